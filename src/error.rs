use thiserror::Error;

/// Fatal-at-start audio device failures. A device error mid-session is
/// routed through the normal teardown path, never retried in place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("no output device available")]
    NoOutputDevice,

    #[error("unsupported device sample rate: {0} Hz")]
    UnsupportedRate(u32),

    #[error("audio backend error: {0}")]
    Backend(String),
}

impl From<cpal::DevicesError> for DeviceError {
    fn from(err: cpal::DevicesError) -> Self {
        DeviceError::Backend(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for DeviceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        DeviceError::Backend(err.to_string())
    }
}

impl From<cpal::SupportedStreamConfigsError> for DeviceError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        DeviceError::Backend(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for DeviceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        DeviceError::Backend(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for DeviceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        DeviceError::Backend(err.to_string())
    }
}

/// Closed error set reported by the transport collaborator at open time.
/// `AuthInvalid` is surfaced distinctly so the caller can route to
/// re-authentication instead of a generic retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("authentication rejected by the remote service")]
    AuthInvalid,

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("remote service rejected the session: {0}")]
    RemoteRejected(String),
}

/// Per-frame decode failure. Recovered by dropping the frame; a single
/// corrupt frame must not terminate playback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("wire frame of {len} bytes is not a whole number of {channels}-channel i16 samples")]
pub struct DecodeError {
    pub len: usize,
    pub channels: u16,
}

/// One-shot summary failure. Never user-visible: the controller degrades
/// every variant to a fixed fallback message.
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("summary request failed: {0}")]
    Http(String),

    #[error("summary response contained no text")]
    EmptyResponse,
}
