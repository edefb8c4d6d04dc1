use crate::error::{ConnectionError, DeviceError};

/// Why a session ended in failure. Carried into the terminal state so the
/// caller can route `AuthInvalid` to re-authentication instead of retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Capture(DeviceError),
    Connection(ConnectionError),
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalReason {
    Closed,
    Failed(FailureReason),
}

/// The session lifecycle. Exactly one controller owns the current phase;
/// these transitions are the single source of truth for whether capture,
/// transport and playback are active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Capturing,
    Closing,
    Summarizing,
    Terminal(TerminalReason),
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Terminal(_))
    }

    /// Short user-visible status for the current phase.
    pub fn status_line(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "ready when you are",
            SessionPhase::Connecting => "opening a secure channel...",
            SessionPhase::Capturing => "listening, this is a safe space...",
            SessionPhase::Closing => "ending the call...",
            SessionPhase::Summarizing => "writing a closing note...",
            SessionPhase::Terminal(TerminalReason::Closed) => "call ended",
            SessionPhase::Terminal(TerminalReason::Failed(reason)) => match reason {
                FailureReason::Capture(_) => "microphone unavailable or permission denied",
                FailureReason::Connection(ConnectionError::AuthInvalid) => {
                    "sign-in expired, please re-authenticate"
                }
                FailureReason::Connection(_) => "could not connect, please check the network",
                FailureReason::Transport(_) => "connection lost, the call has ended",
            },
        }
    }
}
