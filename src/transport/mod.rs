pub mod live;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::debug;

use crate::audio::codec::AudioFrame;
use crate::error::ConnectionError;
use crate::session::transcript::Speaker;

/// Session open parameters handed to the transport collaborator.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub voice_profile: String,
    pub system_behavior: String,
    pub request_input_transcript: bool,
    pub request_output_transcript: bool,
}

/// Events surfaced by the transport, delivered in remote arrival order on
/// the session control loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Raw PCM16 bytes of synthesized speech.
    Audio(Vec<u8>),
    Transcript {
        speaker: Speaker,
        text: String,
        is_final: bool,
    },
    /// Signal-only: the remote side started a new utterance; unstarted
    /// playback must be discarded.
    Interruption,
    /// The channel is gone. No events follow this one.
    Closed,
}

/// The single bidirectional channel to the remote model.
///
/// `send` must never block on network backpressure; implementations drop
/// the oldest unsent frame instead of accumulating unbounded latency.
/// `close` is idempotent and guarantees no events are delivered after it
/// returns.
#[async_trait]
pub trait SessionTransport: Send {
    async fn open(
        &mut self,
        request: &OpenRequest,
    ) -> Result<mpsc::Receiver<TransportEvent>, ConnectionError>;

    fn send(&self, frame: AudioFrame);

    async fn close(&mut self);
}

/// Bounded outbound frame queue with the documented lossy policy: when
/// full, the oldest unsent frame is dropped so latency stays bounded.
/// Drops are counted so the loss is observable without a caller-facing
/// event.
#[derive(Debug)]
pub struct SendQueue {
    capacity: usize,
    frames: Mutex<VecDeque<AudioFrame>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            frames: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Non-blocking enqueue from the control loop.
    pub fn push(&self, frame: AudioFrame) {
        {
            let mut frames = self.frames.lock().unwrap();
            if frames.len() >= self.capacity {
                frames.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(dropped, "send queue full, dropped oldest frame");
            }
            frames.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Awaited by the writer task; resolves with the next frame in capture
    /// order.
    pub async fn pop(&self) -> AudioFrame {
        loop {
            let notified = self.notify.notified();
            if let Some(frame) = self.frames.lock().unwrap().pop_front() {
                return frame;
            }
            notified.await;
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
