use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::capture::CaptureSource;
use crate::audio::codec::{decode_frame, encode_block, CAPTURE_RATE_HZ, PLAYBACK_RATE_HZ};
use crate::audio::playback::PlaybackScheduler;
use crate::config::SessionConfig;
use crate::error::{ConnectionError, DeviceError, SummaryError};
use crate::services::summary::Summarizer;
use crate::session::state::{FailureReason, SessionPhase, TerminalReason};
use crate::session::transcript::{TranscriptAccumulator, TranscriptSegment};
use crate::transport::{SessionTransport, TransportEvent};

/// Closing message when the session ends with nothing said.
pub const FALLBACK_QUIET: &str =
    "Quiet company is a kind of strength too. Whenever you need to talk, I'm here.";
/// Closing message when the summary collaborator fails or times out.
pub const FALLBACK_SUMMARY_FAILED: &str =
    "Thank you for opening up today. Remember, you are not alone in this.";
/// Closing message when the collaborator answers with empty text.
pub const FALLBACK_SUMMARY_EMPTY: &str =
    "Every moment you face this bravely is a step back toward freedom.";

/// Cap on how much finalized transcript goes into the one-shot summary
/// prompt.
const SUMMARY_PROMPT_MAX_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub enum SessionCommand {
    End,
}

/// Caller-side handle for ending a running session.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn end(&self) {
        let _ = self.cmd_tx.send(SessionCommand::End).await;
    }
}

/// What a finished session leaves behind. The transcript itself is
/// discarded with the session; only the closing summary survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub terminal: TerminalReason,
    /// `None` when the session failed before ever capturing.
    pub summary: Option<String>,
    pub final_status: String,
}

/// Orchestrates one voice session: owns the state machine, the transcript
/// log and the wiring between capture, transport and playback. All
/// transitions and event handling run on this one control loop; device
/// callbacks never do more than push or pull a block of samples.
pub struct SessionController {
    id: Uuid,
    config: SessionConfig,
    transport: Box<dyn SessionTransport>,
    capture: Box<dyn CaptureSource>,
    summarizer: Arc<dyn Summarizer>,
    scheduler: Arc<PlaybackScheduler>,
    transcript: TranscriptAccumulator,
    phase: SessionPhase,
    cmd_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn SessionTransport>,
        capture: Box<dyn CaptureSource>,
        summarizer: Arc<dyn Summarizer>,
        scheduler: Arc<PlaybackScheduler>,
    ) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let controller = Self {
            id: Uuid::new_v4(),
            config,
            transport,
            capture,
            summarizer,
            scheduler,
            transcript: TranscriptAccumulator::new(),
            phase: SessionPhase::Idle,
            cmd_rx,
        };
        (controller, SessionHandle { cmd_tx })
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    fn set_phase(&mut self, next: SessionPhase) {
        info!(session = %self.id, from = ?self.phase, to = ?next, "session phase");
        self.phase = next;
    }

    /// Drives the session from `Idle` to `Terminal`. Every suspension
    /// point is bounded, so this future always completes once `end` is
    /// requested or a fatal error occurs.
    pub async fn run(mut self) -> SessionOutcome {
        self.set_phase(SessionPhase::Connecting);

        let open_request = self.config.open_request();
        let opened = timeout(
            self.config.open_timeout,
            self.transport.open(&open_request),
        )
        .await;
        let mut events = match opened {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                return self.fail_without_capture(FailureReason::Connection(e)).await;
            }
            Err(_) => {
                return self
                    .fail_without_capture(FailureReason::Connection(
                        ConnectionError::NetworkUnreachable("open timed out".into()),
                    ))
                    .await;
            }
        };

        // The microphone is acquired only once the channel is up, so an
        // auth failure never touches the capture device.
        let mut blocks = match self.capture.start() {
            Ok(blocks) => blocks,
            Err(e) => {
                return self.fail_without_capture(FailureReason::Capture(e)).await;
            }
        };

        self.set_phase(SessionPhase::Capturing);
        let mut failure: Option<FailureReason> = None;

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(SessionCommand::End) | None => break,
                },
                event = events.recv() => match event {
                    Some(TransportEvent::Audio(bytes)) => {
                        match decode_frame(&bytes, PLAYBACK_RATE_HZ, 1) {
                            Ok(frame) => {
                                self.scheduler.enqueue(frame);
                            }
                            Err(e) => {
                                // Per-frame failure stays local: drop it.
                                warn!(session = %self.id, "dropping corrupt frame: {}", e);
                            }
                        }
                    }
                    Some(TransportEvent::Transcript { speaker, text, is_final }) => {
                        self.transcript.append(TranscriptSegment { speaker, text, is_final });
                    }
                    Some(TransportEvent::Interruption) => {
                        self.scheduler.flush();
                    }
                    Some(TransportEvent::Closed) => {
                        failure = Some(FailureReason::Transport(
                            "channel closed by remote".into(),
                        ));
                        break;
                    }
                    None => {
                        failure = Some(FailureReason::Transport(
                            "event stream ended".into(),
                        ));
                        break;
                    }
                },
                block = blocks.recv() => match block {
                    Some(samples) => {
                        let frame = encode_block(&samples, CAPTURE_RATE_HZ);
                        self.transport.send(frame);
                    }
                    None => {
                        failure = Some(FailureReason::Capture(DeviceError::Backend(
                            "capture stream ended".into(),
                        )));
                        break;
                    }
                },
            }
        }

        // Teardown is one path regardless of why we got here: capture
        // stops, the channel closes, then the summary runs on whatever
        // transcript survived.
        self.set_phase(SessionPhase::Closing);
        self.capture.stop();
        if timeout(self.config.close_timeout, self.transport.close())
            .await
            .is_err()
        {
            warn!(session = %self.id, "transport close timed out");
        }

        self.set_phase(SessionPhase::Summarizing);
        let summary = self.build_summary().await;

        let terminal = match failure {
            None => TerminalReason::Closed,
            Some(reason) => TerminalReason::Failed(reason),
        };
        self.set_phase(SessionPhase::Terminal(terminal.clone()));
        SessionOutcome {
            terminal,
            summary: Some(summary),
            final_status: self.phase.status_line().to_string(),
        }
    }

    /// Failure before `Capturing`: run the cleanup path (the transport
    /// close is idempotent even if it never opened) and land in
    /// `Terminal(Failed)` without a summary.
    async fn fail_without_capture(mut self, reason: FailureReason) -> SessionOutcome {
        warn!(session = %self.id, ?reason, "session failed before capture");
        self.set_phase(SessionPhase::Closing);
        if timeout(self.config.close_timeout, self.transport.close())
            .await
            .is_err()
        {
            warn!(session = %self.id, "transport close timed out");
        }
        let terminal = TerminalReason::Failed(reason);
        self.set_phase(SessionPhase::Terminal(terminal.clone()));
        SessionOutcome {
            terminal,
            summary: None,
            final_status: self.phase.status_line().to_string(),
        }
    }

    /// A failed summary never fails the session: every branch lands on a
    /// fixed message within `summary_timeout`.
    async fn build_summary(&mut self) -> String {
        if !self.transcript.has_finalized() {
            return FALLBACK_QUIET.to_string();
        }

        let text = self.transcript.finalized_text(None);
        let text = tail_bytes(&text, SUMMARY_PROMPT_MAX_BYTES);

        match timeout(self.config.summary_timeout, self.summarizer.summarize(text)).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(SummaryError::EmptyResponse)) => FALLBACK_SUMMARY_EMPTY.to_string(),
            Ok(Err(e)) => {
                warn!(session = %self.id, "summary failed: {}", e);
                FALLBACK_SUMMARY_FAILED.to_string()
            }
            Err(_) => {
                warn!(session = %self.id, "summary timed out");
                FALLBACK_SUMMARY_FAILED.to_string()
            }
        }
    }
}

/// Last `max` bytes of `text`, aligned to a char boundary.
fn tail_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
