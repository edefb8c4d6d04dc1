//! Live duplex transport speaking the BidiGenerateContent WebSocket
//! protocol: one `setup` message up front, then `realtimeInput` media
//! chunks out and `serverContent` messages in.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{OpenRequest, SendQueue, SessionTransport, TransportEvent};
use crate::audio::codec::AudioFrame;
use crate::error::ConnectionError;
use crate::session::transcript::Speaker;

const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/\
google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// How many unsent frames may be queued before the oldest is dropped.
/// Eight 4096-sample blocks is about two seconds of audio.
const SEND_QUEUE_FRAMES: usize = 8;

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
}

impl LiveConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
        }
    }
}

/// One long-lived transport per session, explicitly opened and closed.
pub struct LiveTransport {
    config: LiveConfig,
    queue: Arc<SendQueue>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    opened: bool,
}

impl LiveTransport {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            queue: Arc::new(SendQueue::new(SEND_QUEUE_FRAMES)),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            opened: false,
        }
    }
}

#[async_trait]
impl SessionTransport for LiveTransport {
    async fn open(
        &mut self,
        request: &OpenRequest,
    ) -> Result<mpsc::Receiver<TransportEvent>, ConnectionError> {
        self.cancel = CancellationToken::new();
        let url = format!("{}?key={}", self.config.endpoint, self.config.api_key);
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(classify_connect_error)?;
        let (mut sink, mut stream) = ws.split();

        let setup = build_setup(&self.config.model, request);
        sink.send(tungstenite::Message::Text(setup.to_string().into()))
            .await
            .map_err(|e| ConnectionError::NetworkUnreachable(e.to_string()))?;

        // The server acknowledges the setup before any content flows.
        loop {
            match stream.next().await {
                Some(Ok(msg)) => {
                    if let Some(value) = message_json(&msg) {
                        if value.get("setupComplete").is_some() {
                            break;
                        }
                        debug!("ignoring pre-setup message");
                    }
                }
                Some(Err(e)) => {
                    return Err(ConnectionError::NetworkUnreachable(e.to_string()));
                }
                None => {
                    return Err(ConnectionError::RemoteRejected(
                        "channel closed during setup".into(),
                    ));
                }
            }
        }

        let (events_tx, events_rx) = mpsc::channel::<TransportEvent>(256);

        // Writer: drains the lossy send queue in capture order.
        let queue = Arc::clone(&self.queue);
        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = sink.send(tungstenite::Message::Close(None)).await;
                        break;
                    }
                    frame = queue.pop() => {
                        let msg = realtime_input(&frame);
                        if let Err(e) = sink
                            .send(tungstenite::Message::Text(msg.to_string().into()))
                            .await
                        {
                            warn!("send failed, closing channel: {}", e);
                            cancel.cancel();
                            break;
                        }
                    }
                }
            }
        }));

        // Reader: maps serverContent messages to events, preserving the
        // remote arrival order.
        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = stream.next() => match next {
                        Some(Ok(msg)) => {
                            if let Some(value) = message_json(&msg) {
                                deliver_server_message(value, &events_tx).await;
                            } else if matches!(msg, tungstenite::Message::Close(_)) {
                                let _ = events_tx.send(TransportEvent::Closed).await;
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!("receive failed: {}", e);
                            let _ = events_tx.send(TransportEvent::Closed).await;
                            break;
                        }
                        None => {
                            let _ = events_tx.send(TransportEvent::Closed).await;
                            break;
                        }
                    },
                }
            }
        }));

        self.opened = true;
        Ok(events_rx)
    }

    fn send(&self, frame: AudioFrame) {
        self.queue.push(frame);
    }

    async fn close(&mut self) {
        if !self.opened {
            return;
        }
        self.opened = false;
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        debug!(
            dropped = self.queue.dropped(),
            "transport closed, frames dropped under backpressure"
        );
    }
}

fn classify_connect_error(err: tungstenite::Error) -> ConnectionError {
    match &err {
        tungstenite::Error::Http(resp) => {
            let code = resp.status().as_u16();
            if code == 401 || code == 403 {
                ConnectionError::AuthInvalid
            } else {
                ConnectionError::RemoteRejected(format!("handshake rejected: {}", code))
            }
        }
        _ => {
            let text = err.to_string();
            if text.contains("401") || text.contains("403") {
                ConnectionError::AuthInvalid
            } else {
                ConnectionError::NetworkUnreachable(text)
            }
        }
    }
}

fn build_setup(model: &str, request: &OpenRequest) -> serde_json::Value {
    let mut setup = serde_json::json!({
        "model": format!("models/{}", model),
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": request.voice_profile }
                }
            }
        },
        "systemInstruction": { "parts": [ { "text": request.system_behavior } ] }
    });
    if request.request_input_transcript {
        setup["inputAudioTranscription"] = serde_json::json!({});
    }
    if request.request_output_transcript {
        setup["outputAudioTranscription"] = serde_json::json!({});
    }
    serde_json::json!({ "setup": setup })
}

fn realtime_input(frame: &AudioFrame) -> serde_json::Value {
    serde_json::json!({
        "realtimeInput": {
            "mediaChunks": [
                { "mimeType": frame.mime_type(), "data": frame.to_base64() }
            ]
        }
    })
}

fn message_json(msg: &tungstenite::Message) -> Option<serde_json::Value> {
    match msg {
        tungstenite::Message::Text(text) => serde_json::from_str(text).ok(),
        tungstenite::Message::Binary(bytes) => serde_json::from_slice(bytes).ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    server_content: Option<ServerContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    input_transcription: Option<Transcription>,
    output_transcription: Option<Transcription>,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

async fn deliver_server_message(
    value: serde_json::Value,
    events_tx: &mpsc::Sender<TransportEvent>,
) {
    let parsed: ServerMessage = match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("unrecognized server message: {}", e);
            return;
        }
    };
    let Some(content) = parsed.server_content else {
        return;
    };

    if let Some(turn) = content.model_turn {
        for part in turn.parts {
            let Some(inline) = part.inline_data else {
                continue;
            };
            match BASE64.decode(inline.data.as_bytes()) {
                Ok(bytes) => {
                    let _ = events_tx.send(TransportEvent::Audio(bytes)).await;
                }
                Err(e) => warn!("dropping undecodable audio chunk: {}", e),
            }
        }
    }

    // The live API delivers transcription increments as authoritative
    // fragments, so each one is final at arrival time.
    if let Some(t) = content.input_transcription {
        if !t.text.is_empty() {
            let _ = events_tx
                .send(TransportEvent::Transcript {
                    speaker: Speaker::Caller,
                    text: t.text,
                    is_final: true,
                })
                .await;
        }
    }
    if let Some(t) = content.output_transcription {
        if !t.text.is_empty() {
            let _ = events_tx
                .send(TransportEvent::Transcript {
                    speaker: Speaker::Companion,
                    text: t.text,
                    is_final: true,
                })
                .await;
        }
    }

    if content.interrupted {
        let _ = events_tx.send(TransportEvent::Interruption).await;
    }
}

#[derive(Deserialize)]
struct Transcription {
    #[serde(default)]
    text: String,
}
