use std::time::Duration;

use crate::transport::OpenRequest;

const DEFAULT_SYSTEM_BEHAVIOR: &str = "You are a warm and wise companion for \
people under financial strain. Use short, calm sentences to settle the \
caller's anxiety. Never judge, never lecture.";

/// Per-session configuration. Owned by exactly one controller; a new
/// session gets a fresh copy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub voice_profile: String,
    pub system_behavior: String,
    pub request_input_transcript: bool,
    pub request_output_transcript: bool,

    // Every suspension point in the session lifecycle carries a bound so
    // the controller can never hang in Connecting, Closing or Summarizing.
    pub open_timeout: Duration,
    pub close_timeout: Duration,
    pub summary_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            voice_profile: "Zephyr".to_string(),
            system_behavior: DEFAULT_SYSTEM_BEHAVIOR.to_string(),
            request_input_transcript: true,
            request_output_transcript: true,
            open_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
            summary_timeout: Duration::from_secs(8),
        }
    }
}

impl SessionConfig {
    pub fn open_request(&self) -> OpenRequest {
        OpenRequest {
            voice_profile: self.voice_profile.clone(),
            system_behavior: self.system_behavior.clone(),
            request_input_transcript: self.request_input_transcript,
            request_output_transcript: self.request_output_transcript,
        }
    }
}
