use std::sync::Arc;

use anyhow::Context;
use solace::audio::capture::MicCapture;
use solace::audio::codec::PLAYBACK_RATE_HZ;
use solace::audio::output::SpeakerOutput;
use solace::audio::playback::PlaybackScheduler;
use solace::config::SessionConfig;
use solace::services::summary::GenerateContentClient;
use solace::session::controller::SessionController;
use solace::transport::live::{LiveConfig, LiveTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("solace voice session starting");

    let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;

    let config = SessionConfig::default();
    let scheduler = Arc::new(PlaybackScheduler::new(PLAYBACK_RATE_HZ));
    let mut output = SpeakerOutput::start(Arc::clone(&scheduler))?;

    let transport = Box::new(LiveTransport::new(LiveConfig::new(api_key.clone())));
    let capture = Box::new(MicCapture::new());
    let summarizer = Arc::new(GenerateContentClient::new(api_key));

    let (controller, handle) =
        SessionController::new(config, transport, capture, summarizer, scheduler);

    let session = tokio::spawn(controller.run());

    tracing::info!("session live, press Ctrl+C to end the call");
    tokio::signal::ctrl_c().await?;
    handle.end().await;

    let outcome = session.await?;
    output.stop();

    println!("{}", outcome.final_status);
    if let Some(summary) = outcome.summary {
        println!("closing note: {}", summary);
    }
    Ok(())
}
