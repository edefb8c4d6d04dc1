use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::audio::playback::PlaybackScheduler;
use crate::error::DeviceError;

/// Speaker output driving a `PlaybackScheduler`.
///
/// Owns the cpal output stream on its own thread (same pattern as capture:
/// cpal streams are not `Send`). The device callback does nothing but
/// `scheduler.fill`, which is the non-blocking minimum.
pub struct SpeakerOutput {
    stop_flag: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SpeakerOutput {
    pub fn start(scheduler: Arc<PlaybackScheduler>) -> Result<Self, DeviceError> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), DeviceError>>();

        let flag = Arc::clone(&stop_flag);
        let worker = thread::spawn(move || {
            output_thread(scheduler, ready_tx, flag);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop_flag,
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(DeviceError::Backend("output thread exited early".into())),
        }
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn output_thread(
    scheduler: Arc<PlaybackScheduler>,
    ready_tx: std_mpsc::Sender<Result<(), DeviceError>>,
    stop_flag: Arc<AtomicBool>,
) {
    let stream = match open_output_stream(scheduler) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.into()));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while !stop_flag.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(20));
    }
    drop(stream);
    info!("output thread stopped");
}

fn open_output_stream(scheduler: Arc<PlaybackScheduler>) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(DeviceError::NoOutputDevice)?;

    info!("audio output device: {}", device.name().unwrap_or_default());

    let rate = scheduler.sample_rate();
    let mut selected = None;
    for range in device.supported_output_configs()? {
        if range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate {
            selected = Some(range.with_sample_rate(cpal::SampleRate(rate)));
            break;
        }
    }
    let config = selected.ok_or(DeviceError::UnsupportedRate(rate))?;
    let channels = config.channels() as usize;

    info!("output config: rate={}Hz channels={}", rate, channels);

    let err_fn = |err| error!("output stream error: {}", err);

    let mut mono = Vec::new();
    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if channels <= 1 {
                    scheduler.fill(data);
                    return;
                }
                // Mono engine on a multi-channel device: fill one channel's
                // worth and duplicate across the frame.
                mono.resize(data.len() / channels, 0.0);
                scheduler.fill(&mut mono);
                for (frame, &s) in data.chunks_exact_mut(channels).zip(mono.iter()) {
                    frame.fill(s);
                }
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(DeviceError::Backend(format!(
                "unsupported output sample format {other:?}"
            )));
        }
    };

    Ok(stream)
}
