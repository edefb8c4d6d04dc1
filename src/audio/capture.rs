use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::*;
use ringbuf::HeapRb;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::audio::codec::{CAPTURE_BLOCK_SAMPLES, CAPTURE_RATE_HZ};
use crate::error::DeviceError;

/// Seam between the controller and the microphone so sessions can be
/// driven with an in-process source in tests.
pub trait CaptureSource: Send {
    /// Acquires the device and starts delivering fixed-size blocks of
    /// normalized mono samples at 16 kHz.
    fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, DeviceError>;

    /// Releases the device. Idempotent.
    fn stop(&mut self);
}

/// Real microphone capture.
///
/// The cpal stream lives on a dedicated thread (cpal streams are not
/// `Send`): the device callback pushes raw samples into an SPSC ring and
/// the owning thread assembles 4096-sample blocks, decimating to 16 kHz
/// when the device runs at 32 or 48 kHz. The ring is lossy when full; a
/// capture glitch must not stall the device callback.
pub struct MicCapture {
    stop_flag: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl MicCapture {
    pub fn new() -> Self {
        Self {
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MicCapture {
    fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, DeviceError> {
        let (block_tx, block_rx) = mpsc::channel::<Vec<f32>>(32);
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), DeviceError>>();

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = Arc::clone(&self.stop_flag);

        let worker = thread::spawn(move || {
            capture_thread(block_tx, ready_tx, stop_flag);
        });
        self.worker = Some(worker);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(block_rx),
            Ok(Err(e)) => {
                self.stop();
                Err(e)
            }
            Err(_) => {
                self.stop();
                Err(DeviceError::Backend("capture thread exited early".into()))
            }
        }
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_thread(
    block_tx: mpsc::Sender<Vec<f32>>,
    ready_tx: std_mpsc::Sender<Result<(), DeviceError>>,
    stop_flag: Arc<AtomicBool>,
) {
    let (stream, device_rate, mut consumer) = match open_input_stream() {
        Ok(parts) => parts,
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

    // 16 kHz divides every accepted device rate, so decimation is a plain
    // block average over `factor` samples.
    let factor = (device_rate / CAPTURE_RATE_HZ) as usize;
    let raw_block = CAPTURE_BLOCK_SAMPLES * factor;
    let mut raw = vec![0.0f32; raw_block];

    while !stop_flag.load(Ordering::SeqCst) {
        if consumer.occupied_len() < raw_block {
            thread::sleep(Duration::from_millis(10));
            continue;
        }
        let _ = consumer.pop_slice(&mut raw);

        let block: Vec<f32> = if factor == 1 {
            raw.clone()
        } else {
            raw.chunks_exact(factor)
                .map(|group| group.iter().sum::<f32>() / factor as f32)
                .collect()
        };

        // Lossy when the control loop lags: dropping a block beats letting
        // capture latency accumulate.
        match block_tx.try_send(block) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("capture block dropped, control loop behind");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("capture block channel closed, stopping capture");
                break;
            }
        }
    }

    drop(stream);
    info!("capture thread stopped");
}

type InputParts = (cpal::Stream, u32, ringbuf::HeapCons<f32>);

fn open_input_stream() -> Result<InputParts, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(DeviceError::NoInputDevice)?;

    info!("audio input device: {}", device.name().unwrap_or_default());

    // Prefer the wire rate; 32 k and 48 k decimate cleanly.
    let target_rates = [CAPTURE_RATE_HZ, 48_000, 32_000];
    let mut selected = None;
    for &rate in &target_rates {
        for range in device.supported_input_configs()? {
            if range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate {
                selected = Some((range.with_sample_rate(cpal::SampleRate(rate)), rate));
                break;
            }
        }
        if selected.is_some() {
            break;
        }
    }
    let (config, device_rate) = match selected {
        Some(parts) => parts,
        None => {
            let def = device.default_input_config()?;
            let rate = def.sample_rate().0;
            if !target_rates.contains(&rate) {
                return Err(DeviceError::UnsupportedRate(rate));
            }
            (def, rate)
        }
    };

    let channels = config.channels() as usize;
    info!("capture config: rate={}Hz channels={}", device_rate, channels);

    // Two seconds of headroom between the device callback and the reader.
    let ring = HeapRb::<f32>::new(device_rate as usize * 2);
    let (mut producer, consumer) = ring.split();

    let err_fn = |err| error!("capture stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &_| push_mono(data, channels, &mut producer),
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _: &_| {
                for frame in data.chunks_exact(channels.max(1)) {
                    let sum: f32 = frame.iter().map(|&s| s as f32 / 32768.0).sum();
                    let _ = producer.try_push(sum / channels.max(1) as f32);
                }
            },
            err_fn,
            None,
        )?,
        other => {
            warn!("unsupported capture sample format: {:?}", other);
            return Err(DeviceError::Backend(format!(
                "unsupported sample format {other:?}"
            )));
        }
    };

    Ok((stream, device_rate, consumer))
}

fn push_mono<P>(input: &[f32], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    if channels <= 1 {
        // Partial pushes drop samples when the ring is full (lossy).
        producer.push_slice(input);
        return;
    }
    for frame in input.chunks_exact(channels) {
        let sum: f32 = frame.iter().sum();
        let _ = producer.try_push(sum / channels as f32);
    }
}
