use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use crate::audio::codec::PlayableFrame;

/// A decoded frame bound to a scheduled start time on the output device's
/// monotonic clock. Created at enqueue, destroyed at playback completion
/// or flush.
#[derive(Debug)]
struct BufferEntry {
    samples: Vec<f32>,
    start_time: f64,
}

#[derive(Debug)]
struct Playing {
    samples: Vec<f32>,
    cursor: usize,
}

#[derive(Debug)]
struct Inner {
    /// The single piece of state touched by both `enqueue` and `flush`.
    next_free_time: f64,
    queue: VecDeque<BufferEntry>,
    playing: Option<Playing>,
    /// Samples emitted to the device so far; the device clock is derived
    /// from this, so tests can drive time by pulling samples.
    clock_samples: u64,
    delivered: u64,
}

/// Gapless playback queue. Frames are scheduled back to back regardless of
/// network jitter: each one starts at `max(next_free_time, now)` and the
/// anchor advances by the frame duration, so entries never overlap and no
/// silence is inserted beyond natural arrival gaps.
///
/// `enqueue`/`flush` run on the session control loop while `fill` runs on
/// the device callback thread, hence the mutex around the anchor and queue.
#[derive(Debug)]
pub struct PlaybackScheduler {
    sample_rate: u32,
    inner: Mutex<Inner>,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            inner: Mutex::new(Inner {
                next_free_time: 0.0,
                queue: VecDeque::new(),
                playing: None,
                clock_samples: 0,
                delivered: 0,
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current device clock, in seconds since the stream started.
    pub fn now(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        inner.clock_samples as f64 / self.sample_rate as f64
    }

    /// Schedules a decoded frame for gapless playback and returns its
    /// start time on the device clock.
    pub fn enqueue(&self, frame: PlayableFrame) -> f64 {
        let samples = frame.into_mono();
        let duration = samples.len() as f64 / self.sample_rate as f64;

        let mut inner = self.inner.lock().unwrap();
        let now = inner.clock_samples as f64 / self.sample_rate as f64;
        let start_time = inner.next_free_time.max(now);
        inner.next_free_time = start_time + duration;
        inner.queue.push_back(BufferEntry {
            samples,
            start_time,
        });
        start_time
    }

    /// Barge-in: cancels every scheduled-but-not-started entry and resets
    /// the anchor to "now". The entry already playing is left to finish so
    /// we never cut mid-sample and click. Returns how many entries were
    /// cancelled.
    pub fn flush(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let cancelled = inner.queue.len();
        inner.queue.clear();
        inner.next_free_time = inner.clock_samples as f64 / self.sample_rate as f64;
        if cancelled > 0 {
            debug!(cancelled, "playback queue flushed");
        }
        cancelled
    }

    /// Device callback entry point: writes the next `out.len()` samples of
    /// output, pulling queued entries as their start times arrive and
    /// padding with silence elsewhere. Sample-accurate and non-blocking
    /// apart from the queue lock.
    pub fn fill(&self, out: &mut [f32]) {
        let mut inner = self.inner.lock().unwrap();
        let rate = self.sample_rate as f64;

        for slot in out.iter_mut() {
            if inner
                .playing
                .as_ref()
                .is_some_and(|p| p.cursor >= p.samples.len())
            {
                inner.playing = None;
            }

            if inner.playing.is_none() {
                let t = inner.clock_samples as f64 / rate;
                let due = inner
                    .queue
                    .front()
                    .is_some_and(|entry| entry.start_time <= t + 1e-9);
                if due {
                    if let Some(entry) = inner.queue.pop_front() {
                        inner.playing = Some(Playing {
                            samples: entry.samples,
                            cursor: 0,
                        });
                        inner.delivered += 1;
                    }
                }
            }

            *slot = match inner.playing.as_mut() {
                Some(p) if p.cursor < p.samples.len() => {
                    let s = p.samples[p.cursor];
                    p.cursor += 1;
                    s
                }
                _ => 0.0,
            };
            inner.clock_samples += 1;
        }
    }

    /// Entries waiting for their start time (not counting the one playing).
    pub fn queued_len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Entries handed to the output device since the stream started.
    pub fn delivered_entries(&self) -> u64 {
        self.inner.lock().unwrap().delivered
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing.is_some()
    }
}
