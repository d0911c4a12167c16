//! Take recording.
//!
//! A [`Recorder`] moves between `Idle`, `Recording` and `Paused`. Key presses
//! are captured as `(pitch, offset_ms)` events, where the offset excludes time
//! spent paused. Vocal takes additionally hold a microphone lease for the
//! duration of the take and capture raw frames from it.
//!
//! The microphone is exclusive: one [`SharedMicrophone`] hands out at most one
//! [`MicLease`] at a time, and the lease gives the device back when dropped, so
//! `stop`, `clear` and dropping the recorder all release it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{SampleBuffer, StereoFrame};
use crate::error::{Result, WindError};
use crate::mixer::TrackEvent;

/// A running capture stream.
pub trait InputSource {
    fn try_recv(&mut self) -> Option<Vec<StereoFrame>>;
    fn sample_rate(&self) -> u32;
}

/// Something that can open a capture stream.
pub trait Microphone {
    fn open(&self) -> Result<Box<dyn InputSource>>;
}

#[derive(Clone)]
pub struct SharedMicrophone {
    device: Arc<dyn Microphone + Send + Sync>,
    held: Arc<AtomicBool>,
}

impl SharedMicrophone {
    pub fn new(device: impl Microphone + Send + Sync + 'static) -> Self {
        Self {
            device: Arc::new(device),
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Fails fast with `DeviceBusy` if another lease is alive or an open is
    /// already in flight.
    pub fn acquire(&self) -> Result<MicLease> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WindError::DeviceBusy);
        }
        match self.device.open() {
            Ok(source) => Ok(MicLease {
                source: Some(source),
                held: self.held.clone(),
            }),
            Err(e) => {
                self.held.store(false, Ordering::Release);
                Err(e)
            }
        }
    }
}

pub struct MicLease {
    source: Option<Box<dyn InputSource>>,
    held: Arc<AtomicBool>,
}

impl MicLease {
    pub fn sample_rate(&self) -> u32 {
        self.source.as_ref().map_or(0, |s| s.sample_rate())
    }

    fn try_recv(&mut self) -> Option<Vec<StereoFrame>> {
        self.source.as_mut()?.try_recv()
    }
}

impl Drop for MicLease {
    fn drop(&mut self) {
        // close the stream before letting anyone else open the device
        self.source.take();
        self.held.store(false, Ordering::Release);
        tracing::debug!("microphone released");
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
}

impl RecorderState {
    pub fn label(self) -> &'static str {
        match self {
            RecorderState::Idle => "IDLE",
            RecorderState::Recording => "REC",
            RecorderState::Paused => "PAUSED",
        }
    }
}

/// What a finished recording produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Take {
    pub events: Vec<TrackEvent>,
    pub audio: Option<SampleBuffer>,
}

pub struct Recorder {
    state: RecorderState,
    microphone: Option<SharedMicrophone>,
    lease: Option<MicLease>,
    events: Vec<TrackEvent>,
    audio: Option<SampleBuffer>,
    started: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    has_recording: bool,
    last_take: Option<Take>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Recorder {
    pub fn new(microphone: Option<SharedMicrophone>) -> Self {
        Self {
            state: RecorderState::Idle,
            microphone,
            lease: None,
            events: Vec::new(),
            audio: None,
            started: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            has_recording: false,
            last_take: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn has_recording(&self) -> bool {
        self.has_recording
    }

    pub fn is_capturing_audio(&self) -> bool {
        self.lease.is_some()
    }

    pub fn last_take(&self) -> Option<&Take> {
        self.last_take.as_ref()
    }

    /// Begin a new take. `needs_input` asks for the microphone; if it can't be
    /// acquired the error is returned and nothing changes. Calling this while a
    /// take is already running does nothing.
    pub fn start(&mut self, needs_input: bool, now: Instant) -> Result<()> {
        if self.state != RecorderState::Idle {
            return Ok(());
        }

        let lease = if needs_input {
            let mic = self.microphone.as_ref().ok_or_else(|| {
                WindError::DeviceUnavailable("no microphone configured".into())
            })?;
            Some(mic.acquire()?)
        } else {
            None
        };

        self.audio = lease.as_ref().map(|l| SampleBuffer::new(l.sample_rate()));
        self.lease = lease;
        self.events.clear();
        self.has_recording = false;
        self.last_take = None;
        self.started = Some(now);
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.state = RecorderState::Recording;
        tracing::debug!(microphone = needs_input, "recording started");
        Ok(())
    }

    pub fn pause(&mut self, now: Instant) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.poll_input();
        self.paused_at = Some(now);
        self.state = RecorderState::Paused;
    }

    pub fn resume(&mut self, now: Instant) {
        if self.state != RecorderState::Paused {
            return;
        }
        // whatever the mic delivered while paused is dropped
        self.poll_input();
        if let Some(at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(at);
        }
        self.state = RecorderState::Recording;
    }

    /// Append a played note. Ignored unless recording.
    pub fn record_note(&mut self, pitch: &str, now: Instant) -> bool {
        if self.state != RecorderState::Recording {
            return false;
        }
        let Some(started) = self.started else {
            return false;
        };
        let elapsed = now
            .saturating_duration_since(started)
            .saturating_sub(self.paused_total);
        self.events.push(TrackEvent {
            pitch: pitch.to_string(),
            offset_ms: elapsed.as_millis() as u64,
        });
        true
    }

    /// Drain captured microphone frames. Frames arriving while paused are
    /// discarded.
    pub fn poll_input(&mut self) {
        let Some(lease) = self.lease.as_mut() else {
            return;
        };
        while let Some(frames) = lease.try_recv() {
            if self.state == RecorderState::Recording {
                if let Some(audio) = self.audio.as_mut() {
                    audio.extend(&frames);
                }
            }
        }
    }

    /// Finish the take and release the microphone.
    pub fn stop(&mut self) -> Option<Take> {
        if self.state == RecorderState::Idle {
            return None;
        }
        if self.state == RecorderState::Recording {
            self.poll_input();
        }
        self.lease = None;
        self.state = RecorderState::Idle;
        self.started = None;
        self.paused_at = None;
        self.has_recording = true;

        let take = Take {
            events: std::mem::take(&mut self.events),
            audio: self.audio.take(),
        };
        tracing::debug!(events = take.events.len(), "recording stopped");
        self.last_take = Some(take.clone());
        Some(take)
    }

    /// Drop everything, from any state.
    pub fn clear(&mut self) {
        self.lease = None;
        self.state = RecorderState::Idle;
        self.events.clear();
        self.audio = None;
        self.started = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.has_recording = false;
        self.last_take = None;
    }
}
