//! Tone synthesis.
//!
//! Every timbre class maps to an oscillator shape and an attack/decay envelope.
//! The envelope ramps linearly from silence to `amplitude * gain_scale` over the
//! attack window, then falls exponentially toward [`ENVELOPE_FLOOR`] (never to
//! exactly zero) over the decay window. Each call builds an independent
//! [`Tone`]; nothing is shared between calls except the output bus.

use crate::audio_api::{AudioCommand, ToneSink};
use crate::ids::{next_tone_id, ToneId};
use crate::instrument::TimbreClass;

/// Where the exponential decay ends up.
pub const ENVELOPE_FLOOR: f32 = 0.001;

pub const VIBRATO_RATE_HZ: f32 = 5.0;
pub const VIBRATO_DEPTH_HZ: f32 = 10.0;
pub const VIBRATO_SECS: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

impl Waveform {
    /// One sample of the waveform at `phase` in cycles, `[0, 1)`.
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (std::f32::consts::TAU * phase).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimbreProfile {
    pub waveform: Waveform,
    pub attack_secs: f32,
    pub decay_secs: f32,
    pub gain_scale: f32,
}

pub fn profile(timbre: TimbreClass) -> TimbreProfile {
    match timbre {
        TimbreClass::Flute => TimbreProfile {
            waveform: Waveform::Sine,
            attack_secs: 0.1,
            decay_secs: 1.5,
            gain_scale: 0.3,
        },
        TimbreClass::Sax => TimbreProfile {
            waveform: Waveform::Sawtooth,
            attack_secs: 0.1,
            decay_secs: 2.0,
            gain_scale: 0.4,
        },
        TimbreClass::Trumpet => TimbreProfile {
            waveform: Waveform::Square,
            attack_secs: 0.05,
            decay_secs: 1.2,
            gain_scale: 0.3,
        },
        TimbreClass::Clarinet => TimbreProfile {
            waveform: Waveform::Triangle,
            attack_secs: 0.1,
            decay_secs: 1.8,
            gain_scale: 0.3,
        },
    }
}

/// A fully resolved tone, ready for the audio engine.
#[derive(Clone, Debug)]
pub struct Tone {
    pub id: ToneId,
    pub waveform: Waveform,
    pub frequency: f32,
    pub peak: f32,
    pub attack_secs: f32,
    pub decay_secs: f32,
    pub duration_secs: f32,
    pub vibrato: bool,
    pub delay_secs: f32, // silence before the attack starts
}

impl Tone {
    /// Seconds from the start of the attack until the tone is silent.
    pub fn length_secs(&self) -> f32 {
        self.duration_secs.min(self.attack_secs + self.decay_secs)
    }

    /// Envelope gain `t` seconds after the attack started.
    pub fn gain_at(&self, t: f32) -> f32 {
        if t < 0.0 || t >= self.length_secs() {
            return 0.0;
        }
        if t < self.attack_secs {
            return self.peak * t / self.attack_secs;
        }
        let progress = ((t - self.attack_secs) / self.decay_secs).clamp(0.0, 1.0);
        let floor = ENVELOPE_FLOOR.min(self.peak);
        if self.peak <= 0.0 {
            return 0.0;
        }
        self.peak * (floor / self.peak).powf(progress)
    }

    /// Instantaneous frequency, including vibrato when enabled.
    pub fn frequency_at(&self, t: f32) -> f32 {
        if self.vibrato && (0.0..VIBRATO_SECS).contains(&t) {
            let wobble = (std::f32::consts::TAU * VIBRATO_RATE_HZ * t).sin();
            self.frequency + VIBRATO_DEPTH_HZ * wobble
        } else {
            self.frequency
        }
    }
}

/// Everything needed to schedule one tone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneRequest {
    pub timbre: TimbreClass,
    pub frequency: f64,
    pub amplitude: f32, // 0.0..=1.0
    pub duration_ms: u32,
    pub vibrato: bool,
    pub delay_ms: u64,
}

impl ToneRequest {
    pub fn new(timbre: TimbreClass, frequency: f64, amplitude: f32, duration_ms: u32) -> Self {
        Self {
            timbre,
            frequency,
            amplitude,
            duration_ms,
            vibrato: false,
            delay_ms: 0,
        }
    }

    /// Resolve the timbre into a concrete tone. `None` when the request would be
    /// inaudible or the frequency is unusable.
    pub fn build(&self) -> Option<Tone> {
        let amplitude = if self.amplitude.is_nan() {
            0.0
        } else {
            self.amplitude.clamp(0.0, 1.0)
        };
        if amplitude <= 0.0 || !self.frequency.is_finite() || self.frequency <= 0.0 {
            return None;
        }
        if self.duration_ms == 0 {
            return None;
        }
        let p = profile(self.timbre);
        Some(Tone {
            id: next_tone_id(),
            waveform: p.waveform,
            frequency: self.frequency as f32,
            peak: amplitude * p.gain_scale,
            attack_secs: p.attack_secs,
            decay_secs: p.decay_secs,
            duration_secs: self.duration_ms as f32 / 1000.0,
            vibrato: self.vibrato,
            delay_secs: self.delay_ms as f32 / 1000.0,
        })
    }
}

pub struct Synthesizer {
    sink: Box<dyn ToneSink>,
}

impl Synthesizer {
    pub fn new(sink: Box<dyn ToneSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &dyn ToneSink {
        self.sink.as_ref()
    }

    /// Fire-and-forget: schedule a tone and return immediately. Never fails;
    /// inaudible requests are dropped.
    pub fn play(
        &self,
        timbre: TimbreClass,
        frequency: f64,
        amplitude: f32,
        duration_ms: u32,
    ) -> Option<ToneId> {
        self.schedule(ToneRequest::new(timbre, frequency, amplitude, duration_ms))
    }

    pub fn schedule(&self, req: ToneRequest) -> Option<ToneId> {
        let tone = req.build()?;
        let id = tone.id;
        self.sink.send(AudioCommand::Play(tone));
        Some(id)
    }

    pub fn cancel(&self, id: ToneId) {
        self.sink.send(AudioCommand::Cancel(id));
    }
}
