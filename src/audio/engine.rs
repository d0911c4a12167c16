use crate::audio_api::AudioCommand;
use crate::synth::Tone;

use super::frame::StereoFrame;
use super::voice::{BufferVoice, ToneVoice};

pub const MAX_VOICES: usize = 32; // hard cap so we won't grow in the audio callback
pub const MAX_PENDING: usize = 4096; // delayed tones waiting for their start frame
const MAX_TAKES: usize = 4;

// a delayed tone, started once the engine clock reaches `start`
struct Pending {
    start: u64,
    tone: Tone,
}

pub struct Engine {
    sample_rate: f32,
    clock: u64, // frames rendered so far
    voices: Vec<ToneVoice>,
    pending: Vec<Pending>,
    takes: Vec<BufferVoice>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            clock: 0,
            voices: Vec::with_capacity(MAX_VOICES),
            pending: Vec::with_capacity(MAX_PENDING),
            takes: Vec::with_capacity(MAX_TAKES),
        }
    }

    /// Voices currently rendering. Delayed tones don't count until they start.
    pub fn active_voices(&self) -> usize {
        self.voices.len() + self.takes.len()
    }

    pub fn pending_tones(&self) -> usize {
        self.pending.len()
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Play(tone) => {
                let delay = (tone.delay_secs.max(0.0) * self.sample_rate).round() as u64;
                if delay == 0 {
                    self.start_voice(tone, 0);
                } else if self.pending.len() < MAX_PENDING {
                    self.pending.push(Pending {
                        start: self.clock + delay,
                        tone,
                    });
                }
                // queue full: the tone is dropped
            }
            AudioCommand::Cancel(id) => {
                self.voices.retain(|v| v.id() != id);
                self.pending.retain(|p| p.tone.id != id);
            }
            AudioCommand::PlayBuffer { buffer, gain } => {
                if self.takes.len() >= MAX_TAKES {
                    self.takes.remove(0);
                }
                self.takes.push(BufferVoice::new(buffer, gain));
            }
        }
    }

    fn start_voice(&mut self, tone: Tone, wait: u64) {
        let voice = ToneVoice::new(tone, wait);
        if self.voices.len() < MAX_VOICES {
            self.voices.push(voice);
            return;
        }
        // full: replace whichever voice has the least left to give
        let sample_rate = self.sample_rate;
        let quietest = self
            .voices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.level(sample_rate).total_cmp(&b.level(sample_rate)))
            .map(|(i, _)| i);
        if let Some(i) = quietest {
            self.voices[i] = voice;
        }
    }

    pub fn render_block(&mut self, frames: &mut [StereoFrame]) {
        let end = self.clock + frames.len() as u64;
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].start < end {
                let due = self.pending.swap_remove(i);
                let wait = due.start.saturating_sub(self.clock);
                self.start_voice(due.tone, wait);
            } else {
                i += 1;
            }
        }

        frames.fill(StereoFrame::zero());
        for v in &mut self.voices {
            v.render_into(frames, self.sample_rate);
        }
        for t in &mut self.takes {
            t.render_into(frames);
        }
        self.voices.retain(|v| v.active);
        self.takes.retain(|t| t.active);
        self.clock = end;
    }
}
