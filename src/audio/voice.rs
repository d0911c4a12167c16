use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use crate::ids::ToneId;
use crate::synth::Tone;

/// One synthesized tone being rendered.
#[derive(Clone, Debug)]
pub struct ToneVoice {
    tone: Tone,
    phase: f32,  // cycles, [0, 1)
    wait: u64,   // silent frames left before the attack
    frames: u64, // frames rendered since the attack started
    pub active: bool,
}

impl ToneVoice {
    /// `wait` is counted in output frames from the start of the next block.
    pub fn new(tone: Tone, wait: u64) -> Self {
        Self {
            tone,
            phase: 0.0,
            wait,
            frames: 0,
            active: true,
        }
    }

    /// Gain this voice still has to give. Voices that haven't reached their
    /// peak yet count as loud.
    pub fn level(&self, sample_rate: f32) -> f32 {
        if !self.active {
            return 0.0;
        }
        let t = self.frames as f32 / sample_rate;
        if self.wait > 0 || t < self.tone.attack_secs {
            return self.tone.peak;
        }
        self.tone.gain_at(t)
    }

    pub fn id(&self) -> ToneId {
        self.tone.id
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame], sample_rate: f32) {
        if !self.active || sample_rate <= 0.0 {
            return;
        }
        let length = self.tone.length_secs();

        for frame in out.iter_mut() {
            if self.wait > 0 {
                self.wait -= 1;
                continue;
            }
            let t = self.frames as f32 / sample_rate;
            self.frames += 1;
            if t >= length {
                self.active = false;
                break;
            }

            let value = self.tone.waveform.sample(self.phase) * self.tone.gain_at(t);
            frame.left += value;
            frame.right += value;

            self.phase += self.tone.frequency_at(t) / sample_rate;
            self.phase -= self.phase.floor();
        }
    }
}

/// Playback of a recorded take.
#[derive(Clone, Debug)]
pub struct BufferVoice {
    buffer: SampleBuffer,
    pos: usize,
    gain: f32,
    pub active: bool,
}

impl BufferVoice {
    pub fn new(buffer: SampleBuffer, gain: f32) -> Self {
        let active = !buffer.is_empty();
        Self {
            buffer,
            pos: 0,
            gain,
            active,
        }
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        if !self.active {
            return;
        }
        let remaining = &self.buffer.data[self.pos..];
        let n = remaining.len().min(out.len());
        for (frame, s) in out.iter_mut().zip(&remaining[..n]) {
            frame.left += s.left * self.gain;
            frame.right += s.right * self.gain;
        }
        self.pos += n;
        if self.pos >= self.buffer.len() {
            self.active = false;
        }
    }
}
