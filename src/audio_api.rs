pub use crate::audio::SampleBuffer;
pub use crate::ids::ToneId;
pub use crate::synth::Tone;

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // Schedule one synthesized tone. Fire-and-forget: it decays on its own.
    Play(Tone),

    // Stop a scheduled tone early. Unknown or finished ids are ignored.
    Cancel(ToneId),

    // The engine can't resample (it runs in the audio callback), so buffers
    // must already be at the output rate before they're sent.
    PlayBuffer { buffer: SampleBuffer, gain: f32 },
}

/// Where synthesized tones go. The real implementation forwards commands to the
/// audio thread; when no output device could be opened a silent sink is used
/// instead so key presses still succeed.
pub trait ToneSink {
    fn send(&self, cmd: AudioCommand);
    fn sample_rate(&self) -> u32;
}

/// Output used when the audio device can't be initialized. Drops everything.
#[derive(Clone, Copy, Debug)]
pub struct SilentSink {
    pub sample_rate: u32,
}

impl ToneSink for SilentSink {
    fn send(&self, cmd: AudioCommand) {
        if let AudioCommand::Play(tone) = cmd {
            tracing::trace!(tone = tone.id.0, "no audio output, dropping tone");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
