use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, ToneSink};
use crate::error::WindError;
use crate::recorder::{InputSource, Microphone};

mod engine;
mod frame;
mod sample_buffer;
mod voice;

pub use engine::{Engine, MAX_VOICES};
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl ToneSink for AudioHandle {
    fn send(&self, cmd: AudioCommand) {
        // a full queue drops the note rather than blocking the key press
        if self.tx.try_send(cmd).is_err() {
            tracing::debug!("audio command queue full, dropping command");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let output_stream =
                build_output_stream_f32(&device, &config.into(), rx, sample_rate, channels)?;
            output_stream.play().context("failed to play output stream")?;
            tracing::info!(sample_rate, channels, "audio output started");

            Ok(AudioHandle {
                tx,
                sample_rate,
                _output_stream: output_stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    sample_rate: u32,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(sample_rate);
    let mut scratch = vec![StereoFrame::zero(); 4096];

    let err_fn = |err| tracing::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            if scratch.len() < n_frames {
                scratch.resize(n_frames, StereoFrame::zero());
            }
            let frames = &mut scratch[..n_frames];
            engine.render_block(frames);

            // interleave; extra channels past stereo stay silent
            for (out, f) in data.chunks_mut(channels.max(1)).zip(frames.iter()) {
                out.fill(0.0);
                out[0] = f.left;
                if out.len() > 1 {
                    out[1] = f.right;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

// ── Input stream ──────────────────────────────────────────────────

/// The system's default capture device.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpalMicrophone;

struct CpalInput {
    rx: Receiver<Vec<StereoFrame>>,
    sample_rate: u32,
    _stream: cpal::Stream, // capture stops when this drops
}

impl InputSource for CpalInput {
    fn try_recv(&mut self) -> Option<Vec<StereoFrame>> {
        self.rx.try_recv().ok()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Microphone for CpalMicrophone {
    fn open(&self) -> Result<Box<dyn InputSource>, WindError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| WindError::DeviceUnavailable("no default input device".into()))?;

        let supported = device
            .default_input_config()
            .map_err(|e| WindError::DeviceUnavailable(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(WindError::DeviceUnavailable(format!(
                "unsupported input sample format {:?}",
                supported.sample_format()
            )));
        }
        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate = stream_config.sample_rate;
        let in_channels = stream_config.channels as usize;

        let (tx, rx) = crossbeam_channel::bounded::<Vec<StereoFrame>>(2048);
        let stream = build_input_stream(&device, &stream_config, in_channels, tx)
            .map_err(|e| WindError::DeviceUnavailable(e.to_string()))?;
        stream
            .play()
            .map_err(|e| WindError::DeviceUnavailable(e.to_string()))?;
        tracing::info!(sample_rate, in_channels, "microphone opened");

        Ok(Box::new(CpalInput {
            rx,
            sample_rate,
            _stream: stream,
        }))
    }
}

fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    in_channels: usize,
    tx: Sender<Vec<StereoFrame>>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let err_fn = |err| tracing::error!("audio input stream error: {err}");

    device.build_input_stream(
        config,
        move |data: &[f32], _info: &cpal::InputCallbackInfo| {
            let frames: Vec<StereoFrame> = if in_channels <= 1 {
                data.iter().map(|&s| StereoFrame::mono(s)).collect()
            } else {
                data.chunks_exact(in_channels)
                    .map(|c| StereoFrame {
                        left: c[0],
                        right: c[1],
                    })
                    .collect()
            };

            let _ = tx.try_send(frames);
        },
        err_fn,
        None,
    )
}
