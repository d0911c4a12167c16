use std::path::Path;

use super::frame::StereoFrame;
use crate::error::Result;

/// Captured microphone audio at the rate it was recorded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            data: Vec::new(),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f32 / self.sample_rate as f32
    }

    pub fn extend(&mut self, frames: &[StereoFrame]) {
        self.data.extend_from_slice(frames);
    }

    /// Write as a 32-bit float stereo WAV.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for f in &self.data {
            writer.write_sample(f.left)?;
            writer.write_sample(f.right)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Copy of this buffer at `target_rate`, ready for the output engine.
    pub fn resampled(&self, target_rate: u32) -> Self {
        Self {
            data: resample_linear(&self.data, self.sample_rate, target_rate),
            sample_rate: target_rate,
        }
    }
}

// Takes are short and only replayed, so neighbouring frames are blended
// linearly. The tail holds the last frame.
fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    let Some(&last) = frames.last() else {
        return Vec::new();
    };
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return frames.to_vec();
    }
    let (src, dst) = (source_rate as u64, target_rate as u64);
    let out_len = (frames.len() as u64 * dst).div_ceil(src);

    (0..out_len)
        .map(|i| {
            let idx = (i * src / dst) as usize;
            let t = ((i * src) % dst) as f32 / dst as f32;
            match frames.get(idx + 1) {
                Some(&next) => frames[idx].lerp(next, t),
                None => last,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, rate: u32) -> SampleBuffer {
        SampleBuffer {
            data: (0..n).map(|i| StereoFrame::mono(i as f32 / n as f32)).collect(),
            sample_rate: rate,
        }
    }

    #[test]
    fn same_rate_is_a_copy() {
        let buf = ramp(10, 44_100);
        assert_eq!(buf.resampled(44_100), buf);
    }

    #[test]
    fn upsampling_doubles_length_and_interpolates() {
        let buf = ramp(4, 22_050);
        let up = buf.resampled(44_100);
        assert_eq!(up.sample_rate, 44_100);
        assert_eq!(up.len(), 8);
        // halfway between frame 0 (0.0) and frame 1 (0.25)
        assert!((up.data[1].left - 0.125).abs() < 1e-6);
    }

    #[test]
    fn downsampling_holds_the_tail() {
        let buf = ramp(10, 48_000);
        let down = buf.resampled(16_000);
        assert_eq!(down.len(), 4);
        assert_eq!(down.data[1], buf.data[3]);
        assert_eq!(down.data[3], buf.data[9]);
        assert!(SampleBuffer::new(48_000).resampled(16_000).is_empty());
    }

    #[test]
    fn duration_follows_rate() {
        assert_eq!(ramp(44_100, 44_100).duration_secs(), 1.0);
        assert_eq!(SampleBuffer::new(0).duration_secs(), 0.0);
    }

    #[test]
    fn writes_readable_wav() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("take.wav");
        let buf = ramp(100, 48_000);
        buf.write_wav(&path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 200);
        assert_eq!(samples[20], buf.data[10].left);
    }
}
