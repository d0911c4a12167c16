// The smallest unit of audio; one stereo frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    // synthesized tones are mono, both channels get the same value
    pub fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    pub fn peak(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }

    /// Blend towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            left: self.left + (other.left - self.left) * t,
            right: self.right + (other.right - self.right) * t,
        }
    }
}
