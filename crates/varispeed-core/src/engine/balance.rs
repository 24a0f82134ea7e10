//! Stereo balance stage
//!
//! Routes the output to the left channel, the right channel, or both. The
//! channel gains ramp linearly over a few milliseconds when the mode changes
//! so switching never clicks.

use crate::types::StereoBuffer;

/// Gain ramp time in seconds when the balance mode changes
const RAMP_SECONDS: f64 = 0.005;

/// Stereo balance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanMode {
    /// Left channel only
    Left,
    /// Right channel only
    Right,
    /// Both channels
    #[default]
    Stereo,
}

impl PanMode {
    /// Target (left, right) channel gains for this mode
    pub fn gains(self) -> (f32, f32) {
        match self {
            PanMode::Left => (1.0, 0.0),
            PanMode::Right => (0.0, 1.0),
            PanMode::Stereo => (1.0, 1.0),
        }
    }
}

/// Per-channel gain stage with click-free mode switching
pub struct BalanceStage {
    mode: PanMode,
    left_gain: f32,
    right_gain: f32,
    /// Per-sample gain step toward the target
    ramp_step: f32,
}

impl BalanceStage {
    pub fn new_with_sample_rate(sample_rate: u32) -> Self {
        Self {
            mode: PanMode::Stereo,
            left_gain: 1.0,
            right_gain: 1.0,
            ramp_step: (1.0 / (sample_rate as f64 * RAMP_SECONDS)) as f32,
        }
    }

    pub fn mode(&self) -> PanMode {
        self.mode
    }

    /// Change the balance mode; gains ramp toward the new targets
    pub fn set_mode(&mut self, mode: PanMode) {
        self.mode = mode;
    }

    /// Apply the channel gains to a block in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let (target_left, target_right) = self.mode.gains();

        // Fast path once both gains have settled
        if self.left_gain == target_left && self.right_gain == target_right {
            if self.mode == PanMode::Stereo {
                return;
            }
            for sample in buffer.iter_mut() {
                sample.left *= self.left_gain;
                sample.right *= self.right_gain;
            }
            return;
        }

        for sample in buffer.iter_mut() {
            self.left_gain = step_toward(self.left_gain, target_left, self.ramp_step);
            self.right_gain = step_toward(self.right_gain, target_right, self.ramp_step);
            sample.left *= self.left_gain;
            sample.right *= self.right_gain;
        }
    }
}

fn step_toward(current: f32, target: f32, step: f32) -> f32 {
    if (current - target).abs() <= step {
        target
    } else if current < target {
        current + step
    } else {
        current - step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn ones(len: usize) -> StereoBuffer {
        let mut buffer = StereoBuffer::silence(len);
        buffer.as_mut_slice().fill(StereoSample::new(1.0, 1.0));
        buffer
    }

    #[test]
    fn test_stereo_passes_through() {
        let mut stage = BalanceStage::new_with_sample_rate(48000);
        let mut buffer = ones(256);
        stage.process(&mut buffer);

        assert_eq!(buffer[0], StereoSample::new(1.0, 1.0));
        assert_eq!(buffer[255], StereoSample::new(1.0, 1.0));
    }

    #[test]
    fn test_left_mode_silences_right_after_ramp() {
        let mut stage = BalanceStage::new_with_sample_rate(48000);
        stage.set_mode(PanMode::Left);

        // 5ms at 48kHz is 240 samples; one 512-sample block covers the ramp
        let mut buffer = ones(512);
        stage.process(&mut buffer);

        assert_eq!(buffer[511].left, 1.0);
        assert_eq!(buffer[511].right, 0.0);

        // Subsequent blocks hold the settled gains
        let mut buffer = ones(512);
        stage.process(&mut buffer);
        assert_eq!(buffer[0].right, 0.0);
    }

    #[test]
    fn test_mode_change_ramps_without_jumps() {
        let mut stage = BalanceStage::new_with_sample_rate(48000);
        stage.set_mode(PanMode::Right);

        let mut buffer = ones(512);
        stage.process(&mut buffer);

        // The left gain walks down sample by sample, never stepping more than
        // the ramp increment
        let step = 1.0 / (48000.0 * 0.005) + 1e-6;
        for pair in buffer.as_slice().windows(2) {
            assert!((pair[0].left - pair[1].left).abs() <= step);
        }
    }

    #[test]
    fn test_round_trip_back_to_stereo() {
        let mut stage = BalanceStage::new_with_sample_rate(48000);
        stage.set_mode(PanMode::Left);
        let mut buffer = ones(512);
        stage.process(&mut buffer);

        stage.set_mode(PanMode::Stereo);
        let mut buffer = ones(512);
        stage.process(&mut buffer);
        assert_eq!(buffer[511], StereoSample::new(1.0, 1.0));
    }
}
