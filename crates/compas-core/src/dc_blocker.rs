//! DC-blocking highpass for the master output.
//!
//! A one-pole/one-zero highpass with the difference equation
//!
//! ```text
//! y[n] = gain * (x[n] - x[n-1]) + R * y[n-1]
//! ```
//!
//! where `R = (adapt_frames - 1) / adapt_frames`, `gain = (1 + R) / 2`,
//! and `adapt_frames` is a 10 ms adaptation window at the current audio
//! rate (at least 2 frames). A constant input decays towards zero by a
//! factor of `R` per frame.
//!
//! # Reference
//!
//! Julius O. Smith III, "DC Blocker", in Introduction to Digital Filters
//! with Audio Applications.

/// One channel of DC-blocking filter state.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    r: f32,
    gain: f32,
    feedforward: f32,
    feedback: f32,
}

impl DcBlocker {
    /// Creates a blocker adapted to the given audio rate.
    pub fn new(audio_rate: i32) -> Self {
        let mut blocker = Self {
            r: 0.0,
            gain: 0.0,
            feedforward: 0.0,
            feedback: 0.0,
        };
        blocker.set_audio_rate(audio_rate);
        blocker
    }

    /// Re-derives the coefficients for a new audio rate.
    pub fn set_audio_rate(&mut self, audio_rate: i32) {
        debug_assert!(audio_rate > 0);
        const ADAPT_TIME: f64 = 0.01;
        let adapt_frames = (ADAPT_TIME * f64::from(audio_rate)).max(2.0);
        self.r = ((adapt_frames - 1.0) / adapt_frames) as f32;
        self.gain = (1.0 + self.r) / 2.0;
    }

    /// Returns the pole coefficient `R`.
    pub fn pole(&self) -> f32 {
        self.r
    }

    /// Clears the filter state.
    pub fn reset(&mut self) {
        self.feedforward = 0.0;
        self.feedback = 0.0;
    }

    /// Filters a block in place.
    pub fn process(&mut self, buf: &mut [f32]) {
        let mut feedforward = self.feedforward;
        let mut feedback = self.feedback;

        for sample in buf.iter_mut() {
            let input = *sample;
            let out = self.gain * (input - feedforward) + self.r * feedback;
            *sample = out;
            feedforward = input;
            feedback = out;
        }

        self.feedforward = feedforward;
        self.feedback = feedback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_decays() {
        let mut blocker = DcBlocker::new(48000);
        let r = blocker.pole();

        let mut buf = vec![1.0f32; 4800];
        blocker.process(&mut buf);

        // After n frames of constant input, |y| <= R^n (first output is
        // below 1 already, then each step multiplies by R).
        let bound = libm::powf(r, 4799.0);
        assert!(
            buf[4799].abs() <= bound * 1.001,
            "output {} exceeds bound {}",
            buf[4799],
            bound
        );
    }

    #[test]
    fn test_passes_transitions() {
        let mut blocker = DcBlocker::new(48000);
        let mut buf = vec![0.0f32; 16];
        buf[8] = 1.0;
        blocker.process(&mut buf);
        // The impulse itself passes nearly unattenuated.
        assert!(buf[8] > 0.9);
    }

    #[test]
    fn test_min_adapt_window() {
        // Very low rates clamp the window to 2 frames: R = 0.5.
        let blocker = DcBlocker::new(10);
        assert!((blocker.pole() - 0.5).abs() < 1e-6);
    }
}
