//! Linear parameter ramps over musical time.
//!
//! A [`Slider`] moves a control value towards a target over a duration
//! given in musical time. The duration is converted to a frame count when
//! the slide starts; tempo or audio-rate changes mid-slide re-scale the
//! remaining frame count so the slide still ends at the same musical
//! moment.
//!
//! The ramp is advanced frame-by-frame with [`step()`](Slider::step) or in
//! blocks with [`skip()`](Slider::skip); the two are interchangeable, so
//! block subdivision never changes where the slide lands.

use crate::tstamp::Tstamp;

/// A linear ramp to a target value over a musical duration.
#[derive(Debug, Clone)]
pub struct Slider {
    length: Tstamp,
    audio_rate: i32,
    tempo: f64,
    current: f64,
    target: f64,
    frames_left: i64,
    update: f64,
}

impl Slider {
    /// Creates an idle slider with the given initial value.
    pub fn new(initial: f64) -> Self {
        Self {
            length: Tstamp::zero(),
            audio_rate: 48000,
            tempo: 120.0,
            current: initial,
            target: initial,
            frames_left: 0,
            update: 0.0,
        }
    }

    /// Sets the musical duration used by the next [`start()`](Self::start).
    pub fn set_length(&mut self, length: Tstamp) {
        self.length = length;
    }

    /// Returns the configured musical duration.
    pub fn length(&self) -> Tstamp {
        self.length
    }

    /// Updates the audio rate, re-scaling an active slide.
    pub fn set_audio_rate(&mut self, audio_rate: i32) {
        debug_assert!(audio_rate > 0);
        if self.audio_rate == audio_rate {
            return;
        }
        let ratio = f64::from(audio_rate) / f64::from(self.audio_rate);
        self.audio_rate = audio_rate;
        self.rescale_remaining(ratio);
    }

    /// Updates the tempo, re-scaling an active slide.
    pub fn set_tempo(&mut self, tempo: f64) {
        debug_assert!(tempo > 0.0);
        if self.tempo == tempo {
            return;
        }
        let ratio = self.tempo / tempo;
        self.tempo = tempo;
        self.rescale_remaining(ratio);
    }

    fn rescale_remaining(&mut self, ratio: f64) {
        if self.frames_left <= 0 {
            return;
        }
        let scaled = libm::round(self.frames_left as f64 * ratio) as i64;
        self.frames_left = scaled.max(1);
        self.update = (self.target - self.current) / self.frames_left as f64;
    }

    /// Starts a slide from `from` towards `target` over the configured
    /// musical length at the current tempo and audio rate.
    ///
    /// A zero-length slide snaps to the target immediately.
    pub fn start(&mut self, target: f64, from: f64) {
        self.current = from;
        self.target = target;

        let total =
            libm::round(self.length.to_frames(self.tempo, self.audio_rate)) as i64;
        if total <= 0 {
            self.current = target;
            self.frames_left = 0;
            self.update = 0.0;
            return;
        }

        self.frames_left = total;
        self.update = (target - from) / total as f64;
    }

    /// Stops the slide, keeping the current value.
    pub fn stop(&mut self) {
        self.target = self.current;
        self.frames_left = 0;
        self.update = 0.0;
    }

    /// Cancels any slide and jumps to `value`.
    pub fn set_value(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.frames_left = 0;
        self.update = 0.0;
    }

    /// Returns true while a slide is active.
    pub fn in_progress(&self) -> bool {
        self.frames_left > 0
    }

    /// Returns the current value without advancing.
    pub fn value(&self) -> f64 {
        self.current
    }

    /// Advances the slide by one frame and returns the new value.
    #[inline]
    pub fn step(&mut self) -> f64 {
        if self.frames_left > 0 {
            self.current += self.update;
            self.frames_left -= 1;
            if self.frames_left == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Advances the slide by `nframes` frames and returns the new value.
    pub fn skip(&mut self, nframes: i64) -> f64 {
        debug_assert!(nframes >= 0);
        if self.frames_left > 0 {
            let advance = nframes.min(self.frames_left);
            self.current += self.update * advance as f64;
            self.frames_left -= advance;
            if self.frames_left == 0 {
                self.current = self.target;
            }
        }
        self.current
    }
}

impl Default for Slider {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_reaches_target_in_exact_frames() {
        // 1 beat at 120 BPM / 48000 Hz = 24000 frames.
        let mut slider = Slider::new(0.0);
        slider.set_length(Tstamp::new(1, 0));
        slider.start(1.0, 0.0);

        for _ in 0..23999 {
            slider.step();
        }
        assert!(slider.in_progress());
        slider.step();
        assert!(!slider.in_progress());
        assert_eq!(slider.value(), 1.0);
    }

    #[test]
    fn test_step_and_skip_agree() {
        let mut a = Slider::new(0.0);
        a.set_length(Tstamp::new(2, 0));
        a.start(3.0, 0.0);

        let mut b = a.clone();

        for _ in 0..1000 {
            a.step();
        }
        b.skip(1000);

        assert!((a.value() - b.value()).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_change_rescales() {
        let mut slider = Slider::new(0.0);
        slider.set_length(Tstamp::new(1, 0));
        slider.start(1.0, 0.0);

        // Halfway through, halve the tempo: remaining frames double.
        slider.skip(12000);
        slider.set_tempo(60.0);

        slider.skip(23999);
        assert!(slider.in_progress());
        slider.skip(1);
        assert!(!slider.in_progress());
        assert_eq!(slider.value(), 1.0);
    }

    #[test]
    fn test_zero_length_snaps() {
        let mut slider = Slider::new(0.5);
        slider.start(2.0, 0.5);
        assert!(!slider.in_progress());
        assert_eq!(slider.value(), 2.0);
    }
}
