//! Carried force and pitch controls.
//!
//! Each channel carries a force (amplitude) and a pitch control across
//! notes; each control pairs a plain value with a [`Slider`] and an
//! [`Lfo`]. Voices receive a copy of the channel controls at note-on and
//! advance that copy independently, so background voices keep sliding and
//! wobbling the way they were when they were replaced.

use crate::lfo::Lfo;
use crate::slider::Slider;
use crate::tstamp::Tstamp;

/// Carried amplitude control: force in decibels plus tremolo.
#[derive(Debug, Clone)]
pub struct ForceControls {
    /// Current force in dB.
    pub force: f64,
    /// Force slide.
    pub slider: Slider,
    /// Tremolo (force modulation in dB).
    pub tremolo: Lfo,
}

impl ForceControls {
    /// Creates controls at the given initial force in dB.
    pub fn new(force: f64) -> Self {
        Self {
            force,
            slider: Slider::new(force),
            tremolo: Lfo::new(),
        }
    }

    /// Resets to the given force, stopping slides and tremolo.
    pub fn reset(&mut self, force: f64) {
        self.force = force;
        self.slider = Slider::new(force);
        self.tremolo = Lfo::new();
    }

    /// Propagates an audio-rate change.
    pub fn set_audio_rate(&mut self, audio_rate: i32) {
        self.slider.set_audio_rate(audio_rate);
        self.tremolo.set_audio_rate(audio_rate);
    }

    /// Propagates a tempo change.
    pub fn set_tempo(&mut self, tempo: f64) {
        self.slider.set_tempo(tempo);
        self.tremolo.set_tempo(tempo);
    }

    /// Advances by a block of frames without producing values.
    pub fn skip(&mut self, nframes: i64) {
        if self.slider.in_progress() {
            self.force = self.slider.skip(nframes);
        }
        if self.tremolo.active() {
            self.tremolo.skip(nframes);
        }
    }

    /// Advances one frame and returns the effective force in dB.
    #[inline]
    pub fn next(&mut self) -> f64 {
        if self.slider.in_progress() {
            self.force = self.slider.step();
        }
        let wobble = if self.tremolo.active() {
            self.tremolo.next()
        } else {
            0.0
        };
        self.force + wobble
    }

    /// Starts a force slide towards `target` dB.
    pub fn slide_to(&mut self, target: f64) {
        self.slider.start(target, self.force);
    }

    /// Sets the slide duration used by the next slide.
    pub fn set_slide_length(&mut self, length: Tstamp) {
        self.slider.set_length(length);
    }
}

/// Carried pitch control: pitch in cents plus vibrato.
#[derive(Debug, Clone)]
pub struct PitchControls {
    /// Current pitch in cents.
    pub pitch: f64,
    /// Pitch slide.
    pub slider: Slider,
    /// Vibrato (pitch modulation in cents).
    pub vibrato: Lfo,
}

impl PitchControls {
    /// Creates controls at the given initial pitch in cents.
    pub fn new(pitch: f64) -> Self {
        Self {
            pitch,
            slider: Slider::new(pitch),
            vibrato: Lfo::new(),
        }
    }

    /// Resets to the given pitch, stopping slides and vibrato.
    pub fn reset(&mut self, pitch: f64) {
        self.pitch = pitch;
        self.slider = Slider::new(pitch);
        self.vibrato = Lfo::new();
    }

    /// Propagates an audio-rate change.
    pub fn set_audio_rate(&mut self, audio_rate: i32) {
        self.slider.set_audio_rate(audio_rate);
        self.vibrato.set_audio_rate(audio_rate);
    }

    /// Propagates a tempo change.
    pub fn set_tempo(&mut self, tempo: f64) {
        self.slider.set_tempo(tempo);
        self.vibrato.set_tempo(tempo);
    }

    /// Advances by a block of frames without producing values.
    pub fn skip(&mut self, nframes: i64) {
        if self.slider.in_progress() {
            self.pitch = self.slider.skip(nframes);
        }
        if self.vibrato.active() {
            self.vibrato.skip(nframes);
        }
    }

    /// Advances one frame and returns the effective pitch in cents.
    #[inline]
    pub fn next(&mut self) -> f64 {
        if self.slider.in_progress() {
            self.pitch = self.slider.step();
        }
        let wobble = if self.vibrato.active() {
            self.vibrato.next()
        } else {
            0.0
        };
        self.pitch + wobble
    }

    /// Starts a pitch slide towards `target` cents.
    pub fn slide_to(&mut self, target: f64) {
        self.slider.start(target, self.pitch);
    }

    /// Sets the slide duration used by the next slide.
    pub fn set_slide_length(&mut self, length: Tstamp) {
        self.slider.set_length(length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_slide() {
        let mut fc = ForceControls::new(0.0);
        fc.set_slide_length(Tstamp::new(1, 0));
        fc.slide_to(-6.0);

        fc.skip(24000);
        assert_eq!(fc.force, -6.0);
        assert!(!fc.slider.in_progress());
    }

    #[test]
    fn test_next_and_skip_agree_on_slider() {
        let mut a = PitchControls::new(0.0);
        a.set_slide_length(Tstamp::new(1, 0));
        a.slide_to(1200.0);
        let mut b = a.clone();

        for _ in 0..100 {
            a.next();
        }
        b.skip(100);

        assert!((a.pitch - b.pitch).abs() < 1e-9);
    }
}
