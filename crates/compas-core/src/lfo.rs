//! Tempo-synced low-frequency oscillator for tremolo and vibrato.
//!
//! Speed is given in cycles per beat so the modulation tracks tempo
//! changes; the per-frame phase increment is re-derived from the current
//! tempo and audio rate on every advance.

use core::f64::consts::TAU;

/// A sine LFO whose speed is expressed in cycles per beat.
///
/// Inactive (zero-depth) LFOs contribute nothing and cost nothing; the
/// carried-control code checks [`active()`](Lfo::active) before advancing.
#[derive(Debug, Clone)]
pub struct Lfo {
    audio_rate: i32,
    tempo: f64,
    /// Oscillation speed in cycles per beat.
    speed: f64,
    /// Peak deviation added to the carried control value.
    depth: f64,
    /// Current phase position [0.0, 1.0).
    phase: f64,
}

impl Lfo {
    /// Creates an inactive LFO.
    pub fn new() -> Self {
        Self {
            audio_rate: 48000,
            tempo: 120.0,
            speed: 0.0,
            depth: 0.0,
            phase: 0.0,
        }
    }

    /// Sets the audio rate.
    pub fn set_audio_rate(&mut self, audio_rate: i32) {
        debug_assert!(audio_rate > 0);
        self.audio_rate = audio_rate;
    }

    /// Sets the tempo.
    pub fn set_tempo(&mut self, tempo: f64) {
        debug_assert!(tempo > 0.0);
        self.tempo = tempo;
    }

    /// Sets the speed in cycles per beat.
    pub fn set_speed(&mut self, cycles_per_beat: f64) {
        self.speed = cycles_per_beat.max(0.0);
    }

    /// Sets the modulation depth.
    pub fn set_depth(&mut self, depth: f64) {
        self.depth = depth;
    }

    /// Returns the modulation depth.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Returns true if the LFO currently modulates its control.
    pub fn active(&self) -> bool {
        self.depth != 0.0 && self.speed > 0.0
    }

    /// Resets the phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    fn phase_inc(&self) -> f64 {
        // cycles/beat * beats/sec / frames/sec = cycles/frame
        self.speed * self.tempo / (60.0 * f64::from(self.audio_rate))
    }

    /// Advances one frame and returns the modulation value.
    #[inline]
    pub fn next(&mut self) -> f64 {
        let value = libm::sin(self.phase * TAU) * self.depth;
        self.phase += self.phase_inc();
        if self.phase >= 1.0 {
            self.phase -= libm::floor(self.phase);
        }
        value
    }

    /// Advances `nframes` frames without producing values.
    pub fn skip(&mut self, nframes: i64) {
        debug_assert!(nframes >= 0);
        self.phase += self.phase_inc() * nframes as f64;
        self.phase -= libm::floor(self.phase);
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}
