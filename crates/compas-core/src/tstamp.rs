//! Musical time as beats plus a fixed-point remainder.
//!
//! A [`Tstamp`] is `(beats, remainder)` where the remainder counts
//! [`BEAT_UNITS`]ths of a beat. The unit count is highly composite so that
//! common tuplet subdivisions (thirds, fifths, sevenths, ...) are exact.
//!
//! Conversion to audio frames depends on tempo and audio rate and is done
//! in `f64`; callers that slice time repeatedly must carry the fractional
//! frame residue themselves (see the player's `frame_remainder`) so that
//! successive short slices do not accumulate drift.

use core::cmp::Ordering;
use core::ops::{Add, AddAssign, Sub, SubAssign};

use serde::ser::{Serialize, SerializeTuple, Serializer};

/// Number of remainder units in one beat.
///
/// `882_161_280 = 2^7 * 3^4 * 5 * 7 * 11 * 13 * 17`, so all subdivisions
/// up to 17-tuplets are representable exactly.
pub const BEAT_UNITS: i32 = 882_161_280;

/// Musical time: `beats` plus `rem / BEAT_UNITS` beats.
///
/// Ordered lexicographically. The remainder is kept normalised to
/// `0 <= rem < BEAT_UNITS`; arithmetic carries/borrows into the beat count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tstamp {
    beats: i64,
    rem: i32,
}

impl Tstamp {
    /// Creates a timestamp from beats and remainder units.
    ///
    /// # Panics
    ///
    /// Panics if `rem` is outside `[0, BEAT_UNITS)`.
    pub fn new(beats: i64, rem: i32) -> Self {
        assert!((0..BEAT_UNITS).contains(&rem), "remainder out of range: {rem}");
        Self { beats, rem }
    }

    /// The zero timestamp.
    pub const fn zero() -> Self {
        Self { beats: 0, rem: 0 }
    }

    /// Returns the beat count.
    pub fn beats(&self) -> i64 {
        self.beats
    }

    /// Returns the remainder in [`BEAT_UNITS`]ths of a beat.
    pub fn rem(&self) -> i32 {
        self.rem
    }

    /// Returns true if this timestamp is zero.
    pub fn is_zero(&self) -> bool {
        self.beats == 0 && self.rem == 0
    }

    /// Returns true if this timestamp is after zero.
    pub fn is_positive(&self) -> bool {
        *self > Self::zero()
    }

    /// Converts an audio frame count to musical time at the given tempo
    /// and audio rate, rounding down to the representable grid.
    pub fn from_frames(nframes: i64, tempo: f64, audio_rate: i32) -> Self {
        debug_assert!(nframes >= 0);
        debug_assert!(tempo > 0.0);
        debug_assert!(audio_rate > 0);

        let beats_f = nframes as f64 * tempo / (60.0 * f64::from(audio_rate));
        let beats = libm::floor(beats_f) as i64;
        let mut rem = libm::floor((beats_f - beats as f64) * f64::from(BEAT_UNITS)) as i32;
        // Float rounding can land exactly on the next beat.
        if rem >= BEAT_UNITS {
            rem = BEAT_UNITS - 1;
        }
        Self { beats, rem }
    }

    /// Converts musical time to an exact (fractional) frame count at the
    /// given tempo and audio rate.
    pub fn to_frames(&self, tempo: f64, audio_rate: i32) -> f64 {
        debug_assert!(tempo > 0.0);
        debug_assert!(audio_rate > 0);

        let beats_f = self.beats as f64 + f64::from(self.rem) / f64::from(BEAT_UNITS);
        beats_f * 60.0 / tempo * f64::from(audio_rate)
    }

    /// Returns the smaller of two timestamps.
    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    /// Saturating subtraction: returns `self - other`, clamped to zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        if self <= other { Self::zero() } else { self - other }
    }
}

impl Add for Tstamp {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let mut beats = self.beats + other.beats;
        let mut rem = self.rem + other.rem;
        if rem >= BEAT_UNITS {
            rem -= BEAT_UNITS;
            beats += 1;
        }
        Self { beats, rem }
    }
}

impl AddAssign for Tstamp {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Tstamp {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        let mut beats = self.beats - other.beats;
        let mut rem = self.rem - other.rem;
        if rem < 0 {
            rem += BEAT_UNITS;
            beats -= 1;
        }
        Self { beats, rem }
    }
}

impl SubAssign for Tstamp {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl PartialOrd for Tstamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tstamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.beats
            .cmp(&other.beats)
            .then_with(|| self.rem.cmp(&other.rem))
    }
}

impl Serialize for Tstamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.beats)?;
        tup.serialize_element(&self.rem)?;
        tup.end()
    }
}
