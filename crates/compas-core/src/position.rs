//! Playback position types.

use serde::ser::{Serialize, SerializeTuple, Serializer};

use crate::tstamp::Tstamp;

/// A reference to one concrete use of a shared pattern body:
/// `(pattern index, instance index)`.
///
/// Negative indices mean "no pattern" and are used as sentinels for
/// stopped playback and for "current pattern" jump targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatInstRef {
    /// Pattern index, or negative for none.
    pub pat: i32,
    /// Instance index within the pattern.
    pub inst: i32,
}

impl PatInstRef {
    /// Creates a pattern instance reference.
    pub const fn new(pat: i32, inst: i32) -> Self {
        Self { pat, inst }
    }

    /// The "no pattern" sentinel.
    pub const fn none() -> Self {
        Self { pat: -1, inst: -1 }
    }

    /// Returns true if this refers to an actual pattern.
    pub fn is_valid(&self) -> bool {
        self.pat >= 0 && self.inst >= 0
    }
}

impl Default for PatInstRef {
    fn default() -> Self {
        Self::none()
    }
}

impl Serialize for PatInstRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.pat)?;
        tup.serialize_element(&self.inst)?;
        tup.end()
    }
}

/// Where playback is in the composition hierarchy.
///
/// `track`/`system` index into the order lists; both are `-1` in pattern
/// playback mode, where only `piref` and `pat_pos` are meaningful.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    /// Track index into the module's track list, or -1.
    pub track: i32,
    /// System index into the track's order list, or -1.
    pub system: i32,
    /// Position within the current pattern.
    pub pat_pos: Tstamp,
    /// The pattern instance being played.
    pub piref: PatInstRef,
}

impl Position {
    /// Creates a position at the start of the given track.
    pub fn at_track_start(track: i32) -> Self {
        Self {
            track,
            system: 0,
            pat_pos: Tstamp::zero(),
            piref: PatInstRef::none(),
        }
    }

    /// Returns true if the pattern position is meaningful.
    pub fn has_valid_pattern_pos(&self) -> bool {
        self.piref.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piref_sentinel() {
        assert!(!PatInstRef::none().is_valid());
        assert!(PatInstRef::new(0, 0).is_valid());
    }

    #[test]
    fn test_piref_ordering() {
        assert!(PatInstRef::new(1, 0) > PatInstRef::new(0, 5));
        assert!(PatInstRef::new(1, 1) > PatInstRef::new(1, 0));
    }
}
