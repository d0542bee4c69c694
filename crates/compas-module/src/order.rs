//! Songs and the track order.
//!
//! A song is one entry in the module's track list: an order list of
//! pattern instances played back to back, plus the song's starting tempo.

use compas_core::position::PatInstRef;

/// One subsong: an ordered list of pattern instances.
#[derive(Debug, Clone)]
pub struct Song {
    /// Starting tempo in BPM.
    pub tempo: f64,
    /// Pattern instances in playback order ("systems").
    pub order: Vec<PatInstRef>,
}

impl Song {
    /// Creates a song with the given starting tempo and empty order.
    pub fn new(tempo: f64) -> Self {
        Self {
            tempo,
            order: Vec::new(),
        }
    }

    /// Returns the pattern instance at `system`, if within the order.
    pub fn system(&self, system: i32) -> Option<PatInstRef> {
        if system < 0 {
            return None;
        }
        self.order.get(system as usize).copied()
    }

    /// Returns the order list length.
    pub fn system_count(&self) -> usize {
        self.order.len()
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::new(120.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_lookup() {
        let mut song = Song::new(120.0);
        song.order.push(PatInstRef::new(0, 0));
        song.order.push(PatInstRef::new(1, 0));

        assert_eq!(song.system(0), Some(PatInstRef::new(0, 0)));
        assert_eq!(song.system(1), Some(PatInstRef::new(1, 0)));
        assert_eq!(song.system(2), None);
        assert_eq!(song.system(-1), None);
    }
}
