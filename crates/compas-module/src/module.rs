//! The module aggregate.

use thiserror::Error;

use compas_core::limits::{AUDIO_UNITS_MAX, PATTERNS_MAX, TRACKS_MAX};
use compas_core::position::PatInstRef;

use crate::audio_unit::AudioUnit;
use crate::bind::Bind;
use crate::ch_defaults::ChannelDefaults;
use crate::connections::{DeviceNode, ModuleConnections};
use crate::env::EnvVars;
use crate::order::Song;
use crate::pattern::Pattern;
use crate::tuning::TuningTable;

/// Validation errors for a module description.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// An order list refers to a pattern that does not exist.
    #[error("track {track} system {system} refers to missing pattern {pat}")]
    MissingPattern {
        /// Track index.
        track: usize,
        /// System index within the track.
        system: usize,
        /// The missing pattern index.
        pat: i32,
    },

    /// A connection endpoint refers to a missing audio unit.
    #[error("connection endpoint refers to missing audio unit {index}")]
    MissingAudioUnit {
        /// The missing audio unit index.
        index: usize,
    },

    /// A structural limit was exceeded.
    #[error("too many {what}: {count} (limit {limit})")]
    LimitExceeded {
        /// What overflowed.
        what: &'static str,
        /// Actual count.
        count: usize,
        /// The limit.
        limit: usize,
    },
}

/// An immutable description of a piece of music.
#[derive(Debug, Default)]
pub struct Module {
    /// Pattern table.
    pub patterns: Vec<Option<Pattern>>,
    /// Track list.
    pub tracks: Vec<Song>,
    /// Audio unit table.
    pub audio_units: Vec<Option<AudioUnit>>,
    /// Module-level routing.
    pub connections: ModuleConnections,
    /// Tuning tables.
    pub tuning_tables: Vec<Option<TuningTable>>,
    /// Bind table, if any.
    pub bind: Option<Bind>,
    /// Per-channel defaults, if any.
    pub ch_defaults: Option<Vec<ChannelDefaults>>,
    /// Environment variable declarations.
    pub env: EnvVars,
    /// Render volume applied to the final output, linear.
    pub mix_volume: f64,
    /// Whether the master DC blocker runs.
    pub dc_blocker_enabled: bool,
    /// Seed for the per-channel random states.
    pub random_seed: u64,
}

impl Module {
    /// Creates an empty module with default global settings.
    pub fn new() -> Self {
        Self {
            mix_volume: 1.0,
            dc_blocker_enabled: true,
            ..Self::default()
        }
    }

    /// Stores a pattern at `index`, growing the table as needed.
    pub fn set_pattern(&mut self, index: usize, pattern: Pattern) {
        if self.patterns.len() <= index {
            self.patterns.resize_with(index + 1, || None);
        }
        self.patterns[index] = Some(pattern);
    }

    /// Returns the pattern referenced by `piref`, if it exists.
    pub fn pattern(&self, piref: PatInstRef) -> Option<&Pattern> {
        if !piref.is_valid() {
            return None;
        }
        self.patterns.get(piref.pat as usize)?.as_ref()
    }

    /// Stores an audio unit at `index`, growing the table as needed.
    pub fn set_audio_unit(&mut self, index: usize, au: AudioUnit) {
        if self.audio_units.len() <= index {
            self.audio_units.resize_with(index + 1, || None);
        }
        self.audio_units[index] = Some(au);
    }

    /// Returns the audio unit at `index`, if it exists.
    pub fn audio_unit(&self, index: usize) -> Option<&AudioUnit> {
        self.audio_units.get(index)?.as_ref()
    }

    /// Stores a tuning table at `index`, growing the table as needed.
    pub fn set_tuning_table(&mut self, index: usize, table: TuningTable) {
        if self.tuning_tables.len() <= index {
            self.tuning_tables.resize_with(index + 1, || None);
        }
        self.tuning_tables[index] = Some(table);
    }

    /// Returns the tuning table at `index`, if it exists.
    pub fn tuning_table(&self, index: usize) -> Option<&TuningTable> {
        self.tuning_tables.get(index)?.as_ref()
    }

    /// Appends a track and returns its index.
    pub fn add_track(&mut self, song: Song) -> usize {
        self.tracks.push(song);
        self.tracks.len() - 1
    }

    /// Returns the starting tempo of a track, or the default 120 BPM.
    pub fn start_tempo(&self, track: i32) -> f64 {
        if track < 0 {
            return self.tracks.first().map_or(120.0, |s| s.tempo);
        }
        self.tracks.get(track as usize).map_or(120.0, |s| s.tempo)
    }

    /// Finds the (track, system) location of a pattern instance in the
    /// track order lists.
    pub fn find_pattern_location(&self, piref: PatInstRef) -> Option<(i32, i32)> {
        for (track, song) in self.tracks.iter().enumerate() {
            for (system, &entry) in song.order.iter().enumerate() {
                if entry == piref {
                    return Some((track as i32, system as i32));
                }
            }
        }
        None
    }

    /// Validates structural consistency.
    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.patterns.len() > PATTERNS_MAX {
            return Err(ModuleError::LimitExceeded {
                what: "patterns",
                count: self.patterns.len(),
                limit: PATTERNS_MAX,
            });
        }
        if self.tracks.len() > TRACKS_MAX {
            return Err(ModuleError::LimitExceeded {
                what: "tracks",
                count: self.tracks.len(),
                limit: TRACKS_MAX,
            });
        }
        if self.audio_units.len() > AUDIO_UNITS_MAX {
            return Err(ModuleError::LimitExceeded {
                what: "audio units",
                count: self.audio_units.len(),
                limit: AUDIO_UNITS_MAX,
            });
        }

        for (track, song) in self.tracks.iter().enumerate() {
            for (system, &piref) in song.order.iter().enumerate() {
                if self.pattern(piref).is_none() {
                    return Err(ModuleError::MissingPattern {
                        track,
                        system,
                        pat: piref.pat,
                    });
                }
            }
        }

        for edge in &self.connections.edges {
            for node in [edge.src, edge.dst] {
                if let DeviceNode::Au(index) = node {
                    if self.audio_unit(index).is_none() {
                        return Err(ModuleError::MissingAudioUnit { index });
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compas_core::tstamp::Tstamp;

    #[test]
    fn test_validate_missing_pattern() {
        let mut module = Module::new();
        let mut song = Song::new(120.0);
        song.order.push(PatInstRef::new(0, 0));
        module.add_track(song);

        assert!(matches!(
            module.validate(),
            Err(ModuleError::MissingPattern { pat: 0, .. })
        ));

        module.set_pattern(0, Pattern::new(Tstamp::new(4, 0)));
        assert!(module.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_audio_unit() {
        let mut module = Module::new();
        module
            .connections
            .connect_stereo(DeviceNode::Au(0), DeviceNode::Master);

        assert!(matches!(
            module.validate(),
            Err(ModuleError::MissingAudioUnit { index: 0 })
        ));
    }

    #[test]
    fn test_find_pattern_location() {
        let mut module = Module::new();
        module.set_pattern(0, Pattern::new(Tstamp::new(4, 0)));
        module.set_pattern(1, Pattern::new(Tstamp::new(4, 0)));

        let mut song = Song::new(120.0);
        song.order.push(PatInstRef::new(0, 0));
        song.order.push(PatInstRef::new(1, 0));
        module.add_track(song);

        assert_eq!(
            module.find_pattern_location(PatInstRef::new(1, 0)),
            Some((0, 1))
        );
        assert_eq!(module.find_pattern_location(PatInstRef::new(2, 0)), None);
    }
}
