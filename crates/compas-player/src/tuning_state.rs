//! Runtime tuning state.
//!
//! A mutable copy of one module tuning table. Retuning operations act on
//! the copy; resetting restores the module's as-written offsets.

use compas_module::TuningTable;

/// Runtime copy of a tuning table.
#[derive(Debug, Clone)]
pub struct TuningState {
    table: TuningTable,
}

impl TuningState {
    /// Creates state from a module table.
    pub fn new(table: &TuningTable) -> Self {
        let mut table = table.clone();
        table.reset_retuning();
        Self { table }
    }

    /// Restores the state from a module table.
    pub fn reset(&mut self, table: &TuningTable) {
        *self = Self::new(table);
    }

    /// Playback pitch in cents (retuned offsets are authoritative).
    pub fn pitch_of(&self, note: usize, modifier: i32, octave: i32) -> Option<f64> {
        self.table.pitch_of(note, modifier, octave)
    }

    /// Pitch in cents from the as-written offsets.
    pub fn pitch_of_as_written(&self, note: usize, modifier: i32, octave: i32) -> Option<f64> {
        self.table.pitch_of_as_written(note, modifier, octave)
    }

    /// Adjusts one note's retuned offset.
    pub fn retune(&mut self, note: usize, cents: f64) {
        self.table.retune(note, cents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retune_does_not_touch_written() {
        let table = TuningTable::new(440.0, &[0.0, 100.0]);
        let mut state = TuningState::new(&table);

        state.retune(1, 95.0);
        assert_eq!(state.pitch_of(1, -1, 0), Some(95.0));
        assert_eq!(state.pitch_of_as_written(1, -1, 0), Some(100.0));

        state.reset(&table);
        assert_eq!(state.pitch_of(1, -1, 0), Some(100.0));
    }
}
