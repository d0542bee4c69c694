//! Microtonal tuning tables.
//!
//! A tuning table maps note indices (plus optional modifiers and an
//! octave) to a pitch offset in cents, where 0 cents is 440 Hz. Each note
//! carries two offsets: the as-written value from the composition and a
//! retuned value that adaptive retuning may adjust at runtime. The
//! retuned value is authoritative for playback; the as-written value
//! stays queryable for callers that need it.

/// One note of a tuning table.
#[derive(Debug, Clone, Copy)]
pub struct TuningNote {
    /// As-written offset from the reference pitch, in cents.
    pub cents: f64,
    /// Retuned offset, in cents. Starts equal to `cents`.
    pub cents_retuned: f64,
}

/// A tuning table.
#[derive(Debug, Clone)]
pub struct TuningTable {
    /// Reference frequency of note 0 at the centre octave, in Hz.
    pub ref_pitch: f64,
    /// Octave width in cents (1200 for untempered octaves).
    pub octave_width: f64,
    /// Centre octave index.
    pub centre_octave: i32,
    /// Note offsets within one octave.
    pub notes: Vec<TuningNote>,
    /// Modifier offsets in cents (e.g. sharps/flats in non-12edo systems).
    pub modifiers: Vec<f64>,
}

impl TuningTable {
    /// Creates a table with the given reference pitch and note offsets
    /// (cents within one octave).
    pub fn new(ref_pitch: f64, note_cents: &[f64]) -> Self {
        Self {
            ref_pitch,
            octave_width: 1200.0,
            centre_octave: 0,
            notes: note_cents
                .iter()
                .map(|&cents| TuningNote {
                    cents,
                    cents_retuned: cents,
                })
                .collect(),
            modifiers: Vec::new(),
        }
    }

    /// The standard 12-tone equal temperament table at A = 440 Hz.
    pub fn twelve_tone_equal() -> Self {
        let cents: Vec<f64> = (0..12).map(|i| f64::from(i) * 100.0).collect();
        Self::new(440.0, &cents)
    }

    /// Returns the number of notes per octave.
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Returns the playback pitch of a note in cents (0 cents = 440 Hz),
    /// using the retuned note offsets.
    ///
    /// `modifier` indexes the modifier table; negative means none.
    /// Returns `None` for out-of-range note or modifier indices.
    pub fn pitch_of(&self, note: usize, modifier: i32, octave: i32) -> Option<f64> {
        let base = self.notes.get(note)?.cents_retuned;
        self.pitch_common(base, modifier, octave)
    }

    /// Like [`pitch_of`](Self::pitch_of) but using the as-written note
    /// offsets, ignoring any retuning.
    pub fn pitch_of_as_written(&self, note: usize, modifier: i32, octave: i32) -> Option<f64> {
        let base = self.notes.get(note)?.cents;
        self.pitch_common(base, modifier, octave)
    }

    fn pitch_common(&self, base: f64, modifier: i32, octave: i32) -> Option<f64> {
        let mod_cents = if modifier < 0 {
            0.0
        } else {
            *self.modifiers.get(modifier as usize)?
        };

        let ref_offset = 1200.0 * libm::log2(self.ref_pitch / 440.0);
        let octave_offset = f64::from(octave - self.centre_octave) * self.octave_width;
        Some(ref_offset + base + mod_cents + octave_offset)
    }

    /// Adjusts the retuned offset of one note.
    pub fn retune(&mut self, note: usize, cents_retuned: f64) {
        if let Some(n) = self.notes.get_mut(note) {
            n.cents_retuned = cents_retuned;
        }
    }

    /// Restores all retuned offsets to the as-written values.
    pub fn reset_retuning(&mut self) {
        for note in &mut self.notes {
            note.cents_retuned = note.cents;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_note_is_zero_cents() {
        let table = TuningTable::new(440.0, &[0.0, 100.0]);
        assert_eq!(table.pitch_of(0, -1, 0), Some(0.0));
        assert_eq!(table.pitch_of(1, -1, 0), Some(100.0));
    }

    #[test]
    fn test_octave_shift() {
        let table = TuningTable::new(440.0, &[0.0]);
        assert_eq!(table.pitch_of(0, -1, 1), Some(1200.0));
        assert_eq!(table.pitch_of(0, -1, -1), Some(-1200.0));
    }

    #[test]
    fn test_reference_pitch_offset() {
        let table = TuningTable::new(880.0, &[0.0]);
        let cents = table.pitch_of(0, -1, 0).unwrap();
        assert!((cents - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_retuning_is_separate() {
        let mut table = TuningTable::new(440.0, &[0.0]);
        table.retune(0, 5.0);

        assert_eq!(table.pitch_of(0, -1, 0), Some(5.0));
        assert_eq!(table.pitch_of_as_written(0, -1, 0), Some(0.0));

        table.reset_retuning();
        assert_eq!(table.pitch_of(0, -1, 0), Some(0.0));
    }

    #[test]
    fn test_out_of_range() {
        let table = TuningTable::new(440.0, &[0.0]);
        assert_eq!(table.pitch_of(3, -1, 0), None);
        assert_eq!(table.pitch_of(0, 2, 0), None);
    }
}
