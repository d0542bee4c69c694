//! Channel grid iterators.
//!
//! One cgiter per channel advances through the composition: along the
//! rows of its own note column (channel 0 also reads the global column),
//! across pattern boundaries as directed by the track's order list, or
//! looping inside one pattern instance in pattern playback mode.
//!
//! A trigger row is returned exactly once per visit; when the player has
//! to abandon a row mid-way (event buffer full, pattern delay) it clears
//! the returned status so the row is offered again on the next call.

use std::sync::Arc;

use compas_core::position::Position;
use compas_core::tstamp::Tstamp;

use compas_module::{Module, Trigger};

/// A per-channel cursor over patterns.
#[derive(Debug, Clone)]
pub struct Cgiter {
    module: Arc<Module>,
    col_index: usize,
    /// Current position.
    pub pos: Position,
    row_returned: bool,
}

impl Cgiter {
    /// Creates a cgiter for one channel.
    pub fn new(module: Arc<Module>, col_index: usize) -> Self {
        Self {
            module,
            col_index,
            pos: Position::default(),
            row_returned: false,
        }
    }

    /// Jumps to a position. If the position carries a track and system,
    /// the pattern instance is resolved from the order list.
    pub fn reset(&mut self, pos: &Position) {
        self.pos = *pos;
        if pos.track >= 0 {
            self.pos.piref = self
                .module
                .tracks
                .get(pos.track as usize)
                .and_then(|song| song.system(pos.system))
                .unwrap_or_default();
        }
        self.row_returned = false;
    }

    /// Returns true when the cursor has advanced past the end of the
    /// composition.
    pub fn has_finished(&self) -> bool {
        !self.pos.piref.is_valid()
    }

    /// Returns the triggers exactly at the current position, once per
    /// visit. Channel 0 sees global-column triggers before its own.
    pub fn get_trigger_row(&mut self) -> Option<Vec<Trigger>> {
        if self.row_returned || self.has_finished() {
            return None;
        }
        let pattern = self.module.pattern(self.pos.piref)?;
        if self.pos.pat_pos >= pattern.length() {
            return None;
        }

        let mut triggers = Vec::new();
        if self.col_index == 0 {
            if let Some(row) = pattern.global_column().row_at(self.pos.pat_pos) {
                triggers.extend_from_slice(row);
            }
        }
        if let Some(row) = pattern.column(self.col_index).row_at(self.pos.pat_pos) {
            triggers.extend_from_slice(row);
        }

        if triggers.is_empty() {
            return None;
        }
        self.row_returned = true;
        Some(triggers)
    }

    /// Makes the current row eligible for
    /// [`get_trigger_row`](Self::get_trigger_row) again.
    pub fn clear_returned_status(&mut self) {
        self.row_returned = false;
    }

    /// Shrinks `dist` to the musical time to the next trigger row in this
    /// channel or to the end of the pattern, whichever is closer.
    /// Returns true if a trigger row exists within the shrunk distance.
    pub fn peek(&self, dist: &mut Tstamp) -> bool {
        if self.has_finished() {
            return false;
        }
        let Some(pattern) = self.module.pattern(self.pos.piref) else {
            return false;
        };

        let remaining = pattern.length().saturating_sub(self.pos.pat_pos);
        let mut next_row: Option<Tstamp> = pattern
            .column(self.col_index)
            .next_row_after(self.pos.pat_pos);
        if self.col_index == 0 {
            let global_next = pattern.global_column().next_row_after(self.pos.pat_pos);
            next_row = match (next_row, global_next) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }

        let mut found = false;
        if let Some(next) = next_row {
            if next < pattern.length() {
                let to_next = next - self.pos.pat_pos;
                if to_next <= *dist {
                    *dist = to_next;
                    found = true;
                }
            }
        }

        *dist = (*dist).min(remaining);
        found
    }

    /// Advances musical time by `dist`.
    ///
    /// A cursor that lands exactly on the pattern end stays there until
    /// the next move, so the slice that reaches the boundary still
    /// renders; the crossing into the next system (or the loop back to
    /// the pattern start, in pattern playback mode) happens lazily.
    pub fn move_dist(&mut self, dist: Tstamp) {
        if self.has_finished() {
            return;
        }
        if dist.is_positive() {
            self.row_returned = false;
        }

        // Parked on the boundary from the previous move: cross first.
        match self.module.pattern(self.pos.piref) {
            Some(pattern) if self.pos.pat_pos >= pattern.length() => {
                self.pos.pat_pos -= pattern.length();
                self.advance_system();
                if self.has_finished() {
                    return;
                }
            }
            Some(_) => {}
            None => {
                self.pos.piref = compas_core::position::PatInstRef::none();
                return;
            }
        }

        self.pos.pat_pos += dist;

        // Strict overshoot crosses immediately, carrying the remainder;
        // the hop bound keeps degenerate zero-length orders finite.
        let mut hops = 0;
        while let Some(pattern) = self.module.pattern(self.pos.piref) {
            if self.pos.pat_pos <= pattern.length() {
                return;
            }

            self.pos.pat_pos -= pattern.length();
            self.advance_system();
            if self.has_finished() {
                return;
            }

            hops += 1;
            if hops > compas_core::limits::PATTERNS_MAX {
                self.pos.piref = compas_core::position::PatInstRef::none();
                return;
            }
        }

        // Referenced pattern does not exist: playback ends here.
        self.pos.piref = compas_core::position::PatInstRef::none();
    }

    /// Steps to the next entry in the order list; pattern playback mode
    /// stays on its instance.
    fn advance_system(&mut self) {
        self.row_returned = false;
        if self.pos.track < 0 {
            return;
        }
        self.pos.system += 1;
        self.pos.piref = self
            .module
            .tracks
            .get(self.pos.track as usize)
            .and_then(|song| song.system(self.pos.system))
            .unwrap_or_default();
    }
}
