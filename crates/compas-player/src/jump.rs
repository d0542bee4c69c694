//! Armed jump contexts.
//!
//! A jump trigger arms itself on first encounter: it allocates a context
//! keyed by its own location `(pattern instance, row, channel, trigger
//! order)` holding the jump target and a remaining counter. Re-encounters
//! consume the counter; at zero the context is released and the trigger
//! is passed over. The context pool is bounded; exhaustion means the jump
//! trigger simply does not arm.

use std::collections::BTreeMap;

use compas_core::limits::JUMP_CONTEXTS_MAX;
use compas_core::position::PatInstRef;
use compas_core::tstamp::Tstamp;

/// Location key of a jump trigger: at most one context exists per key.
pub type JumpKey = (PatInstRef, Tstamp, usize, usize);

/// Runtime state of one armed jump trigger.
#[derive(Debug, Clone)]
pub struct JumpContext {
    /// Source pattern instance.
    pub piref: PatInstRef,
    /// Source row.
    pub row: Tstamp,
    /// Source channel.
    pub ch_num: usize,
    /// Trigger order within the source row.
    pub order: usize,
    /// Remaining jumps.
    pub counter: i64,
    /// Target pattern instance; invalid means "the current pattern".
    pub target_piref: PatInstRef,
    /// Target row.
    pub target_row: Tstamp,
}

impl JumpContext {
    /// Returns the location key of this context.
    pub fn key(&self) -> JumpKey {
        (self.piref, self.row, self.ch_num, self.order)
    }
}

/// The set of armed jump contexts, with a bounded allocation budget.
#[derive(Debug)]
pub struct ActiveJumps {
    contexts: BTreeMap<JumpKey, JumpContext>,
    capacity: usize,
}

impl ActiveJumps {
    /// Creates an empty set with the default context budget.
    pub fn new() -> Self {
        Self {
            contexts: BTreeMap::new(),
            capacity: JUMP_CONTEXTS_MAX,
        }
    }

    /// Releases every context.
    pub fn reset(&mut self) {
        self.contexts.clear();
    }

    /// Arms a context. Returns false (dropping the context) if one
    /// already exists at the same key or the budget is exhausted.
    pub fn add(&mut self, ctx: JumpContext) -> bool {
        if self.contexts.len() >= self.capacity || self.contexts.contains_key(&ctx.key()) {
            return false;
        }
        self.contexts.insert(ctx.key(), ctx);
        true
    }

    /// Returns the context armed exactly at `key`.
    pub fn get(&self, key: &JumpKey) -> Option<&JumpContext> {
        self.contexts.get(key)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, key: &JumpKey) -> Option<&mut JumpContext> {
        self.contexts.get_mut(key)
    }

    /// Finds the first context within `piref` at or after
    /// `(row, ch_num, order)`.
    pub fn next_context(
        &self,
        piref: PatInstRef,
        row: Tstamp,
        ch_num: usize,
        order: usize,
    ) -> Option<&JumpContext> {
        self.contexts
            .range((piref, row, ch_num, order)..)
            .map(|(_, ctx)| ctx)
            .find(|ctx| ctx.piref == piref)
    }

    /// Mutable variant of [`next_context`](Self::next_context).
    pub fn next_context_mut(
        &mut self,
        piref: PatInstRef,
        row: Tstamp,
        ch_num: usize,
        order: usize,
    ) -> Option<&mut JumpContext> {
        self.contexts
            .range_mut((piref, row, ch_num, order)..)
            .map(|(_, ctx)| ctx)
            .find(|ctx| ctx.piref == piref)
    }

    /// Releases the context at `key`.
    pub fn remove(&mut self, key: &JumpKey) {
        self.contexts.remove(key);
    }

    /// Returns the number of armed contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns true if no context is armed.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl Default for ActiveJumps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(row: i64, ch: usize, order: usize, counter: i64) -> JumpContext {
        JumpContext {
            piref: PatInstRef::new(0, 0),
            row: Tstamp::new(row, 0),
            ch_num: ch,
            order,
            counter,
            target_piref: PatInstRef::none(),
            target_row: Tstamp::zero(),
        }
    }

    #[test]
    fn test_one_context_per_key() {
        let mut jumps = ActiveJumps::new();
        assert!(jumps.add(ctx(3, 0, 0, 2)));
        assert!(!jumps.add(ctx(3, 0, 0, 5)));
        assert_eq!(jumps.len(), 1);
    }

    #[test]
    fn test_next_context_order() {
        let mut jumps = ActiveJumps::new();
        jumps.add(ctx(3, 0, 0, 1));
        jumps.add(ctx(1, 2, 0, 1));

        let first = jumps
            .next_context(PatInstRef::new(0, 0), Tstamp::zero(), 0, 0)
            .unwrap();
        assert_eq!(first.row, Tstamp::new(1, 0));
        assert_eq!(first.ch_num, 2);

        let after = jumps
            .next_context(PatInstRef::new(0, 0), Tstamp::new(2, 0), 0, 0)
            .unwrap();
        assert_eq!(after.row, Tstamp::new(3, 0));
    }

    #[test]
    fn test_next_context_respects_piref() {
        let mut jumps = ActiveJumps::new();
        jumps.add(ctx(3, 0, 0, 1));

        assert!(
            jumps
                .next_context(PatInstRef::new(1, 0), Tstamp::zero(), 0, 0)
                .is_none()
        );
    }

    #[test]
    fn test_remove() {
        let mut jumps = ActiveJumps::new();
        let c = ctx(3, 0, 0, 1);
        let key = c.key();
        jumps.add(c);
        jumps.remove(&key);
        assert!(jumps.is_empty());
    }
}
