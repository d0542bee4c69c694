//! Event binding table.
//!
//! A bind entry maps a source event name to a list of target triggers;
//! when the source event fires, each target trigger is evaluated (with
//! the source argument available as the meta value `$`) and fired on a
//! channel offset from the source channel. Optional constraint
//! expressions gate the expansion.

/// One expansion target.
#[derive(Debug, Clone)]
pub struct BindTarget {
    /// Channel offset relative to the source channel (wraps).
    pub ch_offset: i32,
    /// Target trigger description: `["<event>", "<expr>"]`.
    pub desc: String,
}

/// One bind table entry.
#[derive(Debug, Clone)]
pub struct BindEntry {
    /// Source event name that activates this entry.
    pub event_name: String,
    /// Constraint expressions; all must evaluate truthy for the entry to
    /// apply. Evaluated with the source argument as `$`.
    pub constraints: Vec<String>,
    /// Targets fired in order when the entry applies.
    pub targets: Vec<BindTarget>,
}

/// The module's bind table.
#[derive(Debug, Clone, Default)]
pub struct Bind {
    entries: Vec<BindEntry>,
}

impl Bind {
    /// Creates an empty bind table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    pub fn add_entry(&mut self, entry: BindEntry) {
        self.entries.push(entry);
    }

    /// Returns all entries.
    pub fn entries(&self) -> &[BindEntry] {
        &self.entries
    }

    /// Returns the indices of entries keyed on `event_name`, in table
    /// order. Channels cache this per event name.
    pub fn entry_indices_for(&self, event_name: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.event_name == event_name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the entry at `index`.
    pub fn entry(&self, index: usize) -> &BindEntry {
        &self.entries[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_lookup() {
        let mut bind = Bind::new();
        bind.add_entry(BindEntry {
            event_name: "n+".into(),
            constraints: Vec::new(),
            targets: vec![BindTarget {
                ch_offset: 1,
                desc: r#"["n+", "$"]"#.into(),
            }],
        });
        bind.add_entry(BindEntry {
            event_name: ".f".into(),
            constraints: Vec::new(),
            targets: Vec::new(),
        });

        assert_eq!(bind.entry_indices_for("n+"), vec![0]);
        assert_eq!(bind.entry_indices_for(".f"), vec![1]);
        assert!(bind.entry_indices_for("n-").is_empty());
    }
}
