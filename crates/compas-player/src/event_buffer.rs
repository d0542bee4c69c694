//! The outgoing event buffer.
//!
//! Every fired event is recorded as a `[channel, name, argument]` triple,
//! rendered to JSON. The buffer has a byte budget; when an add would be
//! lost to a full buffer mid-expansion, the buffer enters skipping mode:
//! it remembers how many events of the interrupted top-level expansion
//! were already delivered, so that when the caller drains the buffer and
//! processing re-runs the same expansion, exactly that prefix is
//! suppressed and the remainder comes out once. Concatenated across
//! calls, the stream equals what an unbounded buffer would have produced.

use compas_core::value::Value;

/// Bounded JSON event sink with suspend/resume bookkeeping.
#[derive(Debug)]
pub struct EventBuffer {
    entries: Vec<String>,
    size_bytes: usize,
    /// Byte budget; 0 means unbounded.
    capacity: usize,
    full: bool,
    /// Events added since the last completed top-level event.
    add_counter: usize,
    /// Events still to suppress while resuming an interrupted expansion.
    skip_count: usize,
}

impl EventBuffer {
    /// Creates a buffer with the given byte budget (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            size_bytes: 0,
            capacity,
            full: false,
            add_counter: 0,
            skip_count: 0,
        }
    }

    /// Drops all recorded events and clears the full flag. Resume
    /// bookkeeping survives: skipping continues until the interrupted
    /// expansion has been replayed.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.size_bytes = 0;
        self.full = false;
    }

    /// Returns true if the byte budget is exhausted.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Returns true while an interrupted expansion is being replayed.
    pub fn is_skipping(&self) -> bool {
        self.skip_count > 0
    }

    /// Enters skipping mode: the events already delivered from the
    /// current top-level expansion will be suppressed on replay.
    pub fn start_skipping(&mut self) {
        self.skip_count = self.add_counter;
    }

    /// Marks the current top-level event as fully processed.
    pub fn reset_add_counter(&mut self) {
        self.add_counter = 0;
    }

    /// Abandons a pending resume (when the suspended work can no longer
    /// be replayed, e.g. playback stopped).
    pub fn cancel_skipping(&mut self) {
        self.skip_count = 0;
    }

    /// Records one event.
    pub fn add(&mut self, ch: usize, name: &str, arg: &Value) {
        self.add_counter += 1;

        if self.skip_count > 0 {
            self.skip_count -= 1;
            return;
        }

        let rendered = render_entry(ch, name, arg);
        self.size_bytes += rendered.len() + 1;
        self.entries.push(rendered);

        if self.capacity > 0 && self.size_bytes >= self.capacity {
            self.full = true;
        }
    }

    /// Returns the number of recorded events.
    pub fn event_count(&self) -> usize {
        self.entries.len()
    }

    /// Renders the recorded events as a JSON array.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.size_bytes + 2);
        out.push('[');
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(entry);
        }
        out.push(']');
        out
    }
}

fn render_entry(ch: usize, name: &str, arg: &Value) -> String {
    let name_json = serde_json::to_string(name).unwrap_or_else(|_| "\"\"".into());
    let arg_json = serde_json::to_string(arg).unwrap_or_else(|_| "null".into());
    format!("[{ch},{name_json},{arg_json}]")
}
