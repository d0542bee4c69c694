//! Voice slots.
//!
//! A voice is one activation of one processor inside one audio unit. All
//! voices triggered together for a note share a group id and are rendered
//! together by the instrument's voice signal plan.

use compas_module::{VoiceCommonState, VoiceProcState};

/// An activation record for one processor.
#[derive(Debug)]
pub struct Voice {
    /// Group identity shared by co-triggered voices.
    pub group_id: u64,
    /// Owning channel.
    pub ch_num: usize,
    /// Audio unit index.
    pub au_index: usize,
    /// Processor index within the audio unit.
    pub proc_index: usize,
    /// Still producing (or able to produce) signal.
    pub active: bool,
    /// Per-voice copy of the carried controls plus release state.
    pub common: VoiceCommonState,
    /// Processor-specific DSP state.
    pub state: Box<dyn VoiceProcState>,
}

impl Voice {
    /// Deactivates the voice.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}
