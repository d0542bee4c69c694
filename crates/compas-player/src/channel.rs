//! Per-channel state.
//!
//! A channel carries controls across notes (force and pitch, each with a
//! slider and an LFO), remembers which voice group is its foreground, and
//! queues intra-block events for sample-accurate dispatch during voice
//! processing.

use std::collections::HashMap;

use compas_core::controls::{ForceControls, PitchControls};
use compas_core::limits::LOCAL_EVENTS_MAX;
use compas_core::random::Random;
use compas_core::tstamp::Tstamp;

use compas_module::{Bind, ChannelDefaults};

/// What a queued channel event does when dispatched.
#[derive(Debug, Clone)]
pub enum ChannelEventKind {
    /// Start a new foreground voice group.
    NoteOn {
        /// Group id reserved at sequencing time.
        group_id: u64,
        /// Resolved pitch in cents.
        cents: f64,
        /// Fired from outside the composition (exempt from muting).
        external: bool,
    },
    /// Release the foreground voice group.
    NoteOff,
    /// Set force in dB.
    SetForce(f64),
    /// Slide force towards a target in dB.
    SlideForce(f64),
    /// Set the force slide duration.
    SlideForceLength(Tstamp),
    /// Set tremolo speed in cycles per beat.
    TremoloSpeed(f64),
    /// Set tremolo depth in dB.
    TremoloDepth(f64),
    /// Slide pitch towards a target in cents.
    SlidePitch(f64),
    /// Set the pitch slide duration.
    SlidePitchLength(Tstamp),
    /// Set vibrato speed in cycles per beat.
    VibratoSpeed(f64),
    /// Set vibrato depth in cents.
    VibratoDepth(f64),
    /// Select the channel's audio unit.
    SetAu(i32),
}

/// One queued intra-block event.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    /// Dispatch point: after audio for frames before this index, before
    /// audio from this index on.
    pub frame_offset: usize,
    /// The effect to apply.
    pub kind: ChannelEventKind,
}

/// Per-channel mutable state.
#[derive(Debug)]
pub struct Channel {
    /// Channel index.
    pub index: usize,
    /// Group id of the current foreground voices (0 = none).
    pub fg_group_id: u64,
    /// Audio unit the channel plays.
    pub audio_unit: i32,
    /// Carried force control.
    pub force: ForceControls,
    /// Carried pitch control.
    pub pitch: PitchControls,
    /// Pending intra-block events.
    pub local_events: Vec<ChannelEvent>,
    /// Cached bind entry indices per event name.
    event_cache: HashMap<String, Vec<usize>>,
    /// Expression random state.
    pub rand: Random,
    /// Muted channels process voices but are not mixed.
    pub muted: bool,
    /// Frame offset of the event currently being dispatched.
    pub frame_offset_temp: usize,
    /// Route new voices to the test output instead of regular mixing.
    pub use_test_output: bool,
    /// Defaults applied on reset.
    defaults: ChannelDefaults,
    seed: u64,
    tempo: f64,
    audio_rate: i32,
}

impl Channel {
    /// Creates a channel.
    pub fn new(index: usize, tempo: f64, audio_rate: i32, seed: u64) -> Self {
        let mut ch = Self {
            index,
            fg_group_id: 0,
            audio_unit: 0,
            force: ForceControls::new(0.0),
            pitch: PitchControls::new(0.0),
            local_events: Vec::new(),
            event_cache: HashMap::new(),
            rand: Random::new(seed ^ (index as u64 + 1)),
            muted: false,
            frame_offset_temp: 0,
            use_test_output: false,
            defaults: ChannelDefaults::default(),
            seed,
            tempo,
            audio_rate,
        };
        ch.sync_rates();
        ch
    }

    /// A throwaway stand-in used while a channel's real state is being
    /// processed elsewhere.
    pub fn placeholder() -> Self {
        Self::new(0, 120.0, 48000, 0)
    }

    fn sync_rates(&mut self) {
        self.force.set_audio_rate(self.audio_rate);
        self.force.set_tempo(self.tempo);
        self.pitch.set_audio_rate(self.audio_rate);
        self.pitch.set_tempo(self.tempo);
    }

    /// Resets carried state and re-applies the stored defaults.
    pub fn reset(&mut self) {
        self.fg_group_id = 0;
        self.audio_unit = self.defaults.audio_unit;
        self.force.reset(self.defaults.force);
        self.pitch.reset(0.0);
        self.local_events.clear();
        self.rand.reset(self.seed ^ (self.index as u64 + 1));
        self.frame_offset_temp = 0;
        self.sync_rates();
    }

    /// Stores and applies new defaults.
    pub fn apply_defaults(&mut self, defaults: &ChannelDefaults) {
        self.defaults = *defaults;
        self.audio_unit = defaults.audio_unit;
        self.force.reset(defaults.force);
        self.sync_rates();
    }

    /// Propagates an audio-rate change to the carried controls.
    pub fn set_audio_rate(&mut self, audio_rate: i32) {
        self.audio_rate = audio_rate;
        self.force.set_audio_rate(audio_rate);
        self.pitch.set_audio_rate(audio_rate);
    }

    /// Propagates a tempo change to the carried controls.
    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo;
        self.force.set_tempo(tempo);
        self.pitch.set_tempo(tempo);
    }

    /// Sets the mute flag.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Returns true if the channel is muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Queues an intra-block event. Overflow drops the event.
    pub fn push_local_event(&mut self, event: ChannelEvent) {
        if self.local_events.len() >= LOCAL_EVENTS_MAX {
            tracing::warn!(
                channel = self.index,
                "local event queue full, dropping event"
            );
            return;
        }
        self.local_events.push(event);
    }

    /// Returns the bind entries applicable to `event_name`, caching the
    /// lookup per channel.
    pub fn cached_bind_entries(&mut self, bind: &Bind, event_name: &str) -> Vec<usize> {
        if let Some(hit) = self.event_cache.get(event_name) {
            return hit.clone();
        }
        let indices = bind.entry_indices_for(event_name);
        self.event_cache
            .insert(event_name.to_string(), indices.clone());
        indices
    }

    /// Drops the cached bind lookups (after a bind table change).
    pub fn clear_event_cache(&mut self) {
        self.event_cache.clear();
    }
}
