//! Global playback state.
//!
//! Everything the sequence engine mutates that is not channel-local lives
//! here: playback mode, tempo and the tempo slide state machine, master
//! volume, pattern delay, goto and jump dispatch flags, the armed jump
//! contexts, the row-processing cursor (`cur_ch`/`cur_trigger`) and the
//! running voice statistics.

use compas_core::dc_blocker::DcBlocker;
use compas_core::position::{PatInstRef, Position};
use compas_core::slider::Slider;
use compas_core::tstamp::{BEAT_UNITS, Tstamp};

use compas_module::Module;

use crate::jump::ActiveJumps;
use crate::tuning_state::TuningState;

/// Tempo slides advance in small musical slices; the tempo is constant
/// within one slice.
pub const TEMPO_SLIDE_SLICE_LEN: i32 = BEAT_UNITS / 24;

/// Zero-advance gotos tolerated per slice before further gotos are
/// ignored.
pub const GOTO_SAFETY_MAX: u32 = 8;

/// Playback mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Not playing.
    Stopped,
    /// Playing the whole module.
    Module,
    /// Playing one track.
    Song,
    /// Looping one pattern instance.
    Pattern,
}

/// Global playback state owned by the player.
#[derive(Debug)]
pub struct MasterParams {
    /// Playback mode.
    pub playback_state: PlaybackState,
    /// Loop instead of stopping at the end.
    pub is_infinite: bool,
    /// Set when pattern playback mode was just entered and the channels
    /// still need resetting.
    pub pattern_playback_flag: bool,
    /// Position playback (re)starts from.
    pub start_pos: Position,
    /// Current position.
    pub cur_pos: Position,
    /// Channel being processed within the current trigger row.
    pub cur_ch: usize,
    /// Trigger index being processed within the current column.
    pub cur_trigger: usize,

    /// Current tempo in BPM.
    pub tempo: f64,
    /// Tempo slide direction: -1, 0 or 1.
    pub tempo_slide: i32,
    /// Slide target in BPM.
    pub tempo_slide_target: f64,
    /// Tempo change applied per slice.
    pub tempo_slide_update: f64,
    /// Musical time left in the whole slide.
    pub tempo_slide_left: Tstamp,
    /// Musical time left in the current slice.
    pub tempo_slide_slice_left: Tstamp,
    /// Slide duration set by `m/=t`.
    pub tempo_slide_length: Tstamp,
    /// Set when tempo changed and sliders/LFOs/devices need the news.
    pub tempo_settings_changed: bool,

    /// Master volume, linear.
    pub volume: f64,
    /// Master volume slide.
    pub volume_slider: Slider,
    /// Volume slide duration set by `m/=v`.
    pub volume_slide_length: Tstamp,
    /// DC blocker state per output channel.
    pub dc_blockers: [DcBlocker; 2],

    /// Remaining pattern delay.
    pub delay_left: Tstamp,

    /// Goto requested.
    pub do_goto: bool,
    /// Goto target pattern instance; invalid means the current one.
    pub goto_target_piref: PatInstRef,
    /// Goto target row.
    pub goto_target_row: Tstamp,
    /// Consecutive zero-advance gotos this slice.
    pub goto_safety_counter: u32,

    /// Jump requested.
    pub do_jump: bool,
    /// Jump counter armed into new contexts, set by `m.jc`.
    pub jump_counter: i64,
    /// Jump target pattern instance set by `m.jp`; invalid = current.
    pub jump_target_piref: PatInstRef,
    /// Jump target row set by `m.jr`.
    pub jump_target_row: Tstamp,
    /// Armed jump contexts.
    pub active_jumps: ActiveJumps,

    /// Pause flag: render silence without advancing musical time.
    pub pause: bool,

    /// Running maximum of simultaneously active voices.
    pub active_voices: usize,
    /// Running maximum of simultaneously active voice groups.
    pub active_vgroups: usize,

    /// Monotonic voice group id source (0 is the "no group" sentinel).
    pub group_id_counter: u64,

    /// Runtime tuning states.
    pub tuning_states: Vec<Option<TuningState>>,
}

impl MasterParams {
    /// Creates state for a module at the given audio rate.
    pub fn new(module: &Module, audio_rate: i32) -> Self {
        let mut params = Self {
            playback_state: PlaybackState::Song,
            is_infinite: false,
            pattern_playback_flag: false,
            start_pos: Position::at_track_start(0),
            cur_pos: Position::at_track_start(0),
            cur_ch: 0,
            cur_trigger: 0,
            tempo: module.start_tempo(0),
            tempo_slide: 0,
            tempo_slide_target: 0.0,
            tempo_slide_update: 0.0,
            tempo_slide_left: Tstamp::zero(),
            tempo_slide_slice_left: Tstamp::zero(),
            tempo_slide_length: Tstamp::zero(),
            tempo_settings_changed: false,
            volume: 1.0,
            volume_slider: Slider::new(1.0),
            volume_slide_length: Tstamp::zero(),
            dc_blockers: [DcBlocker::new(audio_rate), DcBlocker::new(audio_rate)],
            delay_left: Tstamp::zero(),
            do_goto: false,
            goto_target_piref: PatInstRef::none(),
            goto_target_row: Tstamp::zero(),
            goto_safety_counter: 0,
            do_jump: false,
            jump_counter: 2,
            jump_target_piref: PatInstRef::none(),
            jump_target_row: Tstamp::zero(),
            active_jumps: ActiveJumps::new(),
            pause: false,
            active_voices: 0,
            active_vgroups: 0,
            group_id_counter: 0,
            tuning_states: Vec::new(),
        };
        params.volume_slider.set_audio_rate(audio_rate);
        params
    }

    /// Restores the playback-facing state for a fresh start. Tuning
    /// states and the group id counter survive resets.
    pub fn reset(&mut self, module: &Module) {
        self.playback_state = PlaybackState::Song;
        self.pattern_playback_flag = false;
        self.start_pos = Position::at_track_start(0);
        self.cur_pos = Position::at_track_start(0);
        self.cur_ch = 0;
        self.cur_trigger = 0;
        self.tempo = module.start_tempo(0);
        self.tempo_slide = 0;
        self.tempo_slide_left = Tstamp::zero();
        self.tempo_slide_slice_left = Tstamp::zero();
        self.tempo_slide_length = Tstamp::zero();
        self.tempo_settings_changed = false;
        self.volume = 1.0;
        self.volume_slider = {
            let mut s = Slider::new(1.0);
            s.set_tempo(self.tempo);
            s
        };
        self.volume_slide_length = Tstamp::zero();
        for blocker in &mut self.dc_blockers {
            blocker.reset();
        }
        self.delay_left = Tstamp::zero();
        self.do_goto = false;
        self.goto_target_piref = PatInstRef::none();
        self.goto_target_row = Tstamp::zero();
        self.goto_safety_counter = 0;
        self.do_jump = false;
        self.jump_counter = 2;
        self.jump_target_piref = PatInstRef::none();
        self.jump_target_row = Tstamp::zero();
        self.active_jumps.reset();
        self.pause = false;
        self.active_voices = 0;
        self.active_vgroups = 0;
    }

    /// Applies the starting tempo of the current track.
    pub fn set_starting_tempo(&mut self, module: &Module) {
        self.tempo = module.start_tempo(self.cur_pos.track);
    }

    /// Begins a tempo slide towards `target` over the configured slide
    /// length. A zero length sets the tempo directly.
    pub fn start_tempo_slide(&mut self, target: f64) {
        if !self.tempo_slide_length.is_positive() || target == self.tempo {
            self.tempo = target;
            self.tempo_slide = 0;
            self.tempo_settings_changed = true;
            return;
        }

        let length_units = self.tempo_slide_length.beats() as f64 * f64::from(BEAT_UNITS)
            + f64::from(self.tempo_slide_length.rem());
        let slices = (length_units / f64::from(TEMPO_SLIDE_SLICE_LEN)).max(1.0);

        self.tempo_slide = if target > self.tempo { 1 } else { -1 };
        self.tempo_slide_target = target;
        self.tempo_slide_update = (target - self.tempo) / slices;
        self.tempo_slide_left = self.tempo_slide_length;
        self.tempo_slide_slice_left =
            Tstamp::new(0, TEMPO_SLIDE_SLICE_LEN).min(self.tempo_slide_left);
        // End the current slice so the slide engages from here.
        self.tempo_settings_changed = true;
    }

    /// Advances the tempo slide state machine at a slice boundary.
    pub fn update_tempo_slide(&mut self) {
        if self.tempo_slide == 0 {
            return;
        }

        if !self.tempo_slide_left.is_positive() {
            // Out of slide time.
            self.tempo = self.tempo_slide_target;
            self.tempo_slide = 0;
            self.tempo_settings_changed = true;
        } else if !self.tempo_slide_slice_left.is_positive() {
            // New tempo for the next slice.
            self.tempo += self.tempo_slide_update;
            self.tempo_settings_changed = true;

            let overshot_low = self.tempo_slide < 0 && self.tempo < self.tempo_slide_target;
            let overshot_high = self.tempo_slide > 0 && self.tempo > self.tempo_slide_target;
            if overshot_low || overshot_high {
                self.tempo = self.tempo_slide_target;
                self.tempo_slide = 0;
            } else {
                self.tempo_slide_slice_left =
                    Tstamp::new(0, TEMPO_SLIDE_SLICE_LEN).min(self.tempo_slide_left);
            }
        }
    }

    /// Draws the next voice group id.
    pub fn next_group_id(&mut self) -> u64 {
        self.group_id_counter += 1;
        self.group_id_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MasterParams {
        MasterParams::new(&Module::new(), 48000)
    }

    #[test]
    fn test_zero_length_slide_is_immediate() {
        let mut mp = params();
        mp.start_tempo_slide(60.0);
        assert_eq!(mp.tempo, 60.0);
        assert_eq!(mp.tempo_slide, 0);
        assert!(mp.tempo_settings_changed);
    }

    #[test]
    fn test_slide_reaches_target() {
        let mut mp = params();
        mp.tempo_slide_length = Tstamp::new(1, 0);
        mp.start_tempo_slide(60.0);
        assert_eq!(mp.tempo_slide, -1);

        // Drain the slide slice by slice.
        for _ in 0..100 {
            if mp.tempo_slide == 0 {
                break;
            }
            let advance = mp.tempo_slide_slice_left.min(mp.tempo_slide_left);
            mp.tempo_slide_slice_left = mp.tempo_slide_slice_left.saturating_sub(advance);
            mp.tempo_slide_left = mp.tempo_slide_left.saturating_sub(advance);
            mp.update_tempo_slide();
        }

        assert_eq!(mp.tempo, 60.0);
        assert_eq!(mp.tempo_slide, 0);
    }

    #[test]
    fn test_group_ids_monotonic() {
        let mut mp = params();
        let a = mp.next_group_id();
        let b = mp.next_group_id();
        assert!(b > a);
        assert!(a > 0);
    }
}
