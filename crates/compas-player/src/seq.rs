//! Sequence advancement: the coupling of musical time to audio time.
//!
//! [`Player::move_forwards`] computes how far the composition can advance
//! before something interesting happens (a trigger row, the end of a
//! tempo slide slice, the end of a pattern delay) and converts that
//! musical distance to a frame count, carrying the fractional frame
//! residue so repeated short slices never drift.
//!
//! [`Player::process_cgiters`] walks the channels of the current trigger
//! row, dispatching triggers and honouring jumps, gotos, pattern delays
//! and event-buffer suspension, then moves every channel iterator forward
//! in lockstep.

use compas_core::limits::CHANNELS;
use compas_core::position::{PatInstRef, Position};
use compas_core::tstamp::Tstamp;
use compas_core::value::{Value, ValueType};

use crate::event_handler;
use crate::event_names::{self, EventCategory};
use crate::jump::JumpKey;
use crate::master_params::{GOTO_SAFETY_MAX, PlaybackState};
use crate::player::{Player, ResumePoint};

impl Player {
    /// Advances musical time by up to `nframes` worth and returns the
    /// number of frames to render before the next advance.
    pub(crate) fn move_forwards(&mut self, nframes: usize, skip: bool) -> usize {
        debug_assert!(!self.has_stopped());

        self.master_params.update_tempo_slide();
        if self.master_params.tempo_settings_changed {
            self.master_params.tempo_settings_changed = false;
            self.update_sliders_and_lfos_tempo();
        }

        let tempo = self.master_params.tempo;
        let audio_rate = self.audio_rate;

        let mut limit = Tstamp::from_frames(nframes as i64, tempo, audio_rate);

        if self.master_params.tempo_slide != 0 {
            limit = limit.min(self.master_params.tempo_slide_slice_left);
            self.master_params.tempo_slide_slice_left = self
                .master_params
                .tempo_slide_slice_left
                .saturating_sub(limit);
            self.master_params.tempo_slide_left =
                self.master_params.tempo_slide_left.saturating_sub(limit);
        }

        if self.master_params.delay_left.is_positive() {
            limit = limit.min(self.master_params.delay_left);
            self.master_params.delay_left = self.master_params.delay_left.saturating_sub(limit);
        } else {
            self.process_cgiters(&mut limit, skip);
        }

        if limit.is_positive() {
            // We are moving, so zero-advance goto accounting restarts.
            self.master_params.goto_safety_counter = 0;
        }

        let dframes = limit.to_frames(tempo, audio_rate);
        debug_assert!(dframes >= 0.0);

        // Carry the fractional frame so the remainder stays in
        // [-0.5, 0.5) and cumulative rounding is subdivision-invariant.
        let mut to_be_rendered = dframes as usize;
        self.frame_remainder += dframes - to_be_rendered as f64;
        if self.frame_remainder >= 0.5 {
            to_be_rendered += 1;
            self.frame_remainder -= 1.0;
        }

        debug_assert!(to_be_rendered <= nframes);
        to_be_rendered
    }

    /// Processes the trigger rows at the current position and shrinks
    /// `limit` to the next musically interesting moment.
    pub(crate) fn process_cgiters(&mut self, limit: &mut Tstamp, skip: bool) {
        debug_assert!(!self.has_stopped());

        if self.master_params.pattern_playback_flag {
            self.start_pattern_playback_mode();
        }

        // The channel iterators are lockstep on global position.
        self.master_params.cur_pos = self.cgiters[0].pos;

        // Nothing to play here.
        if !self.master_params.cur_pos.piref.is_valid() {
            self.master_params.playback_state = PlaybackState::Stopped;
            *limit = Tstamp::zero();
            return;
        }

        let mut i = self.master_params.cur_ch;
        while i < CHANNELS {
            if self.cgiters[i].has_finished() {
                break;
            }

            if let Some(row) = self.cgiters[i].get_trigger_row() {
                while self.master_params.cur_trigger < row.len() {
                    let trigger = row[self.master_params.cur_trigger].clone();
                    let key: JumpKey = (
                        self.master_params.cur_pos.piref,
                        self.cgiters[i].pos.pat_pos,
                        i,
                        self.master_params.cur_trigger,
                    );
                    let armed_counter = self
                        .master_params
                        .active_jumps
                        .get(&key)
                        .map(|ctx| ctx.counter);

                    match armed_counter {
                        Some(counter) if counter > 0 => {
                            self.master_params.do_jump = true;
                        }
                        Some(_) => {
                            // Consumed context: release it and pass over
                            // the trigger.
                            self.master_params.active_jumps.remove(&key);
                        }
                        None => {
                            let category =
                                event_names::lookup(&trigger.name).map(|spec| spec.category);
                            let passes_skip_filter = !skip
                                || matches!(
                                    category,
                                    Some(
                                        EventCategory::Control
                                            | EventCategory::General
                                            | EventCategory::Master
                                    )
                                );
                            let is_control = matches!(category, Some(EventCategory::Control));

                            if passes_skip_filter
                                && (!is_control || self.master_params.is_infinite)
                            {
                                if !skip && self.event_buffer.is_full() {
                                    *limit = Tstamp::zero();
                                    self.cgiters[i].clear_returned_status();
                                    return;
                                }

                                self.process_trigger_parts(
                                    i,
                                    &trigger.name,
                                    &trigger.expr,
                                    None,
                                    skip,
                                    false,
                                );

                                if self.event_buffer.is_skipping() {
                                    *limit = Tstamp::zero();
                                    self.resume = ResumePoint::MidRow;
                                    self.cgiters[i].clear_returned_status();
                                    return;
                                }

                                self.event_buffer.reset_add_counter();
                            }
                        }
                    }

                    if self.master_params.pattern_playback_flag {
                        self.start_pattern_playback_mode();
                    }

                    if self.check_perform_goto() {
                        *limit = Tstamp::zero();
                        return;
                    }

                    if self.master_params.do_jump {
                        self.master_params.do_jump = false;

                        let target = self.master_params.active_jumps.get_mut(&key).map(|ctx| {
                            ctx.counter -= 1;
                            (ctx.target_piref, ctx.target_row)
                        });
                        if let Some((target_piref, target_row)) = target {
                            let target_piref = if target_piref.is_valid() {
                                target_piref
                            } else {
                                self.master_params.cur_pos.piref
                            };
                            self.set_new_playback_position(target_piref, target_row);
                            *limit = Tstamp::zero();
                            return;
                        }
                    }

                    self.master_params.cur_trigger += 1;

                    if self.master_params.delay_left.is_positive() {
                        *limit = Tstamp::zero();
                        self.cgiters[i].clear_returned_status();
                        return;
                    }
                }
            }

            // All triggers of this column processed.
            self.master_params.cur_trigger = 0;
            self.master_params.cur_ch = i + 1;

            // See how far this channel lets us move.
            let mut dist = *limit;
            self.cgiters[i].peek(&mut dist);
            if dist < *limit {
                *limit = dist;
            }

            i += 1;
        }

        // All trigger rows processed.
        self.master_params.cur_ch = 0;
        self.master_params.cur_trigger = 0;

        if self.master_params.tempo_settings_changed {
            *limit = Tstamp::zero();
            return;
        }

        let advance = *limit;
        let mut any_active = false;
        for cgiter in &mut self.cgiters {
            cgiter.move_dist(advance);
            any_active |= !cgiter.has_finished();
        }

        if !any_active {
            if self.master_params.is_infinite {
                let start = self.master_params.start_pos;
                for cgiter in &mut self.cgiters {
                    cgiter.reset(&start);
                }
            } else {
                self.master_params.playback_state = PlaybackState::Stopped;
            }
            *limit = Tstamp::zero();
        }
    }

    /// Enters pattern playback mode at a pattern instance.
    pub fn set_pattern_playback(&mut self, piref: PatInstRef, row: Tstamp) {
        self.master_params.playback_state = PlaybackState::Pattern;
        self.master_params.pattern_playback_flag = true;
        self.master_params.cur_pos = Position {
            track: -1,
            system: -1,
            pat_pos: row,
            piref,
        };
    }

    pub(crate) fn start_pattern_playback_mode(&mut self) {
        self.master_params.pattern_playback_flag = false;

        self.reset_channels();

        let pos = self.master_params.cur_pos;
        for cgiter in &mut self.cgiters {
            cgiter.reset(&pos);
        }
    }

    pub(crate) fn reset_channels(&mut self) {
        for i in 0..CHANNELS {
            let defaults = self
                .module
                .ch_defaults
                .as_ref()
                .and_then(|d| d.get(i))
                .copied()
                .unwrap_or_default();
            self.channels[i].apply_defaults(&defaults);
            self.channels[i].reset();
        }
    }

    pub(crate) fn update_sliders_and_lfos_tempo(&mut self) {
        let tempo = self.master_params.tempo;
        self.master_params.volume_slider.set_tempo(tempo);
        for ch in &mut self.channels {
            ch.set_tempo(tempo);
        }
        self.device_states.set_tempo(tempo);
    }

    pub(crate) fn set_new_playback_position(
        &mut self,
        target_piref: PatInstRef,
        target_row: Tstamp,
    ) {
        let mut actual_piref = target_piref;
        let mut actual_row = target_row;

        if self.master_params.playback_state == PlaybackState::Pattern
            && actual_piref != self.master_params.cur_pos.piref
        {
            // Pattern playback never leaves its pattern instance.
            actual_piref = self.master_params.cur_pos.piref;
            actual_row = Tstamp::zero();
        }

        match self.module.find_pattern_location(actual_piref) {
            None => {
                // The jump target does not exist.
                self.master_params.playback_state = PlaybackState::Stopped;
            }
            Some((track, system)) => {
                let mut target_pos = Position {
                    track,
                    system,
                    pat_pos: actual_row,
                    piref: actual_piref,
                };
                if self.master_params.playback_state == PlaybackState::Pattern {
                    target_pos.track = -1;
                    target_pos.system = -1;
                }

                for cgiter in &mut self.cgiters {
                    cgiter.reset(&target_pos);
                }
                self.master_params.cur_pos = target_pos;
            }
        }

        // Make sure all triggers are processed after the move.
        self.master_params.cur_ch = 0;
        self.master_params.cur_trigger = 0;
    }

    /// Performs a pending goto. Returns true if playback moved.
    pub(crate) fn check_perform_goto(&mut self) -> bool {
        if !self.master_params.do_goto {
            return false;
        }
        self.master_params.do_goto = false;

        let target_piref = if self.master_params.goto_target_piref.is_valid() {
            self.master_params.goto_target_piref
        } else {
            self.master_params.cur_pos.piref
        };
        let target_row = self.master_params.goto_target_row;

        if target_piref == self.master_params.cur_pos.piref
            && target_row == self.master_params.cur_pos.pat_pos
        {
            self.master_params.goto_safety_counter += 1;
            if self.master_params.goto_safety_counter > GOTO_SAFETY_MAX {
                tracing::warn!("ignoring goto loop that advances no musical time");
                return false;
            }
        }

        self.set_new_playback_position(target_piref, target_row);
        true
    }

    /// Dispatches one event: side effect, event stream, bind expansion
    /// and query results.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn process_event(
        &mut self,
        ch_num: usize,
        event_name: &str,
        arg: &Value,
        is_at_global_breakpoint: bool,
        frame_offset: usize,
        skip: bool,
        external: bool,
    ) {
        let _ = is_at_global_breakpoint;

        let Some(spec) = event_names::lookup(event_name) else {
            self.emit_error(ch_num, format!("unsupported event type: {event_name}"));
            return;
        };

        let is_query = spec.category == EventCategory::Query;
        let is_auto = spec.category == EventCategory::Auto;

        if !is_query && !is_auto {
            if let Err(message) = event_handler::trigger(
                &mut self.master_params,
                &mut self.channels,
                &mut self.voice_group_res,
                &self.module,
                ch_num,
                spec,
                arg,
                frame_offset,
                external,
            ) {
                self.emit_error(ch_num, message);
                return;
            }
        }

        if !skip {
            self.event_buffer.add(ch_num, event_name, arg);
        }

        // Bind expansion.
        let module = std::sync::Arc::clone(&self.module);
        if let Some(bind) = module.bind.as_ref() {
            let entries = self.channels[ch_num].cached_bind_entries(bind, event_name);
            'entries: for entry_index in entries {
                let entry = bind.entry(entry_index);

                for constraint in &entry.constraints {
                    let passed = crate::expr::evaluate(
                        constraint,
                        &self.env,
                        Some(arg),
                        &mut self.channels[ch_num].rand,
                    )
                    .map(|v| truthy(&v))
                    .unwrap_or(false);
                    if !passed {
                        continue 'entries;
                    }
                }

                for target in &entry.targets {
                    if self.event_buffer.is_full() {
                        self.event_buffer.start_skipping();
                        return;
                    }
                    let target_ch = (ch_num as i64 + i64::from(target.ch_offset))
                        .rem_euclid(CHANNELS as i64)
                        as usize;
                    self.process_trigger_desc(target_ch, &target.desc, Some(arg), skip, external);
                }
            }
        }

        // Query expansion.
        if !skip && is_query {
            match event_name {
                "qlocation" => {
                    let pos = self.master_params.cur_pos;
                    if !self.try_auto(ch_num, "Atrack", Value::Int(i64::from(pos.track))) {
                        return;
                    }
                    if !self.try_auto(ch_num, "Asystem", Value::Int(i64::from(pos.system))) {
                        return;
                    }
                    if pos.has_valid_pattern_pos()
                        && !self.try_auto(ch_num, "Apattern", Value::PatInstRef(pos.piref))
                    {
                        return;
                    }
                    let _ = self.try_auto(ch_num, "Arow", Value::Tstamp(pos.pat_pos));
                }
                "qvoices" => {
                    let voices = self.master_params.active_voices;
                    let vgroups = self.master_params.active_vgroups;
                    if !self.try_auto(ch_num, "Avoices", Value::Int(voices as i64)) {
                        return;
                    }
                    if !self.try_auto(ch_num, "Avgroups", Value::Int(vgroups as i64)) {
                        return;
                    }
                    self.master_params.active_voices = 0;
                    self.master_params.active_vgroups = 0;
                }
                "qf" => {
                    let force = self.channel_fg_force(ch_num);
                    let value = if force.is_finite() {
                        Value::Float(force)
                    } else {
                        Value::Bool(false)
                    };
                    let _ = self.try_auto(ch_num, "Af", value);
                }
                _ => {}
            }
        }
    }

    fn try_auto(&mut self, ch_num: usize, name: &str, value: Value) -> bool {
        if self.event_buffer.is_full() {
            self.event_buffer.start_skipping();
            return false;
        }
        self.process_event(ch_num, name, &value, true, 0, false, false);
        true
    }

    /// Parses and fires a trigger description `["name", "expr"]`.
    pub(crate) fn process_trigger_desc(
        &mut self,
        ch_num: usize,
        desc: &str,
        meta: Option<&Value>,
        skip: bool,
        external: bool,
    ) {
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(desc);
        let parts = parsed
            .ok()
            .and_then(|v| v.as_array().cloned())
            .filter(|a| a.len() == 2);
        let Some(parts) = parts else {
            self.emit_error(ch_num, format!("malformed trigger: {desc}"));
            return;
        };
        let (Some(name), Some(expr)) = (parts[0].as_str(), parts[1].as_str()) else {
            self.emit_error(ch_num, format!("malformed trigger: {desc}"));
            return;
        };
        let name = name.to_string();
        let expr = expr.to_string();
        self.process_trigger_parts(ch_num, &name, &expr, meta, skip, external);
    }

    /// Evaluates a trigger's argument expression, type-checks it against
    /// the event's declared parameter type, and dispatches.
    pub(crate) fn process_trigger_parts(
        &mut self,
        ch_num: usize,
        event_name: &str,
        expr: &str,
        meta: Option<&Value>,
        skip: bool,
        external: bool,
    ) {
        let Some(spec) = event_names::lookup(event_name) else {
            self.emit_error(ch_num, format!("unsupported event type: {event_name}"));
            return;
        };

        let arg = if spec.param == ValueType::None {
            Value::None
        } else {
            let evaluated = crate::expr::evaluate(
                expr,
                &self.env,
                meta,
                &mut self.channels[ch_num].rand,
            );
            match evaluated {
                Ok(value) => match value.convert(spec.param) {
                    Some(value) => value,
                    None => {
                        self.emit_error(
                            ch_num,
                            format!("type mismatch in `{event_name}` argument `{expr}`"),
                        );
                        return;
                    }
                },
                Err(message) => {
                    self.emit_error(ch_num, format!("couldn't parse `{expr}`: {message}"));
                    return;
                }
            }
        };

        let is_control = spec.category == EventCategory::Control;
        if !is_control || self.master_params.is_infinite {
            self.process_event(ch_num, event_name, &arg, true, 0, skip, external);
        }
    }

    pub(crate) fn emit_error(&mut self, ch_num: usize, message: String) {
        tracing::warn!(channel = ch_num, "{message}");
        if !self.event_buffer.is_full() {
            self.event_buffer
                .add(ch_num, "Aerror", &Value::String(message));
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        _ => false,
    }
}
