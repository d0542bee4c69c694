//! The mixing player.
//!
//! Couples symbolic time to audio time: each render call alternates
//! between advancing the channel grid iterators up to the next musically
//! interesting moment and rendering audio up to that limit, so triggers
//! land frame-accurately and output is delivered with at most one block
//! of latency.

use std::collections::HashMap;
use std::sync::Arc;

use compas_core::limits::{AUDIO_BUFFER_SIZE_MAX, CHANNELS, OUT_CHANNELS, THREADS_MAX, VOICES_MAX};
use compas_core::value::Value;

use compas_module::Module;

use crate::cgiter::Cgiter;
use crate::channel::Channel;
use crate::device_states::DeviceStates;
use crate::error::PlayerError;
use crate::event_buffer::EventBuffer;
use crate::expr::{self, EnvState};
use crate::master_params::{MasterParams, PlaybackState};
use crate::mixed_signal_plan::MixedSignalPlan;
use crate::tuning_state::TuningState;
use crate::voice_exec::{
    ChannelPackage, RenderStats, ThreadParams, VoiceBatchCtx, apply_channel_event,
    process_channel_fg, process_claimed_bg,
};
use crate::voice_pool::{VoiceGroupReservations, VoicePool};
use crate::voice_signal_plan::VoiceSignalPlan;
use crate::workers::{WorkerJob, WorkerPool};

/// One-slot continuation for event-buffer overflow.
#[derive(Debug, Clone, Default)]
pub(crate) enum ResumePoint {
    /// Nothing suspended.
    #[default]
    None,
    /// Suspended while processing a trigger row.
    MidRow,
    /// Suspended while processing an externally fired event.
    MidFire {
        /// Channel the event was fired on.
        ch: usize,
        /// Event name.
        name: String,
        /// Event argument.
        arg: Value,
    },
}

/// The realtime mixing player.
#[derive(Debug)]
pub struct Player {
    pub(crate) module: Arc<Module>,
    pub(crate) audio_rate: i32,
    pub(crate) audio_buffer_size: usize,
    audio_buffer: Vec<f32>,
    audio_frames_available: usize,

    thread_count: usize,
    pub(crate) thread_params: Vec<ThreadParams>,
    workers: Option<WorkerPool>,

    pub(crate) device_states: DeviceStates,
    pub(crate) env: EnvState,
    pub(crate) event_buffer: EventBuffer,
    pub(crate) voices: VoicePool,
    pub(crate) voice_group_res: VoiceGroupReservations,
    voice_plans: Arc<HashMap<usize, VoiceSignalPlan>>,
    mixed_plan: Option<MixedSignalPlan>,
    pub(crate) master_params: MasterParams,
    pub(crate) channels: Vec<Channel>,
    pub(crate) cgiters: Vec<Cgiter>,

    pub(crate) frame_remainder: f64,
    cgiters_accessed: bool,
    audio_frames_processed: u64,
    nanoseconds_history: i64,
    events_returned: bool,
    pub(crate) resume: ResumePoint,
}

impl Player {
    /// Creates a player for a module.
    pub fn new(
        module: Arc<Module>,
        audio_rate: i32,
        audio_buffer_size: usize,
        event_buffer_size: usize,
        voice_count: usize,
    ) -> Result<Self, PlayerError> {
        if audio_rate <= 0 {
            return Err(PlayerError::BadArgument(format!(
                "audio rate {audio_rate}"
            )));
        }
        if audio_buffer_size == 0 || audio_buffer_size > AUDIO_BUFFER_SIZE_MAX {
            return Err(PlayerError::BadArgument(format!(
                "audio buffer size {audio_buffer_size}"
            )));
        }
        if voice_count > VOICES_MAX {
            return Err(PlayerError::BadArgument(format!(
                "voice count {voice_count}"
            )));
        }
        module.validate()?;

        let master_params = MasterParams::new(&module, audio_rate);
        let tempo = master_params.tempo;

        let channels: Vec<Channel> = (0..CHANNELS)
            .map(|i| Channel::new(i, tempo, audio_rate, module.random_seed))
            .collect();
        let cgiters: Vec<Cgiter> = (0..CHANNELS)
            .map(|i| Cgiter::new(Arc::clone(&module), i))
            .collect();

        let device_count = module.audio_units.len() + 1;

        let mut player = Self {
            env: EnvState::new(&module.env),
            device_states: DeviceStates::new(device_count, audio_buffer_size, tempo, audio_rate),
            module,
            audio_rate,
            audio_buffer_size,
            audio_buffer: vec![0.0; audio_buffer_size * OUT_CHANNELS],
            audio_frames_available: 0,
            thread_count: 1,
            thread_params: vec![ThreadParams::new(0, 0, audio_buffer_size)],
            workers: None,
            event_buffer: EventBuffer::new(event_buffer_size),
            voices: VoicePool::new(voice_count),
            voice_group_res: VoiceGroupReservations::new(),
            voice_plans: Arc::new(HashMap::new()),
            mixed_plan: None,
            master_params,
            channels,
            cgiters,
            frame_remainder: 0.0,
            cgiters_accessed: false,
            audio_frames_processed: 0,
            nanoseconds_history: 0,
            events_returned: false,
            resume: ResumePoint::None,
        };

        player.prepare_mixing()?;
        player.reset(-1);
        Ok(player)
    }

    /// Builds the voice signal plans and the mixed signal plan from the
    /// module's current connections.
    pub fn prepare_mixing(&mut self) -> Result<(), PlayerError> {
        let mut plans = HashMap::new();
        let mut wb_need = 0;
        let mut state_need = 0;

        for (index, slot) in self.module.audio_units.iter().enumerate() {
            let Some(au) = slot else { continue };
            if au.is_instrument() && !au.procs.is_empty() {
                let plan = VoiceSignalPlan::build(index, au)?;
                wb_need = wb_need.max(plan.work_buffer_count());
                state_need = state_need.max(au.max_voice_state_size());
                plans.insert(index, plan);
            }
        }

        self.voices.reserve_state_space(state_need)?;
        self.voice_plans = Arc::new(plans);
        self.mixed_plan = Some(MixedSignalPlan::build(&self.module)?);

        for params in &mut self.thread_params {
            params.work_buffers.ensure_count(wb_need);
        }

        tracing::debug!(
            voice_plans = self.voice_plans.len(),
            mixed_levels = self.mixed_plan.as_ref().map_or(0, MixedSignalPlan::level_count),
            "mixing prepared"
        );
        Ok(())
    }

    /// Sets the number of render threads.
    ///
    /// On failure the player falls back to single-thread mode.
    pub fn set_thread_count(&mut self, count: usize) -> Result<(), PlayerError> {
        if count == 0 || count > THREADS_MAX {
            return Err(PlayerError::BadArgument(format!("thread count {count}")));
        }
        if count == self.thread_count {
            return Ok(());
        }

        // Existing workers stop before their resources are replaced.
        self.workers = None;

        let wb_count = self.thread_params[0].work_buffers.count();
        self.thread_params.truncate(count);
        while self.thread_params.len() < count {
            let id = self.thread_params.len();
            self.thread_params
                .push(ThreadParams::new(id, wb_count, self.audio_buffer_size));
        }
        self.sync_voice_scratch_size();
        self.device_states.set_thread_count(count);

        if count > 1 {
            match WorkerPool::spawn(count) {
                Ok(pool) => self.workers = Some(pool),
                Err(err) => {
                    self.thread_params.truncate(1);
                    self.device_states.set_thread_count(1);
                    self.thread_count = 1;
                    return Err(err);
                }
            }
        }

        self.thread_count = count;
        Ok(())
    }

    /// Returns the configured thread count.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Changes the audio rate.
    pub fn set_audio_rate(&mut self, rate: i32) -> Result<(), PlayerError> {
        if rate <= 0 {
            return Err(PlayerError::BadArgument(format!("audio rate {rate}")));
        }
        if rate == self.audio_rate {
            return Ok(());
        }

        self.device_states.set_audio_rate(rate);

        // Keep the nanosecond position stable across the rate change.
        self.nanoseconds_history += (self.audio_frames_processed as i64)
            .saturating_mul(1_000_000_000)
            / i64::from(self.audio_rate);
        self.audio_frames_processed = 0;

        self.audio_rate = rate;
        self.update_sliders_and_lfos_audio_rate();
        Ok(())
    }

    /// Returns the audio rate.
    pub fn audio_rate(&self) -> i32 {
        self.audio_rate
    }

    /// Changes the audio buffer size.
    pub fn set_audio_buffer_size(&mut self, size: usize) -> Result<(), PlayerError> {
        if size == 0 || size > AUDIO_BUFFER_SIZE_MAX {
            return Err(PlayerError::BadArgument(format!("audio buffer size {size}")));
        }
        if size == self.audio_buffer_size {
            return Ok(());
        }

        self.audio_buffer_size = size;
        self.audio_buffer.resize(size * OUT_CHANNELS, 0.0);
        self.audio_frames_available = self.audio_frames_available.min(size);
        self.device_states.set_audio_buffer_size(size);
        for params in &mut self.thread_params {
            params.set_buffer_size(size);
        }
        self.sync_voice_scratch_size();
        Ok(())
    }

    /// Returns the audio buffer size.
    pub fn audio_buffer_size(&self) -> usize {
        self.audio_buffer_size
    }

    /// Reserves per-voice DSP state space.
    pub fn reserve_voice_state_space(&mut self, size: usize) -> Result<(), PlayerError> {
        self.voices.reserve_state_space(size)
    }

    /// Reserves per-voice work buffer space in frames.
    pub fn reserve_voice_work_buffer_space(&mut self, size: usize) -> Result<(), PlayerError> {
        self.voices.reserve_work_buffers(size)?;
        self.sync_voice_scratch_size();
        Ok(())
    }

    /// Voice scratch must hold a whole block and any reserved voice work
    /// buffer space.
    fn sync_voice_scratch_size(&mut self) {
        let need = self.audio_buffer_size.max(self.voices.work_buffer_size());
        for params in &mut self.thread_params {
            if params.work_buffers.size() < need {
                params.work_buffers.resize_all(need);
            }
        }
    }

    /// Creates (or resets) the runtime tuning state for one table.
    pub fn create_tuning_state(&mut self, index: usize) -> Result<(), PlayerError> {
        let Some(table) = self.module.tuning_table(index) else {
            return Err(PlayerError::BadArgument(format!(
                "no tuning table at index {index}"
            )));
        };
        if self.master_params.tuning_states.len() <= index {
            self.master_params
                .tuning_states
                .resize_with(index + 1, || None);
        }
        self.master_params.tuning_states[index] = Some(TuningState::new(table));
        Ok(())
    }

    /// Restarts playback from the beginning of a track; -1 plays the
    /// whole module.
    pub fn reset(&mut self, track_num: i32) {
        debug_assert!(track_num >= -1);

        self.master_params.reset(&self.module);
        if track_num == -1 {
            self.master_params.playback_state = PlaybackState::Module;
            self.master_params.cur_pos.track = 0;
        } else {
            self.master_params.cur_pos.track = track_num;
        }
        self.master_params.start_pos = self.master_params.cur_pos;

        self.update_sliders_and_lfos_audio_rate();
        self.update_sliders_and_lfos_tempo();

        self.frame_remainder = 0.0;

        self.reset_channels();

        let pos = self.master_params.cur_pos;
        for cgiter in &mut self.cgiters {
            cgiter.reset(&pos);
        }
        self.cgiters_accessed = false;

        self.event_buffer.clear();
        self.audio_frames_processed = 0;
        self.nanoseconds_history = 0;
        self.events_returned = false;
        self.resume = ResumePoint::None;

        self.env.reset(&self.module.env);
        self.voices.reset();
        self.voice_group_res.reset();
    }

    /// Mutes or unmutes a channel.
    pub fn set_channel_mute(&mut self, ch: usize, mute: bool) {
        if ch < CHANNELS {
            self.channels[ch].set_muted(mute);
        }
    }

    /// Routes a channel's new voices to the test output.
    pub fn set_channel_test_output(&mut self, ch: usize, enabled: bool) {
        if ch < CHANNELS {
            self.channels[ch].use_test_output = enabled;
        }
    }

    /// Returns true when playback has stopped.
    pub fn has_stopped(&self) -> bool {
        self.master_params.playback_state == PlaybackState::Stopped
    }

    /// Frames produced by the last [`play`](Self::play) call.
    pub fn get_frames_available(&self) -> usize {
        self.audio_frames_available
    }

    /// Stereo interleaved output of the last [`play`](Self::play) call.
    pub fn get_audio(&self) -> &[f32] {
        &self.audio_buffer[..self.audio_frames_available * OUT_CHANNELS]
    }

    /// Playback position in nanoseconds, stable across audio-rate
    /// changes.
    pub fn get_nanoseconds(&self) -> i64 {
        let here = (self.audio_frames_processed as i64).saturating_mul(1_000_000_000)
            / i64::from(self.audio_rate);
        self.nanoseconds_history + here
    }

    /// Returns the events fired since the last call as a JSON array.
    /// A repeated call on the same block yields only continuation events.
    pub fn get_events(&mut self) -> String {
        if self.events_returned {
            self.update_receive();
        }
        self.events_returned = true;
        self.event_buffer.render()
    }

    /// Renders up to `nframes` frames of audio.
    pub fn play(&mut self, nframes: usize) {
        debug_assert!(self.audio_buffer_size > 0);

        self.flush_receive();
        self.event_buffer.clear();

        let mut nframes = nframes.min(self.audio_buffer_size);
        let was_playing = !self.has_stopped();
        let mut rendered = 0;
        let mut zero_rounds = 0u32;

        while rendered < nframes && !self.event_buffer.is_full() {
            // Move forwards in the composition.
            let mut to_be_rendered = nframes - rendered;
            if !self.master_params.pause && !self.has_stopped() {
                if !self.cgiters_accessed {
                    // First note read: final inits.
                    self.cgiters_accessed = true;
                    self.init_final();
                }
                to_be_rendered = self.move_forwards(to_be_rendered, false);
            }

            // Don't pad with silence if we stopped during this call.
            if was_playing && self.has_stopped() {
                nframes = rendered + to_be_rendered;
            }

            self.device_states.invalidate_buffers();
            for params in &mut self.thread_params {
                for wb in &mut params.test_outs {
                    wb.invalidate();
                }
            }

            self.process_voices(to_be_rendered);

            if !self.event_buffer.is_skipping() {
                self.voice_group_res.reset();
            }

            self.process_mixed_signals(to_be_rendered);
            self.apply_master_volume(to_be_rendered);
            self.mix_test_voice_signals(to_be_rendered);
            if self.module.dc_blocker_enabled {
                self.apply_dc_blocker(to_be_rendered);
            }
            self.render_interleaved(rendered, to_be_rendered);

            rendered += to_be_rendered;

            // A composition that never advances musical time (e.g. an
            // order of zero-length patterns in infinite mode) must not
            // hang the caller.
            if to_be_rendered == 0 {
                zero_rounds += 1;
                if zero_rounds > 4096 {
                    tracing::warn!("playback makes no progress, stopping");
                    self.master_params.playback_state = PlaybackState::Stopped;
                    break;
                }
            } else {
                zero_rounds = 0;
            }
        }

        self.audio_frames_available = rendered;
        self.audio_frames_processed += rendered as u64;
        self.events_returned = false;
    }

    /// Advances playback without rendering audio.
    pub fn skip(&mut self, nframes: i64) {
        self.event_buffer.clear();
        self.audio_frames_available = 0;

        if self.has_stopped() || self.master_params.pause {
            return;
        }

        let mut nframes = nframes.max(0);
        let mut skipped: i64 = 0;
        let mut zero_rounds = 0u32;
        while skipped < nframes {
            if !self.cgiters_accessed {
                self.cgiters_accessed = true;
                self.init_final();
            }

            let chunk = (nframes - skipped).min(i64::from(i32::MAX)) as usize;
            let advanced = self.move_forwards(chunk, true);

            for ch in &mut self.channels {
                ch.local_events.clear();
            }

            if self.has_stopped() {
                nframes = skipped + advanced as i64;
            }

            self.master_params.volume_slider.skip(advanced as i64);
            skipped += advanced as i64;

            if advanced == 0 {
                if self.has_stopped() {
                    break;
                }
                zero_rounds += 1;
                if zero_rounds > 4096 {
                    tracing::warn!("skip makes no progress, stopping");
                    self.master_params.playback_state = PlaybackState::Stopped;
                    break;
                }
            } else {
                zero_rounds = 0;
            }
        }

        self.audio_frames_processed += skipped.max(0) as u64;
        self.events_returned = false;
        if nframes > 0 {
            self.cgiters_accessed = true;
        }
    }

    /// Fires an event synchronously on a channel. The event description
    /// is the compact form `["name", argument]`.
    pub fn fire(&mut self, ch: usize, event_desc: &str) -> Result<(), PlayerError> {
        if ch >= CHANNELS {
            return Err(PlayerError::BadArgument(format!("channel {ch}")));
        }

        self.flush_receive();
        self.event_buffer.clear();

        let parsed: serde_json::Value = serde_json::from_str(event_desc)
            .map_err(|e| PlayerError::EventParse(e.to_string()))?;
        let parts = parsed
            .as_array()
            .filter(|a| a.len() == 2)
            .ok_or_else(|| PlayerError::EventParse("expected [name, argument]".into()))?;
        let name = parts[0]
            .as_str()
            .ok_or_else(|| PlayerError::EventParse("event name must be a string".into()))?
            .to_string();
        let spec = crate::event_names::lookup(&name)
            .ok_or_else(|| PlayerError::EventParse(format!("unsupported event type: {name}")))?;
        let arg = expr::value_from_json(&parts[1], spec.param)
            .map_err(PlayerError::EventParse)?;

        self.process_event(ch, &name, &arg, true, 0, false, true);
        self.check_perform_goto();

        if self.event_buffer.is_skipping() {
            self.resume = ResumePoint::MidFire { ch, name, arg };
        } else {
            self.event_buffer.reset_add_counter();
        }

        self.events_returned = false;
        Ok(())
    }

    // --- Internals ---

    pub(crate) fn init_final(&mut self) {
        self.master_params.set_starting_tempo(&self.module);
        let tempo = self.master_params.tempo;

        self.device_states.set_tempo(tempo);
        self.reset_channels();
        for ch in &mut self.channels {
            ch.set_tempo(tempo);
        }
        self.master_params.volume_slider.set_tempo(tempo);

        let pos = self.master_params.cur_pos;
        for cgiter in &mut self.cgiters {
            cgiter.reset(&pos);
        }
    }

    pub(crate) fn update_sliders_and_lfos_audio_rate(&mut self) {
        let rate = self.audio_rate;
        for ch in &mut self.channels {
            ch.set_audio_rate(rate);
        }
        self.master_params.volume_slider.set_audio_rate(rate);
        for blocker in &mut self.master_params.dc_blockers {
            blocker.set_audio_rate(rate);
        }
    }

    fn make_batch_ctx(&self, frame_count: usize) -> VoiceBatchCtx {
        VoiceBatchCtx {
            module: Arc::clone(&self.module),
            plans: Arc::clone(&self.voice_plans),
            slots: self.voices.slots(),
            bg_queue: self.voices.bg_queue(),
            muted: Arc::new(self.channels.iter().map(Channel::is_muted).collect()),
            tempo: self.master_params.tempo,
            audio_rate: self.audio_rate,
            frame_count,
        }
    }

    fn process_voices(&mut self, frame_count: usize) {
        if frame_count == 0 {
            self.process_all_local_events();
            return;
        }

        let ctx = self.make_batch_ctx(frame_count);
        self.voices.start_group_iteration();

        let mut stats = RenderStats::default();

        if self.thread_count > 1 && self.workers.is_some() {
            let thread_count = self.thread_count;
            let mut jobs = Vec::with_capacity(thread_count);
            for thread_id in 0..thread_count {
                let mut packages = Vec::new();
                let mut ci = thread_id;
                while ci < CHANNELS {
                    packages.push((
                        ci,
                        ChannelPackage {
                            ch: std::mem::replace(&mut self.channels[ci], Channel::placeholder()),
                            groups: self.voices.take_partition(ci),
                        },
                    ));
                    ci += thread_count;
                }
                jobs.push(WorkerJob {
                    thread_id,
                    packages,
                    dstates: self.device_states.take_thread_states(thread_id),
                    params: std::mem::replace(
                        &mut self.thread_params[thread_id],
                        ThreadParams::placeholder(),
                    ),
                    ctx: ctx.clone(),
                });
            }

            let dones = self
                .workers
                .as_ref()
                .expect("worker pool present")
                .dispatch(jobs);

            for done in dones {
                for (ci, pkg) in done.packages {
                    self.channels[ci] = pkg.ch;
                    self.voices.put_partition(ci, pkg.groups);
                }
                self.device_states.put_thread_states(done.thread_id, done.dstates);
                self.thread_params[done.thread_id] = done.params;
                stats.voice_count += done.stats.voice_count;
                stats.vgroup_count += done.stats.vgroup_count;
            }
        } else {
            let mut params =
                std::mem::replace(&mut self.thread_params[0], ThreadParams::placeholder());
            let mut dstates = self.device_states.take_thread_states(0);

            for ci in 0..CHANNELS {
                let mut pkg = ChannelPackage {
                    ch: std::mem::replace(&mut self.channels[ci], Channel::placeholder()),
                    groups: self.voices.take_partition(ci),
                };
                process_channel_fg(&mut pkg, &ctx, &mut params, &mut dstates, &mut stats);
                self.channels[ci] = pkg.ch;
                self.voices.put_partition(ci, pkg.groups);
            }

            process_claimed_bg(&ctx, &mut params, &mut dstates, &mut stats);

            self.device_states.put_thread_states(0, dstates);
            self.thread_params[0] = params;
        }

        self.voices.finish_group_iteration();

        if self.thread_count > 1 {
            self.device_states.mix_thread_states(frame_count);
        }

        self.voices.clean_up_inactive();

        self.master_params.active_voices =
            self.master_params.active_voices.max(stats.voice_count);
        self.master_params.active_vgroups =
            self.master_params.active_vgroups.max(stats.vgroup_count);
    }

    fn process_all_local_events(&mut self) {
        let ctx = self.make_batch_ctx(0);

        for ci in 0..CHANNELS {
            let mut ch = std::mem::replace(&mut self.channels[ci], Channel::placeholder());
            let mut groups = self.voices.take_partition(ci);

            let events = std::mem::take(&mut ch.local_events);
            for event in events {
                apply_channel_event(&mut ch, &mut groups, &event.kind, 0, &ctx);
            }

            self.channels[ci] = ch;
            self.voices.put_partition(ci, groups);
        }

        self.voices.clean_up_fg_voices();
    }

    fn process_mixed_signals(&mut self, frame_count: usize) {
        if frame_count == 0 {
            return;
        }

        if let Some(plan) = &self.mixed_plan {
            plan.execute_all_tasks(
                &self.module,
                self.device_states.thread_zero_mut(),
                frame_count,
                self.master_params.tempo,
            );
        }

        // Silence any master input that nothing wrote to.
        let master = self.device_states.thread_state_mut(0, 0);
        for wb in &mut master.recv {
            if !wb.is_valid() {
                wb.clear(0, frame_count);
            }
        }
    }

    fn apply_master_volume(&mut self, frame_count: usize) {
        if frame_count == 0 {
            return;
        }

        let both_invalid = {
            let master = self.device_states.thread_state(0, 0);
            !master.recv[0].is_valid() && !master.recv[1].is_valid()
        };
        if both_invalid {
            self.master_params
                .volume_slider
                .skip(frame_count as i64);
            return;
        }

        let mut slider = self.master_params.volume_slider.clone();
        let mut volume = self.master_params.volume;
        let master = self.device_states.thread_state_mut(0, 0);

        for wb in &mut master.recv {
            if !wb.is_valid() {
                continue;
            }
            slider = self.master_params.volume_slider.clone();
            let buf = wb.get_contents_mut();

            if slider.in_progress() {
                for sample in &mut buf[..frame_count] {
                    volume = slider.step();
                    *sample *= volume as f32;
                }
            } else {
                let scale = volume as f32;
                for sample in &mut buf[..frame_count] {
                    *sample *= scale;
                }
            }
        }

        self.master_params.volume = volume;
        self.master_params.volume_slider = slider;
    }

    fn mix_test_voice_signals(&mut self, frame_count: usize) {
        if frame_count == 0 {
            return;
        }
        for index in 0..self.thread_params.len() {
            for port in 0..OUT_CHANNELS {
                let master = self.device_states.thread_state_mut(0, 0);
                master.recv[port].mix(&self.thread_params[index].test_outs[port], 0, frame_count);
            }
        }
    }

    fn apply_dc_blocker(&mut self, frame_count: usize) {
        if frame_count == 0 {
            return;
        }
        let master = self.device_states.thread_state_mut(0, 0);
        for (port, wb) in master.recv.iter_mut().enumerate() {
            let buf = wb.get_contents_mut();
            self.master_params.dc_blockers[port].process(&mut buf[..frame_count]);
        }
    }

    fn render_interleaved(&mut self, rendered: usize, frame_count: usize) {
        if frame_count == 0 {
            return;
        }
        let mix_vol = self.module.mix_volume as f32;
        let master = self.device_states.thread_state(0, 0);
        let left = master.recv[0].get_contents();
        let right = master.recv[1].get_contents();

        let out = &mut self.audio_buffer
            [rendered * OUT_CHANNELS..(rendered + frame_count) * OUT_CHANNELS];
        for i in 0..frame_count {
            out[i * 2] = left[i] * mix_vol;
            out[i * 2 + 1] = right[i] * mix_vol;
        }
    }

    /// The current foreground force of a channel in dB, or NaN without
    /// foreground voices.
    pub(crate) fn channel_fg_force(&self, ch: usize) -> f64 {
        let group_id = self.channels[ch].fg_group_id;
        if group_id == 0 {
            return f64::NAN;
        }
        self.voices
            .get_fg_group(ch, group_id)
            .and_then(|g| g.voices.first())
            .map_or(f64::NAN, |v| v.common.force.force)
    }

    pub(crate) fn update_receive(&mut self) -> bool {
        let mut new_events_found = false;

        self.event_buffer.clear();

        if self.event_buffer.is_skipping() {
            new_events_found = true;
            self.voice_group_res.begin_resume();

            match self.resume.clone() {
                ResumePoint::MidFire { ch, name, arg } => {
                    self.process_event(ch, &name, &arg, true, 0, false, false);
                    self.check_perform_goto();
                }
                _ => {
                    if self.has_stopped() {
                        self.event_buffer.cancel_skipping();
                    } else {
                        self.move_forwards(0, false);
                    }
                }
            }

            if self.event_buffer.is_skipping() {
                return new_events_found;
            }
            self.resume = ResumePoint::None;
            self.event_buffer.reset_add_counter();
        }

        if (self.master_params.cur_ch > 0 || self.master_params.cur_trigger > 0)
            && !self.has_stopped()
        {
            new_events_found = true;

            let old_ch = self.master_params.cur_ch;
            let old_trigger = self.master_params.cur_trigger;

            // Process the remainder of the current row.
            self.move_forwards(0, false);

            if old_ch == self.master_params.cur_ch
                && old_trigger == self.master_params.cur_trigger
                && !self.event_buffer.is_skipping()
            {
                new_events_found = false;
            }
        }

        new_events_found
    }

    pub(crate) fn flush_receive(&mut self) {
        while self.update_receive() {}
    }
}
