//! Voice processing over one render block.
//!
//! The same code drives both the single-threaded path and the worker
//! threads: a channel is processed against an owned package (the channel
//! state plus its voice pool partition), the block is subdivided at the
//! channel's queued events, and carried controls advance by exactly each
//! sub-slice's frame count before the next event applies. Background
//! groups are claimed one at a time from the shared queue.

use std::collections::HashMap;
use std::sync::Arc;

use compas_core::limits::OUT_CHANNELS;
use compas_core::work_buffer::{WorkBuffer, WorkBuffers};

use compas_module::processor::VoiceCommonState;
use compas_module::Module;

use crate::channel::{Channel, ChannelEvent, ChannelEventKind};
use crate::device_states::DeviceThreadState;
use crate::voice::Voice;
use crate::voice_pool::{BgQueue, SlotBudget, VoiceGroup};
use crate::voice_signal_plan::VoiceSignalPlan;

/// Per-thread rendering resources.
#[derive(Debug)]
pub struct ThreadParams {
    /// Thread id (0 is the host thread).
    pub thread_id: usize,
    /// Voice scratch buffers.
    pub work_buffers: WorkBuffers,
    /// Per-thread test voice output accumulators.
    pub test_outs: Vec<WorkBuffer>,
}

impl ThreadParams {
    /// Creates thread resources.
    pub fn new(thread_id: usize, wb_count: usize, buffer_size: usize) -> Self {
        Self {
            thread_id,
            work_buffers: WorkBuffers::new(wb_count, buffer_size),
            test_outs: (0..OUT_CHANNELS)
                .map(|_| WorkBuffer::new(buffer_size))
                .collect(),
        }
    }

    /// An empty stand-in used while the real resources are on a worker.
    pub fn placeholder() -> Self {
        Self::new(usize::MAX, 0, 0)
    }

    /// Re-sizes all buffers for a new audio buffer size.
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.work_buffers.resize_all(buffer_size);
        for wb in &mut self.test_outs {
            wb.resize(buffer_size);
        }
    }
}

/// Running per-call voice statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderStats {
    /// Voices still active after processing.
    pub voice_count: usize,
    /// Groups with at least one active voice.
    pub vgroup_count: usize,
}

/// Shared, read-mostly context for one voice processing pass.
#[derive(Debug, Clone)]
pub struct VoiceBatchCtx {
    /// The module being played.
    pub module: Arc<Module>,
    /// Voice signal plans keyed by audio unit index.
    pub plans: Arc<HashMap<usize, VoiceSignalPlan>>,
    /// Voice slot budget.
    pub slots: Arc<SlotBudget>,
    /// Background group claim queue.
    pub bg_queue: Arc<BgQueue>,
    /// Channel mute snapshot.
    pub muted: Arc<Vec<bool>>,
    /// Current tempo.
    pub tempo: f64,
    /// Audio rate.
    pub audio_rate: i32,
    /// Whole block size in frames.
    pub frame_count: usize,
}

/// One channel's owned state during a render pass.
#[derive(Debug)]
pub struct ChannelPackage {
    /// The channel.
    pub ch: Channel,
    /// The channel's voice pool partition.
    pub groups: Vec<VoiceGroup>,
}

/// Processes one channel's foreground voices over the block, dispatching
/// its queued events at their frame offsets, then renders the groups
/// that entered the background during this block.
pub fn process_channel_fg(
    pkg: &mut ChannelPackage,
    ctx: &VoiceBatchCtx,
    params: &mut ThreadParams,
    dstates: &mut [DeviceThreadState],
    stats: &mut RenderStats,
) {
    let frame_count = ctx.frame_count;
    let events: Vec<ChannelEvent> = std::mem::take(&mut pkg.ch.local_events);

    let mut event_index = 0;
    let mut slice_start = 0;

    while slice_start < frame_count {
        let mut slice_stop = frame_count;

        let event = if event_index < events.len() {
            let event = &events[event_index];
            slice_stop = event.frame_offset.min(frame_count).max(slice_start);
            event_index += 1;
            Some(event)
        } else {
            None
        };

        if slice_start < slice_stop {
            let sub_frames = slice_stop - slice_start;

            if pkg.ch.fg_group_id != 0 {
                let fg_id = pkg.ch.fg_group_id;
                if let Some(pos) = pkg.groups.iter().position(|g| !g.bg && g.group_id == fg_id)
                {
                    process_voice_group_slice(
                        &mut pkg.groups[pos],
                        pkg.ch.is_muted(),
                        ctx,
                        params,
                        dstates,
                        stats,
                        sub_frames,
                        slice_start,
                    );
                }
            }

            // Carried controls advance by exactly this sub-slice.
            pkg.ch.force.skip(sub_frames as i64);
            pkg.ch.pitch.skip(sub_frames as i64);
        }

        if let Some(event) = event {
            pkg.ch.frame_offset_temp = event.frame_offset;
            apply_channel_event(&mut pkg.ch, &mut pkg.groups, &event.kind, event.frame_offset, ctx);
            pkg.ch.frame_offset_temp = 0;
        }

        slice_start = slice_stop;
    }

    // Events at the very end of the block run after the last sub-slice.
    for event in &events[event_index..] {
        apply_channel_event(&mut pkg.ch, &mut pkg.groups, &event.kind, frame_count, ctx);
    }

    // Groups replaced during this block render their remainder as
    // background.
    for group in &mut pkg.groups {
        if group.bg && group.bg_fresh {
            let offset = group.frame_offset.min(frame_count);
            let sub_frames = frame_count - offset;
            if sub_frames > 0 {
                process_voice_group_slice(
                    group,
                    ctx.muted[group.ch_num],
                    ctx,
                    params,
                    dstates,
                    stats,
                    sub_frames,
                    offset,
                );
            }
            group.bg_fresh = false;
            group.frame_offset = 0;
        }
    }
}

/// Claims and renders background groups until the shared queue is dry.
pub fn process_claimed_bg(
    ctx: &VoiceBatchCtx,
    params: &mut ThreadParams,
    dstates: &mut [DeviceThreadState],
    stats: &mut RenderStats,
) {
    while let Some(mut group) = ctx.bg_queue.claim() {
        let offset = group.frame_offset.min(ctx.frame_count);
        let sub_frames = ctx.frame_count - offset;
        if sub_frames > 0 {
            let muted = ctx.muted[group.ch_num];
            process_voice_group_slice(
                &mut group,
                muted,
                ctx,
                params,
                dstates,
                stats,
                sub_frames,
                offset,
            );
        }
        group.frame_offset = 0;
        ctx.bg_queue.complete(group);
    }
}

/// Renders one voice group for one sub-slice of the block.
#[allow(clippy::too_many_arguments)]
fn process_voice_group_slice(
    group: &mut VoiceGroup,
    ch_muted: bool,
    ctx: &VoiceBatchCtx,
    params: &mut ThreadParams,
    dstates: &mut [DeviceThreadState],
    stats: &mut RenderStats,
    frame_count: usize,
    frame_offset: usize,
) {
    let au_index = group.au_index;
    let (Some(au), Some(plan)) = (ctx.module.audio_unit(au_index), ctx.plans.get(&au_index))
    else {
        group.deactivate_all();
        return;
    };

    let is_muted = !group.external && ch_muted;
    let use_test_output = group.use_test_output;
    let enable_mixing = !is_muted && !use_test_output;

    let device = au_index + 1;
    let state = &mut dstates[device];

    let process_stop = plan.execute(
        au,
        group,
        &mut params.work_buffers,
        &mut state.send,
        frame_count,
        frame_offset,
        ctx.frame_count,
        ctx.tempo,
        ctx.audio_rate,
        enable_mixing,
    );

    if process_stop < frame_offset + frame_count {
        group.deactivate_all();
    }

    let active = group.active_voice_count();
    stats.voice_count += active;
    if active > 0 {
        stats.vgroup_count += 1;
    }

    if use_test_output {
        let sources = plan.output_sources();
        let fallback = sources[0];
        let ThreadParams {
            work_buffers,
            test_outs,
            ..
        } = params;
        for (port, out) in test_outs.iter_mut().enumerate() {
            let src = sources.get(port).copied().flatten().or(fallback);
            if let Some(src) = src {
                out.mix(work_buffers.get(src), frame_offset, process_stop);
            }
        }
    }
}

/// Applies one queued channel event at its dispatch point.
pub fn apply_channel_event(
    ch: &mut Channel,
    groups: &mut Vec<VoiceGroup>,
    kind: &ChannelEventKind,
    frame_offset: usize,
    ctx: &VoiceBatchCtx,
) {
    match kind {
        ChannelEventKind::NoteOn {
            group_id,
            cents,
            external,
        } => {
            // The previous foreground group keeps ringing in the
            // background from this frame on.
            if ch.fg_group_id != 0 {
                let fg_id = ch.fg_group_id;
                if let Some(group) = groups.iter_mut().find(|g| !g.bg && g.group_id == fg_id) {
                    group.bg = true;
                    group.bg_fresh = true;
                    group.frame_offset = frame_offset;
                    group.release_all();
                }
            }

            ch.pitch.pitch = *cents;
            ch.pitch.slider.set_value(*cents);

            let au_index = ch.audio_unit;
            let au = if au_index >= 0 {
                ctx.module.audio_unit(au_index as usize)
            } else {
                None
            };
            let Some(au) = au else {
                tracing::warn!(channel = ch.index, au_index, "note on without audio unit");
                ch.fg_group_id = 0;
                return;
            };

            let proc_indices = au.voice_proc_indices();
            if proc_indices.is_empty() || !ctx.slots.try_alloc(proc_indices.len()) {
                tracing::warn!(channel = ch.index, "voice allocation failed");
                ch.fg_group_id = 0;
                return;
            }

            let voices: Vec<Voice> = proc_indices
                .iter()
                .map(|&proc_index| {
                    let mut pitch = ch.pitch.clone();
                    pitch.pitch = *cents;
                    Voice {
                        group_id: *group_id,
                        ch_num: ch.index,
                        au_index: au_index as usize,
                        proc_index,
                        active: true,
                        common: VoiceCommonState::new(
                            ch.force.clone(),
                            pitch,
                            ctx.audio_rate,
                        ),
                        state: au.procs[proc_index].new_voice_state(),
                    }
                })
                .collect();

            groups.push(VoiceGroup {
                group_id: *group_id,
                ch_num: ch.index,
                au_index: au_index as usize,
                bg: false,
                bg_fresh: false,
                frame_offset,
                external: *external,
                use_test_output: ch.use_test_output,
                voices,
            });
            ch.fg_group_id = *group_id;
        }

        ChannelEventKind::NoteOff => {
            if ch.fg_group_id != 0 {
                let fg_id = ch.fg_group_id;
                if let Some(group) = groups.iter_mut().find(|g| !g.bg && g.group_id == fg_id) {
                    group.release_all();
                }
            }
        }

        ChannelEventKind::SetForce(db) => {
            ch.force.force = *db;
            ch.force.slider.set_value(*db);
            for_fg_voices(ch, groups, |common| {
                common.force.force = *db;
                common.force.slider.set_value(*db);
            });
        }

        ChannelEventKind::SlideForce(target) => {
            ch.force.slide_to(*target);
            for_fg_voices(ch, groups, |common| common.force.slide_to(*target));
        }

        ChannelEventKind::SlideForceLength(length) => {
            ch.force.set_slide_length(*length);
            for_fg_voices(ch, groups, |common| common.force.set_slide_length(*length));
        }

        ChannelEventKind::TremoloSpeed(speed) => {
            ch.force.tremolo.set_speed(*speed);
            for_fg_voices(ch, groups, |common| common.force.tremolo.set_speed(*speed));
        }

        ChannelEventKind::TremoloDepth(depth) => {
            ch.force.tremolo.set_depth(*depth);
            for_fg_voices(ch, groups, |common| common.force.tremolo.set_depth(*depth));
        }

        ChannelEventKind::SlidePitch(target) => {
            ch.pitch.slide_to(*target);
            for_fg_voices(ch, groups, |common| common.pitch.slide_to(*target));
        }

        ChannelEventKind::SlidePitchLength(length) => {
            ch.pitch.set_slide_length(*length);
            for_fg_voices(ch, groups, |common| common.pitch.set_slide_length(*length));
        }

        ChannelEventKind::VibratoSpeed(speed) => {
            ch.pitch.vibrato.set_speed(*speed);
            for_fg_voices(ch, groups, |common| common.pitch.vibrato.set_speed(*speed));
        }

        ChannelEventKind::VibratoDepth(depth) => {
            ch.pitch.vibrato.set_depth(*depth);
            for_fg_voices(ch, groups, |common| common.pitch.vibrato.set_depth(*depth));
        }

        ChannelEventKind::SetAu(index) => {
            ch.audio_unit = *index;
        }
    }
}

fn for_fg_voices(
    ch: &Channel,
    groups: &mut [VoiceGroup],
    mut apply: impl FnMut(&mut VoiceCommonState),
) {
    if ch.fg_group_id == 0 {
        return;
    }
    if let Some(group) = groups
        .iter_mut()
        .find(|g| !g.bg && g.group_id == ch.fg_group_id)
    {
        for voice in &mut group.voices {
            apply(&mut voice.common);
        }
    }
}
