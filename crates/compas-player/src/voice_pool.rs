//! The voice pool.
//!
//! A fixed budget of voice slots partitioned by owning channel: every
//! live voice group sits in its channel's partition, so the thread that
//! owns a channel during a render call owns its foreground groups too.
//! Background groups (groups whose channel has moved on) are drained into
//! a shared claim queue at the start of each render call and handed out
//! one at a time; in threaded mode the claim is the only cross-thread
//! contention point.
//!
//! Slot accounting is atomic so note-on dispatch on worker threads can
//! allocate without further coordination; when no slots remain the
//! allocation fails and the triggering event proceeds without audio
//! effect.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use compas_core::limits::{CHANNELS, VOICE_STATE_SIZE_MAX, VOICE_WORK_BUFFER_SIZE_MAX};

use crate::error::PlayerError;
use crate::voice::Voice;

/// A transient set of voices sharing one group id.
#[derive(Debug)]
pub struct VoiceGroup {
    /// Group identity.
    pub group_id: u64,
    /// Owning channel.
    pub ch_num: usize,
    /// Audio unit the group plays.
    pub au_index: usize,
    /// True once the owning channel has moved on to a newer group.
    pub bg: bool,
    /// True if the group entered the background during the current block.
    pub bg_fresh: bool,
    /// First frame of the block still to be rendered for this group.
    pub frame_offset: usize,
    /// Fired from outside the composition (exempt from muting).
    pub external: bool,
    /// Route output to the per-thread test buffers instead of mixing.
    pub use_test_output: bool,
    /// Member voices, one per voice processor of the audio unit.
    pub voices: Vec<Voice>,
}

impl VoiceGroup {
    /// Number of voices still active.
    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    /// True if every voice has deactivated.
    pub fn is_inactive(&self) -> bool {
        self.voices.iter().all(|v| !v.active)
    }

    /// Deactivates every voice.
    pub fn deactivate_all(&mut self) {
        for voice in &mut self.voices {
            voice.deactivate();
        }
    }

    /// Marks every voice released.
    pub fn release_all(&mut self) {
        for voice in &mut self.voices {
            voice.common.released = true;
        }
    }
}

/// Atomic voice slot budget shared with worker threads.
#[derive(Debug)]
pub struct SlotBudget {
    in_use: AtomicUsize,
    capacity: usize,
}

impl SlotBudget {
    fn new(capacity: usize) -> Self {
        Self {
            in_use: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Tries to claim `count` slots.
    pub fn try_alloc(&self, count: usize) -> bool {
        let claimed = self.in_use.fetch_add(count, Ordering::AcqRel);
        if claimed + count > self.capacity {
            self.in_use.fetch_sub(count, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Returns `count` slots to the budget.
    pub fn release(&self, count: usize) {
        self.in_use.fetch_sub(count, Ordering::AcqRel);
    }

    /// Slots currently claimed.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }
}

/// Shared background-group claim queue.
#[derive(Debug, Default)]
pub struct BgQueue {
    pending: Mutex<VecDeque<VoiceGroup>>,
    done: Mutex<Vec<VoiceGroup>>,
}

impl BgQueue {
    /// Atomically claims the next unclaimed background group.
    pub fn claim(&self) -> Option<VoiceGroup> {
        self.pending.lock().expect("bg queue poisoned").pop_front()
    }

    /// Returns a processed group.
    pub fn complete(&self, group: VoiceGroup) {
        self.done.lock().expect("bg queue poisoned").push(group);
    }
}

/// Host-side voice group id reservations.
///
/// Group ids are drawn on the host thread, in program order of the
/// triggering events, and the queued note-on carries its id to the
/// render stage. When event-buffer overflow forces the same event to be
/// re-processed, the replay consumes the same ids in the same order, so
/// a resumed render call allocates the groups the first pass reserved.
#[derive(Debug)]
pub struct VoiceGroupReservations {
    lanes: Vec<ReservationLane>,
}

#[derive(Debug, Default)]
struct ReservationLane {
    ids: Vec<u64>,
    next: usize,
}

impl VoiceGroupReservations {
    /// Creates empty reservations.
    pub fn new() -> Self {
        Self {
            lanes: (0..CHANNELS).map(|_| ReservationLane::default()).collect(),
        }
    }

    /// Returns the next reserved id for `ch`, drawing a fresh one from
    /// `draw` only when the replay cursor has consumed every earlier
    /// reservation.
    pub fn reserve_or_reuse(&mut self, ch: usize, draw: impl FnOnce() -> u64) -> u64 {
        let lane = &mut self.lanes[ch];
        if lane.next < lane.ids.len() {
            let id = lane.ids[lane.next];
            lane.next += 1;
            return id;
        }
        let id = draw();
        lane.ids.push(id);
        lane.next = lane.ids.len();
        id
    }

    /// Forgets all reservations (after a fully processed block).
    pub fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.ids.clear();
            lane.next = 0;
        }
    }

    /// Rewinds the replay cursors before re-processing a suspended event.
    pub fn begin_resume(&mut self) {
        for lane in &mut self.lanes {
            lane.next = 0;
        }
    }
}

impl Default for VoiceGroupReservations {
    fn default() -> Self {
        Self::new()
    }
}

/// The pool of voice slots.
#[derive(Debug)]
pub struct VoicePool {
    slots: Arc<SlotBudget>,
    state_size: usize,
    work_buffer_size: usize,
    partitions: Vec<Vec<VoiceGroup>>,
    bg_queue: Arc<BgQueue>,
}

impl VoicePool {
    /// Creates a pool with the given voice slot budget.
    pub fn new(voice_count: usize) -> Self {
        Self {
            slots: Arc::new(SlotBudget::new(voice_count)),
            state_size: 0,
            work_buffer_size: 0,
            partitions: (0..CHANNELS).map(|_| Vec::new()).collect(),
            bg_queue: Arc::new(BgQueue::default()),
        }
    }

    /// Reserves per-voice DSP state size; only grows.
    pub fn reserve_state_space(&mut self, size: usize) -> Result<(), PlayerError> {
        if size > VOICE_STATE_SIZE_MAX {
            return Err(PlayerError::ReservationTooLarge {
                what: "voice state space",
                size,
                limit: VOICE_STATE_SIZE_MAX,
            });
        }
        self.state_size = self.state_size.max(size);
        Ok(())
    }

    /// Reserves per-voice work buffer size in frames; only grows.
    pub fn reserve_work_buffers(&mut self, size: usize) -> Result<(), PlayerError> {
        if size > VOICE_WORK_BUFFER_SIZE_MAX {
            return Err(PlayerError::ReservationTooLarge {
                what: "voice work buffer space",
                size,
                limit: VOICE_WORK_BUFFER_SIZE_MAX,
            });
        }
        self.work_buffer_size = self.work_buffer_size.max(size);
        Ok(())
    }

    /// Reserved per-voice state size.
    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Reserved voice work buffer size in frames.
    pub fn work_buffer_size(&self) -> usize {
        self.work_buffer_size
    }

    /// The shared slot budget handle.
    pub fn slots(&self) -> Arc<SlotBudget> {
        Arc::clone(&self.slots)
    }

    /// The shared background claim queue handle.
    pub fn bg_queue(&self) -> Arc<BgQueue> {
        Arc::clone(&self.bg_queue)
    }

    /// Drops every voice and returns all slots.
    pub fn reset(&mut self) {
        for partition in &mut self.partitions {
            for group in partition.drain(..) {
                self.slots.release(group.voices.len());
            }
        }
        let mut pending = self.bg_queue.pending.lock().expect("bg queue poisoned");
        for group in pending.drain(..) {
            self.slots.release(group.voices.len());
        }
        drop(pending);
        let mut done = self.bg_queue.done.lock().expect("bg queue poisoned");
        for group in done.drain(..) {
            self.slots.release(group.voices.len());
        }
    }

    /// Moves a channel's partition out for processing.
    pub fn take_partition(&mut self, ch: usize) -> Vec<VoiceGroup> {
        std::mem::take(&mut self.partitions[ch])
    }

    /// Returns a channel's partition after processing.
    pub fn put_partition(&mut self, ch: usize, partition: Vec<VoiceGroup>) {
        debug_assert!(self.partitions[ch].is_empty());
        self.partitions[ch] = partition;
    }

    /// Looks up a foreground group in a channel's partition.
    pub fn get_fg_group(&self, ch: usize, group_id: u64) -> Option<&VoiceGroup> {
        self.partitions[ch]
            .iter()
            .find(|g| !g.bg && g.group_id == group_id)
    }

    /// Begins a render call's group iteration: stale background groups
    /// move into the shared claim queue.
    pub fn start_group_iteration(&mut self) {
        let mut pending = self.bg_queue.pending.lock().expect("bg queue poisoned");
        debug_assert!(pending.is_empty());
        for partition in &mut self.partitions {
            let mut i = 0;
            while i < partition.len() {
                if partition[i].bg && !partition[i].bg_fresh {
                    pending.push_back(partition.remove(i));
                } else {
                    i += 1;
                }
            }
        }
    }

    /// Claims the next unclaimed background group (single-thread path
    /// uses the same queue as the synced variant).
    pub fn get_next_bg_group(&self) -> Option<VoiceGroup> {
        self.bg_queue.claim()
    }

    /// Finishes the render call's group iteration: claimed groups return
    /// to their partitions.
    pub fn finish_group_iteration(&mut self) {
        let mut done = self.bg_queue.done.lock().expect("bg queue poisoned");
        let groups: Vec<VoiceGroup> = done.drain(..).collect();
        drop(done);
        for group in groups {
            self.partitions[group.ch_num].push(group);
        }
    }

    /// Releases groups whose voices have all deactivated.
    pub fn clean_up_inactive(&mut self) {
        for partition in &mut self.partitions {
            let mut i = 0;
            while i < partition.len() {
                if partition[i].is_inactive() {
                    let group = partition.remove(i);
                    self.slots.release(group.voices.len());
                } else {
                    i += 1;
                }
            }
        }
    }

    /// Releases foreground groups whose voices have deactivated.
    pub fn clean_up_fg_voices(&mut self) {
        for partition in &mut self.partitions {
            let mut i = 0;
            while i < partition.len() {
                if !partition[i].bg && partition[i].is_inactive() {
                    let group = partition.remove(i);
                    self.slots.release(group.voices.len());
                } else {
                    i += 1;
                }
            }
        }
    }

    /// Counts live voices across all partitions.
    pub fn live_voice_count(&self) -> usize {
        self.slots.in_use()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compas_core::controls::{ForceControls, PitchControls};
    use compas_module::processor::{EmptyVoiceState, VoiceCommonState};

    fn test_group(ch: usize, group_id: u64, voices: usize) -> VoiceGroup {
        VoiceGroup {
            group_id,
            ch_num: ch,
            au_index: 0,
            bg: false,
            bg_fresh: false,
            frame_offset: 0,
            external: false,
            use_test_output: false,
            voices: (0..voices)
                .map(|i| Voice {
                    group_id,
                    ch_num: ch,
                    au_index: 0,
                    proc_index: i,
                    active: true,
                    common: VoiceCommonState::new(
                        ForceControls::new(0.0),
                        PitchControls::new(0.0),
                        48000,
                    ),
                    state: Box::new(EmptyVoiceState),
                })
                .collect(),
        }
    }

    #[test]
    fn test_slot_budget() {
        let budget = SlotBudget::new(4);
        assert!(budget.try_alloc(3));
        assert!(!budget.try_alloc(2));
        assert!(budget.try_alloc(1));
        budget.release(4);
        assert_eq!(budget.in_use(), 0);
    }

    #[test]
    fn test_bg_iteration_visits_each_group_once() {
        let mut pool = VoicePool::new(16);

        let mut g1 = test_group(0, 1, 2);
        g1.bg = true;
        let mut g2 = test_group(3, 2, 2);
        g2.bg = true;
        let g3 = test_group(0, 3, 2);

        pool.slots.try_alloc(6);
        let mut part0 = pool.take_partition(0);
        part0.push(g1);
        part0.push(g3);
        pool.put_partition(0, part0);
        let mut part3 = pool.take_partition(3);
        part3.push(g2);
        pool.put_partition(3, part3);

        pool.start_group_iteration();

        let mut seen = Vec::new();
        while let Some(group) = pool.get_next_bg_group() {
            seen.push(group.group_id);
            pool.bg_queue.complete(group);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&1));
        assert!(seen.contains(&2));

        pool.finish_group_iteration();
        // Foreground group untouched, background groups back home.
        assert_eq!(pool.partitions[0].len(), 2);
        assert_eq!(pool.partitions[3].len(), 1);
    }

    #[test]
    fn test_reservations_replay_in_order() {
        let mut res = VoiceGroupReservations::new();
        let mut counter = 0u64;
        let mut draw = || {
            counter += 1;
            counter
        };

        assert_eq!(res.reserve_or_reuse(0, &mut draw), 1);
        assert_eq!(res.reserve_or_reuse(0, &mut draw), 2);
        assert_eq!(res.reserve_or_reuse(5, &mut draw), 3);

        // A replay of the same events consumes the same ids.
        res.begin_resume();
        assert_eq!(res.reserve_or_reuse(0, &mut draw), 1);
        assert_eq!(res.reserve_or_reuse(0, &mut draw), 2);
        assert_eq!(res.reserve_or_reuse(5, &mut draw), 3);
        // New events past the replayed prefix draw fresh ids.
        assert_eq!(res.reserve_or_reuse(0, &mut draw), 4);

        res.reset();
        assert_eq!(res.reserve_or_reuse(0, &mut draw), 5);
    }

    #[test]
    fn test_clean_up_releases_slots() {
        let mut pool = VoicePool::new(8);
        pool.slots.try_alloc(3);
        let mut group = test_group(1, 1, 3);
        group.deactivate_all();
        let mut part = pool.take_partition(1);
        part.push(group);
        pool.put_partition(1, part);

        pool.clean_up_inactive();
        assert_eq!(pool.live_voice_count(), 0);
        assert!(pool.partitions[1].is_empty());
    }
}
