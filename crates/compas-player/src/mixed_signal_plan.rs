//! The mixed signal plan.
//!
//! A layered topological sort of the module-level routing graph. Level 0
//! is the master output; higher levels are upstream. Execution walks the
//! levels from the highest down to 0; within a level, tasks are handed
//! out through a per-level cursor so a future multi-threaded executor can
//! steal them, though execution is single-threaded today.
//!
//! A task mixes its device's incoming edges (upstream send buffers into
//! the device's receive buffers) and, for effect units, runs the mixed
//! processors. Instrument send buffers already hold the voice mix when
//! the plan runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use compas_module::{AuType, DeviceNode, Module};

use crate::device_states::DeviceThreadState;
use crate::error::PlayerError;

/// Device table index: 0 is the master, audio unit `i` is `i + 1`.
pub fn device_id(node: DeviceNode) -> usize {
    match node {
        DeviceNode::Master => 0,
        DeviceNode::Au(i) => i + 1,
    }
}

#[derive(Debug)]
struct MixedTask {
    device: usize,
    /// `(source device, source port, destination port)`
    in_edges: Vec<(usize, usize, usize)>,
    /// Set for effect units whose mixed processors must run.
    effect_au: Option<usize>,
}

/// Compiled mixed-signal execution plan.
#[derive(Debug)]
pub struct MixedSignalPlan {
    /// `levels[l]` holds the tasks of layer `l`; 0 is the master.
    levels: Vec<Vec<MixedTask>>,
    cursors: Vec<AtomicUsize>,
}

impl MixedSignalPlan {
    /// Builds the plan from the module-level graph.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::GraphCycle`] if the routing graph has a
    /// true cycle.
    pub fn build(module: &Module) -> Result<Self, PlayerError> {
        let device_count = module.audio_units.len() + 1;

        // Longest-path level from the master, by relaxation. With a true
        // cycle the levels keep growing past the device count.
        let mut level = vec![0usize; device_count];
        let mut changed = true;
        let mut rounds = 0;
        while changed {
            changed = false;
            rounds += 1;
            if rounds > device_count + 1 {
                return Err(PlayerError::GraphCycle {
                    context: "module routing".into(),
                });
            }
            for edge in &module.connections.edges {
                let src = device_id(edge.src);
                let dst = device_id(edge.dst);
                if level[src] < level[dst] + 1 {
                    level[src] = level[dst] + 1;
                    changed = true;
                }
            }
        }

        let max_level = level.iter().copied().max().unwrap_or(0);
        let mut levels: Vec<Vec<MixedTask>> = (0..=max_level).map(|_| Vec::new()).collect();

        for device in 0..device_count {
            let in_edges: Vec<(usize, usize, usize)> = module
                .connections
                .edges
                .iter()
                .filter(|e| device_id(e.dst) == device)
                .map(|e| (device_id(e.src), e.src_port, e.dst_port))
                .collect();

            let effect_au = if device > 0 {
                match module.audio_unit(device - 1) {
                    Some(au) if au.au_type == AuType::Effect => Some(device - 1),
                    _ => None,
                }
            } else {
                None
            };

            if in_edges.is_empty() && effect_au.is_none() {
                continue;
            }

            levels[level[device]].push(MixedTask {
                device,
                in_edges,
                effect_au,
            });
        }

        let cursors = (0..levels.len()).map(|_| AtomicUsize::new(0)).collect();
        Ok(Self { levels, cursors })
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Resets the per-level task cursors.
    pub fn reset(&self) {
        for cursor in &self.cursors {
            cursor.store(0, Ordering::Release);
        }
    }

    /// Executes the next unclaimed task of `level`. Returns false when
    /// the level is exhausted.
    pub fn execute_next_task(
        &self,
        level: usize,
        module: &Module,
        states: &mut [DeviceThreadState],
        frame_count: usize,
        tempo: f64,
    ) -> bool {
        let index = self.cursors[level].fetch_add(1, Ordering::AcqRel);
        let Some(task) = self.levels[level].get(index) else {
            return false;
        };
        run_task(task, module, states, frame_count, tempo);
        true
    }

    /// Executes every task, upstream levels first.
    pub fn execute_all_tasks(
        &self,
        module: &Module,
        states: &mut [DeviceThreadState],
        frame_count: usize,
        tempo: f64,
    ) {
        self.reset();
        for level in (0..self.levels.len()).rev() {
            while self.execute_next_task(level, module, states, frame_count, tempo) {}
        }
        self.reset();
    }
}

fn run_task(
    task: &MixedTask,
    module: &Module,
    states: &mut [DeviceThreadState],
    frame_count: usize,
    tempo: f64,
) {
    for &(src_dev, src_port, dst_port) in &task.in_edges {
        if src_dev == task.device {
            continue;
        }
        let (src, dst) = pair_mut(states, src_dev, task.device);
        if let (Some(src_wb), Some(dst_wb)) = (src.send.get(src_port), dst.recv.get_mut(dst_port))
        {
            dst_wb.mix(src_wb, 0, frame_count);
        }
    }

    if let Some(au_index) = task.effect_au {
        if let Some(au) = module.audio_unit(au_index) {
            let state = &mut states[task.device];
            let DeviceThreadState { recv, send } = state;
            for proc in &au.procs {
                if proc.supports_mixed() {
                    proc.render_mixed(recv, send, frame_count, tempo);
                }
            }
        }
    }
}

fn pair_mut(
    states: &mut [DeviceThreadState],
    a: usize,
    b: usize,
) -> (&mut DeviceThreadState, &mut DeviceThreadState) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = states.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = states.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
