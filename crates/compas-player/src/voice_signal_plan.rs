//! Voice signal plans.
//!
//! A per-instrument, topologically ordered execution plan over the
//! instrument's internal connection graph. Each processor's send ports
//! get dedicated scratch buffer indices; receive ports read the buffer of
//! the connected send port. Executing the plan renders every voice of one
//! group for a sub-slice and mixes the terminal processors' output into
//! the audio unit's per-thread send buffers.

use compas_core::limits::OUT_CHANNELS;
use compas_core::work_buffer::{WorkBuffer, WorkBuffers};

use compas_module::processor::VoiceRenderCtx;
use compas_module::{AudioUnit, ProcNode};

use crate::error::PlayerError;
use crate::voice_pool::VoiceGroup;

#[derive(Debug)]
struct PlanNode {
    proc_index: usize,
    in_bufs: Vec<Option<usize>>,
    out_bufs: Vec<usize>,
    terminal: bool,
}

/// Compiled voice execution plan for one instrument.
#[derive(Debug)]
pub struct VoiceSignalPlan {
    /// The audio unit this plan renders.
    pub au_index: usize,
    nodes: Vec<PlanNode>,
    output_srcs: [Option<usize>; OUT_CHANNELS],
    wb_count: usize,
}

impl VoiceSignalPlan {
    /// Builds a plan from an instrument's internal connection graph.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::GraphCycle`] if the processor graph has a
    /// true cycle.
    pub fn build(au_index: usize, au: &AudioUnit) -> Result<Self, PlayerError> {
        let voice_procs = au.voice_proc_indices();
        let proc_count = au.procs.len();

        // Kahn's algorithm over processor-to-processor edges.
        let mut indegree = vec![0usize; proc_count];
        for edge in &au.connections.edges {
            if let (ProcNode::Proc(_), ProcNode::Proc(dst)) = (edge.src, edge.dst) {
                indegree[dst] += 1;
            }
        }

        let mut ready: Vec<usize> = voice_procs
            .iter()
            .copied()
            .filter(|&i| indegree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(voice_procs.len());
        while let Some(proc_index) = ready.pop() {
            order.push(proc_index);
            for edge in &au.connections.edges {
                if let (ProcNode::Proc(src), ProcNode::Proc(dst)) = (edge.src, edge.dst) {
                    if src == proc_index {
                        indegree[dst] -= 1;
                        if indegree[dst] == 0 && voice_procs.contains(&dst) {
                            ready.push(dst);
                        }
                    }
                }
            }
        }
        if order.len() != voice_procs.len() {
            return Err(PlayerError::GraphCycle {
                context: format!("audio unit {au_index} ({})", au.name),
            });
        }

        // Dedicated scratch buffer per send port.
        let mut send_base = vec![0usize; proc_count];
        let mut wb_count = 0;
        for &proc_index in &order {
            send_base[proc_index] = wb_count;
            wb_count += au.procs[proc_index].send_port_count();
        }

        let buf_of = |proc_index: usize, port: usize| send_base[proc_index] + port;

        let mut nodes = Vec::with_capacity(order.len());
        for &proc_index in &order {
            let proc = &au.procs[proc_index];

            let mut in_bufs = vec![None; proc.recv_port_count()];
            for edge in au.connections.edges_into(ProcNode::Proc(proc_index)) {
                if let ProcNode::Proc(src) = edge.src {
                    if edge.dst_port < in_bufs.len() {
                        in_bufs[edge.dst_port] = Some(buf_of(src, edge.src_port));
                    }
                }
            }

            let out_bufs: Vec<usize> = (0..proc.send_port_count())
                .map(|port| buf_of(proc_index, port))
                .collect();

            let terminal = au
                .connections
                .edges_out_of(ProcNode::Proc(proc_index))
                .any(|e| e.dst == ProcNode::AuOutput);

            nodes.push(PlanNode {
                proc_index,
                in_bufs,
                out_bufs,
                terminal,
            });
        }

        let mut output_srcs = [None; OUT_CHANNELS];
        for edge in au.connections.edges_into(ProcNode::AuOutput) {
            if let ProcNode::Proc(src) = edge.src {
                if edge.dst_port < OUT_CHANNELS {
                    output_srcs[edge.dst_port] = Some(buf_of(src, edge.src_port));
                }
            }
        }

        Ok(Self {
            au_index,
            nodes,
            output_srcs,
            wb_count,
        })
    }

    /// Scratch buffers this plan needs.
    pub fn work_buffer_count(&self) -> usize {
        self.wb_count
    }

    /// Renders one voice group for `[frame_offset, frame_offset +
    /// frame_count)` within a block of `total_frames`, mixing terminal
    /// output into `au_send` when `enable_mixing` is set.
    ///
    /// Returns the first block-relative frame at which the group's output
    /// became silent.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        au: &AudioUnit,
        group: &mut VoiceGroup,
        buffers: &mut WorkBuffers,
        au_send: &mut [WorkBuffer],
        frame_count: usize,
        frame_offset: usize,
        total_frames: usize,
        tempo: f64,
        audio_rate: i32,
        enable_mixing: bool,
    ) -> usize {
        let stop_limit = frame_offset + frame_count;
        let ctx = VoiceRenderCtx {
            frame_offset,
            frame_count,
            total_frames,
            audio_rate,
            tempo,
        };

        let mut group_stop = frame_offset;
        let mut have_terminal = false;

        for node in &self.nodes {
            let voice = group
                .voices
                .iter_mut()
                .find(|v| v.proc_index == node.proc_index && v.active);
            let Some(voice) = voice else {
                if node.terminal {
                    have_terminal = true;
                }
                continue;
            };

            let proc = &au.procs[node.proc_index];

            let mut out_bufs: Vec<WorkBuffer> = node
                .out_bufs
                .iter()
                .map(|&idx| buffers.take(idx))
                .collect();

            let stop = proc.render_voice(
                &mut voice.common,
                voice.state.as_mut(),
                buffers,
                &node.in_bufs,
                &mut out_bufs,
                &ctx,
            );

            for (slot, buf) in node.out_bufs.iter().zip(out_bufs.drain(..)) {
                buffers.put(*slot, buf);
            }

            if node.terminal {
                have_terminal = true;
                group_stop = group_stop.max(stop);
            }
        }

        if !have_terminal {
            group_stop = frame_offset;
        }

        if enable_mixing {
            for (port, src) in self.output_srcs.iter().enumerate() {
                if let Some(src) = src {
                    if port < au_send.len() {
                        au_send[port].mix(buffers.get(*src), frame_offset, stop_limit);
                    }
                }
            }
        }

        group_stop.min(stop_limit)
    }

    /// The scratch buffer indices feeding the audio unit's output ports
    /// (used for test-output routing).
    pub fn output_sources(&self) -> [Option<usize>; OUT_CHANNELS] {
        self.output_srcs
    }
}
