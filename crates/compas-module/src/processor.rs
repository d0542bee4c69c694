//! The processor rendering contract.
//!
//! A processor is one node inside an audio unit. Voice processors render
//! per-voice (one activation per note per channel); mixed processors
//! render once per block on the module-level graph. A processor may
//! support either or both modes.
//!
//! Voice rendering operates on a sub-slice `[frame_offset,
//! frame_offset + frame_count)` of a block of `total_frames`; the engine
//! subdivides blocks at intra-block events, so a processor must be
//! prepared to continue mid-block without losing state.

use std::any::Any;
use std::fmt;

use compas_core::controls::{ForceControls, PitchControls};
use compas_core::work_buffer::{WorkBuffer, WorkBuffers};

/// Per-voice state shared by every processor of a voice group.
///
/// The channel's carried controls are copied in here at note-on; each
/// voice advances its copy independently so background voices keep the
/// trajectory they had when they were replaced.
#[derive(Debug, Clone)]
pub struct VoiceCommonState {
    /// Amplitude control in dB.
    pub force: ForceControls,
    /// Pitch control in cents (0 cents = 440 Hz).
    pub pitch: PitchControls,
    /// True once the note has been released.
    pub released: bool,
    /// Frames rendered since release.
    pub release_frames: i64,
    /// Audio rate the voice was started at.
    pub audio_rate: i32,
}

impl VoiceCommonState {
    /// Creates voice state from copies of the channel's carried controls.
    pub fn new(force: ForceControls, pitch: PitchControls, audio_rate: i32) -> Self {
        Self {
            force,
            pitch,
            released: false,
            release_frames: 0,
            audio_rate,
        }
    }
}

/// Processor-specific per-voice DSP state.
///
/// Implementations are downcast by their owning processor through
/// [`as_any_mut`](Self::as_any_mut).
pub trait VoiceProcState: Any + Send + fmt::Debug {
    /// Upcast for downcasting back to the concrete state type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Stateless stand-in for processors without per-voice DSP state.
#[derive(Debug, Default)]
pub struct EmptyVoiceState;

impl VoiceProcState for EmptyVoiceState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Timing parameters for one voice-rendering sub-slice.
#[derive(Debug, Clone, Copy)]
pub struct VoiceRenderCtx {
    /// First frame of the sub-slice within the block.
    pub frame_offset: usize,
    /// Number of frames to render.
    pub frame_count: usize,
    /// Full block size.
    pub total_frames: usize,
    /// Audio rate in Hz.
    pub audio_rate: i32,
    /// Current tempo in BPM.
    pub tempo: f64,
}

/// One node type inside an audio unit.
///
/// Processors are shared, immutable descriptors; all mutable state lives
/// in voice states (voice mode) or device states (mixed mode).
pub trait Processor: Send + Sync + fmt::Debug {
    /// Short processor type name.
    fn name(&self) -> &'static str;

    /// Number of receive ports.
    fn recv_port_count(&self) -> usize;

    /// Number of send ports.
    fn send_port_count(&self) -> usize;

    /// True if this processor renders per-voice.
    fn supports_voice(&self) -> bool;

    /// True if this processor renders in the mixed path.
    fn supports_mixed(&self) -> bool {
        false
    }

    /// Size in bytes of this processor's per-voice DSP state, used for
    /// voice pool space accounting.
    fn voice_state_size(&self) -> usize {
        0
    }

    /// Creates a fresh per-voice state.
    fn new_voice_state(&self) -> Box<dyn VoiceProcState>;

    /// Renders one sub-slice for one voice.
    ///
    /// `in_bufs[p]` is the scratch buffer index feeding receive port `p`
    /// (or `None` if unconnected); `out_bufs[p]` is the taken-out buffer
    /// for send port `p`. Returns the block-relative frame index at which
    /// the output became silent; a still-live voice returns
    /// `frame_offset + frame_count`.
    fn render_voice(
        &self,
        common: &mut VoiceCommonState,
        state: &mut dyn VoiceProcState,
        buffers: &WorkBuffers,
        in_bufs: &[Option<usize>],
        out_bufs: &mut [WorkBuffer],
        ctx: &VoiceRenderCtx,
    ) -> usize;

    /// Renders one block in the mixed path (effect audio units).
    ///
    /// Default implementation passes the receive ports through.
    fn render_mixed(
        &self,
        recv: &[WorkBuffer],
        send: &mut [WorkBuffer],
        frame_count: usize,
        tempo: f64,
    ) {
        let _ = tempo;
        for (dst, src) in send.iter_mut().zip(recv.iter()) {
            dst.mix(src, 0, frame_count);
        }
    }
}
