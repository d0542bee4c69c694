//! Builtin processor set.
//!
//! A deliberately small set, enough to build playable instruments and
//! effects: a pitch stage, a sine generator, a force (amplitude) stage
//! and a volume stage. The engine treats these through the [`Processor`]
//! trait only; nothing in the player knows their concrete types.

use std::any::Any;

use compas_core::math::{cents_to_ratio, db_to_scale};
use compas_core::work_buffer::{WorkBuffer, WorkBuffers};

use crate::processor::{
    EmptyVoiceState, Processor, VoiceCommonState, VoiceProcState, VoiceRenderCtx,
};

/// Release ramp duration in seconds used by [`ForceProc`].
const RELEASE_TIME: f64 = 0.05;

/// Writes the voice's effective pitch in cents, one value per frame.
///
/// This is where the carried pitch control (slide plus vibrato) becomes
/// an audio-rate signal for downstream generators.
#[derive(Debug, Default)]
pub struct PitchProc;

impl Processor for PitchProc {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn recv_port_count(&self) -> usize {
        0
    }

    fn send_port_count(&self) -> usize {
        1
    }

    fn supports_voice(&self) -> bool {
        true
    }

    fn new_voice_state(&self) -> Box<dyn VoiceProcState> {
        Box::new(EmptyVoiceState)
    }

    fn render_voice(
        &self,
        common: &mut VoiceCommonState,
        _state: &mut dyn VoiceProcState,
        _buffers: &WorkBuffers,
        _in_bufs: &[Option<usize>],
        out_bufs: &mut [WorkBuffer],
        ctx: &VoiceRenderCtx,
    ) -> usize {
        let stop = ctx.frame_offset + ctx.frame_count;
        let out = out_bufs[0].get_contents_mut();
        for frame in &mut out[ctx.frame_offset..stop] {
            *frame = common.pitch.next() as f32;
        }
        stop
    }
}

/// Per-voice state of [`SineProc`].
#[derive(Debug, Default)]
struct SineVoiceState {
    phase: f64,
}

impl VoiceProcState for SineVoiceState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Sine generator driven by a pitch signal in cents (0 cents = 440 Hz).
#[derive(Debug, Default)]
pub struct SineProc;

impl Processor for SineProc {
    fn name(&self) -> &'static str {
        "sine"
    }

    fn recv_port_count(&self) -> usize {
        1
    }

    fn send_port_count(&self) -> usize {
        1
    }

    fn supports_voice(&self) -> bool {
        true
    }

    fn voice_state_size(&self) -> usize {
        size_of::<SineVoiceState>()
    }

    fn new_voice_state(&self) -> Box<dyn VoiceProcState> {
        Box::new(SineVoiceState::default())
    }

    fn render_voice(
        &self,
        _common: &mut VoiceCommonState,
        state: &mut dyn VoiceProcState,
        buffers: &WorkBuffers,
        in_bufs: &[Option<usize>],
        out_bufs: &mut [WorkBuffer],
        ctx: &VoiceRenderCtx,
    ) -> usize {
        let state = state
            .as_any_mut()
            .downcast_mut::<SineVoiceState>()
            .expect("sine voice state");

        let stop = ctx.frame_offset + ctx.frame_count;
        let rate = f64::from(ctx.audio_rate);
        let pitch_in = in_bufs
            .first()
            .copied()
            .flatten()
            .map(|idx| buffers.get(idx))
            .filter(|wb| wb.is_valid());

        let out = out_bufs[0].get_contents_mut();
        match pitch_in {
            Some(pitch) => {
                let cents = pitch.get_contents();
                for i in ctx.frame_offset..stop {
                    let freq = 440.0 * cents_to_ratio(f64::from(cents[i]));
                    out[i] = libm::sin(state.phase * core::f64::consts::TAU) as f32;
                    state.phase += freq / rate;
                    if state.phase >= 1.0 {
                        state.phase -= libm::floor(state.phase);
                    }
                }
            }
            None => {
                // Unconnected pitch input: steady 440 Hz.
                let inc = 440.0 / rate;
                for frame in &mut out[ctx.frame_offset..stop] {
                    *frame = libm::sin(state.phase * core::f64::consts::TAU) as f32;
                    state.phase += inc;
                    if state.phase >= 1.0 {
                        state.phase -= 1.0;
                    }
                }
            }
        }

        stop
    }
}

/// Applies the voice's force control to its audio input and fans it out
/// to a stereo pair. Owns the release ramp: after note-off the gain fades
/// linearly over [`RELEASE_TIME`] and the processor declares itself
/// finished.
#[derive(Debug, Default)]
pub struct ForceProc;

impl Processor for ForceProc {
    fn name(&self) -> &'static str {
        "force"
    }

    fn recv_port_count(&self) -> usize {
        1
    }

    fn send_port_count(&self) -> usize {
        2
    }

    fn supports_voice(&self) -> bool {
        true
    }

    fn new_voice_state(&self) -> Box<dyn VoiceProcState> {
        Box::new(EmptyVoiceState)
    }

    fn render_voice(
        &self,
        common: &mut VoiceCommonState,
        _state: &mut dyn VoiceProcState,
        buffers: &WorkBuffers,
        in_bufs: &[Option<usize>],
        out_bufs: &mut [WorkBuffer],
        ctx: &VoiceRenderCtx,
    ) -> usize {
        let stop = ctx.frame_offset + ctx.frame_count;

        let audio_in = in_bufs
            .first()
            .copied()
            .flatten()
            .map(|idx| buffers.get(idx))
            .filter(|wb| wb.is_valid());
        let Some(audio_in) = audio_in else {
            for out in out_bufs.iter_mut() {
                out.clear(ctx.frame_offset, stop);
            }
            return ctx.frame_offset;
        };

        let release_len = ((RELEASE_TIME * f64::from(common.audio_rate)) as i64).max(1);
        let input = audio_in.get_contents();
        let (left, rest) = out_bufs.split_at_mut(1);
        let left = left[0].get_contents_mut();
        let right = rest[0].get_contents_mut();

        let mut finished_at = stop;
        for i in ctx.frame_offset..stop {
            let gain = db_to_scale(common.force.next()) as f32;

            let env = if common.released {
                let remaining = release_len - common.release_frames;
                common.release_frames += 1;
                if remaining <= 0 {
                    finished_at = i;
                    break;
                }
                remaining as f32 / release_len as f32
            } else {
                1.0
            };

            let sample = input[i] * gain * env;
            left[i] = sample;
            right[i] = sample;
        }

        if finished_at < stop {
            left[finished_at..stop].fill(0.0);
            right[finished_at..stop].fill(0.0);
        }

        finished_at
    }
}

/// Fixed stereo gain stage for the mixed path.
#[derive(Debug)]
pub struct VolumeProc {
    scale: f64,
}

impl VolumeProc {
    /// Creates a volume stage with the given gain in dB.
    pub fn new(volume_db: f64) -> Self {
        Self {
            scale: db_to_scale(volume_db),
        }
    }
}

impl Processor for VolumeProc {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn recv_port_count(&self) -> usize {
        2
    }

    fn send_port_count(&self) -> usize {
        2
    }

    fn supports_voice(&self) -> bool {
        false
    }

    fn supports_mixed(&self) -> bool {
        true
    }

    fn new_voice_state(&self) -> Box<dyn VoiceProcState> {
        Box::new(EmptyVoiceState)
    }

    fn render_voice(
        &self,
        _common: &mut VoiceCommonState,
        _state: &mut dyn VoiceProcState,
        _buffers: &WorkBuffers,
        _in_bufs: &[Option<usize>],
        _out_bufs: &mut [WorkBuffer],
        ctx: &VoiceRenderCtx,
    ) -> usize {
        ctx.frame_offset
    }

    fn render_mixed(
        &self,
        recv: &[WorkBuffer],
        send: &mut [WorkBuffer],
        frame_count: usize,
        _tempo: f64,
    ) {
        let scale = self.scale as f32;
        for (dst, src) in send.iter_mut().zip(recv.iter()) {
            if !src.is_valid() {
                continue;
            }
            let input = src.get_contents();
            let out = dst.get_contents_mut();
            for i in 0..frame_count.min(input.len()).min(out.len()) {
                out[i] = input[i] * scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compas_core::controls::{ForceControls, PitchControls};

    fn test_common(audio_rate: i32) -> VoiceCommonState {
        VoiceCommonState::new(ForceControls::new(0.0), PitchControls::new(0.0), audio_rate)
    }

    fn render_ctx(frames: usize) -> VoiceRenderCtx {
        VoiceRenderCtx {
            frame_offset: 0,
            frame_count: frames,
            total_frames: frames,
            audio_rate: 48000,
            tempo: 120.0,
        }
    }

    #[test]
    fn test_pitch_proc_writes_cents() {
        let proc = PitchProc;
        let mut common = test_common(48000);
        common.pitch.pitch = 700.0;
        let mut state = proc.new_voice_state();
        let buffers = WorkBuffers::new(0, 64);
        let mut outs = vec![WorkBuffer::new(64)];

        let stop = proc.render_voice(
            &mut common,
            state.as_mut(),
            &buffers,
            &[],
            &mut outs,
            &render_ctx(64),
        );

        assert_eq!(stop, 64);
        assert!(outs[0].is_valid());
        assert!(outs[0].get_contents().iter().all(|&c| c == 700.0));
    }

    #[test]
    fn test_sine_produces_signal() {
        let proc = SineProc;
        let mut common = test_common(48000);
        let mut state = proc.new_voice_state();
        let buffers = WorkBuffers::new(0, 256);
        let mut outs = vec![WorkBuffer::new(256)];

        proc.render_voice(
            &mut common,
            state.as_mut(),
            &buffers,
            &[None],
            &mut outs,
            &render_ctx(256),
        );

        let energy: f32 = outs[0].get_contents().iter().map(|s| s.abs()).sum();
        assert!(energy > 0.0, "sine should produce output");
    }

    #[test]
    fn test_force_release_finishes() {
        let proc = ForceProc;
        let mut common = test_common(48000);
        common.released = true;

        let mut buffers = WorkBuffers::new(1, 8000);
        buffers.get_mut(0).clear(0, 8000);
        buffers
            .get_mut(0)
            .get_contents_mut()
            .fill(1.0);

        let mut state = proc.new_voice_state();
        let mut outs = vec![WorkBuffer::new(8000), WorkBuffer::new(8000)];
        let ctx = VoiceRenderCtx {
            frame_offset: 0,
            frame_count: 8000,
            total_frames: 8000,
            audio_rate: 48000,
            tempo: 120.0,
        };

        let stop = proc.render_voice(
            &mut common,
            state.as_mut(),
            &buffers,
            &[Some(0)],
            &mut outs,
            &ctx,
        );

        // 50 ms at 48 kHz = 2400 frames of release ramp.
        assert_eq!(stop, 2400);
        assert_eq!(outs[0].get_contents()[2500], 0.0);
        assert!(outs[0].get_contents()[100] > 0.0);
    }

    #[test]
    fn test_volume_scales_mixed() {
        let proc = VolumeProc::new(-6.0);
        let mut recv = vec![WorkBuffer::new(16), WorkBuffer::new(16)];
        for wb in &mut recv {
            wb.get_contents_mut().fill(1.0);
        }
        let mut send = vec![WorkBuffer::new(16), WorkBuffer::new(16)];

        proc.render_mixed(&recv, &mut send, 16, 120.0);

        let expected = db_to_scale(-6.0) as f32;
        assert!((send[0].get_contents()[0] - expected).abs() < 1e-6);
    }
}
