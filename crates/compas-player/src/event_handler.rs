//! Sequencing-stage event dispatch.
//!
//! Maps an event name to its effect on channel or master state. Master,
//! control and general events act immediately; channel events are
//! resolved (pitch lookup, group id reservation) and queued into the
//! channel's local event FIFO for sample-accurate application during
//! voice processing.

use compas_core::math::db_to_scale;
use compas_core::position::PatInstRef;
use compas_core::tstamp::Tstamp;
use compas_core::value::Value;

use compas_module::Module;

use crate::channel::{Channel, ChannelEvent, ChannelEventKind};
use crate::event_names::{EventCategory, EventSpec};
use crate::jump::JumpContext;
use crate::master_params::MasterParams;
use crate::voice_pool::VoiceGroupReservations;

/// Applies one event's sequencing-stage side effect.
///
/// Returns a message suitable for an `Aerror` event when the argument is
/// unusable; the engine state is untouched in that case.
#[allow(clippy::too_many_arguments)]
pub fn trigger(
    master: &mut MasterParams,
    channels: &mut [Channel],
    res: &mut VoiceGroupReservations,
    module: &Module,
    ch_num: usize,
    spec: &EventSpec,
    arg: &Value,
    frame_offset: usize,
    external: bool,
) -> Result<(), String> {
    match spec.category {
        EventCategory::Channel => {
            let kind = channel_event_kind(master, module, res, ch_num, spec, arg, external)?;
            channels[ch_num].push_local_event(ChannelEvent { frame_offset, kind });
            Ok(())
        }
        EventCategory::Master => master_event(master, spec, arg),
        EventCategory::Control => control_event(master, spec, arg),
        EventCategory::General => Ok(()),
        EventCategory::Query | EventCategory::Auto => Ok(()),
    }
}

fn channel_event_kind(
    master: &mut MasterParams,
    module: &Module,
    res: &mut VoiceGroupReservations,
    ch_num: usize,
    spec: &EventSpec,
    arg: &Value,
    external: bool,
) -> Result<ChannelEventKind, String> {
    let kind = match spec.name {
        "n+" => {
            let note = expect_float(arg)?;
            let cents = resolve_pitch(master, module, note);
            let group_id = res.reserve_or_reuse(ch_num, || master.next_group_id());
            ChannelEventKind::NoteOn {
                group_id,
                cents,
                external,
            }
        }
        "n-" => ChannelEventKind::NoteOff,
        ".f" => ChannelEventKind::SetForce(expect_float(arg)?),
        "/f" => ChannelEventKind::SlideForce(expect_float(arg)?),
        "/=f" => ChannelEventKind::SlideForceLength(expect_tstamp(arg)?),
        "ts" => ChannelEventKind::TremoloSpeed(expect_float(arg)?),
        "td" => ChannelEventKind::TremoloDepth(expect_float(arg)?),
        "/p" => ChannelEventKind::SlidePitch(expect_float(arg)?),
        "/=p" => ChannelEventKind::SlidePitchLength(expect_tstamp(arg)?),
        "vs" => ChannelEventKind::VibratoSpeed(expect_float(arg)?),
        "vd" => ChannelEventKind::VibratoDepth(expect_float(arg)?),
        ".a" => {
            let index = expect_int(arg)?;
            if index < 0 || module.audio_unit(index as usize).is_none() {
                return Err(format!("no audio unit at index {index}"));
            }
            ChannelEventKind::SetAu(index as i32)
        }
        other => return Err(format!("unhandled channel event `{other}`")),
    };
    Ok(kind)
}

/// Resolves a note index through the tuning state (falling back to the
/// module table, then to raw cents). Note indices outside one octave
/// wrap with an octave shift.
fn resolve_pitch(master: &MasterParams, module: &Module, note: f64) -> f64 {
    let index = libm::round(note) as i64;

    if let Some(state) = master.tuning_states.first().and_then(Option::as_ref) {
        if let Some(cents) = lookup_wrapped(index, |n, o| state.pitch_of(n, -1, o)) {
            return cents;
        }
    }
    if let Some(table) = module.tuning_table(0) {
        if let Some(cents) = lookup_wrapped(index, |n, o| table.pitch_of(n, -1, o)) {
            return cents;
        }
    }

    note
}

fn lookup_wrapped(index: i64, pitch_of: impl Fn(usize, i32) -> Option<f64>) -> Option<f64> {
    // Probe the table size through the query itself: wrap into the
    // octave the table covers.
    let count = (0..).take_while(|&n| pitch_of(n, 0).is_some()).count() as i64;
    if count == 0 {
        return None;
    }
    let octave = index.div_euclid(count) as i32;
    let note = index.rem_euclid(count) as usize;
    pitch_of(note, octave)
}

fn master_event(master: &mut MasterParams, spec: &EventSpec, arg: &Value) -> Result<(), String> {
    match spec.name {
        "m.t" => {
            let tempo = expect_float(arg)?;
            if !(tempo.is_finite() && tempo > 0.0) {
                return Err(format!("invalid tempo {tempo}"));
            }
            master.tempo = tempo;
            master.tempo_slide = 0;
            master.tempo_settings_changed = true;
        }
        "m/t" => {
            let target = expect_float(arg)?;
            if !(target.is_finite() && target > 0.0) {
                return Err(format!("invalid tempo slide target {target}"));
            }
            master.start_tempo_slide(target);
        }
        "m/=t" => master.tempo_slide_length = expect_tstamp(arg)?,
        "m.v" => {
            let scale = db_to_scale(expect_float(arg)?);
            master.volume = scale;
            master.volume_slider.set_value(scale);
        }
        "m/v" => {
            let scale = db_to_scale(expect_float(arg)?);
            let length = master.volume_slide_length;
            master.volume_slider.set_length(length);
            master.volume_slider.start(scale, master.volume);
        }
        "m/=v" => master.volume_slide_length = expect_tstamp(arg)?,
        "mpd" => master.delay_left = expect_tstamp(arg)?,
        "m.jc" => {
            let counter = expect_int(arg)?;
            if counter < 0 {
                return Err(format!("invalid jump counter {counter}"));
            }
            master.jump_counter = counter;
        }
        "m.jp" => master.jump_target_piref = expect_piref(arg)?,
        "m.jr" => master.jump_target_row = expect_tstamp(arg)?,
        "mj" => {
            if master.jump_counter != 0 {
                let ctx = JumpContext {
                    piref: master.cur_pos.piref,
                    row: master.cur_pos.pat_pos,
                    ch_num: master.cur_ch,
                    order: master.cur_trigger,
                    counter: master.jump_counter,
                    target_piref: master.jump_target_piref,
                    target_row: master.jump_target_row,
                };
                let key = ctx.key();
                if master.active_jumps.add(ctx) || master.active_jumps.get(&key).is_some() {
                    master.do_jump = true;
                } else {
                    tracing::warn!("jump context budget exhausted, jump not armed");
                }
            }
        }
        "m.gp" => master.goto_target_piref = expect_piref(arg)?,
        "m.gr" => master.goto_target_row = expect_tstamp(arg)?,
        "mg" => master.do_goto = true,
        other => return Err(format!("unhandled master event `{other}`")),
    }
    Ok(())
}

fn control_event(master: &mut MasterParams, spec: &EventSpec, arg: &Value) -> Result<(), String> {
    match spec.name {
        "cpause" => master.pause = true,
        "cresume" => master.pause = false,
        "c.i" => master.is_infinite = expect_bool(arg)?,
        other => return Err(format!("unhandled control event `{other}`")),
    }
    Ok(())
}

fn expect_float(arg: &Value) -> Result<f64, String> {
    match arg {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        other => Err(format!("expected float, got {:?}", other.value_type())),
    }
}

fn expect_int(arg: &Value) -> Result<i64, String> {
    match arg {
        Value::Int(i) => Ok(*i),
        other => Err(format!("expected int, got {:?}", other.value_type())),
    }
}

fn expect_bool(arg: &Value) -> Result<bool, String> {
    match arg {
        Value::Bool(b) => Ok(*b),
        other => Err(format!("expected bool, got {:?}", other.value_type())),
    }
}

fn expect_tstamp(arg: &Value) -> Result<Tstamp, String> {
    match arg {
        Value::Tstamp(t) => Ok(*t),
        other => Err(format!("expected timestamp, got {:?}", other.value_type())),
    }
}

fn expect_piref(arg: &Value) -> Result<PatInstRef, String> {
    match arg {
        Value::PatInstRef(p) => Ok(*p),
        other => Err(format!(
            "expected pattern instance, got {:?}",
            other.value_type()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_names::lookup;

    fn fixtures() -> (MasterParams, Vec<Channel>, VoiceGroupReservations, Module) {
        let module = Module::new();
        let master = MasterParams::new(&module, 48000);
        let channels = (0..4).map(|i| Channel::new(i, 120.0, 48000, 7)).collect();
        (master, channels, VoiceGroupReservations::new(), module)
    }

    #[test]
    fn test_note_on_queues_local_event() {
        let (mut master, mut channels, mut res, module) = fixtures();
        let spec = lookup("n+").unwrap();

        trigger(
            &mut master,
            &mut channels,
            &mut res,
            &module,
            1,
            spec,
            &Value::Float(0.0),
            0,
            false,
        )
        .unwrap();

        assert_eq!(channels[1].local_events.len(), 1);
        assert!(matches!(
            channels[1].local_events[0].kind,
            ChannelEventKind::NoteOn { group_id: 1, .. }
        ));
    }

    #[test]
    fn test_pattern_delay() {
        let (mut master, mut channels, mut res, module) = fixtures();
        let spec = lookup("mpd").unwrap();

        trigger(
            &mut master,
            &mut channels,
            &mut res,
            &module,
            0,
            spec,
            &Value::Tstamp(Tstamp::new(2, 0)),
            0,
            false,
        )
        .unwrap();

        assert_eq!(master.delay_left, Tstamp::new(2, 0));
    }

    #[test]
    fn test_jump_arms_context() {
        let (mut master, mut channels, mut res, module) = fixtures();
        master.cur_pos.piref = PatInstRef::new(0, 0);
        master.jump_counter = 2;

        trigger(
            &mut master,
            &mut channels,
            &mut res,
            &module,
            0,
            lookup("mj").unwrap(),
            &Value::None,
            0,
            false,
        )
        .unwrap();

        assert!(master.do_jump);
        assert_eq!(master.active_jumps.len(), 1);
    }

    #[test]
    fn test_jump_with_zero_counter_ignored() {
        let (mut master, mut channels, mut res, module) = fixtures();
        master.jump_counter = 0;

        trigger(
            &mut master,
            &mut channels,
            &mut res,
            &module,
            0,
            lookup("mj").unwrap(),
            &Value::None,
            0,
            false,
        )
        .unwrap();

        assert!(!master.do_jump);
        assert!(master.active_jumps.is_empty());
    }

    #[test]
    fn test_bad_argument_reports() {
        let (mut master, mut channels, mut res, module) = fixtures();

        let result = trigger(
            &mut master,
            &mut channels,
            &mut res,
            &module,
            0,
            lookup("m.t").unwrap(),
            &Value::Float(-10.0),
            0,
            false,
        );
        assert!(result.is_err());
    }
}
