//! End-to-end playback tests.
//!
//! Each test builds a small module, renders it and checks frame counts,
//! event streams and output samples against the playback contract.

use std::sync::Arc;

use compas_core::position::PatInstRef;
use compas_core::tstamp::Tstamp;
use compas_module::{AudioUnit, DeviceNode, Module, Pattern, Song, Trigger, TuningTable};
use compas_player::Player;

const RATE: i32 = 48000;
const BUFFER: usize = 65536;

/// A module with one sine instrument routed to the master and one track
/// playing pattern 0.
fn sine_module(pattern: Pattern) -> Arc<Module> {
    let mut module = Module::new();
    module.set_audio_unit(0, AudioUnit::sine_instrument("sin"));
    module.set_tuning_table(0, TuningTable::new(440.0, &[0.0, 100.0, 200.0, 700.0]));
    module
        .connections
        .connect_stereo(DeviceNode::Au(0), DeviceNode::Master);
    module.set_pattern(0, pattern);

    let mut song = Song::new(120.0);
    song.order.push(PatInstRef::new(0, 0));
    module.add_track(song);

    Arc::new(module)
}

fn new_player(module: Arc<Module>) -> Player {
    Player::new(module, RATE, BUFFER, 0, 64).expect("player setup")
}

/// Renders until playback stops; returns all interleaved samples.
fn render_all(player: &mut Player, chunk: usize) -> Vec<f32> {
    let mut out = Vec::new();
    for _ in 0..10_000 {
        if player.has_stopped() {
            break;
        }
        player.play(chunk);
        out.extend_from_slice(player.get_audio());
    }
    assert!(player.has_stopped(), "render did not finish");
    out
}

fn parse_events(json: &str) -> Vec<(usize, String, serde_json::Value)> {
    let parsed: serde_json::Value = serde_json::from_str(json).expect("event JSON");
    parsed
        .as_array()
        .expect("event array")
        .iter()
        .map(|entry| {
            let parts = entry.as_array().expect("event triple");
            (
                parts[0].as_u64().expect("channel") as usize,
                parts[1].as_str().expect("name").to_string(),
                parts[2].clone(),
            )
        })
        .collect()
}

fn first_audible(samples: &[f32]) -> Option<usize> {
    samples
        .iter()
        .position(|s| s.abs() > 1e-6)
        .map(|i| i / 2)
}

// --- Scenarios ---

#[test]
fn test_empty_module_stops_immediately() {
    let mut player = new_player(Arc::new(Module::new()));
    player.play(1024);

    assert_eq!(player.get_frames_available(), 0);
    assert!(player.has_stopped());
}

#[test]
fn test_single_note_sine() {
    let mut pattern = Pattern::new(Tstamp::new(8, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("#", "'lead in'"));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    // 0.5 seconds = one beat at 120 BPM.
    player.play(24000);

    assert_eq!(player.get_frames_available(), 24000);
    let energy: f32 = player.get_audio().iter().map(|s| s.abs()).sum();
    assert!(energy > 0.0, "expected audible output");

    let events = parse_events(&player.get_events());
    let note_ons: Vec<_> = events.iter().filter(|(_, name, _)| name == "n+").collect();
    assert_eq!(note_ons.len(), 1);
    assert_eq!(note_ons[0].0, 0);
}

#[test]
fn test_pattern_delay_defers_note() {
    // One row: a one-beat pattern delay, then the note. The delay splits
    // the row, so the first beat is silent and the note starts exactly
    // one beat in.
    let mut pattern = Pattern::new(Tstamp::new(2, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("mpd", "[1, 0]"));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.play(48000);
    assert_eq!(player.get_frames_available(), 48000);

    let samples = player.get_audio();
    let silent_energy: f32 = samples[..24000 * 2].iter().map(|s| s.abs()).sum();
    let note_energy: f32 = samples[24000 * 2..].iter().map(|s| s.abs()).sum();

    assert_eq!(silent_energy, 0.0, "delay region must be silent");
    assert!(note_energy > 0.0, "note must sound after the delay");
}

#[test]
fn test_jump_with_counter_two_plays_pattern_three_times() {
    let mut pattern = Pattern::new(Tstamp::new(4, 0));
    pattern.add_trigger(0, Tstamp::new(3, 0), Trigger::new("m.jc", "2"));
    pattern.add_trigger(0, Tstamp::new(3, 0), Trigger::new("mj", "null"));
    let mut player = new_player(sine_module(pattern));

    let samples = render_all(&mut player, 4096);

    // Two jumps replay [0, 3); the final pass runs to the end:
    // 3 + 3 + 4 beats = 10 beats = 240000 frames at 120 BPM / 48 kHz.
    assert_eq!(samples.len() / 2, 240_000);
}

#[test]
fn test_jump_counter_exhausts() {
    // After its counter is spent the jump row must pass through without
    // jumping, so playback terminates.
    let mut pattern = Pattern::new(Tstamp::new(1, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("m.jc", "1"));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("mj", "null"));
    let mut player = new_player(sine_module(pattern));

    let samples = render_all(&mut player, 4096);
    // The jump fires once at the row start (before any audio), replays
    // the same beat, then the released context lets the beat complete.
    assert_eq!(samples.len() / 2, 24_000);
}

#[test]
fn test_channel_mute_matches_solo_render() {
    let mut both = Pattern::new(Tstamp::new(4, 0));
    both.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    both.add_trigger(1, Tstamp::zero(), Trigger::new("n+", "3"));

    let mut solo = Pattern::new(Tstamp::new(4, 0));
    solo.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));

    let mut muted_player = new_player(sine_module(both));
    muted_player.set_channel_mute(1, true);
    let muted_render = render_all(&mut muted_player, 4096);

    let mut solo_player = new_player(sine_module(solo));
    let solo_render = render_all(&mut solo_player, 4096);

    assert_eq!(muted_render.len(), solo_render.len());
    assert_eq!(muted_render, solo_render, "muted render must equal solo render");
}

#[test]
fn test_tempo_slide_completes_within_first_beat() {
    let mut pattern = Pattern::new(Tstamp::new(2, 0));
    pattern.add_global_trigger(Tstamp::zero(), Trigger::new("m/=t", "[1, 0]"));
    pattern.add_global_trigger(Tstamp::zero(), Trigger::new("m/t", "60"));
    pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.play(8192);
    let events = parse_events(&player.get_events());
    assert!(
        events.iter().any(|(_, name, _)| name == "m/t"),
        "slide event must be reported"
    );
    let mut samples = player.get_audio().to_vec();
    while !player.has_stopped() {
        player.play(8192);
        samples.extend_from_slice(player.get_audio());
    }

    let note_start = first_audible(&samples).expect("note must sound");
    let total_frames = samples.len() / 2;

    // The first beat decelerates from 120 towards 60, so it lasts
    // between 24000 (all at 120) and 48000 (all at 60) frames.
    assert!(note_start > 24_000, "first beat too short: {note_start}");
    assert!(note_start < 48_000, "first beat too long: {note_start}");

    // The second beat runs entirely at 60 BPM: one second, up to onset
    // detection landing a couple of frames into the sine cycle.
    let second_beat = total_frames - note_start;
    assert!(
        (second_beat as i64 - 48_000).abs() <= 4,
        "second beat lasted {second_beat} frames"
    );
}

// --- Universal properties ---

#[test]
fn test_frame_count_correctness_across_rates() {
    for rate in [8000, 44100, 48000, 96000] {
        let mut pattern = Pattern::new(Tstamp::new(16, 0));
        pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
        let module = sine_module(pattern);
        let mut player = Player::new(module, rate, BUFFER, 0, 64).expect("player setup");

        let mut delivered = 0usize;
        let mut requested = 0usize;
        for chunk in [1usize, 7, 64, 1000, 4096, 500, 9000].iter().cycle() {
            if player.has_stopped() {
                break;
            }
            player.play(*chunk);
            let got = player.get_frames_available();
            requested += chunk;
            delivered += got;
            if !player.has_stopped() {
                assert_eq!(got, *chunk, "short delivery while still playing");
            }
        }

        // 16 beats at 120 BPM = 8 seconds.
        assert_eq!(delivered, 8 * rate as usize);
        assert!(requested >= delivered);
    }
}

#[test]
fn test_buffer_size_invariance() {
    let build = || {
        let mut pattern = Pattern::new(Tstamp::new(6, 0));
        pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
        pattern.add_trigger(0, Tstamp::zero(), Trigger::new("vs", "5"));
        pattern.add_trigger(0, Tstamp::zero(), Trigger::new("vd", "30"));
        pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("/=f", "[2, 0]"));
        pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("/f", "-12"));
        pattern.add_trigger(0, Tstamp::new(2, 0), Trigger::new("/=p", "[1, 0]"));
        pattern.add_trigger(0, Tstamp::new(2, 0), Trigger::new("/p", "1200"));
        pattern.add_trigger(0, Tstamp::new(3, 0), Trigger::new("n+", "3"));
        pattern.add_trigger(1, Tstamp::new(2, 0), Trigger::new("n+", "1"));
        pattern.add_trigger(1, Tstamp::new(2, 0), Trigger::new("ts", "4"));
        pattern.add_trigger(1, Tstamp::new(2, 0), Trigger::new("td", "6"));
        pattern.add_trigger(0, Tstamp::new(4, 0), Trigger::new("n-", "null"));
        sine_module(pattern)
    };

    let mut small = new_player(build());
    let small_render = render_all(&mut small, 97);

    let mut large = new_player(build());
    let large_render = render_all(&mut large, 4096);

    assert_eq!(small_render.len(), large_render.len());
    assert_eq!(
        small_render, large_render,
        "block subdivision must not change the output"
    );
}

#[test]
fn test_thread_count_invariance() {
    // Two channels: with round-robin partitioning every thread count
    // sums the same terms in the same grouping, so the match is
    // bit-exact on this pure-mix path.
    let build = || {
        let mut pattern = Pattern::new(Tstamp::new(8, 0));
        for ch in 0..2 {
            pattern.add_trigger(ch, Tstamp::zero(), Trigger::new("n+", format!("{ch}")));
            pattern.add_trigger(ch, Tstamp::new(4, 0), Trigger::new("n-", "null"));
        }
        sine_module(pattern)
    };

    let mut single = new_player(build());
    let single_render = render_all(&mut single, 2048);

    for threads in [2usize, 4] {
        let mut multi = new_player(build());
        multi.set_thread_count(threads).expect("thread setup");
        let multi_render = render_all(&mut multi, 2048);

        assert_eq!(
            single_render, multi_render,
            "output must not depend on thread count ({threads})"
        );
    }
}

#[test]
fn test_goto_loop_is_bounded() {
    // A goto to the current position advances no musical time; the
    // safety counter must keep playback finite.
    let mut pattern = Pattern::new(Tstamp::new(2, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("mg", "null"));
    pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    let samples = render_all(&mut player, 4096);
    assert_eq!(samples.len() / 2, 48_000, "two beats despite goto loop");
}

#[test]
fn test_goto_forward_skips_rows() {
    // Goto from the row start straight to beat 1: beat 0 is never
    // rendered, so only one beat of audio comes out.
    let mut pattern = Pattern::new(Tstamp::new(2, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("m.gr", "[1, 0]"));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("mg", "null"));
    pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    let samples = render_all(&mut player, 4096);
    assert_eq!(samples.len() / 2, 24_000);
    assert!(first_audible(&samples).is_some(), "the skipped-to note sounds");
}

#[test]
fn test_infinite_mode_loops_past_module_end() {
    let mut pattern = Pattern::new(Tstamp::new(1, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.fire(0, r#"["c.i", true]"#).unwrap();
    for _ in 0..5 {
        player.play(24000);
        assert_eq!(player.get_frames_available(), 24000);
    }
    assert!(!player.has_stopped(), "infinite mode must keep playing");
}

#[test]
fn test_event_buffer_resumption_preserves_sequence() {
    let build = || {
        let mut pattern = Pattern::new(Tstamp::new(2, 0));
        for i in 0..24 {
            pattern.add_trigger(0, Tstamp::zero(), Trigger::new(".f", format!("-{i}")));
        }
        sine_module(pattern)
    };

    // Reference: unbounded event buffer.
    let mut reference = new_player(build());
    reference.play(2048);
    let expected = parse_events(&reference.get_events());

    // Tiny buffer: events arrive across several drains.
    let mut player = Player::new(build(), RATE, BUFFER, 160, 64).expect("player setup");
    player.play(2048);

    let mut collected = parse_events(&player.get_events());
    for _ in 0..100 {
        let more = parse_events(&player.get_events());
        if more.is_empty() {
            break;
        }
        collected.extend(more);
    }

    assert_eq!(
        collected, expected,
        "resumed event stream must match the unbounded one"
    );
}

#[test]
fn test_pause_and_resume() {
    let mut pattern = Pattern::new(Tstamp::new(4, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.play(1000);
    assert_eq!(player.get_frames_available(), 1000);

    player.fire(0, r#"["cpause", null]"#).unwrap();
    let before = player.get_nanoseconds();
    player.play(4800);
    // Paused playback still delivers frames but does not advance.
    assert_eq!(player.get_frames_available(), 4800);

    player.fire(0, r#"["cresume", null]"#).unwrap();
    player.play(1000);
    assert_eq!(player.get_frames_available(), 1000);
    assert!(player.get_nanoseconds() > before);
    assert!(!player.has_stopped());
}

#[test]
fn test_fire_note_and_queries() {
    let pattern = Pattern::new(Tstamp::new(16, 0));
    let mut player = new_player(sine_module(pattern));

    player.fire(0, r#"["n+", 0.0]"#).unwrap();
    player.play(4800);
    let energy: f32 = player.get_audio().iter().map(|s| s.abs()).sum();
    assert!(energy > 0.0, "fired note must sound");

    player.fire(0, r#"["qf", null]"#).unwrap();
    let events = parse_events(&player.get_events());
    let af = events.iter().find(|(_, name, _)| name == "Af");
    assert!(af.is_some(), "qf must produce an Af auto event");

    player.fire(3, r#"["qlocation", null]"#).unwrap();
    let events = parse_events(&player.get_events());
    assert!(events.iter().any(|(ch, name, _)| *ch == 3 && name == "Atrack"));
    assert!(events.iter().any(|(_, name, _)| name == "Arow"));

    player.fire(0, r#"["qvoices", null]"#).unwrap();
    let events = parse_events(&player.get_events());
    let voices = events.iter().find(|(_, name, _)| name == "Avoices");
    assert!(voices.is_some_and(|(_, _, arg)| arg.as_i64().unwrap_or(0) > 0));
    assert!(events.iter().any(|(_, name, _)| name == "Avgroups"));
}

#[test]
fn test_audio_unit_selection() {
    let mut pattern = Pattern::new(Tstamp::new(4, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new(".a", "1"));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));

    let mut module = Module::new();
    module.set_audio_unit(0, AudioUnit::sine_instrument("a"));
    module.set_audio_unit(1, AudioUnit::sine_instrument("b"));
    module
        .connections
        .connect_stereo(DeviceNode::Au(1), DeviceNode::Master);
    module.set_pattern(0, pattern);
    let mut song = Song::new(120.0);
    song.order.push(PatInstRef::new(0, 0));
    module.add_track(song);

    // Only unit 1 is routed to the master, so sound proves the switch.
    let mut player = new_player(Arc::new(module));
    player.play(24000);

    let energy: f32 = player.get_audio().iter().map(|s| s.abs()).sum();
    assert!(energy > 0.0, "note must play on the selected unit");

    let events = parse_events(&player.get_events());
    assert!(!events.iter().any(|(_, name, _)| name == "Aerror"));
}

#[test]
fn test_tuning_state_setup() {
    let pattern = Pattern::new(Tstamp::new(4, 0));
    let mut player = new_player(sine_module(pattern));

    assert!(player.create_tuning_state(0).is_ok());
    assert!(player.create_tuning_state(7).is_err());
}

#[test]
fn test_fire_rejects_malformed_events() {
    let pattern = Pattern::new(Tstamp::new(4, 0));
    let mut player = new_player(sine_module(pattern));

    assert!(player.fire(0, "not json").is_err());
    assert!(player.fire(0, r#"["zzz", 1]"#).is_err());
    assert!(player.fire(0, r#"["n+", "wrong type"]"#).is_err());
    assert!(player.fire(99, r#"["n+", 0.0]"#).is_err());
}

#[test]
fn test_bind_expands_events() {
    use compas_module::{Bind, BindEntry, BindTarget};

    let mut pattern = Pattern::new(Tstamp::new(4, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));

    let mut module = Module::new();
    module.set_audio_unit(0, AudioUnit::sine_instrument("sin"));
    module
        .connections
        .connect_stereo(DeviceNode::Au(0), DeviceNode::Master);
    module.set_pattern(0, pattern);
    let mut song = Song::new(120.0);
    song.order.push(PatInstRef::new(0, 0));
    module.add_track(song);

    let mut bind = Bind::new();
    bind.add_entry(BindEntry {
        event_name: "n+".into(),
        constraints: Vec::new(),
        targets: vec![BindTarget {
            ch_offset: 1,
            desc: r#"["n+", "$ + 12"]"#.into(),
        }],
    });
    module.bind = Some(bind);

    let mut player = new_player(Arc::new(module));
    player.play(2048);

    let events = parse_events(&player.get_events());
    let note_ons: Vec<_> = events.iter().filter(|(_, name, _)| name == "n+").collect();
    assert_eq!(note_ons.len(), 2, "bind must add a second note on");
    assert_eq!(note_ons[0].0, 0);
    assert_eq!(note_ons[1].0, 1);
    assert_eq!(note_ons[1].2.as_f64(), Some(12.0));
}

#[test]
fn test_pattern_playback_loops() {
    let mut pattern = Pattern::new(Tstamp::new(1, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.set_pattern_playback(PatInstRef::new(0, 0), Tstamp::zero());

    // Five beats of a one-beat pattern: still playing.
    for _ in 0..5 {
        player.play(24000);
        assert_eq!(player.get_frames_available(), 24000);
    }
    assert!(!player.has_stopped());
}

#[test]
fn test_trigger_time_invariant_across_rates() {
    // A note at beat 1 of a 120 BPM song starts at 0.5 seconds of wall
    // time whatever the audio rate.
    for rate in [8000, 44100, 48000, 96000] {
        let mut pattern = Pattern::new(Tstamp::new(4, 0));
        pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("n+", "0"));
        let module = sine_module(pattern);
        let mut player = Player::new(module, rate, BUFFER, 0, 64).expect("player setup");

        let mut samples = Vec::new();
        while !player.has_stopped() && samples.len() < 4 * rate as usize {
            player.play(1024);
            samples.extend_from_slice(player.get_audio());
        }

        let start = first_audible(&samples).expect("note must sound");
        let seconds = start as f64 / f64::from(rate);
        assert!(
            (seconds - 0.5).abs() < 0.001,
            "note started at {seconds} s at {rate} Hz"
        );
    }
}

#[test]
fn test_skip_drops_note_events() {
    // Skipping filters note triggers: only control/general/master events
    // run, so a note skipped over leaves no sounding voice behind.
    let mut pattern = Pattern::new(Tstamp::new(4, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.skip(48000); // two beats
    player.play(24000);

    assert_eq!(player.get_frames_available(), 24000);
    let energy: f32 = player.get_audio().iter().map(|s| s.abs()).sum();
    assert_eq!(energy, 0.0, "skipped note must not sound");
}

#[test]
fn test_skip_advances_without_audio() {
    let mut pattern = Pattern::new(Tstamp::new(8, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.skip(300_000);
    assert_eq!(player.get_frames_available(), 0);
    // 8 beats at 120 BPM = 4 seconds; skip clamps at module end.
    assert_eq!(player.get_nanoseconds(), 4_000_000_000);
    assert!(player.has_stopped());
}

#[test]
fn test_nanoseconds_stable_across_rate_change() {
    let mut pattern = Pattern::new(Tstamp::new(32, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    let mut player = new_player(sine_module(pattern));

    player.play(24000); // 0.5 s
    player.set_audio_rate(96000).unwrap();
    player.play(48000); // another 0.5 s at the new rate

    let ns = player.get_nanoseconds();
    assert!(
        (ns - 1_000_000_000).abs() < 1_000_000,
        "expected about one second, got {ns} ns"
    );
}

#[test]
fn test_volume_slide_is_applied() {
    let mut pattern = Pattern::new(Tstamp::new(4, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));
    pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("m/=v", "[1, 0]"));
    pattern.add_trigger(0, Tstamp::new(1, 0), Trigger::new("m/v", "-60"));
    let mut player = new_player(sine_module(pattern));

    let samples = render_all(&mut player, 2048);

    // Peak level in the first beat vs the last beat: the slide to -60 dB
    // must make the tail much quieter.
    let first: f32 = samples[..48000]
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()));
    let last: f32 = samples[samples.len() - 48000..]
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()));
    assert!(first > 0.1);
    assert!(last < first / 50.0, "master volume slide not applied");
}

#[test]
fn test_test_output_bypasses_mixing() {
    let mut pattern = Pattern::new(Tstamp::new(4, 0));
    pattern.add_trigger(0, Tstamp::zero(), Trigger::new("n+", "0"));

    // Route the instrument through a heavy attenuator so the regular
    // mixed path is much quieter than the direct test path.
    let mut module = Module::new();
    module.set_audio_unit(0, AudioUnit::sine_instrument("sin"));
    module.set_audio_unit(1, AudioUnit::volume_effect("duck", -60.0));
    module
        .connections
        .connect_stereo(DeviceNode::Au(0), DeviceNode::Au(1));
    module
        .connections
        .connect_stereo(DeviceNode::Au(1), DeviceNode::Master);
    module.set_pattern(0, pattern);
    let mut song = Song::new(120.0);
    song.order.push(PatInstRef::new(0, 0));
    module.add_track(song);
    let module = Arc::new(module);

    let mut regular = new_player(Arc::clone(&module));
    regular.play(24000);
    let regular_peak = regular
        .get_audio()
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()));

    let mut test_routed = new_player(module);
    test_routed.set_channel_test_output(0, true);
    test_routed.play(24000);
    let test_peak = test_routed
        .get_audio()
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()));

    assert!(
        test_peak > regular_peak * 100.0,
        "test output must bypass the attenuated mix path \
         (test {test_peak}, regular {regular_peak})"
    );
}
