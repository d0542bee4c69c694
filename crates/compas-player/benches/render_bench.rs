//! Criterion benchmarks for the render loop
//!
//! Run with: cargo bench -p compas-player

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use compas_core::position::PatInstRef;
use compas_core::tstamp::Tstamp;
use compas_module::{AudioUnit, DeviceNode, Module, Pattern, Song, Trigger, TuningTable};
use compas_player::Player;

const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn bench_module(channel_count: usize) -> Arc<Module> {
    let mut module = Module::new();
    module.set_audio_unit(0, AudioUnit::sine_instrument("sin"));
    module.set_tuning_table(0, TuningTable::twelve_tone_equal());
    module
        .connections
        .connect_stereo(DeviceNode::Au(0), DeviceNode::Master);

    let mut pattern = Pattern::new(Tstamp::new(64, 0));
    for ch in 0..channel_count {
        for beat in 0..64 {
            pattern.add_trigger(
                ch,
                Tstamp::new(beat, 0),
                Trigger::new("n+", format!("{}", (beat % 12) as f64)),
            );
        }
    }
    module.set_pattern(0, pattern);

    let mut song = Song::new(120.0);
    song.order.push(PatInstRef::new(0, 0));
    module.add_track(song);

    Arc::new(module)
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("Player::play");

    for &channels in &[1usize, 4, 16] {
        let module = bench_module(channels);
        for &block_size in BLOCK_SIZES {
            group.bench_with_input(
                BenchmarkId::new(format!("{channels}ch"), block_size),
                &block_size,
                |b, &size| {
                    let mut player = Player::new(Arc::clone(&module), 48000, 4096, 0, 256)
                        .expect("player");
                    b.iter(|| {
                        if player.has_stopped() {
                            player.reset(0);
                        }
                        player.play(size);
                        black_box(player.get_frames_available())
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_skip(c: &mut Criterion) {
    let module = bench_module(4);
    c.bench_function("Player::skip 1s", |b| {
        let mut player = Player::new(Arc::clone(&module), 48000, 4096, 0, 256).expect("player");
        b.iter(|| {
            player.reset(0);
            player.skip(48000);
            black_box(player.get_nanoseconds())
        })
    });
}

criterion_group!(benches, bench_render, bench_skip);
criterion_main!(benches);
