//! Benchmarks for the CPU reference pipeline.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use grainflow::physics::{integrate, resolve};
use grainflow::{
    CpuBackend, EdgePolicy, FrameParams, Particle, SimConfig, SimParams, SpatialGrid,
    UpdatePipeline, Vec2,
};
use rand::Rng;

fn scattered(count: usize, size: f32) -> Vec<Particle> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let mut p = Particle {
                size,
                active: 1,
                id: i as u32,
                ..Default::default()
            };
            p.set_pos(Vec2::new(rng.gen_range(-0.95..0.95), rng.gen_range(-0.95..0.95)));
            p.set_vel(Vec2::new(0.0, rng.gen_range(-0.01..0.0)));
            p
        })
        .collect()
}

fn bench_run_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_frame");
    group.sample_size(20);

    for count in [1_000u32, 10_000, 50_000] {
        let config = SimConfig::default()
            .with_max_particles(count)
            .with_edge_policy(EdgePolicy::Contain);
        let mut pipeline = match UpdatePipeline::new(CpuBackend::new(), &config) {
            Ok(pipeline) => pipeline,
            Err(e) => panic!("bench config rejected: {e}"),
        };
        *pipeline.front_mut() = scattered(count as usize, config.particle_size);
        let frame = FrameParams {
            active_count: count,
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(count), &frame, |b, frame| {
            b.iter(|| pipeline.run_frame(black_box(frame)))
        });
    }

    group.finish();
}

fn bench_grid(c: &mut Criterion) {
    let config = SimConfig::default();
    let sim = SimParams::from_config(&config);
    let particles = scattered(20_000, config.particle_size);
    let mut grid = SpatialGrid::new(config.cell_size, config.max_particles_per_cell);

    c.bench_function("grid_build_20k", |b| {
        b.iter(|| {
            grid.clear();
            for (i, p) in particles.iter().enumerate() {
                let cell = grid.cell_index(grid.cell_coord(p.pos()));
                grid.try_insert(cell, i as u32);
            }
            black_box(grid.occupied())
        })
    });

    c.bench_function("resolve_20k", |b| {
        b.iter(|| {
            let mut hits = 0u32;
            for i in 0..particles.len() as u32 {
                if resolve(i, &particles, &grid, &sim).is_some() {
                    hits += 1;
                }
            }
            black_box(hits)
        })
    });

    c.bench_function("integrate_20k", |b| {
        b.iter(|| {
            particles
                .iter()
                .map(|p| integrate(black_box(p), &sim))
                .fold(0.0f32, |acc, p| acc + p.position[1])
        })
    });
}

criterion_group!(benches, bench_run_frame, bench_grid);
criterion_main!(benches);
