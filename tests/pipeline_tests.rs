//! End-to-end tests of the update pipeline on the CPU backend.
//!
//! These drive whole frames through `SimulationContext` / `UpdatePipeline`
//! and check the properties the simulation promises: the particle offset
//! only grows, emitted slots stay active, grid cells never overflow, and a
//! frame never writes the buffer it reads.

use std::collections::HashSet;

use grainflow::{
    grid_width, CpuBackend, EdgePolicy, FrameParams, MouseButton, Particle, SimConfig,
    SimulationContext, UpdatePipeline, Vec2,
};
use rand::Rng;

fn context(config: SimConfig) -> SimulationContext<CpuBackend> {
    let mut sim = SimulationContext::new(CpuBackend::new(), config).unwrap();
    sim.pointer_mut().set_window_size(800, 800);
    sim.pointer_mut().set_position(400.0, 400.0);
    sim
}

fn pipeline(config: SimConfig) -> UpdatePipeline<CpuBackend> {
    UpdatePipeline::new(CpuBackend::new(), &config).unwrap()
}

fn particle_at(pos: Vec2, vel: Vec2, size: f32) -> Particle {
    let mut p = Particle {
        size,
        active: 1,
        ..Default::default()
    };
    p.set_pos(pos);
    p.set_vel(vel);
    p
}

fn run(active_count: u32) -> FrameParams {
    FrameParams {
        active_count,
        ..Default::default()
    }
}

// ============================================================================
// Emission
// ============================================================================

#[test]
fn test_offset_grows_by_batch_while_pressed() {
    let config = SimConfig::default()
        .with_max_particles(16)
        .with_particles_to_create(4);
    let mut sim = context(config);

    let mut offsets = vec![sim.active_count()];
    sim.pointer_mut().set_button(MouseButton::Left, true);
    for frame in 0..3 {
        sim.step(frame as f32 * 0.016);
        offsets.push(sim.active_count());
    }
    assert_eq!(offsets, vec![0, 4, 8, 12]);

    sim.pointer_mut().set_button(MouseButton::Left, false);
    let idle = sim.step(0.064);
    assert_eq!(sim.active_count(), 12);
    assert_eq!(idle.emit, 0);

    let front = sim.front();
    assert!(front[..12].iter().all(Particle::is_active));
    assert!(front[12..].iter().all(|p| !p.is_active()));
}

#[test]
fn test_emitted_particles_stay_near_pointer() {
    let config = SimConfig::default()
        .with_max_particles(1000)
        .with_particles_to_create(100)
        .with_spawn_radius(0.01)
        .with_jitter_scale(0.05);
    let mut sim = context(config);
    sim.pointer_mut().set_button(MouseButton::Left, true);

    let frame = sim.step(2.5);
    assert_eq!(frame.pointer, [0.0, 0.0]);

    for p in &sim.front()[..100] {
        assert!(p.pos().length() <= 0.01 + 1e-6, "position {:?}", p.position);
        assert!(p.vel().length() <= 0.01 * 0.05 + 1e-7, "velocity {:?}", p.velocity);
        assert_eq!(p.size, config.particle_size);
    }
}

#[test]
fn test_button_selects_material_color() {
    let config = SimConfig::default().with_max_particles(100);
    let mut sim = context(config);

    sim.pointer_mut().set_button(MouseButton::Right, true);
    sim.step(0.0);
    sim.pointer_mut().set_button(MouseButton::Right, false);
    sim.pointer_mut().set_button(MouseButton::Left, true);
    sim.step(0.1);

    let front = sim.front();
    // water first, then sand
    assert!(front[0].color[2] > front[0].color[0]);
    assert!(front[10].color[0] > front[10].color[2]);
}

#[test]
fn test_offset_monotonic_under_random_presses() {
    let mut rng = rand::thread_rng();
    let config = SimConfig::default()
        .with_max_particles(300)
        .with_particles_to_create(7);
    let mut sim = context(config);

    let mut previous = 0;
    for frame in 0..120 {
        sim.pointer_mut().set_button(MouseButton::Left, rng.gen_bool(0.5));
        sim.step(frame as f32 / 60.0);

        let offset = sim.active_count();
        assert!(offset >= previous);
        assert!(offset <= 300);
        previous = offset;
    }
}

#[test]
fn test_active_prefix_and_no_despawn() {
    let mut rng = rand::thread_rng();
    let config = SimConfig::default()
        .with_max_particles(200)
        .with_particles_to_create(9)
        .with_edge_policy(EdgePolicy::Wrap);
    let mut sim = context(config);

    let mut ever_active: HashSet<usize> = HashSet::new();
    for frame in 0..80 {
        let x = rng.gen_range(0.0..800.0);
        let y = rng.gen_range(0.0..800.0);
        sim.pointer_mut().set_position(x, y);
        sim.pointer_mut().set_button(MouseButton::Middle, rng.gen_bool(0.7));
        sim.step(frame as f32 / 60.0);

        let offset = sim.active_count() as usize;
        let front = sim.front();
        for (i, p) in front.iter().enumerate() {
            assert_eq!(p.is_active(), i < offset, "slot {} at offset {}", i, offset);
            if p.is_active() {
                ever_active.insert(i);
            }
        }
        assert!(ever_active.iter().all(|&i| front[i].is_active()));
    }
    assert_eq!(sim.active_count(), 200);
}

// ============================================================================
// Integration
// ============================================================================

#[test]
fn test_single_step_gravity_and_damping() {
    let config = SimConfig::default()
        .with_max_particles(4)
        .with_particles_to_create(1)
        .with_gravity(-0.001)
        .with_damping(0.99);
    let mut pipeline = pipeline(config);

    let start = Vec2::new(0.25, 0.75);
    pipeline.front_mut()[0] = particle_at(start, Vec2::new(0.0, -0.01), config.particle_size);
    pipeline.run_frame(&run(1));

    let p = pipeline.front()[0];
    assert!(p.velocity[0].abs() < 1e-9);
    assert!((p.velocity[1] + 0.01089).abs() < 1e-7);
    assert!((p.pos() - (start + p.vel())).length() < 1e-6);
    assert!(!p.is_resting());
}

#[test]
fn test_column_settles_on_floor() {
    let config = SimConfig::default()
        .with_max_particles(64)
        .with_particles_to_create(1)
        .with_edge_policy(EdgePolicy::Contain);
    let size = config.particle_size;
    let mut pipeline = pipeline(config);

    let count = 10;
    for i in 0..count {
        let y = 0.5 + i as f32 * 0.05;
        pipeline.front_mut()[i] = particle_at(Vec2::new(0.0, y), Vec2::ZERO, size);
    }

    for _ in 0..2000 {
        pipeline.run_frame(&run(count as u32));
    }

    let front = &pipeline.front()[..count];
    assert!(front.iter().all(Particle::is_resting));
    assert!(front[0].position[1] <= -1.0 + size + 1e-4);
    for pair in front.windows(2) {
        let gap = pair[1].position[1] - pair[0].position[1];
        assert!(gap > 0.0 && gap < 2.0 * size + 1e-6, "gap {}", gap);
    }
}

#[test]
fn test_particle_falls_again_when_support_moves() {
    let config = SimConfig::default()
        .with_max_particles(4)
        .with_particles_to_create(1);
    let size = config.particle_size;
    let mut pipeline = pipeline(config);
    pipeline.front_mut()[0] = particle_at(Vec2::new(0.0, 0.0), Vec2::ZERO, size);
    pipeline.front_mut()[1] = particle_at(Vec2::new(0.0, 0.012), Vec2::ZERO, size);

    pipeline.run_frame(&run(2));
    let upper = pipeline.front()[1];
    assert!(upper.is_resting());
    assert_eq!(upper.velocity[1], 0.0);
    assert!(!pipeline.front()[0].is_resting());

    // pull the support out from under it
    pipeline.front_mut()[0].set_pos(Vec2::new(0.5, -0.5));
    pipeline.run_frame(&run(2));
    let released = pipeline.front()[1];
    assert!(!released.is_resting());
    assert_eq!(released.position, upper.position);

    pipeline.run_frame(&run(2));
    let falling = pipeline.front()[1];
    assert!(falling.velocity[1] < 0.0);
    assert!(falling.position[1] < upper.position[1]);
}

#[test]
fn test_open_edges_let_particles_fall_out() {
    let config = SimConfig::default()
        .with_max_particles(4)
        .with_particles_to_create(1);
    let mut pipeline = pipeline(config);
    pipeline.front_mut()[0] =
        particle_at(Vec2::new(0.0, -0.99), Vec2::new(0.0, -0.02), config.particle_size);

    pipeline.run_frame(&run(1));

    let p = pipeline.front()[0];
    assert!(p.position[1] < -1.0);
    assert!(p.is_active());
}

// ============================================================================
// Grid
// ============================================================================

#[test]
fn test_grid_width_for_cell_size() {
    assert_eq!(grid_width(0.01), 200);
    assert_eq!(SimConfig::default().with_cell_size(0.01).grid_width(), 200);
}

#[test]
fn test_full_cell_excludes_third_particle() {
    let config = SimConfig::default()
        .with_max_particles(8)
        .with_particles_to_create(1)
        .with_cell_size(0.1)
        .with_particle_size(0.005)
        .with_max_particles_per_cell(2);
    let mut pipeline = pipeline(config);

    for (i, x) in [0.01, 0.03, 0.05].into_iter().enumerate() {
        pipeline.front_mut()[i] = particle_at(Vec2::new(x, 0.5), Vec2::ZERO, 0.005);
    }
    pipeline.run_frame(&run(3));

    let grid = pipeline.grid();
    let after_first: Vec<Particle> = pipeline.front()[..3].to_vec();
    let cell = grid.cell_index(grid.cell_coord(after_first[0].pos()));
    for p in &after_first {
        assert_eq!(grid.cell_index(grid.cell_coord(p.pos())), cell);
        assert!(p.is_active());
    }
    assert_eq!(grid.count(cell), 2);
    assert_eq!(grid.dropped(), 1);
    assert_eq!(pipeline.backend().last_overflow(), 1);

    pipeline.run_frame(&run(3));
    for (before, after) in after_first.iter().zip(&pipeline.front()[..3]) {
        assert!(after.is_active());
        assert!(after.position[1] < before.position[1]);
    }
}

#[test]
fn test_grid_cells_never_overflow() {
    let config = SimConfig::default()
        .with_max_particles(2000)
        .with_particles_to_create(25)
        .with_cell_size(0.02)
        .with_max_particles_per_cell(2);
    let mut sim = context(config);
    sim.pointer_mut().set_button(MouseButton::Left, true);

    for frame in 0..60 {
        sim.step(frame as f32 / 60.0);

        let grid = sim.pipeline().grid();
        let front = sim.front();
        let mut seen = HashSet::new();

        for cell in 0..grid.cell_count() {
            assert!(grid.count(cell) <= 2);
            for j in grid.occupants(cell) {
                assert!(j < sim.active_count());
                assert!(seen.insert(j), "particle {} listed twice", j);
                let coord = grid.cell_coord(front[j as usize].pos());
                assert_eq!(grid.cell_index(coord), cell);
            }
        }
        assert_eq!(grid.occupied() + grid.dropped(), sim.active_count());
    }
}

// ============================================================================
// Buffer roles
// ============================================================================

#[test]
fn test_frame_never_writes_read_buffer() {
    let config = SimConfig::default()
        .with_max_particles(500)
        .with_particles_to_create(50)
        .with_edge_policy(EdgePolicy::Contain);
    let mut sim = context(config);
    sim.pointer_mut().set_button(MouseButton::Left, true);

    let mut fronts = Vec::new();
    for frame in 0..10 {
        let read_ptr = sim.front().as_ptr();
        let read_snapshot = sim.front().clone();

        sim.step(frame as f32 / 60.0);

        assert_ne!(sim.front().as_ptr(), read_ptr);
        assert_eq!(sim.pipeline().particles().back(), &read_snapshot);
        fronts.push(sim.pipeline().particles().front_index());
    }

    for pair in fronts.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}
