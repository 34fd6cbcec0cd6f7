//! Frame orchestration.
//!
//! [`UpdatePipeline`] drives one simulation frame through a fixed sequence of
//! stages and is generic over where the kernels run. A [`ComputeBackend`]
//! supplies buffer allocation, the three kernels, barriers, and the frame
//! fence; [`CpuBackend`](crate::cpu::CpuBackend) runs them on rayon and
//! [`WgpuBackend`](crate::gpu::compute::WgpuBackend) on the GPU.
//!
//! ```text
//! Idle -> Integrate -> GridBuild -> Resolve -> Present -> Idle
//! ```
//!
//! Integrate reads the front buffer and writes the back buffer. Grid build
//! and resolve both work on the back buffer, which becomes the front buffer
//! when the frame ends. Every stage boundary is a full barrier.

use std::fmt;

use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::ping_pong::PingPong;
use crate::uniforms::{FrameParams, SimParams, UniformSlot};

/// Invocations per compute workgroup.
pub const WORKGROUP_SIZE: u32 = 256;

/// Workgroups needed to cover `count` particles.
#[inline]
pub fn workgroups(count: u32) -> u32 {
    count.div_ceil(WORKGROUP_SIZE)
}

/// Where the simulation kernels execute.
///
/// Calls arrive in the order [`UpdatePipeline::run_frame`] documents. Each
/// kernel covers `workgroups * WORKGROUP_SIZE` indices and must skip indices
/// at or above the frame's `active_count`.
pub trait ComputeBackend {
    /// One particle buffer.
    type Particles;
    /// Grid counters and slots.
    type Grid;

    /// Allocate a zeroed particle buffer. `slot` is its ping-pong index.
    fn create_particles(&mut self, capacity: u32, slot: usize) -> Self::Particles;

    /// Allocate an empty grid for `sim`.
    fn create_grid(&mut self, sim: &SimParams) -> Self::Grid;

    /// Called once every buffer exists, before the first frame.
    fn prepare(&mut self, _particles: &PingPong<Self::Particles>, _grid: &Self::Grid) {}

    /// Upload changed simulation constants.
    fn write_sim_params(&mut self, sim: &SimParams);

    /// Upload the frame uniforms and open the frame.
    fn begin_frame(&mut self, frame: &FrameParams);

    /// Zero every cell counter.
    fn clear_grid(&mut self, grid: &mut Self::Grid);

    /// Spawn or integrate each slot from `read` into `write`.
    fn integrate(&mut self, read: &Self::Particles, write: &mut Self::Particles, workgroups: u32);

    /// Insert every active particle into its cell.
    fn build_grid(&mut self, particles: &Self::Particles, grid: &Self::Grid, workgroups: u32);

    /// Update velocity and resting state from the neighbourhood.
    fn resolve(&mut self, particles: &mut Self::Particles, grid: &Self::Grid, workgroups: u32);

    /// Make every write of the previous stage visible to the next.
    fn barrier(&mut self) {}

    /// Close the frame; returns once its work is submitted.
    fn end_frame(&mut self);
}

/// Position of the pipeline within a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Idle,
    Integrate,
    GridBuild,
    Resolve,
    Present,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Integrate => "integrate",
            Stage::GridBuild => "grid build",
            Stage::Resolve => "resolve",
            Stage::Present => "present",
        };
        f.write_str(name)
    }
}

/// Owns the particle buffers and grid, and runs frames on a backend.
pub struct UpdatePipeline<B: ComputeBackend> {
    backend: B,
    particles: PingPong<B::Particles>,
    grid: B::Grid,
    sim: UniformSlot<SimParams>,
    stage: Stage,
    frames: u64,
}

impl<B: ComputeBackend> UpdatePipeline<B> {
    /// Validate `config` and allocate both particle buffers and the grid.
    pub fn new(mut backend: B, config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = SimParams::from_config(config);

        let particles = PingPong::new(
            backend.create_particles(params.max_particles, 0),
            backend.create_particles(params.max_particles, 1),
        );
        let grid = backend.create_grid(&params);
        backend.prepare(&particles, &grid);

        log::info!(
            "Pipeline ready: {} particle slots, {}x{} grid, {} per cell",
            params.max_particles,
            params.grid_width,
            params.grid_width,
            params.max_per_cell
        );

        Ok(Self {
            backend,
            particles,
            grid,
            sim: UniformSlot::new(params),
            stage: Stage::Idle,
            frames: 0,
        })
    }

    /// Replace the simulation constants from the next frame on.
    ///
    /// Fails if `config` is invalid or would change grid dimensions or
    /// capacity, which are fixed by the allocated buffers.
    pub fn set_config(&mut self, config: &SimConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.set_params(SimParams::from_config(config))
    }

    /// Replace the raw simulation constants from the next frame on.
    ///
    /// Rejected like [`set_config`](Self::set_config) when the values are
    /// invalid or the layout differs.
    pub fn set_params(&mut self, params: SimParams) -> Result<(), ConfigError> {
        params.validate()?;
        let current = self.sim.get();
        if params.grid_width != current.grid_width
            || params.max_per_cell != current.max_per_cell
            || params.max_particles != current.max_particles
        {
            return Err(ConfigError::LayoutChanged);
        }
        self.sim.set(params);
        Ok(())
    }

    pub fn params(&self) -> &SimParams {
        self.sim.get()
    }

    /// Run one frame and flip the buffers.
    ///
    /// `active_count` and the emission range are clamped to capacity. With no
    /// active particles the kernels are skipped but the frame still
    /// completes.
    pub fn run_frame(&mut self, frame: &FrameParams) {
        let capacity = self.sim.get().max_particles;
        let frame = FrameParams {
            active_count: frame.active_count.min(capacity),
            emit_end: frame.emit_end.min(capacity),
            ..*frame
        };

        if let Some(params) = self.sim.take_dirty() {
            log::debug!("Uploading simulation parameters");
            self.backend.write_sim_params(&params);
        }
        self.backend.begin_frame(&frame);
        self.backend.clear_grid(&mut self.grid);

        let groups = workgroups(frame.active_count);
        if groups > 0 {
            self.enter(Stage::Integrate);
            let (read, write) = self.particles.split();
            self.backend.integrate(read, write, groups);
            self.backend.barrier();

            self.enter(Stage::GridBuild);
            self.backend.build_grid(self.particles.back(), &self.grid, groups);
            self.backend.barrier();

            self.enter(Stage::Resolve);
            self.backend.resolve(self.particles.back_mut(), &self.grid, groups);
            self.backend.barrier();
        }

        self.enter(Stage::Present);
        self.backend.end_frame();
        self.particles.swap();
        self.frames += 1;
        self.enter(Stage::Idle);
    }

    fn enter(&mut self, stage: Stage) {
        log::trace!("frame {}: {} -> {}", self.frames, self.stage, stage);
        self.stage = stage;
    }

    /// Buffer written by the last frame; what the renderer draws.
    pub fn front(&self) -> &B::Particles {
        self.particles.front()
    }

    /// Front buffer, for seeding particles between frames.
    pub fn front_mut(&mut self) -> &mut B::Particles {
        self.particles.front_mut()
    }

    pub fn particles(&self) -> &PingPong<B::Particles> {
        &self.particles
    }

    pub fn grid(&self) -> &B::Grid {
        &self.grid
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn capacity(&self) -> u32 {
        self.sim.get().max_particles
    }
}
