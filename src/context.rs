//! The simulation state a frame loop drives.
//!
//! [`SimulationContext`] owns everything that changes between frames: the
//! emission counter, the pointer, and the update pipeline with its buffers.
//! Nothing lives in globals; the window loop and the tests both drive a
//! simulation by calling [`step`](SimulationContext::step) on a context they
//! own.
//!
//! ```
//! use grainflow::{CpuBackend, MouseButton, SimConfig, SimulationContext};
//!
//! let config = SimConfig::default().with_max_particles(100);
//! let mut sim = SimulationContext::new(CpuBackend::new(), config).unwrap();
//!
//! sim.pointer_mut().set_button(MouseButton::Left, true);
//! sim.step(0.0);
//! sim.step(0.016);
//!
//! assert_eq!(sim.active_count(), 20);
//! ```

use crate::config::SimConfig;
use crate::emission::EmissionController;
use crate::error::ConfigError;
use crate::input::PointerState;
use crate::pipeline::{ComputeBackend, UpdatePipeline};
use crate::uniforms::FrameParams;

pub struct SimulationContext<B: ComputeBackend> {
    config: SimConfig,
    emission: EmissionController,
    pointer: PointerState,
    pipeline: UpdatePipeline<B>,
}

impl<B: ComputeBackend> SimulationContext<B> {
    /// Validate `config` and build the pipeline on `backend`.
    pub fn new(backend: B, config: SimConfig) -> Result<Self, ConfigError> {
        let pipeline = UpdatePipeline::new(backend, &config)?;
        Ok(Self {
            emission: EmissionController::new(&config),
            pointer: PointerState::new(),
            pipeline,
            config,
        })
    }

    /// Advance one frame at `time` seconds and return the uniforms it ran with.
    pub fn step(&mut self, time: f32) -> FrameParams {
        let emitted = self.emission.tick(self.pointer.is_pressed());
        let range = self.emission.emission_range();

        let frame = FrameParams {
            pointer: self.pointer.ndc().to_array(),
            time,
            button: self.pointer.button().id(),
            emit: (emitted > 0) as u32,
            emit_start: range.start,
            emit_end: range.end,
            active_count: self.emission.particle_offset(),
        };
        self.pipeline.run_frame(&frame);
        frame
    }

    /// Change tunables that do not affect buffer sizes.
    pub fn set_config(&mut self, config: SimConfig) -> Result<(), ConfigError> {
        self.pipeline.set_config(&config)?;
        self.emission.set_batch(config.particles_to_create);
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn pointer_mut(&mut self) -> &mut PointerState {
        &mut self.pointer
    }

    pub fn emission(&self) -> &EmissionController {
        &self.emission
    }

    pub fn pipeline(&self) -> &UpdatePipeline<B> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut UpdatePipeline<B> {
        &mut self.pipeline
    }

    /// Particles emitted so far, which is the number the renderer draws.
    pub fn active_count(&self) -> u32 {
        self.emission.particle_offset()
    }

    /// Buffer produced by the last frame.
    pub fn front(&self) -> &B::Particles {
        self.pipeline.front()
    }
}
