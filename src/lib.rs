//! # Grainflow
//!
//! An interactive falling-particle sandbox. Hold a mouse button and particles
//! pour out of the pointer, fall, and pile up on each other.
//!
//! ## Quick Start
//!
//! ```ignore
//! use grainflow::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     Simulation::new()
//!         .with_config(SimConfig::default().with_edge_policy(EdgePolicy::Contain))
//!         .run()
//! }
//! ```
//!
//! ## How a frame runs
//!
//! Particles live in two buffers of identical capacity. Each frame:
//!
//! 1. the [`EmissionController`] opens a batch of new slots while the pointer
//!    is held;
//! 2. **integrate** reads every slot from the front buffer and writes the
//!    spawned or moved particle into the back buffer;
//! 3. **grid build** clears the [`SpatialGrid`] and inserts every particle
//!    into its cell, dropping insertions into full cells;
//! 4. **resolve** scans each particle's 3x3 cell neighbourhood and marks it
//!    resting when something sits beneath it;
//! 5. the buffers swap and the renderer draws the new front buffer.
//!
//! Every stage is a data-parallel kernel behind the [`ComputeBackend`]
//! trait. [`WgpuBackend`] runs them as compute shaders, [`CpuBackend`] on the
//! rayon thread pool. Both implement the same rules, which are written once
//! in Rust ([`physics`], [`emission`]) and once in WGSL.
//!
//! ## Spatial grid
//!
//! The domain [-1, 1]² is split into square cells of `cell_size`. Each cell
//! holds at most `max_particles_per_cell` particle indices per frame. Slots
//! are reserved with an atomic compare-and-swap, so a crowded cell never
//! overflows its storage; the particles that miss out still move, they are
//! only invisible to neighbour queries for that frame.

pub mod config;
pub mod context;
pub mod cpu;
pub mod emission;
pub mod error;
pub mod gpu;
pub mod grid;
pub mod input;
pub mod particle;
pub mod physics;
pub mod ping_pong;
pub mod pipeline;
mod simulation;
pub mod time;
pub mod uniforms;

pub use bytemuck;
pub use config::SimConfig;
pub use context::SimulationContext;
pub use cpu::CpuBackend;
pub use emission::EmissionController;
pub use error::{ConfigError, GpuError, SimulationError};
pub use glam::{UVec2, Vec2};
pub use gpu::{GpuState, WgpuBackend};
pub use grid::{grid_width, SpatialGrid};
pub use input::{MouseButton, PointerState};
pub use particle::{Material, Particle};
pub use physics::EdgePolicy;
pub use ping_pong::PingPong;
pub use pipeline::{ComputeBackend, Stage, UpdatePipeline, WORKGROUP_SIZE};
pub use simulation::Simulation;
pub use uniforms::{FrameParams, SimParams};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use grainflow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::SimConfig;
    pub use crate::context::SimulationContext;
    pub use crate::cpu::CpuBackend;
    pub use crate::error::SimulationError;
    pub use crate::input::MouseButton;
    pub use crate::particle::{Material, Particle};
    pub use crate::physics::EdgePolicy;
    pub use crate::simulation::Simulation;
    pub use glam::Vec2;
}
