//! Typed uniform blocks.
//!
//! Shader parameters are split by how often they change. [`SimParams`] holds
//! the configuration and is uploaded when the pipeline is built and again
//! only if it changes. [`FrameParams`] carries the pointer and emission state
//! and is uploaded once per frame. Both are `Pod` structs whose layout
//! matches the WGSL structs in [`UNIFORMS_WGSL`].

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::grid::grid_width;
use crate::physics::EdgePolicy;

/// Simulation constants, bound at group 0 binding 0 of every kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub gravity: f32,
    pub damping: f32,
    pub cell_size: f32,
    pub spawn_radius: f32,
    pub jitter_scale: f32,
    pub particle_size: f32,
    pub grid_width: u32,
    pub max_per_cell: u32,
    pub max_particles: u32,
    pub edge_policy: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl SimParams {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            gravity: config.gravity,
            damping: config.damping,
            cell_size: config.cell_size,
            spawn_radius: config.spawn_radius,
            jitter_scale: config.jitter_scale,
            particle_size: config.particle_size,
            grid_width: config.grid_width(),
            max_per_cell: config.max_particles_per_cell,
            max_particles: config.max_particles,
            edge_policy: config.edge_policy as u32,
            _pad0: 0,
            _pad1: 0,
        }
    }

    pub fn edge_policy(&self) -> EdgePolicy {
        EdgePolicy::from_u32(self.edge_policy)
    }

    /// Check raw parameters the way [`SimConfig::validate`] checks a config.
    ///
    /// `grid_width` must be the width derived from `cell_size`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size > 0.0 && self.cell_size <= 2.0)
            || self.grid_width != grid_width(self.cell_size)
        {
            return Err(ConfigError::CellSize(self.cell_size));
        }
        if self.particle_size * 2.0 > self.cell_size {
            return Err(ConfigError::ParticleTooLarge {
                size: self.particle_size,
                cell_size: self.cell_size,
            });
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(ConfigError::Damping(self.damping));
        }
        for value in [self.spawn_radius, self.jitter_scale] {
            if value < 0.0 {
                return Err(ConfigError::NegativeSpawn(value));
            }
        }
        Ok(())
    }
}

impl From<&SimConfig> for SimParams {
    fn from(config: &SimConfig) -> Self {
        Self::from_config(config)
    }
}

/// Per-frame inputs, bound at group 0 binding 1 of every kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameParams {
    /// Pointer position in NDC.
    pub pointer: [f32; 2],
    /// Seconds since start; feeds the spawn jitter hash.
    pub time: f32,
    /// Pointer button id, 1..=3.
    pub button: u32,
    /// 1 when this frame emits.
    pub emit: u32,
    pub emit_start: u32,
    pub emit_end: u32,
    /// Number of slots the kernels process (the particle offset).
    pub active_count: u32,
}

impl FrameParams {
    pub fn pointer(&self) -> Vec2 {
        Vec2::from(self.pointer)
    }

    pub fn is_emitting(&self) -> bool {
        self.emit != 0
    }

    /// Whether slot `index` is (re)spawned this frame.
    #[inline]
    pub fn emits(&self, index: u32) -> bool {
        self.is_emitting() && index >= self.emit_start && index < self.emit_end
    }
}

/// Host copy of a uniform block that remembers whether it needs uploading.
#[derive(Clone, Debug)]
pub struct UniformSlot<T> {
    value: T,
    dirty: bool,
}

impl<T: Copy + PartialEq> UniformSlot<T> {
    /// New slot; the first [`take_dirty`](Self::take_dirty) yields the value.
    pub fn new(value: T) -> Self {
        Self { value, dirty: true }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Store `value`, marking the slot dirty only if it differs.
    pub fn set(&mut self, value: T) {
        if value != self.value {
            self.value = value;
            self.dirty = true;
        }
    }

    /// The value, if it changed since the last call.
    pub fn take_dirty(&mut self) -> Option<T> {
        if std::mem::take(&mut self.dirty) {
            Some(self.value)
        } else {
            None
        }
    }
}

/// WGSL declarations of [`SimParams`] and [`FrameParams`].
pub const UNIFORMS_WGSL: &str = r#"
struct SimParams {
    gravity: f32,
    damping: f32,
    cell_size: f32,
    spawn_radius: f32,
    jitter_scale: f32,
    particle_size: f32,
    grid_width: u32,
    max_per_cell: u32,
    max_particles: u32,
    edge_policy: u32,
    _pad0: u32,
    _pad1: u32,
};

struct FrameParams {
    pointer: vec2<f32>,
    time: f32,
    button: u32,
    emit: u32,
    emit_start: u32,
    emit_end: u32,
    active_count: u32,
};
"#;
