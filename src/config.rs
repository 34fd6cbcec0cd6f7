//! Simulation configuration.
//!
//! Every tunable of the simulation lives in [`SimConfig`]. Values are fixed
//! for the lifetime of a [`SimulationContext`](crate::SimulationContext); the
//! GPU sees them through the typed [`SimParams`](crate::uniforms::SimParams)
//! uniform block built from this struct.
//!
//! # Example
//!
//! ```
//! use grainflow::{EdgePolicy, SimConfig};
//!
//! let config = SimConfig::default()
//!     .with_cell_size(0.01)
//!     .with_max_particles(50_000)
//!     .with_edge_policy(EdgePolicy::Contain);
//!
//! assert_eq!(config.grid_width(), 200);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::ConfigError;
use crate::grid::grid_width;
use crate::physics::EdgePolicy;

/// Number of particle slots allotted per grid cell by the default capacity.
const DEFAULT_PARTICLES_PER_GRID_CELL: u32 = 10;

/// Tunable parameters of a simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimConfig {
    /// Capacity of each particle buffer.
    pub max_particles: u32,
    /// Particles emitted per frame while the pointer is held.
    pub particles_to_create: u32,
    /// Edge length of a grid cell in NDC units.
    pub cell_size: f32,
    /// Maximum particle indices a grid cell holds per frame.
    pub max_particles_per_cell: u32,
    /// Particle radius.
    pub particle_size: f32,
    /// Radius of the jitter disk around the pointer.
    pub spawn_radius: f32,
    /// Scales the spawn offset into the initial velocity.
    pub jitter_scale: f32,
    /// Added to vertical velocity every frame (negative pulls down).
    pub gravity: f32,
    /// Velocity multiplier applied every frame.
    pub damping: f32,
    /// What happens at the edges of the [-1, 1] domain.
    pub edge_policy: EdgePolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        let cell_size = 0.015;
        let width = grid_width(cell_size);
        Self {
            max_particles: width * width * DEFAULT_PARTICLES_PER_GRID_CELL,
            particles_to_create: 10,
            cell_size,
            max_particles_per_cell: 4,
            particle_size: cell_size * 0.5,
            spawn_radius: 0.01,
            jitter_scale: 0.05,
            gravity: -0.0001,
            damping: 0.99,
            edge_policy: EdgePolicy::Open,
        }
    }
}

impl SimConfig {
    /// Set the particle buffer capacity.
    pub fn with_max_particles(mut self, max_particles: u32) -> Self {
        self.max_particles = max_particles;
        self
    }

    /// Set how many particles each pressed frame emits.
    pub fn with_particles_to_create(mut self, count: u32) -> Self {
        self.particles_to_create = count;
        self
    }

    /// Set the grid cell size.
    ///
    /// The particle radius is clamped to half the new cell size so the
    /// neighbour scan stays complete.
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self.particle_size = self.particle_size.min(cell_size * 0.5);
        self
    }

    /// Set the per-cell occupancy cap.
    pub fn with_max_particles_per_cell(mut self, count: u32) -> Self {
        self.max_particles_per_cell = count;
        self
    }

    /// Set the particle radius.
    pub fn with_particle_size(mut self, size: f32) -> Self {
        self.particle_size = size;
        self
    }

    /// Set the spawn jitter radius.
    pub fn with_spawn_radius(mut self, radius: f32) -> Self {
        self.spawn_radius = radius;
        self
    }

    /// Set how much of the spawn offset becomes initial velocity.
    pub fn with_jitter_scale(mut self, scale: f32) -> Self {
        self.jitter_scale = scale;
        self
    }

    /// Set the per-frame gravity increment.
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the per-frame velocity damping.
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    /// Set the domain edge policy.
    pub fn with_edge_policy(mut self, policy: EdgePolicy) -> Self {
        self.edge_policy = policy;
        self
    }

    /// Number of cells along each axis of the grid.
    pub fn grid_width(&self) -> u32 {
        grid_width(self.cell_size)
    }

    /// Total number of grid cells.
    pub fn cell_count(&self) -> u64 {
        let width = self.grid_width() as u64;
        width * width
    }

    /// Total number of grid slots, if it fits the `u32` indices the kernels use.
    pub fn slot_count(&self) -> Option<u32> {
        let width = self.grid_width();
        width
            .checked_mul(width)
            .and_then(|cells| cells.checked_mul(self.max_particles_per_cell))
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size > 0.0 && self.cell_size <= 2.0) {
            return Err(ConfigError::CellSize(self.cell_size));
        }
        if self.max_particles == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.particles_to_create == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if self.particles_to_create > self.max_particles {
            return Err(ConfigError::BatchExceedsCapacity {
                batch: self.particles_to_create,
                capacity: self.max_particles,
            });
        }
        if self.max_particles_per_cell == 0 {
            return Err(ConfigError::ZeroCellCapacity);
        }
        if self.slot_count().is_none() {
            return Err(ConfigError::GridTooLarge {
                width: self.grid_width(),
                max_per_cell: self.max_particles_per_cell,
            });
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid_width(), 134);
        assert_eq!(config.max_particles, 134 * 134 * 10);
    }

    #[test]
    fn test_grid_width_for_hundredth_cells() {
        let config = SimConfig::default().with_cell_size(0.01);
        assert_eq!(config.grid_width(), 200);
        assert_eq!(config.cell_count(), 40_000);
    }

    #[test]
    fn test_cell_size_shrinks_particle() {
        let config = SimConfig::default().with_cell_size(0.004);
        assert!(config.particle_size <= 0.002);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = SimConfig::default();

        assert_eq!(
            base.with_cell_size(0.0).validate(),
            Err(ConfigError::CellSize(0.0))
        );
        assert_eq!(
            base.with_max_particles(0).validate(),
            Err(ConfigError::ZeroCapacity)
        );
        assert_eq!(
            base.with_particles_to_create(0).validate(),
            Err(ConfigError::ZeroBatch)
        );
        assert_eq!(
            base.with_max_particles(8).with_particles_to_create(9).validate(),
            Err(ConfigError::BatchExceedsCapacity { batch: 9, capacity: 8 })
        );
        assert_eq!(
            base.with_max_particles_per_cell(0).validate(),
            Err(ConfigError::ZeroCellCapacity)
        );
        assert!(matches!(
            base.with_particle_size(0.5).validate(),
            Err(ConfigError::ParticleTooLarge { .. })
        ));
        assert_eq!(base.with_damping(1.5).validate(), Err(ConfigError::Damping(1.5)));
        assert_eq!(
            base.with_spawn_radius(-0.1).validate(),
            Err(ConfigError::NegativeSpawn(-0.1))
        );
    }

    #[test]
    fn test_tiny_cells_rejected() {
        let config = SimConfig::default()
            .with_cell_size(2.0e-5)
            .with_particle_size(5.0e-6);
        assert_eq!(config.grid_width(), 100_000);
        assert_eq!(config.cell_count(), 10_000_000_000);
        assert_eq!(config.slot_count(), None);
        assert_eq!(
            config.validate(),
            Err(ConfigError::GridTooLarge {
                width: 100_000,
                max_per_cell: 4
            })
        );
    }

    #[test]
    fn test_slot_count_at_limit() {
        // 65536 * 65536 overflows u32 on its own
        let config = SimConfig::default()
            .with_max_particles_per_cell(1)
            .with_cell_size(2.0 / 65_536.0);
        assert!(config.slot_count().is_none());

        let config = SimConfig::default().with_max_particles_per_cell(1).with_cell_size(0.001);
        assert_eq!(config.slot_count(), Some(2000 * 2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nan_cell_size_rejected() {
        let config = SimConfig::default().with_cell_size(f32::NAN);
        assert!(matches!(config.validate(), Err(ConfigError::CellSize(_))));
    }
}
