//! Error types for Grainflow.
//!
//! Capacity exhaustion and grid-cell overflow are not errors here: both are
//! silent ceilings of the simulation, not failures. Everything here is fatal to
//! the simulation that raised it.

use std::fmt;

/// Invalid simulation configuration, reported by [`SimConfig::validate`].
///
/// [`SimConfig::validate`]: crate::SimConfig::validate
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Cell size must be positive and no larger than the [-1, 1] domain.
    CellSize(f32),
    /// The particle store needs room for at least one particle.
    ZeroCapacity,
    /// Each press-frame must emit at least one particle.
    ZeroBatch,
    /// The emission batch cannot exceed the store capacity.
    BatchExceedsCapacity { batch: u32, capacity: u32 },
    /// Grid cells must hold at least one particle index.
    ZeroCellCapacity,
    /// A particle diameter wider than a cell escapes the 3x3 neighbour scan.
    ParticleTooLarge { size: f32, cell_size: f32 },
    /// Damping is a velocity multiplier in [0, 1].
    Damping(f32),
    /// Spawn radius and jitter scale cannot be negative.
    NegativeSpawn(f32),
    /// Grid dimensions and capacity are fixed once buffers exist.
    LayoutChanged,
    /// The grid's slot storage would not be addressable with `u32` indices.
    GridTooLarge { width: u32, max_per_cell: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::CellSize(size) => {
                write!(f, "Cell size {} must be in (0, 2]", size)
            }
            ConfigError::ZeroCapacity => write!(f, "Max particles must be greater than zero"),
            ConfigError::ZeroBatch => write!(f, "Particles to create per frame must be greater than zero"),
            ConfigError::BatchExceedsCapacity { batch, capacity } => write!(
                f,
                "Emission batch of {} exceeds the particle capacity of {}",
                batch, capacity
            ),
            ConfigError::ZeroCellCapacity => {
                write!(f, "Max particles per cell must be greater than zero")
            }
            ConfigError::ParticleTooLarge { size, cell_size } => write!(
                f,
                "Particle radius {} is larger than half the cell size {}",
                size, cell_size
            ),
            ConfigError::Damping(d) => write!(f, "Damping {} must be in [0, 1]", d),
            ConfigError::NegativeSpawn(v) => {
                write!(f, "Spawn radius and jitter scale must not be negative (got {})", v)
            }
            ConfigError::LayoutChanged => {
                write!(f, "Grid layout and capacity cannot change after the pipeline is built")
            }
            ConfigError::GridTooLarge { width, max_per_cell } => write!(
                f,
                "A {}x{} grid with {} slots per cell exceeds {} slots",
                width,
                width,
                max_per_cell,
                u32::MAX
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can occur during GPU initialization.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The surface reports no texture format usable by the adapter.
    NoSurfaceFormat,
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Compute shaders need Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::NoSurfaceFormat => write!(f, "Surface is not compatible with the selected adapter"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur when running a simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// The configuration was rejected before any resource was created.
    Config(ConfigError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
            SimulationError::Config(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
            SimulationError::Config(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::BatchExceedsCapacity { batch: 20, capacity: 16 };
        assert_eq!(
            err.to_string(),
            "Emission batch of 20 exceeds the particle capacity of 16"
        );
    }

    #[test]
    fn test_simulation_error_wraps_config() {
        let err: SimulationError = ConfigError::ZeroCapacity.into();
        assert!(err.to_string().starts_with("Invalid configuration"));
        assert!(err.source().is_some());
    }
}
