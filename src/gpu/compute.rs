//! GPU implementation of the simulation kernels.
//!
//! All work of a frame is recorded into one command encoder: the grid clear,
//! then one compute pass per kernel. wgpu synchronises storage buffers between
//! passes, so a pass boundary is the barrier between stages, and the queue
//! submission in [`end_frame`](ComputeBackend::end_frame) is the frame fence.
//!
//! Bind groups are built once per ping-pong parity, so swapping buffers is a
//! matter of picking the other bind group.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::shaders::{grid_build_shader, integrate_shader, resolve_shader};
use crate::particle::Particle;
use crate::ping_pong::PingPong;
use crate::pipeline::ComputeBackend;
use crate::uniforms::{FrameParams, SimParams};

/// One particle storage buffer and its ping-pong index.
pub struct GpuParticles {
    pub buffer: wgpu::Buffer,
    pub slot: usize,
}

/// Grid counters and index slots on the GPU.
pub struct GpuGrid {
    pub counts: wgpu::Buffer,
    pub slots: wgpu::Buffer,
}

struct KernelBindGroups {
    /// Indexed by the slot of the buffer being read.
    integrate: [wgpu::BindGroup; 2],
    /// Indexed by the slot of the buffer being built from.
    grid_build: [wgpu::BindGroup; 2],
    /// Indexed by the slot of the buffer being resolved.
    resolve: [wgpu::BindGroup; 2],
}

/// Runs the kernels as wgpu compute passes.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    sim_buffer: wgpu::Buffer,
    frame_buffer: wgpu::Buffer,
    integrate_pipeline: wgpu::ComputePipeline,
    grid_build_pipeline: wgpu::ComputePipeline,
    resolve_pipeline: wgpu::ComputePipeline,
    bind_groups: Option<KernelBindGroups>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let sim_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sim Params"),
            contents: bytemuck::cast_slice(&[SimParams::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Params"),
            contents: bytemuck::cast_slice(&[FrameParams::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let integrate_module = create_shader(&device, "Integrate Shader", &integrate_shader());
        let grid_build_module = create_shader(&device, "Grid Build Shader", &grid_build_shader());
        let resolve_module = create_shader(&device, "Resolve Shader", &resolve_shader());

        let integrate_pipeline =
            create_compute_pipeline(&device, &integrate_module, "main", "Integrate Pipeline");
        let grid_build_pipeline =
            create_compute_pipeline(&device, &grid_build_module, "main", "Grid Build Pipeline");
        let resolve_pipeline =
            create_compute_pipeline(&device, &resolve_module, "main", "Resolve Pipeline");

        Self {
            device,
            queue,
            sim_buffer,
            frame_buffer,
            integrate_pipeline,
            grid_build_pipeline,
            resolve_pipeline,
            bind_groups: None,
            encoder: None,
        }
    }

    fn dispatch(&mut self, label: &str, kernel: Kernel, slot: usize, workgroups: u32) {
        let Some(groups) = self.bind_groups.as_ref() else {
            log::warn!("{} dispatched before bind groups were prepared", label);
            return;
        };
        let (pipeline, bind_group) = match kernel {
            Kernel::Integrate => (&self.integrate_pipeline, &groups.integrate[slot]),
            Kernel::GridBuild => (&self.grid_build_pipeline, &groups.grid_build[slot]),
            Kernel::Resolve => (&self.resolve_pipeline, &groups.resolve[slot]),
        };

        let encoder = frame_encoder(&self.device, &mut self.encoder);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }
}

#[derive(Clone, Copy)]
enum Kernel {
    Integrate,
    GridBuild,
    Resolve,
}

impl ComputeBackend for WgpuBackend {
    type Particles = GpuParticles;
    type Grid = GpuGrid;

    fn create_particles(&mut self, capacity: u32, slot: usize) -> GpuParticles {
        let label = if slot == 0 { "Particles A" } else { "Particles B" };
        // wgpu zero-initialises new buffers, so every slot starts inactive
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity as u64 * Particle::STRIDE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        GpuParticles { buffer, slot }
    }

    fn create_grid(&mut self, sim: &SimParams) -> GpuGrid {
        let cells = sim.grid_width as u64 * sim.grid_width as u64;
        let word = std::mem::size_of::<u32>() as u64;

        let counts = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Counts"),
            size: cells * word,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let slots = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Slots"),
            size: cells * sim.max_per_cell as u64 * word,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        GpuGrid { counts, slots }
    }

    fn prepare(&mut self, particles: &PingPong<GpuParticles>, grid: &GpuGrid) {
        let [a, b] = particles.buffers();
        let by_slot = |slot: usize| if slot == a.slot { a } else { b };

        let integrate = [0, 1].map(|slot| {
            create_integrate_bind_group(
                &self.device,
                &self.integrate_pipeline,
                &self.sim_buffer,
                &self.frame_buffer,
                &by_slot(slot).buffer,
                &by_slot(1 - slot).buffer,
            )
        });
        let grid_build = [0, 1].map(|slot| {
            create_grid_bind_group(
                &self.device,
                &self.grid_build_pipeline,
                "Grid Build Bind Group",
                &self.sim_buffer,
                &self.frame_buffer,
                &by_slot(slot).buffer,
                grid,
            )
        });
        let resolve = [0, 1].map(|slot| {
            create_grid_bind_group(
                &self.device,
                &self.resolve_pipeline,
                "Resolve Bind Group",
                &self.sim_buffer,
                &self.frame_buffer,
                &by_slot(slot).buffer,
                grid,
            )
        });

        self.bind_groups = Some(KernelBindGroups {
            integrate,
            grid_build,
            resolve,
        });
    }

    fn write_sim_params(&mut self, sim: &SimParams) {
        self.queue
            .write_buffer(&self.sim_buffer, 0, bytemuck::cast_slice(&[*sim]));
    }

    fn begin_frame(&mut self, frame: &FrameParams) {
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[*frame]));
        frame_encoder(&self.device, &mut self.encoder);
    }

    fn clear_grid(&mut self, grid: &mut GpuGrid) {
        let encoder = frame_encoder(&self.device, &mut self.encoder);
        encoder.clear_buffer(&grid.counts, 0, None);
        encoder.clear_buffer(&grid.slots, 0, None);
    }

    fn integrate(&mut self, read: &GpuParticles, _write: &mut GpuParticles, workgroups: u32) {
        self.dispatch("Integrate", Kernel::Integrate, read.slot, workgroups);
    }

    fn build_grid(&mut self, particles: &GpuParticles, _grid: &GpuGrid, workgroups: u32) {
        self.dispatch("Grid Build", Kernel::GridBuild, particles.slot, workgroups);
    }

    fn resolve(&mut self, particles: &mut GpuParticles, _grid: &GpuGrid, workgroups: u32) {
        self.dispatch("Resolve", Kernel::Resolve, particles.slot, workgroups);
    }

    fn end_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}

/// The frame's command encoder, created on first use.
fn frame_encoder<'a>(
    device: &wgpu::Device,
    encoder: &'a mut Option<wgpu::CommandEncoder>,
) -> &'a mut wgpu::CommandEncoder {
    encoder.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Simulation Encoder"),
        })
    })
}

fn create_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    entry_point: &str,
    label: &str,
) -> wgpu::ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: None, // Auto layout
        module: shader,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn create_integrate_bind_group(
    device: &wgpu::Device,
    pipeline: &wgpu::ComputePipeline,
    sim: &wgpu::Buffer,
    frame: &wgpu::Buffer,
    read: &wgpu::Buffer,
    write: &wgpu::Buffer,
) -> wgpu::BindGroup {
    let layout = pipeline.get_bind_group_layout(0);
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Integrate Bind Group"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: sim.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: frame.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: read.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 3, resource: write.as_entire_binding() },
        ],
    })
}

fn create_grid_bind_group(
    device: &wgpu::Device,
    pipeline: &wgpu::ComputePipeline,
    label: &str,
    sim: &wgpu::Buffer,
    frame: &wgpu::Buffer,
    particles: &wgpu::Buffer,
    grid: &GpuGrid,
) -> wgpu::BindGroup {
    let layout = pipeline.get_bind_group_layout(0);
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: sim.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: frame.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: particles.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 3, resource: grid.counts.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 4, resource: grid.slots.as_entire_binding() },
        ],
    })
}
