//! Instanced particle renderer.
//!
//! Each particle is one instance of a six-vertex quad. Position, colour, size
//! and the active flag are fetched straight from the particle storage buffer
//! as per-instance vertex attributes, so nothing is copied between the
//! simulation and the draw.

use super::shaders::RENDER_WGSL;
use crate::particle::Particle;

/// Background colour of the simulation view.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.2,
    g: 0.3,
    b: 0.3,
    a: 1.0,
};

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
    wgpu::VertexAttribute {
        offset: Particle::POSITION_OFFSET,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x2, // position
    },
    wgpu::VertexAttribute {
        offset: Particle::COLOR_OFFSET,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32x3, // color
    },
    wgpu::VertexAttribute {
        offset: Particle::SIZE_OFFSET,
        shader_location: 2,
        format: wgpu::VertexFormat::Float32, // size
    },
    wgpu::VertexAttribute {
        offset: Particle::ACTIVE_OFFSET,
        shader_location: 3,
        format: wgpu::VertexFormat::Uint32, // active
    },
];

pub struct ParticleRenderer {
    pipeline: wgpu::RenderPipeline,
}

impl ParticleRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Render Shader"),
            source: wgpu::ShaderSource::Wgsl(RENDER_WGSL.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: Particle::STRIDE,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { pipeline }
    }

    /// Clear `view` and draw the first `count` particles of `particles`.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        particles: &wgpu::Buffer,
        count: u32,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_vertex_buffer(0, particles.slice(..));
        render_pass.draw(0..6, 0..count);
    }
}
