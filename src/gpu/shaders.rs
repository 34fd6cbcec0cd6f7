//! WGSL sources for the compute kernels and the particle renderer.
//!
//! Every compute kernel starts from the same prelude: the uniform and
//! particle structs, the grid, emission and physics helpers, and the two
//! uniform bindings. Kernel-specific storage bindings follow at bindings 2+.

use crate::emission::EMISSION_WGSL;
use crate::grid::GRID_WGSL;
use crate::particle::PARTICLE_WGSL;
use crate::physics::PHYSICS_WGSL;
use crate::pipeline::WORKGROUP_SIZE;
use crate::uniforms::UNIFORMS_WGSL;

fn prelude() -> String {
    format!(
        r#"{UNIFORMS_WGSL}
{PARTICLE_WGSL}
{GRID_WGSL}
{EMISSION_WGSL}
{PHYSICS_WGSL}
@group(0) @binding(0) var<uniform> sim: SimParams;
@group(0) @binding(1) var<uniform> frame: FrameParams;
"#
    )
}

/// Spawn or integrate every slot below the active count.
///
/// Reads `particles_in` (binding 2), writes `particles_out` (binding 3).
pub fn integrate_shader() -> String {
    format!(
        r#"{prelude}
@group(0) @binding(2) var<storage, read> particles_in: array<Particle>;
@group(0) @binding(3) var<storage, read_write> particles_out: array<Particle>;

@compute @workgroup_size({WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    if index >= frame.active_count {{
        return;
    }}

    if frame.emit == 1u && index >= frame.emit_start && index < frame.emit_end {{
        particles_out[index] = spawn_particle(index);
        return;
    }}

    let p = particles_in[index];
    if p.alive == 0u {{
        return;
    }}
    particles_out[index] = integrate_particle(p);
}}
"#,
        prelude = prelude()
    )
}

/// Insert every alive particle into its cell with a bounded
/// compare-and-swap reservation.
pub fn grid_build_shader() -> String {
    format!(
        r#"{prelude}
@group(0) @binding(2) var<storage, read> particles: array<Particle>;
@group(0) @binding(3) var<storage, read_write> grid_counts: array<atomic<u32>>;
@group(0) @binding(4) var<storage, read_write> grid_slots: array<u32>;

fn try_insert(cell: u32, index: u32) -> bool {{
    var inserted = false;
    var current = atomicLoad(&grid_counts[cell]);
    loop {{
        if current >= sim.max_per_cell {{
            break;
        }}
        let result = atomicCompareExchangeWeak(&grid_counts[cell], current, current + 1u);
        if result.exchanged {{
            grid_slots[cell * sim.max_per_cell + current] = index;
            inserted = true;
            break;
        }}
        current = result.old_value;
    }}
    return inserted;
}}

@compute @workgroup_size({WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    if index >= frame.active_count {{
        return;
    }}

    let p = particles[index];
    if p.alive == 0u {{
        return;
    }}

    let cell = cell_index(cell_coord(p.position, sim.cell_size, sim.grid_width), sim.grid_width);
    _ = try_insert(cell, index);
}}
"#,
        prelude = prelude()
    )
}

/// Settle each particle on whatever is beneath it.
///
/// Neighbours are read through `position` and `size` only; each invocation
/// writes just its own `velocity` and `resting`.
pub fn resolve_shader() -> String {
    format!(
        r#"{prelude}
@group(0) @binding(2) var<storage, read_write> particles: array<Particle>;
@group(0) @binding(3) var<storage, read> grid_counts: array<u32>;
@group(0) @binding(4) var<storage, read> grid_slots: array<u32>;

@compute @workgroup_size({WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    if index >= frame.active_count {{
        return;
    }}

    let p = particles[index];
    if p.alive == 0u {{
        return;
    }}

    var supported = false;
    if p.velocity.y <= 0.0 {{
        supported = touches_floor(p);

        let coord = vec2<i32>(cell_coord(p.position, sim.cell_size, sim.grid_width));
        let width = i32(sim.grid_width);
        for (var dy = -1; dy <= 1; dy += 1) {{
            for (var dx = -1; dx <= 1; dx += 1) {{
                let c = coord + vec2<i32>(dx, dy);
                if c.x < 0 || c.y < 0 || c.x >= width || c.y >= width {{
                    continue;
                }}
                let cell = u32(c.y * width + c.x);
                let count = min(grid_counts[cell], sim.max_per_cell);
                for (var s = 0u; s < count; s += 1u) {{
                    let j = grid_slots[cell * sim.max_per_cell + s];
                    if j != index && supports(particles[j].position, particles[j].size, p) {{
                        supported = true;
                    }}
                }}
            }}
        }}
    }}

    var v = p.velocity;
    if supported {{
        v.y = 0.0;
    }}
    particles[index].velocity = v;
    particles[index].resting = select(0u, 1u, supported);
}}
"#,
        prelude = prelude()
    )
}

/// Instanced quads read straight from the particle buffer.
pub const RENDER_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) particle_pos: vec2<f32>,
    @location(1) particle_color: vec3<f32>,
    @location(2) particle_size: f32,
    @location(3) alive: u32,
) -> VertexOutput {
    var quad = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = quad[vertex_index];

    var out: VertexOutput;
    out.color = particle_color;
    out.uv = corner;
    if alive == 0u {
        // outside the clip volume
        out.clip_position = vec4<f32>(2.0, 2.0, 2.0, 1.0);
        return out;
    }
    out.clip_position = vec4<f32>(particle_pos + corner * particle_size, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let dist = length(in.uv);
    if dist > 1.0 {
        discard;
    }
    let alpha = 1.0 - smoothstep(0.8, 1.0, dist);
    return vec4<f32>(in.color, alpha);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {}", e.emit_to_string(code)))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(module)
    }

    fn struct_size(module: &naga::Module, name: &str) -> u32 {
        module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some(name))
            .map(|(_, ty)| ty.inner.size(module.to_ctx()))
            .unwrap_or_else(|| panic!("struct {} not found", name))
    }

    #[test]
    fn test_integrate_shader_valid() {
        let src = integrate_shader();
        if let Err(e) = validate_wgsl(&src) {
            panic!("{}\n{}", e, src);
        }
    }

    #[test]
    fn test_grid_build_shader_valid() {
        let src = grid_build_shader();
        if let Err(e) = validate_wgsl(&src) {
            panic!("{}\n{}", e, src);
        }
        assert!(src.contains("atomicCompareExchangeWeak"));
    }

    #[test]
    fn test_resolve_shader_valid() {
        let src = resolve_shader();
        if let Err(e) = validate_wgsl(&src) {
            panic!("{}\n{}", e, src);
        }
    }

    #[test]
    fn test_render_shader_valid() {
        validate_wgsl(RENDER_WGSL).unwrap();
    }

    #[test]
    fn test_wgsl_layouts_match_rust() {
        let module = validate_wgsl(&integrate_shader()).unwrap();

        assert_eq!(
            struct_size(&module, "Particle") as usize,
            std::mem::size_of::<crate::Particle>()
        );
        assert_eq!(
            struct_size(&module, "SimParams") as usize,
            std::mem::size_of::<crate::uniforms::SimParams>()
        );
        assert_eq!(
            struct_size(&module, "FrameParams") as usize,
            std::mem::size_of::<crate::uniforms::FrameParams>()
        );
    }

    #[test]
    fn test_workgroup_size_in_kernels() {
        let attr = format!("@workgroup_size({})", WORKGROUP_SIZE);
        for src in [integrate_shader(), grid_build_shader(), resolve_shader()] {
            assert!(src.contains(&attr));
        }
    }
}
