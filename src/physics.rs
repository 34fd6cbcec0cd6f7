//! Per-particle numerics shared by the CPU kernels: integration, the domain
//! edge policy, and support detection. [`PHYSICS_WGSL`] is the shader
//! version of the same rules.

use glam::Vec2;

use crate::emission::spawn_particle;
use crate::grid::SpatialGrid;
use crate::particle::Particle;
use crate::uniforms::{FrameParams, SimParams};

/// Slack when deciding a contained particle sits on the floor.
pub const FLOOR_EPSILON: f32 = 1e-6;

/// Behaviour at the edges of the [-1, 1]² domain.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgePolicy {
    /// Particles leave the domain and keep falling.
    #[default]
    Open = 0,
    /// Particles are clamped inside and the floor supports them.
    Contain = 1,
    /// Particles leaving one edge re-enter at the opposite edge.
    Wrap = 2,
}

impl EdgePolicy {
    /// Decode the uniform representation. Unknown values mean `Open`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => EdgePolicy::Contain,
            2 => EdgePolicy::Wrap,
            _ => EdgePolicy::Open,
        }
    }
}

/// Apply the edge policy to a freshly moved particle.
pub fn apply_edges(pos: &mut Vec2, vel: &mut Vec2, size: f32, policy: EdgePolicy) {
    match policy {
        EdgePolicy::Open => {}
        EdgePolicy::Contain => {
            let lo = -1.0 + size;
            let hi = 1.0 - size;
            if pos.x < lo {
                pos.x = lo;
                vel.x = vel.x.max(0.0);
            }
            if pos.x > hi {
                pos.x = hi;
                vel.x = vel.x.min(0.0);
            }
            if pos.y < lo {
                pos.y = lo;
                vel.y = vel.y.max(0.0);
            }
            if pos.y > hi {
                pos.y = hi;
                vel.y = vel.y.min(0.0);
            }
        }
        EdgePolicy::Wrap => {
            *pos -= 2.0 * ((*pos + Vec2::ONE) / 2.0).floor();
        }
    }
}

/// One explicit Euler step.
///
/// Gravity is skipped while the particle rests on something.
pub fn integrate(p: &Particle, sim: &SimParams) -> Particle {
    let mut vel = p.vel();
    if !p.is_resting() {
        vel.y += sim.gravity;
    }
    vel *= sim.damping;
    let mut pos = p.pos() + vel;
    apply_edges(&mut pos, &mut vel, p.size, sim.edge_policy());

    let mut out = *p;
    out.set_pos(pos);
    out.set_vel(vel);
    out
}

/// New contents of slot `index` for this frame, or `None` to leave it as is.
pub fn update_slot(index: u32, read: &Particle, sim: &SimParams, frame: &FrameParams) -> Option<Particle> {
    if frame.emits(index) {
        Some(spawn_particle(index, frame, sim))
    } else if read.is_active() {
        Some(integrate(read, sim))
    } else {
        None
    }
}

/// Whether a contained particle is sitting on the floor.
pub fn touches_floor(p: &Particle, sim: &SimParams) -> bool {
    sim.edge_policy() == EdgePolicy::Contain && p.position[1] <= -1.0 + p.size + FLOOR_EPSILON
}

/// Whether `below` holds up `p`: overlapping and lower.
#[inline]
pub fn supports(below: &Particle, p: &Particle) -> bool {
    below.position[1] < p.position[1] && below.pos().distance(p.pos()) < below.size + p.size
}

/// Outcome of support resolution for one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub velocity: Vec2,
    pub resting: bool,
}

impl Resolution {
    pub fn apply(&self, p: &mut Particle) {
        p.set_vel(self.velocity);
        p.resting = self.resting as u32;
    }
}

/// Decide whether particle `index` rests on a neighbour or the floor.
///
/// Reads only positions and sizes of other particles. Returns `None` for
/// inactive slots.
pub fn resolve(index: u32, particles: &[Particle], grid: &SpatialGrid, sim: &SimParams) -> Option<Resolution> {
    let p = &particles[index as usize];
    if !p.is_active() {
        return None;
    }

    let mut velocity = p.vel();
    let supported = velocity.y <= 0.0
        && (touches_floor(p, sim)
            || grid
                .neighborhood(grid.cell_coord(p.pos()))
                .flat_map(|cell| grid.occupants(cell))
                .any(|j| j != index && supports(&particles[j as usize], p)));

    if supported {
        velocity.y = 0.0;
    }
    Some(Resolution {
        velocity,
        resting: supported,
    })
}

/// WGSL integration and support helpers. Expects `sim` in scope.
pub const PHYSICS_WGSL: &str = r#"
fn integrate_particle(p_in: Particle) -> Particle {
    var p = p_in;
    var v = p.velocity;
    if p.resting == 0u {
        v.y = v.y + sim.gravity;
    }
    v = v * sim.damping;
    var pos = p.position + v;

    if sim.edge_policy == 1u {
        let lo = -1.0 + p.size;
        let hi = 1.0 - p.size;
        if pos.x < lo {
            pos.x = lo;
            v.x = max(v.x, 0.0);
        }
        if pos.x > hi {
            pos.x = hi;
            v.x = min(v.x, 0.0);
        }
        if pos.y < lo {
            pos.y = lo;
            v.y = max(v.y, 0.0);
        }
        if pos.y > hi {
            pos.y = hi;
            v.y = min(v.y, 0.0);
        }
    } else if sim.edge_policy == 2u {
        pos = pos - 2.0 * floor((pos + vec2<f32>(1.0)) / 2.0);
    }

    p.position = pos;
    p.velocity = v;
    return p;
}

fn touches_floor(p: Particle) -> bool {
    return sim.edge_policy == 1u && p.position.y <= -1.0 + p.size + 1e-6;
}

fn supports(below_pos: vec2<f32>, below_size: f32, p: Particle) -> bool {
    return below_pos.y < p.position.y && distance(below_pos, p.position) < below_size + p.size;
}
"#;
