//! Particle emission.
//!
//! [`EmissionController`] owns the particle offset: the number of slots
//! opened so far. Each frame the pointer is held it opens another batch, up to
//! the buffer capacity, and the integrate kernel spawns a fresh particle in
//! every slot of the newly opened range. Slots are never reclaimed, so the
//! offset only grows.
//!
//! Spawn jitter is a deterministic hash of the slot index and the frame time,
//! computed identically on the CPU ([`spawn_particle`]) and in WGSL
//! ([`EMISSION_WGSL`]).

use glam::Vec2;
use std::f32::consts::TAU;
use std::ops::Range;

use crate::config::SimConfig;
use crate::particle::{Material, Particle};
use crate::uniforms::{FrameParams, SimParams};

/// Tracks how many particle slots have been handed out.
#[derive(Clone, Debug)]
pub struct EmissionController {
    offset: u32,
    batch: u32,
    capacity: u32,
    emitted_last_tick: u32,
    saturation_logged: bool,
}

impl EmissionController {
    pub fn new(config: &SimConfig) -> Self {
        Self::with_limits(config.particles_to_create, config.max_particles)
    }

    /// Controller emitting `batch` slots per pressed tick out of `capacity`.
    pub fn with_limits(batch: u32, capacity: u32) -> Self {
        Self {
            offset: 0,
            batch,
            capacity,
            emitted_last_tick: 0,
            saturation_logged: false,
        }
    }

    /// Advance one frame. Returns the number of slots opened.
    ///
    /// The offset saturates at capacity; further presses open nothing.
    pub fn tick(&mut self, pointer_down: bool) -> u32 {
        let next = if pointer_down {
            self.offset.saturating_add(self.batch).min(self.capacity)
        } else {
            self.offset
        };
        self.emitted_last_tick = next - self.offset;
        self.offset = next;

        if pointer_down && self.offset == self.capacity && !self.saturation_logged {
            log::info!("Particle capacity of {} reached", self.capacity);
            self.saturation_logged = true;
        }
        self.emitted_last_tick
    }

    /// Slots opened by the last tick.
    pub fn emission_range(&self) -> Range<u32> {
        self.offset - self.emitted_last_tick..self.offset
    }

    pub fn is_emitting(&self) -> bool {
        self.emitted_last_tick > 0
    }

    /// Number of slots opened so far; every index below it is active.
    pub fn particle_offset(&self) -> u32 {
        self.offset
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn batch(&self) -> u32 {
        self.batch
    }

    /// Change the per-tick batch without touching the offset.
    pub fn set_batch(&mut self, batch: u32) {
        self.batch = batch;
    }

    pub fn is_saturated(&self) -> bool {
        self.offset >= self.capacity
    }
}

/// Integer hash, bit-identical to `hash` in WGSL.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Hash mapped to [0, 1].
#[inline]
pub fn rand01(seed: u32) -> f32 {
    hash(seed) as f32 / u32::MAX as f32
}

fn spawn_seed(index: u32, time: f32) -> u32 {
    hash(index.wrapping_add(hash(time.to_bits())))
}

/// Point in the unit disk for slot `index` at `time`.
pub fn disk_jitter(index: u32, time: f32) -> Vec2 {
    let seed = spawn_seed(index, time);
    let r = rand01(seed).sqrt();
    let theta = TAU * rand01(seed ^ 0x68bc_21eb);
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Colour multiplier in [0.85, 1.0] for slot `index` at `time`.
pub fn brightness(index: u32, time: f32) -> f32 {
    0.85 + 0.15 * rand01(spawn_seed(index, time) ^ 0x2c1b_3c6d)
}

/// Fresh particle for slot `index`, placed around the pointer.
pub fn spawn_particle(index: u32, frame: &FrameParams, sim: &SimParams) -> Particle {
    let offset = disk_jitter(index, frame.time) * sim.spawn_radius;
    let shade = brightness(index, frame.time);
    let [r, g, b] = Material::from_button(frame.button).color();

    Particle {
        position: (frame.pointer() + offset).to_array(),
        velocity: (offset * sim.jitter_scale).to_array(),
        color: [r * shade, g * shade, b * shade],
        size: sim.particle_size,
        active: 1,
        resting: 0,
        id: index,
        _pad: 0,
    }
}

/// WGSL counterparts of [`hash`], [`rand01`] and [`spawn_particle`].
pub const EMISSION_WGSL: &str = r#"
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn rand01(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}

fn spawn_particle(index: u32) -> Particle {
    let seed = hash(index + hash(bitcast<u32>(frame.time)));
    let r = sqrt(rand01(seed));
    let theta = 6.2831855 * rand01(seed ^ 0x68bc21ebu);
    let offset = vec2<f32>(r * cos(theta), r * sin(theta)) * sim.spawn_radius;
    let shade = 0.85 + 0.15 * rand01(seed ^ 0x2c1b3c6du);

    var p: Particle;
    p.position = frame.pointer + offset;
    p.velocity = offset * sim.jitter_scale;
    p.color = material_color(frame.button) * shade;
    p.size = sim.particle_size;
    p.alive = 1u;
    p.resting = 0u;
    p.id = index;
    p._pad = 0u;
    return p;
}
"#;
