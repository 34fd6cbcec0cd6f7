//! The particle record shared by the CPU reference kernels and the WGSL shaders.
//!
//! [`Particle`] is laid out to match the WGSL `Particle` struct in
//! [`PARTICLE_WGSL`] byte for byte, so the same buffer feeds the compute
//! kernels and the instanced renderer without conversion.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// One particle slot.
///
/// Flags are `u32` (0 or 1) rather than floats so the GPU compares them
/// exactly.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    // not using glam here so the layout stays WGSL compatible
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub color: [f32; 3],
    pub size: f32,
    pub active: u32,
    pub resting: u32,
    pub id: u32,
    pub _pad: u32,
}

impl Particle {
    /// Byte offsets used by the renderer's per-instance vertex attributes.
    pub const POSITION_OFFSET: u64 = 0;
    pub const COLOR_OFFSET: u64 = 16;
    pub const SIZE_OFFSET: u64 = 28;
    pub const ACTIVE_OFFSET: u64 = 32;

    /// GPU stride of one particle.
    pub const STRIDE: u64 = std::mem::size_of::<Particle>() as u64;

    pub fn pos(&self) -> Vec2 {
        Vec2::from(self.position)
    }

    pub fn vel(&self) -> Vec2 {
        Vec2::from(self.velocity)
    }

    pub fn set_pos(&mut self, pos: Vec2) {
        self.position = pos.to_array();
    }

    pub fn set_vel(&mut self, vel: Vec2) {
        self.velocity = vel.to_array();
    }

    pub fn is_active(&self) -> bool {
        self.active != 0
    }

    pub fn is_resting(&self) -> bool {
        self.resting != 0
    }
}

/// What a pointer button pours. Only decides the colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Material {
    Sand,
    Smoke,
    Water,
}

impl Material {
    /// Map a pointer button id (1 = left, 2 = middle, 3 = right).
    ///
    /// Unknown ids pour sand.
    pub fn from_button(button: u32) -> Self {
        match button {
            2 => Material::Smoke,
            3 => Material::Water,
            _ => Material::Sand,
        }
    }

    /// Base RGB colour; emitted particles scale it by a per-particle brightness.
    pub fn color(self) -> [f32; 3] {
        match self {
            Material::Sand => [0.76, 0.70, 0.50],
            Material::Smoke => [0.50, 0.50, 0.50],
            Material::Water => [0.20, 0.40, 1.00],
        }
    }
}

/// WGSL definition of [`Particle`] and the material palette.
///
/// `active` is a reserved word in WGSL, so the flag is called `alive` there.
pub const PARTICLE_WGSL: &str = r#"
struct Particle {
    position: vec2<f32>,
    velocity: vec2<f32>,
    color: vec3<f32>,
    size: f32,
    alive: u32,
    resting: u32,
    id: u32,
    _pad: u32,
};

fn material_color(button: u32) -> vec3<f32> {
    var color = vec3<f32>(0.76, 0.70, 0.50);
    if button == 2u {
        color = vec3<f32>(0.50, 0.50, 0.50);
    } else if button == 3u {
        color = vec3<f32>(0.20, 0.40, 1.00);
    }
    return color;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_layout_matches_wgsl() {
        // WGSL: vec3 aligns to 16, struct size rounds up to 16
        assert_eq!(size_of::<Particle>(), 48);
        assert_eq!(offset_of!(Particle, position) as u64, Particle::POSITION_OFFSET);
        assert_eq!(offset_of!(Particle, velocity), 8);
        assert_eq!(offset_of!(Particle, color) as u64, Particle::COLOR_OFFSET);
        assert_eq!(offset_of!(Particle, size) as u64, Particle::SIZE_OFFSET);
        assert_eq!(offset_of!(Particle, active) as u64, Particle::ACTIVE_OFFSET);
        assert_eq!(offset_of!(Particle, resting), 36);
        assert_eq!(offset_of!(Particle, id), 40);
    }

    #[test]
    fn test_zeroed_is_inactive() {
        let p = Particle::zeroed();
        assert!(!p.is_active());
        assert!(!p.is_resting());
        assert_eq!(p.pos(), Vec2::ZERO);
    }

    #[test]
    fn test_material_from_button() {
        assert_eq!(Material::from_button(1), Material::Sand);
        assert_eq!(Material::from_button(2), Material::Smoke);
        assert_eq!(Material::from_button(3), Material::Water);
        assert_eq!(Material::from_button(0), Material::Sand);
        assert_eq!(Material::from_button(42), Material::Sand);
    }
}
