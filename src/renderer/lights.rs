//! Scene lights and their uniform layout

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 16;

/// Convert a 0xRRGGBB sRGB color to linear RGB
pub fn hex_color(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn scaled(color: [f32; 3], intensity: f32) -> [f32; 4] {
    [
        color[0] * intensity,
        color[1] * intensity,
        color[2] * intensity,
        0.0,
    ]
}

#[derive(Debug, Clone, Copy)]
pub struct HemisphereLight {
    pub sky: [f32; 3],
    pub ground: [f32; 3],
    pub intensity: f32,
}

/// Parallel light shining from `position` towards the origin
#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vec3,
}

/// Light with inverse-square falloff, cut off smoothly at `range` (0 = unbounded)
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vec3,
    pub range: f32,
}

/// All lights contributing to a frame
#[derive(Debug, Clone, Default)]
pub struct LightRig {
    pub ambient: [f32; 3],
    pub hemisphere: Option<HemisphereLight>,
    pub directional: Vec<DirectionalLight>,
    pub point: Vec<PointLight>,
    /// Image-based ambient from the environment map
    pub environment: [f32; 3],
}

impl LightRig {
    pub fn add_ambient(&mut self, color: [f32; 3], intensity: f32) {
        for (acc, c) in self.ambient.iter_mut().zip(color) {
            *acc += c * intensity;
        }
    }

    pub fn to_uniform(&self) -> LightsUniform {
        let mut uniform = LightsUniform::zeroed();
        uniform.ambient = [
            self.ambient[0] + self.environment[0],
            self.ambient[1] + self.environment[1],
            self.ambient[2] + self.environment[2],
            0.0,
        ];

        if let Some(hemi) = &self.hemisphere {
            uniform.hemisphere_sky = scaled(hemi.sky, hemi.intensity);
            uniform.hemisphere_ground = scaled(hemi.ground, hemi.intensity);
        }

        if self.directional.len() > MAX_DIRECTIONAL_LIGHTS {
            log::warn!(
                "{} directional lights requested, only {} are shaded",
                self.directional.len(),
                MAX_DIRECTIONAL_LIGHTS
            );
        }
        for (slot, light) in uniform.directional.iter_mut().zip(&self.directional) {
            let dir = light.position.normalize_or_zero();
            slot.direction = [dir.x, dir.y, dir.z, 0.0];
            slot.color = scaled(light.color, light.intensity);
        }

        if self.point.len() > MAX_POINT_LIGHTS {
            log::warn!(
                "{} point lights requested, only {} are shaded",
                self.point.len(),
                MAX_POINT_LIGHTS
            );
        }
        for (slot, light) in uniform.point.iter_mut().zip(&self.point) {
            slot.position = [light.position.x, light.position.y, light.position.z, light.range];
            slot.color = scaled(light.color, light.intensity);
        }

        uniform.counts = [
            self.directional.len().min(MAX_DIRECTIONAL_LIGHTS) as u32,
            self.point.len().min(MAX_POINT_LIGHTS) as u32,
            0,
            0,
        ];
        uniform
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectionalLightUniform {
    pub direction: [f32; 4],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointLightUniform {
    /// xyz position, w range
    pub position: [f32; 4],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightsUniform {
    pub ambient: [f32; 4],
    pub hemisphere_sky: [f32; 4],
    pub hemisphere_ground: [f32; 4],
    pub directional: [DirectionalLightUniform; MAX_DIRECTIONAL_LIGHTS],
    pub point: [PointLightUniform; MAX_POINT_LIGHTS],
    /// x directional count, y point count
    pub counts: [u32; 4],
    /// x: 1 when the shader must gamma-encode its output
    pub output: [u32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_endpoints() {
        for c in hex_color(0xffffff) {
            assert!((c - 1.0).abs() < 1e-5);
        }
        assert_eq!(hex_color(0x000000), [0.0, 0.0, 0.0]);
        let blue = hex_color(0x0099ff);
        assert_eq!(blue[0], 0.0);
        assert!(blue[1] > 0.3 && blue[1] < 0.35);
        assert!((blue[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_uniform_counts_and_scaling() {
        let mut rig = LightRig::default();
        rig.add_ambient([1.0, 1.0, 1.0], 0.5);
        rig.directional.push(DirectionalLight {
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            position: Vec3::new(3.0, 3.0, 3.0),
        });
        rig.point.push(PointLight {
            color: [1.0, 1.0, 1.0],
            intensity: 2.0,
            position: Vec3::ZERO,
            range: 100.0,
        });

        let u = rig.to_uniform();
        assert_eq!(u.counts[0], 1);
        assert_eq!(u.counts[1], 1);
        assert_eq!(u.ambient[..3], [0.5, 0.5, 0.5]);
        assert_eq!(u.point[0].color[..3], [2.0, 2.0, 2.0]);
        assert_eq!(u.point[0].position[3], 100.0);
        let d = Vec3::from_slice(&u.directional[0].direction[..3]);
        assert!((d.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_excess_point_lights_are_dropped() {
        let mut rig = LightRig::default();
        for _ in 0..MAX_POINT_LIGHTS + 3 {
            rig.point.push(PointLight {
                color: [1.0; 3],
                intensity: 0.5,
                position: Vec3::ONE,
                range: 2.0,
            });
        }
        assert_eq!(rig.to_uniform().counts[1] as usize, MAX_POINT_LIGHTS);
    }

    #[test]
    fn test_uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightsUniform>() % 16, 0);
    }
}
