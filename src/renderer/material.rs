//! Surface descriptions for scene objects

/// How an object's surface is shaded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Lit by the scene's lights; the texture (if any) modulates `color`
    Standard {
        color: [f32; 3],
        emissive: [f32; 3],
        flat_shading: bool,
    },
    /// Unlit constant color
    Basic {
        color: [f32; 3],
        opacity: f32,
        wireframe: bool,
        double_sided: bool,
    },
}

impl Material {
    pub fn standard(color: [f32; 3]) -> Self {
        Material::Standard {
            color,
            emissive: [0.0; 3],
            flat_shading: false,
        }
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self, Material::Basic { opacity, .. } if *opacity < 1.0)
    }

    pub fn is_wireframe(&self) -> bool {
        matches!(self, Material::Basic { wireframe: true, .. })
    }

    pub(crate) fn to_uniform(&self, model: glam::Mat4, has_texture: bool) -> ObjectUniform {
        let normal_matrix = model.inverse().transpose();
        let (color, opacity, emissive, flat, lit) = match *self {
            Material::Standard {
                color,
                emissive,
                flat_shading,
            } => (color, 1.0, emissive, flat_shading, true),
            Material::Basic { color, opacity, .. } => (color, opacity, [0.0; 3], false, false),
        };

        ObjectUniform {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            color: [color[0], color[1], color[2], opacity],
            emissive: [emissive[0], emissive[1], emissive[2], 0.0],
            flags: [has_texture as u32, flat as u32, lit as u32, 0],
        }
    }
}

/// Per-object uniform block (group 2, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// rgb color, a opacity
    pub color: [f32; 4],
    pub emissive: [f32; 4],
    /// x textured, y flat shading, z lit
    pub flags: [u32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn test_transparency_and_wireframe_flags() {
        let ring = Material::Basic {
            color: [1.0; 3],
            opacity: 0.3,
            wireframe: false,
            double_sided: true,
        };
        assert!(ring.is_transparent());
        assert!(!ring.is_wireframe());
        assert!(!Material::standard([1.0; 3]).is_transparent());

        let lines = Material::Basic {
            color: [1.0; 3],
            opacity: 1.0,
            wireframe: true,
            double_sided: false,
        };
        assert!(lines.is_wireframe());
    }

    #[test]
    fn test_uniform_flags() {
        let flat = Material::Standard {
            color: [1.0; 3],
            emissive: [0.0; 3],
            flat_shading: true,
        };
        let u = flat.to_uniform(Mat4::IDENTITY, true);
        assert_eq!(u.flags, [1, 1, 1, 0]);
        assert_eq!(u.color[3], 1.0);

        let unlit = Material::Basic {
            color: [0.5; 3],
            opacity: 1.0,
            wireframe: false,
            double_sided: false,
        };
        let u = unlit.to_uniform(Mat4::IDENTITY, false);
        assert_eq!(u.flags, [0, 0, 0, 0]);
    }

    #[test]
    fn test_normal_matrix_undoes_nonuniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let u = Material::standard([1.0; 3]).to_uniform(model, false);
        assert!((u.normal_matrix[0][0] - 0.5).abs() < 1e-6);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 176);
    }
}
