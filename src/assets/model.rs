//! glTF scene loading

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};

use super::TextureData;
use crate::renderer::{MeshData, MeshVertex};

/// One drawable piece of a loaded model
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub mesh: MeshData,
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub texture: Option<TextureData>,
}

/// A model flattened into world-space parts
#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub parts: Vec<ModelPart>,
}

impl ModelData {
    /// Bounds over all parts
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.parts
            .iter()
            .filter_map(|part| part.mesh.bounds())
            .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)))
    }

    /// Transform that moves the bounds center to the origin and scales the
    /// bounds diagonal to `target_size`
    pub fn normalizing_transform(&self, target_size: f32) -> Mat4 {
        let Some((min, max)) = self.bounds() else {
            return Mat4::IDENTITY;
        };
        let center = (min + max) * 0.5;
        let size = (max - min).length();
        let scale = if size > f32::EPSILON {
            target_size / size
        } else {
            1.0
        };
        Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-center)
    }

    /// Bake the normalizing transform into the vertices
    pub fn normalize(&mut self, target_size: f32) {
        let transform = self.normalizing_transform(target_size);
        for part in &mut self.parts {
            part.mesh.transform(transform);
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.triangle_count()).sum()
    }
}

/// Load a glTF file, flattening the node hierarchy of its default scene
pub fn load_gltf(path: impl AsRef<Path>) -> Result<ModelData> {
    let path = path.as_ref();
    log::info!("Loading model: {:?}", path);

    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to import glTF: {:?}", path))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("glTF file {:?} contains no scene", path))?;

    let mut model = ModelData::default();
    for node in scene.nodes() {
        collect_node(&node, Mat4::IDENTITY, &buffers, &images, &mut model);
    }

    if model.parts.is_empty() {
        return Err(anyhow!("glTF file {:?} has no triangle meshes", path));
    }

    log::info!(
        "Loaded model with {} parts, {} triangles",
        model.parts.len(),
        model.triangle_count()
    );
    Ok(model)
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
    model: &mut ModelData,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!("Skipping non-triangle primitive in mesh {:?}", mesh.name());
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
            let uvs: Option<Vec<[f32; 2]>> =
                reader.read_tex_coords(0).map(|tc| tc.into_f32().collect());
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, position)| MeshVertex {
                    position: *position,
                    normal: normals
                        .as_ref()
                        .and_then(|n| n.get(i).copied())
                        .unwrap_or([0.0, 1.0, 0.0]),
                    uv: uvs.as_ref().and_then(|uv| uv.get(i).copied()).unwrap_or([0.0, 0.0]),
                })
                .collect();

            let mut mesh_data = MeshData { vertices, indices };
            mesh_data.transform(world);
            // Mirroring transforms turn counter-clockwise faces clockwise
            if world.determinant() < 0.0 {
                for tri in mesh_data.indices.chunks_exact_mut(3) {
                    tri.swap(1, 2);
                }
            }

            let material = primitive.material();
            let pbr = material.pbr_metallic_roughness();
            let texture = pbr
                .base_color_texture()
                .and_then(|info| images.get(info.texture().source().index()))
                .and_then(convert_image);

            model.parts.push(ModelPart {
                mesh: mesh_data,
                base_color: pbr.base_color_factor(),
                emissive: material.emissive_factor(),
                texture,
            });
        }
    }

    for child in node.children() {
        collect_node(&child, world, buffers, images, model);
    }
}

fn convert_image(image: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;

    let data = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        other => {
            log::warn!("Unsupported glTF image format {:?}; using material color", other);
            return None;
        }
    };

    Some(TextureData {
        width: image.width,
        height: image.height,
        data,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::uv_sphere;

    fn part(mesh: MeshData) -> ModelPart {
        ModelPart {
            mesh,
            base_color: [1.0; 4],
            emissive: [0.0; 3],
            texture: None,
        }
    }

    #[test]
    fn test_normalize_centers_and_scales() {
        let mut sphere = uv_sphere(5.0, 16, 8);
        sphere.transform(Mat4::from_translation(Vec3::new(10.0, -4.0, 2.0)));
        let mut model = ModelData {
            parts: vec![part(sphere)],
        };

        model.normalize(3.0);

        let (min, max) = model.bounds().unwrap();
        let center = (min + max) * 0.5;
        assert!(center.length() < 1e-4, "center {:?}", center);
        assert!(((max - min).length() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_bounds_span_parts() {
        let mut a = uv_sphere(1.0, 8, 4);
        a.transform(Mat4::from_translation(Vec3::new(-5.0, 0.0, 0.0)));
        let mut b = uv_sphere(1.0, 8, 4);
        b.transform(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        let model = ModelData {
            parts: vec![part(a), part(b)],
        };

        let (min, max) = model.bounds().unwrap();
        assert!((min.x + 6.0).abs() < 1e-5);
        assert!((max.x - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_model_normalizes_to_identity() {
        assert_eq!(ModelData::default().normalizing_transform(3.0), Mat4::IDENTITY);
    }

    #[test]
    fn test_missing_model_fails() {
        assert!(load_gltf("/nonexistent/scene.gltf").is_err());
    }
}
