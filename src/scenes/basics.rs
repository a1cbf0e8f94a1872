//! Rotating icosahedron with a wireframe overlay under a hemisphere light

use std::time::Duration;

use glam::{Mat4, Vec3};

use super::{GpuContext, Scene};
use crate::assets::Environment;
use crate::renderer::{
    hex_color, icosahedron, Camera, DrawItem, HemisphereLight, LightRig, Material, MeshData,
    ObjectId, SceneRenderData,
};
use crate::sim::Spinner;

const ICOSAHEDRON_RADIUS: f32 = 1.0;
const ICOSAHEDRON_DETAIL: u32 = 2;
/// Wireframe sits just outside the faces to avoid z-fighting
const WIREFRAME_SCALE: f32 = 1.001;
const CAMERA_DAMPING: f32 = 0.003;

struct BasicsObjects {
    solid: ObjectId,
    wireframe: ObjectId,
}

pub struct BasicsScene {
    camera: Camera,
    spinner: Spinner,
    rotation: f32,
    geometry: MeshData,
    lights: LightRig,
    objects: Option<BasicsObjects>,
}

impl BasicsScene {
    pub fn new() -> Self {
        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO)
            .with_damping(CAMERA_DAMPING);

        let lights = LightRig {
            hemisphere: Some(HemisphereLight {
                sky: hex_color(0x0099ff),
                ground: hex_color(0xaa5500),
                intensity: 1.0,
            }),
            ..Default::default()
        };

        let geometry = icosahedron(ICOSAHEDRON_RADIUS, ICOSAHEDRON_DETAIL);
        log::info!(
            "Icosahedron: {} faces, {} vertices",
            geometry.triangle_count(),
            geometry.vertices.len()
        );

        Self {
            camera,
            spinner: Spinner::default(),
            rotation: 0.0,
            geometry,
            lights,
            objects: None,
        }
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    fn mesh_transform(&self) -> Mat4 {
        Mat4::from_rotation_y(self.rotation)
    }
}

impl Default for BasicsScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for BasicsScene {
    fn title(&self) -> &str {
        "Basics"
    }

    fn sync_gpu(&mut self, gpu: &mut GpuContext<'_>) {
        if self.objects.is_some() {
            return;
        }

        let resources = &mut *gpu.resources;
        let solid_mesh = resources.add_mesh(gpu.device, &self.geometry);
        let wire_mesh = resources.add_wireframe_mesh(gpu.device, &self.geometry);

        let solid = resources.add_object(
            gpu.device,
            gpu.queue,
            solid_mesh,
            Material::Standard {
                color: [1.0, 1.0, 1.0],
                emissive: [0.0; 3],
                flat_shading: true,
            },
            None,
        );
        let wireframe = resources.add_object(
            gpu.device,
            gpu.queue,
            wire_mesh,
            Material::Basic {
                color: [1.0, 1.0, 1.0],
                opacity: 1.0,
                wireframe: true,
                double_sided: false,
            },
            None,
        );
        resources.set_environment(gpu.device, gpu.queue, &Environment::Pending);

        self.objects = Some(BasicsObjects { solid, wireframe });
    }

    fn update(&mut self, elapsed: Duration) {
        self.rotation = self.spinner.rotation_at(elapsed);
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    fn render_data(&self, aspect_ratio: f32) -> SceneRenderData {
        let mut draws = Vec::new();
        if let Some(objects) = &self.objects {
            let parent = self.mesh_transform();
            draws.push(DrawItem {
                object: objects.solid,
                transform: parent,
            });
            draws.push(DrawItem {
                object: objects.wireframe,
                transform: parent * Mat4::from_scale(Vec3::splat(WIREFRAME_SCALE)),
            });
        }

        SceneRenderData {
            camera: self.camera.clone(),
            aspect_ratio,
            lights: self.lights.clone(),
            draws,
        }
    }

    fn status_lines(&self) -> Vec<String> {
        vec![format!(
            "Icosahedron detail {} | {} faces | yaw {:.3} rad",
            ICOSAHEDRON_DETAIL,
            self.geometry.triangle_count(),
            self.rotation()
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_follows_elapsed_time() {
        let mut scene = BasicsScene::new();
        scene.update(Duration::from_secs(5));
        assert!((scene.rotation() - 0.5).abs() < 1e-6);
        scene.update(Duration::from_secs(10));
        assert!((scene.rotation() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_camera_starts_on_z_axis() {
        let scene = BasicsScene::new();
        let position = scene.camera().position();
        assert!((position - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5);
        assert_eq!(scene.camera().damping, Some(CAMERA_DAMPING));
    }

    #[test]
    fn test_no_draws_before_gpu_upload() {
        let scene = BasicsScene::new();
        assert!(scene.is_ready());
        assert!(scene.render_data(1.0).draws.is_empty());
        assert!(scene.render_data(1.0).lights.hemisphere.is_some());
    }
}
