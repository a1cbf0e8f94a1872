//! Textured planets orbiting a glTF sun in front of an HDR environment

use std::path::PathBuf;
use std::time::Duration;

use glam::{Mat4, Vec3};

use super::{GpuContext, Scene};
use crate::assets::{
    load_gltf, load_hdr, load_texture, Environment, HdrData, ModelData, PendingLoad, TextureData,
};
use crate::config::SolarSystemConfig;
use crate::renderer::{
    hex_color, ring, uv_sphere, Camera, DirectionalLight, DrawItem, LightRig, Material, ObjectId,
    PointLight, SceneRenderData,
};
use crate::sim::SolarSystem;

pub const ENVIRONMENT_FILE: &str = "space.hdr";
pub const SUN_MODEL_FILE: &str = "scene.gltf";

/// Bounding-box diagonal of the sun after normalization
const SUN_SIZE: f32 = 3.0;
const RING_WIDTH: f32 = 0.02;
const RING_SEGMENTS: u32 = 64;
const RING_OPACITY: f32 = 0.3;
const SPHERE_SEGMENTS: u32 = 32;
const SPHERE_RINGS: u32 = 16;
/// Shown on planets until their texture arrives, or if it never does
const PLACEHOLDER_TEXEL: [u8; 4] = [128, 128, 128, 255];
/// Share of the environment's mean radiance used as ambient light
const ENVIRONMENT_AMBIENT: f32 = 1.0;

struct PlanetObjects {
    ring: ObjectId,
    sphere: ObjectId,
}

/// Planet texture that has finished loading but is not on the GPU yet
struct TextureUpload {
    planet: usize,
    data: TextureData,
}

pub struct SolarSystemScene {
    system: SolarSystem,
    assets_dir: PathBuf,
    camera: Camera,
    lights: LightRig,

    environment_load: PendingLoad<HdrData>,
    environment: Environment,
    environment_uploaded: bool,

    model_load: PendingLoad<ModelData>,
    model: Option<ModelData>,
    model_error: Option<String>,

    texture_loads: Vec<(usize, PendingLoad<TextureData>)>,
    texture_uploads: Vec<TextureUpload>,
    texture_failures: usize,

    planet_objects: Vec<PlanetObjects>,
    sun_objects: Vec<ObjectId>,
}

impl SolarSystemScene {
    /// Build the scene and start loading its assets in the background
    pub fn new(config: &SolarSystemConfig, assets_dir: impl Into<PathBuf>) -> Self {
        let assets_dir = assets_dir.into();
        log::info!(
            "Solar system with {} planets, assets in {:?}",
            config.planets.len(),
            assets_dir
        );

        let environment_path = assets_dir.join(ENVIRONMENT_FILE);
        let environment_load = PendingLoad::spawn("environment", move || load_hdr(environment_path));

        let model_path = assets_dir.join(SUN_MODEL_FILE);
        let model_load = PendingLoad::spawn("sun model", move || {
            let mut model = load_gltf(model_path)?;
            model.normalize(SUN_SIZE);
            Ok(model)
        });

        let texture_loads = config
            .planets
            .iter()
            .enumerate()
            .map(|(index, planet)| {
                let path = assets_dir.join(&planet.texture);
                let load = PendingLoad::spawn(planet.texture.clone(), move || load_texture(path));
                (index, load)
            })
            .collect();

        Self {
            system: SolarSystem::new(config),
            assets_dir,
            camera: Camera::looking_at(Vec3::new(0.0, 5.0, 8.0), Vec3::ZERO),
            lights: Self::base_lights(),
            environment_load,
            environment: Environment::Pending,
            environment_uploaded: false,
            model_load,
            model: None,
            model_error: None,
            texture_loads,
            texture_uploads: Vec::new(),
            texture_failures: 0,
            planet_objects: Vec::new(),
            sun_objects: Vec::new(),
        }
    }

    fn base_lights() -> LightRig {
        let mut lights = LightRig::default();
        lights.add_ambient(hex_color(0xffffff), 0.5);
        lights.directional.push(DirectionalLight {
            color: hex_color(0xffffff),
            intensity: 1.0,
            position: Vec3::new(3.0, 3.0, 3.0),
        });
        lights
    }

    fn poll_environment(&mut self) {
        if let Some(outcome) = self.environment_load.poll() {
            self.environment = Environment::from_outcome(outcome);
            if let Environment::Map(hdr) = &self.environment {
                let mean = hdr.average_radiance();
                self.lights.environment = mean.map(|c| c * ENVIRONMENT_AMBIENT);
            }
            if self.system.gate_mut().mark_environment_loaded() {
                log::info!("Environment ready");
            }
        }
    }

    fn poll_model(&mut self) {
        match self.model_load.poll() {
            Some(Ok(model)) => {
                log::info!(
                    "Sun model ready: {} parts, {} triangles",
                    model.parts.len(),
                    model.triangle_count()
                );
                self.model = Some(model);
            }
            Some(Err(e)) => {
                log::error!("Sun model load failed: {:#}", e);
                self.model_error = Some(format!("{:#}", e));
            }
            None => {}
        }
    }

    fn poll_textures(&mut self) {
        let mut finished = Vec::new();
        for (slot, (planet, load)) in self.texture_loads.iter_mut().enumerate() {
            if let Some(outcome) = load.poll() {
                finished.push(slot);
                match outcome {
                    Ok(data) => self.texture_uploads.push(TextureUpload {
                        planet: *planet,
                        data,
                    }),
                    Err(e) => {
                        log::warn!("Planet texture {} failed: {:#}", load.label(), e);
                        self.texture_failures += 1;
                    }
                }
            }
        }
        for slot in finished.into_iter().rev() {
            self.texture_loads.swap_remove(slot);
        }
    }

    fn create_planets(&mut self, gpu: &mut GpuContext<'_>) {
        let placeholder = TextureData::solid(PLACEHOLDER_TEXEL);
        for planet in self.system.planets() {
            let resources = &mut *gpu.resources;

            let ring_mesh = resources.add_mesh(
                gpu.device,
                &ring(planet.orbit_radius, planet.orbit_radius + RING_WIDTH, RING_SEGMENTS),
            );
            let ring = resources.add_object(
                gpu.device,
                gpu.queue,
                ring_mesh,
                Material::Basic {
                    color: [1.0, 1.0, 1.0],
                    opacity: RING_OPACITY,
                    wireframe: false,
                    double_sided: true,
                },
                None,
            );

            let sphere_mesh = resources.add_mesh(
                gpu.device,
                &uv_sphere(planet.size, SPHERE_SEGMENTS, SPHERE_RINGS),
            );
            let sphere = resources.add_object(
                gpu.device,
                gpu.queue,
                sphere_mesh,
                Material::standard([1.0, 1.0, 1.0]),
                Some(&placeholder),
            );

            self.planet_objects.push(PlanetObjects { ring, sphere });
        }
        log::info!("Created {} planets on the GPU", self.planet_objects.len());
    }

    fn create_sun(&mut self, gpu: &mut GpuContext<'_>, model: &ModelData) {
        for part in &model.parts {
            let resources = &mut *gpu.resources;
            let mesh = resources.add_mesh(gpu.device, &part.mesh);
            let material = Material::Standard {
                color: [part.base_color[0], part.base_color[1], part.base_color[2]],
                emissive: part.emissive,
                flat_shading: false,
            };
            let object =
                resources.add_object(gpu.device, gpu.queue, mesh, material, part.texture.as_ref());
            self.sun_objects.push(object);
        }
    }

    fn frame_lights(&self) -> LightRig {
        let mut lights = self.lights.clone();
        lights.point.push(PointLight {
            color: hex_color(0xffffff),
            intensity: 2.0,
            position: Vec3::ZERO,
            range: 100.0,
        });
        for index in 0..self.system.planets().len() {
            lights.point.push(PointLight {
                color: hex_color(0xffffff),
                intensity: 0.5,
                position: self.system.planet_position(index),
                range: 2.0,
            });
        }
        lights
    }
}

impl Scene for SolarSystemScene {
    fn title(&self) -> &str {
        "Solar System"
    }

    fn poll_loads(&mut self) {
        self.poll_environment();
        self.poll_model();
        self.poll_textures();
    }

    fn sync_gpu(&mut self, gpu: &mut GpuContext<'_>) {
        if self.planet_objects.is_empty() && !self.system.planets().is_empty() {
            self.create_planets(gpu);
        }

        for upload in self.texture_uploads.drain(..) {
            if let Some(objects) = self.planet_objects.get(upload.planet) {
                gpu.resources
                    .set_object_texture(gpu.device, gpu.queue, objects.sphere, &upload.data);
            }
        }

        if !self.environment_uploaded && self.environment.is_resolved() {
            gpu.resources
                .set_environment(gpu.device, gpu.queue, &self.environment);
            self.environment_uploaded = true;
        }

        if let Some(model) = self.model.take() {
            self.create_sun(gpu, &model);
            if self.system.gate_mut().mark_model_loaded() {
                log::info!("Sun model ready");
            }
        }
    }

    fn update(&mut self, _elapsed: Duration) {
        self.system.tick();
    }

    fn is_ready(&self) -> bool {
        self.system.is_ready()
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    fn render_data(&self, aspect_ratio: f32) -> SceneRenderData {
        let mut draws = Vec::new();

        let sun = self.system.sun_transform();
        draws.extend(self.sun_objects.iter().map(|&object| DrawItem {
            object,
            transform: sun,
        }));

        for (index, objects) in self.planet_objects.iter().enumerate() {
            draws.push(DrawItem {
                object: objects.sphere,
                transform: self.system.planet_transform(index),
            });
            draws.push(DrawItem {
                object: objects.ring,
                transform: Mat4::IDENTITY,
            });
        }

        SceneRenderData {
            camera: self.camera.clone(),
            aspect_ratio,
            lights: self.frame_lights(),
            draws,
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let gate = self.system.gate();
        let model_state = if gate.model_loaded() {
            "loaded"
        } else if self.model_load.is_pending() || self.model.is_some() {
            "loading"
        } else {
            "failed"
        };
        let mut lines = vec![format!(
            "Environment: {} | Sun model: {} | Tick {}",
            if gate.environment_loaded() { "loaded" } else { "loading" },
            model_state,
            self.system.ticks()
        )];
        let sun = self.system.sun();
        lines.push(format!(
            "Sun spin {:.3} rad (+{} per tick) | {} orbiting bodies",
            sun.rotation(),
            sun.increment(),
            self.system.bodies().len()
        ));
        if matches!(self.environment, Environment::Fallback(_)) {
            lines.push(format!(
                "No {} in {}, using flat background",
                ENVIRONMENT_FILE,
                self.assets_dir.display()
            ));
        }
        if self.texture_failures > 0 {
            lines.push(format!(
                "{} planet texture(s) failed to load",
                self.texture_failures
            ));
        }
        if let Some(error) = &self.model_error {
            lines.push(format!("Sun model failed to load: {}", error));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_assets_dir() -> PathBuf {
        std::env::temp_dir().join(format!("orbit-scenes-missing-{}", std::process::id()))
    }

    fn poll_until_resolved(scene: &mut SolarSystemScene) {
        for _ in 0..500 {
            scene.poll_loads();
            let environment_done = scene.environment.is_resolved();
            let model_done = !scene.model_load.is_pending();
            let textures_done = scene.texture_loads.is_empty();
            if environment_done && model_done && textures_done {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("loads did not resolve");
    }

    #[test]
    fn test_missing_assets_fall_back() {
        let mut scene = SolarSystemScene::new(&SolarSystemConfig::default(), missing_assets_dir());
        poll_until_resolved(&mut scene);

        // Environment failure opens its half of the gate with the flat color
        assert!(matches!(&scene.environment, Environment::Fallback(_)));
        assert!(scene.system.gate().environment_loaded());

        // Model failure is recorded and keeps the gate closed
        assert!(scene.model_error.is_some());
        assert!(!scene.system.gate().model_loaded());
        assert!(!scene.is_ready());

        assert_eq!(scene.texture_failures, 8);
        assert!(scene.status_lines().len() >= 3);
    }

    #[test]
    fn test_orbits_advance_while_gate_is_closed() {
        let mut scene = SolarSystemScene::new(&SolarSystemConfig::default(), missing_assets_dir());
        for _ in 0..5 {
            scene.update(Duration::ZERO);
        }
        assert!(!scene.is_ready());
        assert_eq!(scene.system.ticks(), 5);
        assert!((scene.system.bodies()[0].angle() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_frame_lights_follow_planets() {
        let mut scene = SolarSystemScene::new(&SolarSystemConfig::default(), missing_assets_dir());
        scene.update(Duration::ZERO);

        let lights = scene.frame_lights();
        assert_eq!(lights.point.len(), 1 + 8);
        assert_eq!(lights.directional.len(), 1);
        assert!((lights.ambient[0] - 0.5).abs() < 1e-5);
        for (index, light) in lights.point[1..].iter().enumerate() {
            assert!((light.position - scene.system.planet_position(index)).length() < 1e-6);
            assert_eq!(light.range, 2.0);
        }
    }

    #[test]
    fn test_camera_start_position() {
        let scene = SolarSystemScene::new(&SolarSystemConfig::default(), missing_assets_dir());
        assert!((scene.camera().position() - Vec3::new(0.0, 5.0, 8.0)).length() < 1e-4);
        assert!(scene.camera().damping.is_none());
    }
}
