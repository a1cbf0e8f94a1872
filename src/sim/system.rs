//! Simulation context for the two scenes

use std::time::Duration;

use glam::{Mat4, Vec3};

use super::orbit::{advance_orbits, tick, CentralBody, OrbitingBody};
use crate::assets::LoadGate;
use crate::config::{PlanetConfig, SolarSystemConfig};

/// Planets sit slightly inside their ring so they do not clip it
const PLANET_RING_INSET: f32 = 0.05;

/// Fixed yaw given to each planet sphere at creation
const PLANET_INITIAL_YAW: f32 = 0.001;

/// Process-wide state of the solar system scene
#[derive(Debug, Clone)]
pub struct SolarSystem {
    planets: Vec<PlanetConfig>,
    bodies: Vec<OrbitingBody>,
    sun: CentralBody,
    gate: LoadGate,
    ticks: u64,
}

impl SolarSystem {
    pub fn new(config: &SolarSystemConfig) -> Self {
        let bodies = config
            .planets
            .iter()
            .map(|p| OrbitingBody::new(p.angular_speed))
            .collect();

        Self {
            planets: config.planets.clone(),
            bodies,
            sun: CentralBody::new(config.sun_spin),
            gate: LoadGate::default(),
            ticks: 0,
        }
    }

    /// Advance all planets by one frame; the sun spins only once its model is loaded
    pub fn tick(&mut self) {
        if self.gate.model_loaded() {
            tick(&mut self.bodies, &mut self.sun);
        } else {
            advance_orbits(&mut self.bodies);
        }
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn planets(&self) -> &[PlanetConfig] {
        &self.planets
    }

    pub fn bodies(&self) -> &[OrbitingBody] {
        &self.bodies
    }

    pub fn sun(&self) -> &CentralBody {
        &self.sun
    }

    pub fn gate(&self) -> &LoadGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut LoadGate {
        &mut self.gate
    }

    /// Environment and sun model are both loaded
    pub fn is_ready(&self) -> bool {
        self.gate.is_open()
    }

    /// Rotation of planet `index`'s orbit frame about +Y
    pub fn orbit_transform(&self, index: usize) -> Mat4 {
        let angle = self.bodies.get(index).map(|b| b.angle()).unwrap_or(0.0);
        Mat4::from_rotation_y(angle as f32)
    }

    /// World transform of planet `index`'s sphere
    pub fn planet_transform(&self, index: usize) -> Mat4 {
        let radius = self
            .planets
            .get(index)
            .map(|p| p.orbit_radius)
            .unwrap_or(0.0);
        self.orbit_transform(index)
            * Mat4::from_translation(Vec3::new(0.0, 0.0, radius - PLANET_RING_INSET))
            * Mat4::from_rotation_y(PLANET_INITIAL_YAW)
    }

    /// World position of planet `index`
    pub fn planet_position(&self, index: usize) -> Vec3 {
        self.planet_transform(index).transform_point3(Vec3::ZERO)
    }

    /// World transform of the sun model
    pub fn sun_transform(&self) -> Mat4 {
        Mat4::from_rotation_y(self.sun.rotation() as f32)
    }
}

/// Time-driven spin of the basics scene
#[derive(Debug, Clone, Copy)]
pub struct Spinner {
    radians_per_ms: f64,
}

impl Spinner {
    pub const DEFAULT_RATE: f64 = 0.0001;

    pub fn new(radians_per_ms: f64) -> Self {
        Self { radians_per_ms }
    }

    /// Absolute yaw after `elapsed` since start
    pub fn rotation_at(&self, elapsed: Duration) -> f32 {
        (elapsed.as_secs_f64() * 1000.0 * self.radians_per_ms) as f32
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_moves_every_planet() {
        let mut system = SolarSystem::new(&SolarSystemConfig::default());
        for _ in 0..10 {
            system.tick();
        }
        assert_eq!(system.ticks(), 10);
        for (body, planet) in system.bodies().iter().zip(system.planets()) {
            assert!((body.angle() - 10.0 * planet.angular_speed).abs() < 1e-12);
        }
        assert_eq!(system.sun().rotation(), 0.0);
    }

    #[test]
    fn test_sun_spins_once_model_is_loaded() {
        let mut system = SolarSystem::new(&SolarSystemConfig::default());
        system.tick();
        assert_eq!(system.sun().rotation(), 0.0);

        system.gate_mut().mark_model_loaded();
        for _ in 0..10 {
            system.tick();
        }
        assert!((system.sun().rotation() - 0.01).abs() < 1e-12);
        assert!((system.bodies()[0].angle() - 11.0 * system.planets()[0].angular_speed).abs() < 1e-12);
    }

    #[test]
    fn test_planet_starts_on_positive_z() {
        let system = SolarSystem::new(&SolarSystemConfig::default());
        let earth = system.planet_position(2);
        assert!(earth.x.abs() < 1e-6);
        assert!((earth.z - (3.0 - 0.05)).abs() < 1e-6);
    }

    #[test]
    fn test_quarter_turn_moves_planet_to_positive_x() {
        let config = SolarSystemConfig {
            planets: vec![PlanetConfig {
                name: "Test".into(),
                orbit_radius: 2.05,
                angular_speed: std::f64::consts::FRAC_PI_2,
                size: 0.1,
                texture: "test.jpg".into(),
            }],
            sun_spin: 0.001,
        };
        let mut system = SolarSystem::new(&config);
        system.tick();

        // Right-handed yaw by +90° takes +Z to +X
        let p = system.planet_position(0);
        assert!((p.x - 2.0).abs() < 1e-5, "{:?}", p);
        assert!(p.z.abs() < 1e-5, "{:?}", p);
    }

    #[test]
    fn test_ready_follows_gate() {
        let mut system = SolarSystem::new(&SolarSystemConfig::default());
        assert!(!system.is_ready());
        system.gate_mut().mark_environment_loaded();
        system.gate_mut().mark_model_loaded();
        assert!(system.is_ready());
    }

    #[test]
    fn test_spinner_rate() {
        let spinner = Spinner::default();
        assert!((spinner.rotation_at(Duration::from_millis(10_000)) - 1.0).abs() < 1e-6);
        assert_eq!(spinner.rotation_at(Duration::ZERO), 0.0);
    }
}
