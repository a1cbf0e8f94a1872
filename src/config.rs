//! Command line and scene configuration

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::sim::CENTRAL_SPIN_PER_TICK;

#[derive(Parser, Debug, Clone)]
#[command(name = "orbit-scenes", version, about = "Interactive 3D orbit scenes")]
pub struct Cli {
    /// Initial window width in points
    #[arg(long, global = true, default_value_t = 1280.0)]
    pub width: f32,
    /// Initial window height in points
    #[arg(long, global = true, default_value_t = 720.0)]
    pub height: f32,
    #[command(subcommand)]
    pub scene: SceneCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SceneCommand {
    /// Rotating flat-shaded icosahedron with a wireframe overlay
    Basics,
    /// Textured planets orbiting a spinning sun model
    SolarSystem(SolarSystemArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SolarSystemArgs {
    /// Directory holding space.hdr, scene.gltf and the planet textures
    #[arg(long, default_value = "assets")]
    pub assets: PathBuf,
    /// Optional JSON file overriding the planet table
    #[arg(long)]
    pub planets: Option<PathBuf>,
}

/// One planet and its orbit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetConfig {
    pub name: String,
    /// Orbit ring inner radius (scene units)
    pub orbit_radius: f32,
    /// Radians advanced per tick
    pub angular_speed: f64,
    /// Sphere radius (scene units)
    pub size: f32,
    /// Texture file name, relative to the assets directory
    pub texture: String,
}

impl PlanetConfig {
    fn new(name: &str, orbit_radius: f32, angular_speed: f64, size: f32, texture: &str) -> Self {
        Self {
            name: name.to_string(),
            orbit_radius,
            angular_speed,
            size,
            texture: texture.to_string(),
        }
    }
}

fn default_sun_spin() -> f64 {
    CENTRAL_SPIN_PER_TICK
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarSystemConfig {
    pub planets: Vec<PlanetConfig>,
    /// Sun self-rotation per tick (radians)
    #[serde(default = "default_sun_spin")]
    pub sun_spin: f64,
}

impl Default for SolarSystemConfig {
    fn default() -> Self {
        Self {
            planets: vec![
                PlanetConfig::new("Mercury", 1.5, 0.01, 0.1, "mercurymap.jpg"),
                PlanetConfig::new("Venus", 2.2, 0.008, 0.253, "venusmap.jpg"),
                PlanetConfig::new("Earth", 3.0, 0.006, 0.260, "earthmap1k.jpg"),
                PlanetConfig::new("Mars", 4.0, 0.004, 0.138, "mars_1k_color.jpg"),
                PlanetConfig::new("Jupiter", 6.0, 0.005, 1.121, "jupitermap.jpg"),
                PlanetConfig::new("Saturn", 9.0, 0.0045, 0.945, "saturnmap.jpg"),
                PlanetConfig::new("Uranus", 11.0, 0.006, 0.401, "uranusmap.jpg"),
                PlanetConfig::new("Neptune", 11.0, 0.007, 0.388, "neptunemap.jpg"),
            ],
            sun_spin: default_sun_spin(),
        }
    }
}

impl SolarSystemConfig {
    /// Load a planet table from JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading planet configuration from {:?}", path);

        let file = File::open(path)
            .with_context(|| format!("Failed to open planet configuration: {:?}", path))?;
        let config: SolarSystemConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse planet configuration: {:?}", path))?;
        config.validate()?;

        log::info!("Loaded {} planets", config.planets.len());
        Ok(config)
    }

    /// Built-in table unless a file is given
    pub fn from_args(args: &SolarSystemArgs) -> Result<Self> {
        match &args.planets {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        for planet in &self.planets {
            ensure!(
                planet.size > 0.0 && planet.size.is_finite(),
                "planet {} has invalid size {}",
                planet.name,
                planet.size
            );
            ensure!(
                planet.orbit_radius >= 0.0 && planet.orbit_radius.is_finite(),
                "planet {} has invalid orbit radius {}",
                planet.name,
                planet.orbit_radius
            );
            ensure!(
                planet.angular_speed.is_finite(),
                "planet {} has invalid angular speed",
                planet.name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("orbit-scenes-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_table_speeds() {
        let config = SolarSystemConfig::default();
        let speeds: Vec<f64> = config.planets.iter().map(|p| p.angular_speed).collect();
        assert_eq!(speeds, vec![0.01, 0.008, 0.006, 0.004, 0.005, 0.0045, 0.006, 0.007]);
        assert_eq!(config.sun_spin, 0.001);
    }

    #[test]
    fn test_load_json_with_default_spin() {
        let path = scratch_file(
            "planets.json",
            r#"{"planets": [
                {"name": "Vulcan", "orbit_radius": 0.8, "angular_speed": 0.02,
                 "size": 0.05, "texture": "vulcan.jpg"}
            ]}"#,
        );
        let config = SolarSystemConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.planets.len(), 1);
        assert_eq!(config.planets[0].name, "Vulcan");
        assert_eq!(config.sun_spin, CENTRAL_SPIN_PER_TICK);
    }

    #[test]
    fn test_load_rejects_bad_size() {
        let path = scratch_file(
            "bad-planets.json",
            r#"{"planets": [
                {"name": "Void", "orbit_radius": 1.0, "angular_speed": 0.01,
                 "size": -1.0, "texture": "void.jpg"}
            ]}"#,
        );
        let result = SolarSystemConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(SolarSystemConfig::load("/nonexistent/planets.json").is_err());
    }

    #[test]
    fn test_cli_parses_solar_system() {
        let cli = Cli::parse_from([
            "orbit-scenes",
            "solar-system",
            "--assets",
            "data",
            "--width",
            "800",
        ]);
        assert_eq!(cli.width, 800.0);
        match cli.scene {
            SceneCommand::SolarSystem(args) => {
                assert_eq!(args.assets, PathBuf::from("data"));
                assert!(args.planets.is_none());
            }
            other => panic!("unexpected scene {:?}", other),
        }
    }
}
