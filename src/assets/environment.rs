//! Scene background state and the render gate

use anyhow::Error;

use super::HdrData;
use crate::renderer::hex_color;

/// sRGB color of the flat background used when the HDR environment cannot be loaded
pub const FALLBACK_BACKGROUND_HEX: u32 = 0x222233;

/// Linear fallback background, as the skybox shader expects it
pub fn fallback_background() -> [f32; 3] {
    hex_color(FALLBACK_BACKGROUND_HEX)
}

/// Background and image-based lighting source
#[derive(Debug, Clone, Default)]
pub enum Environment {
    #[default]
    Pending,
    Map(HdrData),
    Fallback([f32; 3]),
}

impl Environment {
    /// Resolve a finished environment load
    pub fn from_outcome(outcome: Result<HdrData, Error>) -> Self {
        match outcome {
            Ok(hdr) => {
                log::info!("Environment map ready ({}x{})", hdr.width, hdr.height);
                Environment::Map(hdr)
            }
            Err(e) => {
                log::warn!("HDRI load failed: {:#}", e);
                Environment::Fallback(fallback_background())
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Environment::Pending)
    }
}

/// Tracks which of the required assets have finished loading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadGate {
    environment_loaded: bool,
    model_loaded: bool,
}

impl LoadGate {
    /// Mark the environment as loaded; returns true only on the first call
    pub fn mark_environment_loaded(&mut self) -> bool {
        !std::mem::replace(&mut self.environment_loaded, true)
    }

    /// Mark the model as loaded; returns true only on the first call
    pub fn mark_model_loaded(&mut self) -> bool {
        !std::mem::replace(&mut self.model_loaded, true)
    }

    pub fn environment_loaded(&self) -> bool {
        self.environment_loaded
    }

    pub fn model_loaded(&self) -> bool {
        self.model_loaded
    }

    /// Both assets are in; the scene may be drawn
    pub fn is_open(&self) -> bool {
        self.environment_loaded && self.model_loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_failed_environment_uses_fallback_and_opens_once() {
        let mut gate = LoadGate::default();
        let env = Environment::from_outcome(Err(anyhow!("simulated 404")));

        match &env {
            Environment::Fallback(color) => {
                let expected = hex_color(0x222233);
                for (got, want) in color.iter().zip(expected) {
                    assert!((got - want).abs() < 1e-6, "{:?} vs {:?}", color, expected);
                }
                // Linear 0x22 is about 0.016, well below the raw byte ratio 0.133
                assert!(color[0] < 0.02 && color[2] < 0.04, "{:?}", color);
            }
            other => panic!("expected fallback, got {:?}", other),
        }
        assert!(env.is_resolved());

        assert!(gate.mark_environment_loaded());
        assert!(!gate.mark_environment_loaded());
        assert!(gate.environment_loaded());
    }

    #[test]
    fn test_gate_needs_both_assets() {
        let mut gate = LoadGate::default();
        assert!(!gate.is_open());
        gate.mark_environment_loaded();
        assert!(!gate.is_open());
        assert!(gate.mark_model_loaded());
        assert!(gate.is_open());
        assert!(!gate.mark_model_loaded());
    }

    #[test]
    fn test_successful_environment_keeps_map() {
        let hdr = HdrData {
            width: 1,
            height: 1,
            data: vec![0.5, 0.5, 0.5, 1.0],
        };
        assert!(matches!(Environment::from_outcome(Ok(hdr)), Environment::Map(_)));
        assert!(!Environment::Pending.is_resolved());
    }
}
