//! Orbit update rule and the per-scene simulation state

mod orbit;
mod system;

pub use orbit::*;
pub use system::*;
