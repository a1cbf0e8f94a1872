//! 3D rendering module using wgpu
//!
//! Handles all GPU rendering: meshes, wireframes, lights and the background.

mod camera;
mod lights;
mod material;
mod mesh;
mod wgpu_callback;

pub use camera::*;
pub use lights::*;
pub use material::*;
pub use mesh::*;
pub use wgpu_callback::*;
