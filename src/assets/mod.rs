//! Asset loading: environment maps, glTF models and surface textures

mod environment;
mod loader;
mod model;
mod textures;

pub use environment::*;
pub use loader::*;
pub use model::*;
pub use textures::*;
