//! The two interactive scenes and the interface the app drives them through

mod basics;
mod solar_system;

pub use basics::*;
pub use solar_system::*;

use std::time::Duration;

use crate::renderer::{Camera, SceneRenderData, SceneRenderResources};

/// Borrowed GPU handles for uploading scene objects
pub struct GpuContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub resources: &'a mut SceneRenderResources,
}

/// A scene driven once per frame by the app
pub trait Scene {
    fn title(&self) -> &str;

    /// Collect finished background loads
    fn poll_loads(&mut self) {}

    /// Upload anything the GPU does not have yet
    fn sync_gpu(&mut self, gpu: &mut GpuContext<'_>);

    /// Advance one frame; `elapsed` is the time since the scene started
    fn update(&mut self, elapsed: Duration);

    /// Whether the scene should be drawn this frame
    fn is_ready(&self) -> bool {
        true
    }

    fn camera(&self) -> &Camera;

    fn camera_mut(&mut self) -> &mut Camera;

    fn render_data(&self, aspect_ratio: f32) -> SceneRenderData;

    /// Lines for the viewport overlay
    fn status_lines(&self) -> Vec<String> {
        Vec::new()
    }
}
