//! orbit-scenes - interactive 3D scenes
//!
//! A rotating wireframed icosahedron and a solar system whose planets
//! advance along their orbits once per frame.

mod assets;
mod config;
mod renderer;
mod scenes;
mod sim;

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use eframe::egui;

use config::{Cli, SceneCommand, SolarSystemConfig};
use renderer::{SceneCallback, SceneRenderResources};
use scenes::{BasicsScene, GpuContext, Scene, SolarSystemScene};

/// Application state
pub struct SceneApp {
    scene: Box<dyn Scene>,
    started: Instant,

    // Camera
    camera_drag: Option<egui::Pos2>,

    wgpu_initialized: bool,
    last_frame_time: Instant,
    last_frame_delta: f64,
}

impl SceneApp {
    pub fn new(cc: &eframe::CreationContext<'_>, scene: Box<dyn Scene>) -> Result<Self> {
        // Initialize wgpu renderer if available
        let wgpu_initialized = if let Some(wgpu_render_state) = &cc.wgpu_render_state {
            let device = &wgpu_render_state.device;
            let queue = &wgpu_render_state.queue;
            let target_format = wgpu_render_state.target_format;

            let resources = SceneRenderResources::new(device, queue, target_format, 1280, 720);
            wgpu_render_state
                .renderer
                .write()
                .callback_resources
                .insert(resources);
            log::info!("wgpu 3D renderer initialized ({:?})", target_format);
            true
        } else {
            log::error!("No wgpu render state available, using 2D status view");
            false
        };

        Ok(Self {
            scene,
            started: Instant::now(),
            camera_drag: None,
            wgpu_initialized,
            last_frame_time: Instant::now(),
            last_frame_delta: 0.0,
        })
    }

    /// Hand the scene the GPU so it can upload new meshes and textures
    fn sync_gpu(&mut self, frame: &eframe::Frame) {
        let Some(wgpu_render_state) = frame.wgpu_render_state() else {
            return;
        };
        let mut renderer = wgpu_render_state.renderer.write();
        if let Some(resources) = renderer
            .callback_resources
            .get_mut::<SceneRenderResources>()
        {
            let mut gpu = GpuContext {
                device: &wgpu_render_state.device,
                queue: &wgpu_render_state.queue,
                resources,
            };
            self.scene.sync_gpu(&mut gpu);
        }
    }

    fn handle_camera_input(&mut self, ctx: &egui::Context, viewport_rect: egui::Rect) {
        let input = ctx.input(|i| i.clone());
        let camera = self.scene.camera_mut();

        let hover = input.pointer.hover_pos();
        let in_viewport = hover.is_some_and(|pos| viewport_rect.contains(pos));

        // Scroll to zoom
        let scroll = input.raw_scroll_delta.y;
        if in_viewport && scroll != 0.0 {
            camera.zoom(scroll * 0.1);
        }

        // Drag to orbit
        let (anchor, delta) = track_drag(
            self.camera_drag,
            hover,
            in_viewport,
            input.pointer.button_down(egui::PointerButton::Primary),
        );
        self.camera_drag = anchor;
        if let Some(delta) = delta {
            if input.modifiers.shift {
                camera.pan(delta.x, -delta.y);
            } else {
                camera.orbit(delta.x, delta.y);
            }
        }

        // Damped controls keep moving after the drag ends
        camera.update();
    }

    fn update_wgpu_render_data(&self, frame: &eframe::Frame, aspect_ratio: f32) {
        if let Some(wgpu_render_state) = frame.wgpu_render_state() {
            let renderer = wgpu_render_state.renderer.read();
            if let Some(resources) = renderer.callback_resources.get::<SceneRenderResources>() {
                resources.set_render_data(self.scene.render_data(aspect_ratio));
            }
        }
    }

    fn render_3d_viewport(&mut self, ui: &mut egui::Ui, frame: &eframe::Frame) {
        let viewport_rect = ui.available_rect_before_wrap();
        let pixels_per_point = ui.ctx().pixels_per_point();
        let viewport_width = (viewport_rect.width() * pixels_per_point).round().max(1.0) as u32;
        let viewport_height = (viewport_rect.height() * pixels_per_point).round().max(1.0) as u32;

        self.handle_camera_input(ui.ctx(), viewport_rect);

        let (response, painter) =
            ui.allocate_painter(viewport_rect.size(), egui::Sense::click_and_drag());

        if self.scene.is_ready() {
            let aspect_ratio = viewport_rect.width() / viewport_rect.height().max(1.0);
            self.update_wgpu_render_data(frame, aspect_ratio);

            // Offscreen targets follow the viewport size, which handles window resizes
            painter.add(egui_wgpu::Callback::new_paint_callback(
                response.rect,
                SceneCallback {
                    viewport_size: (viewport_width, viewport_height),
                },
            ));
        } else {
            painter.rect_filled(response.rect, 0.0, egui::Color32::BLACK);
            painter.text(
                response.rect.center(),
                egui::Align2::CENTER_CENTER,
                "Loading assets...",
                egui::FontId::proportional(16.0),
                egui::Color32::from_rgb(150, 150, 150),
            );
        }

        self.draw_viewport_overlay(&painter, response.rect);
    }

    fn draw_viewport_overlay(&self, painter: &egui::Painter, rect: egui::Rect) {
        let frame_time = self.last_frame_delta.max(0.001);
        let camera = self.scene.camera();

        let mut text = format!(
            "Camera: dist={:.2} az={:.1}° el={:.1}°\n\
             Drag to orbit | Shift+drag to pan | Scroll to zoom\n\
             FPS: {:.0}",
            camera.distance,
            camera.azimuth.to_degrees(),
            camera.elevation.to_degrees(),
            1.0 / frame_time,
        );
        for line in self.scene.status_lines() {
            text.push('\n');
            text.push_str(&line);
        }

        painter.text(
            rect.left_top() + egui::vec2(10.0, 10.0),
            egui::Align2::LEFT_TOP,
            text,
            egui::FontId::monospace(12.0),
            egui::Color32::from_rgb(150, 150, 150),
        );
    }

    fn render_2d_fallback(&mut self, ui: &mut egui::Ui) {
        let viewport_rect = ui.available_rect_before_wrap();
        self.handle_camera_input(ui.ctx(), viewport_rect);

        let (response, painter) =
            ui.allocate_painter(viewport_rect.size(), egui::Sense::click_and_drag());

        painter.rect_filled(response.rect, 0.0, egui::Color32::from_rgb(5, 5, 15));
        painter.text(
            response.rect.center(),
            egui::Align2::CENTER_CENTER,
            "GPU renderer unavailable",
            egui::FontId::proportional(16.0),
            egui::Color32::from_rgb(200, 120, 120),
        );

        self.draw_viewport_overlay(&painter, response.rect);
    }
}

/// Follow a primary-button drag inside the viewport.
///
/// Returns the new drag anchor and the pointer movement since the previous
/// frame. Releasing the button or leaving the viewport drops the anchor.
fn track_drag(
    anchor: Option<egui::Pos2>,
    pointer: Option<egui::Pos2>,
    in_viewport: bool,
    primary_down: bool,
) -> (Option<egui::Pos2>, Option<egui::Vec2>) {
    match pointer {
        Some(pos) if primary_down && in_viewport => (Some(pos), anchor.map(|last| pos - last)),
        _ => (None, None),
    }
}

impl eframe::App for SceneApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.last_frame_delta = (now - self.last_frame_time).as_secs_f64();
        self.last_frame_time = now;

        // Pick up finished loads, then upload them before this frame is drawn
        self.scene.poll_loads();
        if self.wgpu_initialized {
            self.sync_gpu(frame);
        }

        self.scene.update(self.started.elapsed());

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(self.scene.title());
                if self.wgpu_initialized {
                    ui.separator();
                    ui.label(egui::RichText::new("GPU").color(egui::Color32::GREEN));
                }
                ui.separator();
                let status = if self.scene.is_ready() {
                    egui::RichText::new("Running").color(egui::Color32::GREEN)
                } else {
                    egui::RichText::new("Waiting for assets").color(egui::Color32::YELLOW)
                };
                ui.label(status);
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                if self.wgpu_initialized {
                    self.render_3d_viewport(ui, frame);
                } else {
                    self.render_2d_fallback(ui);
                }
            });

        // One tick per displayed frame
        ctx.request_repaint();
    }
}

fn build_scene(cli: &Cli) -> Result<Box<dyn Scene>> {
    match &cli.scene {
        SceneCommand::Basics => Ok(Box::new(BasicsScene::new())),
        SceneCommand::SolarSystem(args) => {
            let config = SolarSystemConfig::from_args(args)?;
            Ok(Box::new(SolarSystemScene::new(&config, args.assets.clone())))
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let scene = build_scene(&cli)?;
    let title = format!("{} - orbit-scenes", scene.title());
    log::info!("Starting {}...", title);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([cli.width, cli.height])
            .with_title(title),
        renderer: eframe::Renderer::Wgpu, // Force wgpu renderer
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "orbit-scenes",
        options,
        Box::new(|cc| match SceneApp::new(cc, scene) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                log::error!("Failed to initialize app: {}", e);
                Err(e.into())
            }
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_reports_movement_while_held() {
        let (anchor, delta) = track_drag(None, Some(egui::pos2(10.0, 10.0)), true, true);
        assert_eq!(anchor, Some(egui::pos2(10.0, 10.0)));
        assert!(delta.is_none());

        let (anchor, delta) = track_drag(anchor, Some(egui::pos2(13.0, 6.0)), true, true);
        assert_eq!(anchor, Some(egui::pos2(13.0, 6.0)));
        assert_eq!(delta, Some(egui::vec2(3.0, -4.0)));
    }

    #[test]
    fn test_release_outside_viewport_clears_drag() {
        let anchor = Some(egui::pos2(100.0, 100.0));

        // Button released while the pointer is outside the viewport
        let (anchor, delta) = track_drag(anchor, Some(egui::pos2(900.0, 50.0)), false, false);
        assert!(anchor.is_none());
        assert!(delta.is_none());

        // Pressing again inside must not jump from the old anchor
        let (anchor, delta) = track_drag(anchor, Some(egui::pos2(400.0, 300.0)), true, true);
        assert_eq!(anchor, Some(egui::pos2(400.0, 300.0)));
        assert!(delta.is_none());
    }

    #[test]
    fn test_pointer_gone_clears_drag() {
        let (anchor, delta) = track_drag(Some(egui::pos2(1.0, 1.0)), None, false, true);
        assert!(anchor.is_none());
        assert!(delta.is_none());
    }
}
