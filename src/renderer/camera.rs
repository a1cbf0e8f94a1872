//! Camera controller for 3D viewport

use glam::{Mat4, Vec3};

const ROTATE_SPEED: f32 = 0.01;
const ELEVATION_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Orbital camera that rotates around a target point
#[derive(Debug, Clone)]
pub struct Camera {
    /// Target point the camera looks at
    pub target: Vec3,
    /// Distance from target
    pub distance: f32,
    /// Azimuth angle (rotation around Y axis) in radians
    pub azimuth: f32,
    /// Elevation angle (rotation above/below XZ plane) in radians
    pub elevation: f32,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Fraction of pending rotation applied per update; None applies input immediately
    pub damping: Option<f32>,
    azimuth_delta: f32,
    elevation_delta: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            azimuth: 0.0,
            elevation: 0.0,
            fov: 75.0_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            min_distance: 0.1,
            max_distance: 500.0,
            damping: None,
            azimuth_delta: 0.0,
            elevation_delta: 0.0,
        }
    }
}

impl Camera {
    /// Camera placed at `position`, looking at `target`
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let mut camera = Self {
            target,
            ..Default::default()
        };
        camera.set_position(position);
        camera
    }

    pub fn with_damping(mut self, factor: f32) -> Self {
        self.damping = Some(factor.clamp(0.0, 1.0));
        self
    }

    /// Re-derive spherical coordinates from a world position
    pub fn set_position(&mut self, position: Vec3) {
        let offset = position - self.target;
        self.distance = offset.length().max(f32::EPSILON);
        self.elevation = (offset.y / self.distance)
            .clamp(-1.0, 1.0)
            .asin()
            .clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
        self.azimuth = offset.x.atan2(offset.z);
    }

    /// Get camera position in world space
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.sin();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Get view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Get projection matrix
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect_ratio, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        self.projection_matrix(aspect_ratio) * self.view_matrix()
    }

    /// Orbit the camera (mouse drag)
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        if self.damping.is_some() {
            self.azimuth_delta -= delta_x * ROTATE_SPEED;
            self.elevation_delta += delta_y * ROTATE_SPEED;
        } else {
            self.rotate(-delta_x * ROTATE_SPEED, delta_y * ROTATE_SPEED);
        }
    }

    fn rotate(&mut self, azimuth: f32, elevation: f32) {
        self.azimuth += azimuth;
        self.elevation = (self.elevation + elevation).clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
    }

    /// Apply pending damped rotation; call once per frame
    pub fn update(&mut self) {
        let Some(factor) = self.damping else {
            return;
        };
        self.rotate(self.azimuth_delta * factor, self.elevation_delta * factor);
        self.azimuth_delta *= 1.0 - factor;
        self.elevation_delta *= 1.0 - factor;
    }

    /// Zoom the camera (mouse wheel)
    pub fn zoom(&mut self, delta: f32) {
        self.distance =
            (self.distance * (1.0 - delta * 0.1)).clamp(self.min_distance, self.max_distance);
    }

    /// Pan the camera (shift + mouse drag)
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let right = Vec3::new(self.azimuth.cos(), 0.0, -self.azimuth.sin());
        let up = Vec3::Y;
        self.target -= right * delta_x * 0.001 * self.distance;
        self.target += up * delta_y * 0.001 * self.distance;
    }
}

/// Camera uniform data for shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera, aspect_ratio: f32) -> Self {
        let pos = camera.position();
        Self {
            view_proj: camera
                .view_projection_matrix(aspect_ratio)
                .to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            proj: camera.projection_matrix(aspect_ratio).to_cols_array_2d(),
            camera_pos: [pos.x, pos.y, pos.z, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looking_at_round_trips_position() {
        let position = Vec3::new(0.0, 5.0, 8.0);
        let camera = Camera::looking_at(position, Vec3::ZERO);
        assert!((camera.position() - position).length() < 1e-4);
        assert!((camera.distance - position.length()).abs() < 1e-5);
    }

    #[test]
    fn test_undamped_orbit_applies_immediately() {
        let mut camera = Camera::looking_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO);
        camera.orbit(-100.0, 0.0);
        assert!((camera.azimuth - 1.0).abs() < 1e-6);
        camera.update();
        assert!((camera.azimuth - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_damping_spreads_and_decays_motion() {
        let mut camera = Camera::looking_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO).with_damping(0.1);
        camera.orbit(-100.0, 0.0);
        assert_eq!(camera.azimuth, 0.0);

        let mut last_step = f32::MAX;
        let mut previous = camera.azimuth;
        for _ in 0..50 {
            camera.update();
            let step = camera.azimuth - previous;
            assert!(step > 0.0 && step < last_step);
            last_step = step;
            previous = camera.azimuth;
        }
        // Total converges to the undamped rotation
        for _ in 0..500 {
            camera.update();
        }
        assert!((camera.azimuth - 1.0).abs() < 1e-3);
        assert!(camera.azimuth_delta.abs() < 1e-3);
    }

    #[test]
    fn test_elevation_is_clamped() {
        let mut camera = Camera::default();
        camera.orbit(0.0, 10_000.0);
        assert!(camera.elevation < std::f32::consts::FRAC_PI_2);
        camera.orbit(0.0, -20_000.0);
        assert!(camera.elevation > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_zoom_respects_limits() {
        let mut camera = Camera::default();
        camera.min_distance = 1.0;
        camera.max_distance = 10.0;
        for _ in 0..100 {
            camera.zoom(5.0);
        }
        assert_eq!(camera.distance, 1.0);
        for _ in 0..100 {
            camera.zoom(-5.0);
        }
        assert_eq!(camera.distance, 10.0);
    }
}
