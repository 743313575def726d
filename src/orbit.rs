use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use winit::event::MouseButton;

use crate::{camera::Camera, input::InputState};

const MIN_POLAR: f32 = 0.01;

/// Orbits the camera around a target. Right-drag rotates, the wheel zooms.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    radius: f32,
    /// Angle from +Y.
    polar: f32,
    /// Angle around Y, measured from +Z.
    azimuth: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitControls {
    pub fn new(camera: &Camera, target: Vec3) -> Self {
        let offset = camera.eye - target;
        let radius = offset.length().max(f32::EPSILON);

        Self {
            target,
            radius,
            polar: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            azimuth: offset.x.atan2(offset.z),
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.1,
            max_distance: 500.0,
        }
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    pub fn rotate(&mut self, drag: Vec2, viewport_height: f32) {
        let per_pixel = TAU / viewport_height.max(1.0) * self.rotate_speed;
        self.azimuth -= drag.x * per_pixel;
        self.polar = (self.polar - drag.y * per_pixel).clamp(MIN_POLAR, PI - MIN_POLAR);
    }

    /// Positive lines zoom in.
    pub fn zoom(&mut self, lines: f32) {
        let scale = 0.95f32.powf(lines * self.zoom_speed);
        self.radius = (self.radius * scale).clamp(self.min_distance, self.max_distance);
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let (sin_azimuth, cos_azimuth) = self.azimuth.sin_cos();
        self.target
            + self.radius * Vec3::new(sin_polar * sin_azimuth, cos_polar, sin_polar * cos_azimuth)
    }

    pub fn update(&mut self, camera: &mut Camera, input: &InputState, viewport: Vec2, captured: bool) {
        if !captured {
            if input.is_button_down(MouseButton::Right) {
                self.rotate(input.cursor_delta(), viewport.y);
            }
            if input.scroll_lines() != 0.0 {
                self.zoom(input.scroll_lines());
            }
        }

        camera.eye = self.eye();
        camera.target = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> (Camera, OrbitControls) {
        let camera = Camera::looking_at(Vec3::new(0.0, 1.6, 3.0), Vec3::new(0.0, 1.6, 0.0), 50.0);
        let controls = OrbitControls::new(&camera, camera.target);
        (camera, controls)
    }

    #[test]
    fn starting_pose_is_preserved() {
        let (camera, controls) = controls();
        assert!(controls.eye().abs_diff_eq(camera.eye, 1e-5));
        assert!((controls.distance() - 3.0).abs() < 1e-5);
    }

    #[test]
    fn horizontal_drag_keeps_distance() {
        let (_, mut controls) = controls();
        controls.rotate(Vec2::new(150.0, 0.0), 600.0);
        let eye = controls.eye();
        assert!((eye.distance(controls.target) - 3.0).abs() < 1e-4);
        assert!((eye.y - 1.6).abs() < 1e-4);
        assert!(eye.x.abs() > 1.0);
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let (_, mut controls) = controls();
        controls.rotate(Vec2::new(0.0, 10_000.0), 600.0);
        let up = controls.eye() - controls.target;
        assert!(up.y > 0.0);
        assert!(up.normalize().y < 1.0);
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let (_, mut controls) = controls();
        controls.zoom(1.0);
        assert!(controls.distance() < 3.0);
        controls.zoom(-10_000.0);
        assert_eq!(controls.distance(), controls.max_distance);
    }

    #[test]
    fn captured_pointer_leaves_camera_alone() {
        let (mut camera, mut controls) = controls();
        let mut input = InputState::new();
        input.press_button(MouseButton::Right);
        input.move_cursor(Vec2::ZERO);
        input.move_cursor(Vec2::new(100.0, 0.0));

        controls.update(&mut camera, &input, Vec2::new(800.0, 600.0), true);
        assert!(camera.eye.abs_diff_eq(Vec3::new(0.0, 1.6, 3.0), 1e-5));

        controls.update(&mut camera, &input, Vec2::new(800.0, 600.0), false);
        assert!(!camera.eye.abs_diff_eq(Vec3::new(0.0, 1.6, 3.0), 1e-3));
    }
}
