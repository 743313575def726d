use glam::{Mat4, Vec2, Vec3};

use crate::math::ray::Ray;

/// Right-handed perspective camera looking from `eye` towards `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn looking_at(eye: Vec3, target: Vec3, fov_y: f32) -> Self {
        Self {
            eye,
            target,
            fov_y,
            ..Default::default()
        }
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self, resolution: Vec2) -> Mat4 {
        let aspect = if resolution.y > 0.0 {
            resolution.x / resolution.y
        } else {
            1.0
        };
        Mat4::perspective_rh(self.fov_y.to_radians(), aspect, self.near, self.far)
    }

    pub fn get_vp_matrix(&self, resolution: Vec2) -> Mat4 {
        self.projection_matrix(resolution) * self.view_matrix()
    }

    /// World-space ray through a pixel, with the origin on the near plane.
    pub fn screen_ray(&self, pixel: Vec2, resolution: Vec2) -> Ray {
        let ndc = Vec2::new(
            pixel.x / resolution.x.max(1.0) * 2.0 - 1.0,
            1.0 - pixel.y / resolution.y.max(1.0) * 2.0,
        );
        let inverse = self.get_vp_matrix(resolution).inverse();
        // wgpu depth runs 0..1.
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    pub view_proj: Mat4,
    pub position: [f32; 4],
}

impl CameraUniform {
    pub fn new(camera: &Camera, resolution: Vec2) -> Self {
        Self {
            view_proj: camera.get_vp_matrix(resolution),
            position: camera.eye.extend(1.0).to_array(),
        }
    }
}
