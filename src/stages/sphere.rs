use glam::{EulerRot, Quat, Vec2, Vec3};

use super::{FrameContext, Route, Stage};
use crate::{
    camera::Camera,
    model::uv_sphere,
    scene_graph::{color_from_hex, Light, Material, Object3D, ObjectId, Scene},
};

const POINTER_SCALE: f32 = 0.001;

/// A dark metallic sphere lit by three coloured point lights. It spins slowly and leans
/// towards the pointer.
pub struct SphereStage {
    scene: Scene,
    camera: Camera,
    sphere: ObjectId,
    /// Pitch carried over between frames; yaw is recomputed from time each frame.
    pitch: f32,
}

impl SphereStage {
    pub fn new() -> anyhow::Result<Self> {
        let mut scene = Scene::new();

        let model = scene.add_model(uv_sphere("Sphere", 0.5, 64, 64));
        let material = Material::standard(color_from_hex(0x292929)).with_pbr(0.7, 0.2);
        let sphere = scene.add_object(Object3D::mesh("Sphere", model, material));

        scene.lights = vec![
            Light::Point {
                position: Vec3::new(2.0, 3.0, 4.0),
                color: Vec3::ONE,
                intensity: 0.1,
            },
            Light::Point {
                position: Vec3::new(-1.86, 1.0, -1.65),
                color: color_from_hex(0xff0000),
                intensity: 10.0,
            },
            Light::Point {
                position: Vec3::new(2.13, -3.0, -1.98),
                color: color_from_hex(0x00e1ff),
                intensity: 6.8,
            },
        ];

        let camera = Camera {
            near: 0.1,
            far: 100.0,
            ..Camera::looking_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, 75.0)
        };

        Ok(Self {
            scene,
            camera,
            sphere,
            pitch: 0.0,
        })
    }

    /// Eases the rotation towards the pointer offset from the viewport center.
    fn rotation(&mut self, time: f32, pointer: Option<Vec2>, viewport: Vec2) -> Quat {
        let target = pointer
            .map(|pointer| (pointer - viewport * 0.5) * POINTER_SCALE)
            .unwrap_or(Vec2::ZERO);

        let mut yaw = 0.5 * time;
        yaw += 0.5 * (target.x - yaw);
        self.pitch += 0.05 * (target.y - self.pitch);

        Quat::from_euler(EulerRot::XYZ, self.pitch, yaw, 0.0)
    }
}

impl Stage for SphereStage {
    fn route(&self) -> Route {
        Route::Home
    }

    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn update(&mut self, ctx: &FrameContext) -> anyhow::Result<()> {
        let rotation = self.rotation(ctx.time, ctx.input.cursor(), ctx.viewport);
        self.scene.set_object_rotation(self.sphere, rotation);
        Ok(())
    }
}
