use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};

use super::{sync_bodies, FrameContext, Route, Stage};
use crate::{
    camera::Camera,
    model::{cuboid, plane},
    physics::{Body, BodyId, PhysicsWorld},
    scene_graph::{color_from_hex, Light, Material, Object3D, ObjectId, Scene},
};

const TIME_STEP: f32 = 1.0 / 60.0;

/// A single spinning box falling onto a small floor. The meshes copy their body poses after
/// every step.
pub struct MovementStage {
    scene: Scene,
    camera: Camera,
    world: PhysicsWorld,
    links: [(BodyId, ObjectId); 2],
}

impl MovementStage {
    pub fn new() -> anyhow::Result<Self> {
        let mut scene = Scene::new();
        scene.background = color_from_hex(0x808080);
        scene.lights = vec![
            Light::Hemisphere {
                sky: color_from_hex(0x808080),
                ground: color_from_hex(0x606060),
                intensity: 1.0,
            },
            Light::Directional {
                position: Vec3::new(0.0, 6.0, 0.0),
                color: Vec3::ONE,
                intensity: 1.0,
            },
        ];

        let mut world = PhysicsWorld::new(Vec3::new(0.0, -2.0, 0.0)).with_solver_iterations(10);

        let ground_body = world.add_body(
            Body::plane()
                .with_orientation(Quat::from_rotation_x(-FRAC_PI_2))
                .with_position(Vec3::new(0.0, -3.0, 0.0)),
        );
        let box_body = world.add_body(
            Body::cuboid(Vec3::ONE, 1.0)
                .with_position(Vec3::new(0.0, 2.0, 0.0))
                .with_angular_velocity(Vec3::new(0.0, 0.0, 10.0))
                .with_angular_damping(0.5),
        );

        let box_model = scene.add_model(cuboid("Box", Vec3::splat(2.0)));
        let box_mesh = scene.add_object(Object3D::mesh(
            "Box",
            box_model,
            Material::basic(color_from_hex(0xff0000)),
        ));

        let floor_model = scene.add_model(plane("Floor", 4.0, 4.0));
        let floor_mesh = scene.add_object(Object3D::mesh(
            "Floor",
            floor_model,
            Material::standard(color_from_hex(0xeeeeee)).with_pbr(0.0, 1.0),
        ));

        let links = [(box_body, box_mesh), (ground_body, floor_mesh)];
        sync_bodies(&world, &mut scene, &links);

        let camera = Camera {
            near: 1.0,
            far: 100.0,
            ..Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 75.0)
        };

        Ok(Self {
            scene,
            camera,
            world,
            links,
        })
    }
}

impl Stage for MovementStage {
    fn route(&self) -> Route {
        Route::Movement
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

    fn update(&mut self, _ctx: &FrameContext) -> anyhow::Result<()> {
        self.world.step(TIME_STEP);
        sync_bodies(&self.world, &mut self.scene, &self.links);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;

    #[test]
    fn floor_mesh_starts_at_the_ground_body() {
        let stage = MovementStage::new().unwrap();
        let floor = stage.scene.get_object_by_name("Floor").unwrap();
        let world = stage.scene.world_matrix(floor).unwrap();
        assert!(world
            .transform_vector3(Vec3::Z)
            .abs_diff_eq(Vec3::Y, 1e-5));
        assert!((world.w_axis.y + 3.0).abs() < 1e-6);
    }

    #[test]
    fn box_mesh_follows_the_spinning_body() {
        let mut stage = MovementStage::new().unwrap();
        let input = crate::input::InputState::new();
        let ctx = FrameContext {
            time: 0.0,
            dt: TIME_STEP,
            input: &input,
            viewport: glam::Vec2::new(800.0, 600.0),
            pointer_captured: false,
        };

        for _ in 0..30 {
            stage.update(&ctx).unwrap();
        }

        let (body_id, mesh) = stage.links[0];
        let body = stage.world.body(body_id).unwrap();
        assert!(body.position.y < 2.0);
        let expected = Mat4::from_rotation_translation(body.orientation, body.position);
        assert!(stage.scene.world_matrix(mesh).unwrap().abs_diff_eq(expected, 1e-5));
        assert!(body.orientation.angle_between(Quat::IDENTITY) > 1.0);
    }
}
