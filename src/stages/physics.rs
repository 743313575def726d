use glam::Vec3;

use super::{sync_bodies, FrameContext, Route, Stage};
use crate::{
    camera::Camera,
    model::{cuboid, plane},
    physics::{Body, BodyId, PhysicsWorld},
    scene_graph::{color_from_hex, Light, Material, Object3D, ObjectId, Scene, Transform},
};

const TIME_STEP: f32 = 1.0 / 60.0;
const BOX_MASS: f32 = 100_000.0;
const BOX_POSITIONS: [Vec3; 6] = [
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(2.0, 1.0, 5.0),
    Vec3::new(0.0, 0.0, 6.0),
    Vec3::new(-1.0, 1.0, 8.0),
    Vec3::new(-2.0, 2.0, 13.0),
    Vec3::new(2.0, -1.0, 13.0),
];

/// Six heavy boxes dropping onto a plane. The world is z-up: the plane lies at z = -10 and
/// gravity pulls along -Z, towards the camera's far side.
pub struct PhysicsStage {
    scene: Scene,
    camera: Camera,
    world: PhysicsWorld,
    links: Vec<(BodyId, ObjectId)>,
}

impl PhysicsStage {
    pub fn new() -> anyhow::Result<Self> {
        let mut scene = Scene::new();
        scene.lights = vec![
            Light::ambient(Vec3::ONE, 0.5),
            // Stands in for a narrow spot light aimed at the origin.
            Light::Point {
                position: Vec3::new(30.0, 30.0, 50.0),
                color: Vec3::ONE,
                intensity: 0.6,
            },
        ];

        let mut world = PhysicsWorld::new(Vec3::new(0.0, 0.0, -10.0));
        let mut links = Vec::new();

        let ground_position = Vec3::new(0.0, 0.0, -10.0);
        let ground_body = world.add_body(Body::plane().with_position(ground_position));
        let ground_model = scene.add_model(plane("Ground", 1000.0, 1000.0));
        let ground = scene.add_object(
            Object3D::mesh(
                "Ground",
                ground_model,
                Material::standard(color_from_hex(0x272727)),
            )
            .with_transform(Transform::from_translation(ground_position)),
        );
        links.push((ground_body, ground));

        let box_model = scene.add_model(cuboid("Box", Vec3::splat(2.0)));
        for (i, position) in BOX_POSITIONS.into_iter().enumerate() {
            let body = world.add_body(Body::cuboid(Vec3::ONE, BOX_MASS).with_position(position));
            let object = scene.add_object(
                Object3D::mesh(format!("Box {i}"), box_model, Material::default())
                    .with_transform(Transform::from_translation(position)),
            );
            links.push((body, object));
        }

        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 15.0), Vec3::ZERO, 75.0);

        Ok(Self {
            scene,
            camera,
            world,
            links,
        })
    }
}

impl Stage for PhysicsStage {
    fn route(&self) -> Route {
        Route::Physics
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
    use super::*;
    use crate::input::InputState;

    #[test]
    fn boxes_settle_on_the_plane_and_meshes_follow() {
        let mut stage = PhysicsStage::new().unwrap();
        let input = InputState::new();
        let ctx = FrameContext {
            time: 0.0,
            dt: TIME_STEP,
            input: &input,
            viewport: glam::Vec2::new(800.0, 600.0),
            pointer_captured: false,
        };

        for _ in 0..600 {
            stage.update(&ctx).unwrap();
        }

        for &(body_id, object_id) in &stage.links[1..] {
            let body = stage.world.body(body_id).unwrap();
            assert!(body.position.z > -10.0, "box sank through the plane: {}", body.position);
            let mesh = stage.scene.world_position(object_id).unwrap();
            assert!(mesh.abs_diff_eq(body.position, 1e-5));
        }
    }
}
