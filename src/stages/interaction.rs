use glam::Vec3;
use rand::Rng;

use super::{FrameContext, Route, Stage};
use crate::{
    camera::Camera,
    input::DesktopControllers,
    interaction::{Grip, Hand, Interaction},
    model::{cuboid, plane},
    orbit::OrbitControls,
    scene_graph::{color_from_hex, Light, Material, Object3D, ObjectId, Scene, Transform},
};

const CUBE_COUNT: usize = 2;
const CUBE_SIZE: f32 = 0.2;

/// Grab cubes with two controllers. On a desktop the controllers are emulated with the mouse
/// (left hand) and the arrow keys plus Space (right hand).
pub struct InteractionStage {
    scene: Scene,
    camera: Camera,
    orbit: OrbitControls,
    interaction: Interaction,
    controllers: Option<DesktopControllers>,
}

impl InteractionStage {
    pub fn new<R: Rng + ?Sized>(rng: &mut R, emulate_controllers: bool) -> anyhow::Result<Self> {
        let mut scene = Scene::new();
        scene.background = color_from_hex(0x505050);
        scene.lights = vec![
            Light::Hemisphere {
                sky: color_from_hex(0x606060),
                ground: color_from_hex(0x404040),
                intensity: 1.0,
            },
            Light::Directional {
                position: Vec3::ONE.normalize(),
                color: Vec3::ONE,
                intensity: 1.0,
            },
        ];

        let floor_model = scene.add_model(plane("Floor", 6.0, 6.0));
        let mut floor = Object3D::mesh(
            "Floor",
            floor_model,
            Material::standard(color_from_hex(0x3a3a3a)),
        )
        .with_transform(Transform::new(
            Vec3::ZERO,
            glam::Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        ));
        floor.raycast = false;
        scene.add_object(floor);

        let group = scene.add_object(Object3D::named("Pickables"));
        let cube_model = scene.add_model(cuboid("Cube", Vec3::splat(CUBE_SIZE)));

        for i in 0..CUBE_COUNT {
            let color = color_from_hex(rng.gen_range(0..=0xffffff));
            let position = Vec3::new(rng.gen::<f32>() - 0.5, 1.6, -1.0);
            scene.add_child(
                group,
                Object3D::mesh(format!("Cube {i}"), cube_model, Material::standard(color))
                    .with_transform(Transform::from_translation(position)),
            )?;
        }

        let interaction = Interaction::new(&mut scene, group)?;
        if !emulate_controllers {
            // Nothing drives the rigs, so they would only float at the origin.
            for hand in Hand::ALL {
                scene.set_visible(interaction.controller_node(hand), false);
            }
        }

        let target = Vec3::new(0.0, 1.6, 0.0);
        let camera = Camera {
            near: 0.1,
            far: 100.0,
            ..Camera::looking_at(Vec3::new(0.0, 1.6, 3.0), target, 50.0)
        };
        let orbit = OrbitControls::new(&camera, target);

        Ok(Self {
            scene,
            camera,
            orbit,
            interaction,
            controllers: emulate_controllers.then(DesktopControllers::new),
        })
    }
}

impl Stage for InteractionStage {
    fn route(&self) -> Route {
        Route::Interaction
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
        self.orbit
            .update(&mut self.camera, ctx.input, ctx.viewport, ctx.pointer_captured);

        if let Some(controllers) = &mut self.controllers {
            let frame = controllers.update(
                &self.camera,
                ctx.input,
                ctx.viewport,
                ctx.dt,
                ctx.pointer_captured,
            );

            for (hand, pose) in &frame.poses {
                self.interaction.set_pose(&mut self.scene, *hand, pose);
            }
            for event in frame.events {
                self.interaction.handle_event(&mut self.scene, event)?;
            }
        }

        self.interaction.update(&mut self.scene)?;
        Ok(())
    }

    fn status(&self) -> Option<String> {
        let name = |object: ObjectId| {
            self.scene
                .get_object(object)
                .map_or("?", |o| o.name.as_str())
        };
        let describe = |hand: Hand| match self.interaction.grip(hand) {
            Grip::Idle => match self.interaction.highlighted(&self.scene, hand) {
                Some(object) => format!(
                    "pointing at {} ({:.1} m)",
                    name(object),
                    self.interaction.ray_length(&self.scene, hand)
                ),
                None => "idle".to_string(),
            },
            Grip::Holding(object) => format!("holding {}", name(object)),
        };

        Some(format!(
            "left: {}, right: {}",
            describe(Hand::Left),
            describe(Hand::Right)
        ))
    }
}
