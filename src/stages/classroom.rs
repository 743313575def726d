use std::collections::HashMap;

use anyhow::Context;
use glam::{Quat, Vec3};

use super::{FrameContext, Route, Stage, StageOptions};
use crate::{
    assets::AssetCache,
    camera::Camera,
    model::{cuboid_at, plane},
    orbit::OrbitControls,
    scene_graph::{
        color_from_hex, Light, Material, Object3D, Scene, SceneModelId, Side, Transform,
    },
};

const CLASS_MODEL: &str = "classroom/class.glb";
const DESK_MODEL: &str = "classroom/longdesk.glb";
const CHAIR_MODEL: &str = "classroom/swivelchair.glb";

/// A classroom assembled from glTF models: the room, a 4x4 grid of long desks and a 4x8 grid
/// of swivel chairs, viewed with orbit controls.
pub struct ClassroomStage {
    scene: Scene,
    camera: Camera,
    orbit: OrbitControls,
    missing_assets: usize,
}

impl ClassroomStage {
    pub fn new(options: &StageOptions) -> anyhow::Result<Self> {
        let mut scene = Scene::new();
        let mut furnisher = Furnisher::new(AssetCache::new(&options.assets_root));

        scene.background = color_from_hex(0xa3e8ff);
        scene.lights = vec![
            Light::Directional {
                position: Vec3::new(20.0, 20.0, 7.5),
                color: color_from_hex(0xfff0cc),
                intensity: 1.0,
            },
            Light::Hemisphere {
                sky: Vec3::ONE,
                ground: color_from_hex(0xe3e3e3),
                intensity: 1.25,
            },
        ];

        furnisher.spawn(
            &mut scene,
            CLASS_MODEL,
            Transform::default(),
            Vec3::new(30.0, 0.1, 40.0),
        )?;

        let quarter_turn = Quat::from_rotation_y(90f32.to_radians());

        for i in 0..4 {
            for j in 0..4 {
                let position = Vec3::new(5.25 * j as f32 - 8.0, 0.0, 6.0 * i as f32 - 5.0);
                furnisher.spawn(
                    &mut scene,
                    DESK_MODEL,
                    Transform::new(position, quarter_turn, Vec3::ONE),
                    Vec3::new(1.0, 0.75, 5.0),
                )?;
            }
        }

        for i in 0..4 {
            for j in 0..8 {
                let position = Vec3::new(2.75 * j as f32 - 10.0, 0.0, 6.0 * i as f32 - 3.0);
                furnisher.spawn(
                    &mut scene,
                    CHAIR_MODEL,
                    Transform::new(position, quarter_turn, Vec3::ONE),
                    Vec3::new(0.6, 0.9, 0.6),
                )?;
            }
        }

        let window_model = scene.add_model(plane("Back window", 30.0, 21.0));
        let window_material = Material::basic(color_from_hex(0xe8f7ff)).with_side(Side::Back);
        scene.add_object(
            Object3D::mesh("Back window", window_model, window_material)
                .with_transform(Transform::from_translation(Vec3::new(-0.25, 10.5, 20.25))),
        );

        let missing_assets = furnisher.missing;
        if missing_assets > 0 {
            log::warn!(
                "{missing_assets} classroom models could not be loaded from {}",
                options.assets_root.display()
            );
        }

        let target = Vec3::new(1.0, 2.0, 0.0);
        let camera = Camera {
            near: 0.1,
            far: 100.0,
            ..Camera::looking_at(Vec3::new(1.0, 4.0, 14.0), target, 75.0)
        };
        let orbit = OrbitControls::new(&camera, target);

        Ok(Self {
            scene,
            camera,
            orbit,
            missing_assets,
        })
    }
}

/// Spawns glTF models, or grey placeholder boxes for files that cannot be loaded. Every
/// placeholder of one file shares a single model.
struct Furnisher {
    assets: AssetCache,
    placeholders: HashMap<&'static str, SceneModelId>,
    /// Placeholders spawned so far.
    missing: usize,
}

impl Furnisher {
    fn new(assets: AssetCache) -> Self {
        Self {
            assets,
            placeholders: HashMap::new(),
            missing: 0,
        }
    }

    /// `fallback` is the size of the placeholder box, which stands on the floor.
    fn spawn(
        &mut self,
        scene: &mut Scene,
        path: &'static str,
        transform: Transform,
        fallback: Vec3,
    ) -> anyhow::Result<()> {
        match self.assets.load_gltf(path) {
            Ok(asset) => {
                scene
                    .spawn_gltf(&asset, None, transform)
                    .with_context(|| format!("Failed to spawn {path}"))?;
            }
            Err(err) => {
                let name = format!("{path} (placeholder)");
                let model = *self.placeholders.entry(path).or_insert_with(|| {
                    log::debug!("Using a placeholder for {path}: {err}");
                    scene.add_model(cuboid_at(
                        name.clone(),
                        Vec3::new(0.0, fallback.y * 0.5, 0.0),
                        fallback,
                    ))
                });
                let material = Material::standard(Vec3::splat(0.6));
                scene.add_object(Object3D::mesh(name, model, material).with_transform(transform));
                self.missing += 1;
            }
        }

        Ok(())
    }
}

impl Stage for ClassroomStage {
    fn route(&self) -> Route {
        Route::Classroom
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
        Ok(())
    }

    fn status(&self) -> Option<String> {
        (self.missing_assets > 0).then(|| format!("{} models missing", self.missing_assets))
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, path::PathBuf};

    use super::*;

    #[test]
    fn missing_assets_fall_back_to_placeholders() {
        let options = StageOptions {
            assets_root: PathBuf::from("definitely/not/here"),
            ..Default::default()
        };
        let stage = ClassroomStage::new(&options).unwrap();

        // Room, 16 desks, 32 chairs and the window.
        assert_eq!(stage.missing_assets, 1 + 16 + 32);
        assert_eq!(stage.scene().objects.len(), 1 + 16 + 32 + 1);
        assert!(stage.status().is_some());
    }

    #[test]
    fn placeholders_of_one_file_share_a_model() {
        let options = StageOptions {
            assets_root: PathBuf::from("definitely/not/here"),
            ..Default::default()
        };
        let stage = ClassroomStage::new(&options).unwrap();
        let scene = stage.scene();

        // One placeholder per file, plus the window.
        assert_eq!(scene.models.len(), 3 + 1);

        let chair_models: HashSet<_> = scene
            .objects
            .iter()
            .filter(|(_, object)| object.name.contains("swivelchair"))
            .filter_map(|(_, object)| object.model_id)
            .collect();
        assert_eq!(chair_models.len(), 1);
    }

    #[test]
    fn desks_are_laid_out_on_a_grid() {
        let options = StageOptions {
            assets_root: PathBuf::from("definitely/not/here"),
            ..Default::default()
        };
        let stage = ClassroomStage::new(&options).unwrap();
        let scene = stage.scene();

        let desks: Vec<Vec3> = scene
            .objects
            .iter()
            .filter(|(_, object)| object.name.contains("longdesk"))
            .map(|(id, _)| scene.world_position(id).unwrap())
            .collect();
        assert_eq!(desks.len(), 16);
        assert!(desks.contains(&Vec3::new(-8.0, 0.0, -5.0)));
        assert!(desks.contains(&Vec3::new(7.75, 0.0, 13.0)));
    }
}
