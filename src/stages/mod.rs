//! Independent scenes reachable through a route path. Only one stage is mounted at a time.

pub mod classroom;
pub mod interaction;
pub mod movement;
pub mod physics;
pub mod sphere;

use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::Context;
use glam::{Vec2, Vec3};

use crate::{
    camera::Camera,
    input::InputState,
    physics::{BodyId, PhysicsWorld},
    scene_graph::{ObjectId, Scene},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Classroom,
    Interaction,
    Physics,
    Movement,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown route {0:?}")]
pub struct UnknownRoute(pub String);

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Home,
        Route::Classroom,
        Route::Interaction,
        Route::Physics,
        Route::Movement,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Classroom => "/Classroom",
            Route::Interaction => "/Interaction",
            Route::Physics => "/Physics",
            Route::Movement => "/Movement",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Route::Home => "Feel the Sphere",
            Route::Classroom => "Classroom",
            Route::Interaction => "Interaction",
            Route::Physics => "Physics",
            Route::Movement => "Movement",
        }
    }

    pub fn from_path(path: &str) -> Result<Route, UnknownRoute> {
        Route::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .ok_or_else(|| UnknownRoute(path.to_string()))
    }
}

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::from_path(s)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Per-frame inputs handed to the mounted stage.
pub struct FrameContext<'a> {
    /// Seconds since the stage was mounted.
    pub time: f32,
    pub dt: f32,
    pub input: &'a InputState,
    pub viewport: Vec2,
    /// The UI owns the pointer this frame.
    pub pointer_captured: bool,
}

/// Settings shared by every stage constructor.
#[derive(Debug, Clone)]
pub struct StageOptions {
    pub assets_root: PathBuf,
    pub emulate_controllers: bool,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from("assets"),
            emulate_controllers: true,
        }
    }
}

pub trait Stage {
    fn route(&self) -> Route;
    fn scene(&self) -> &Scene;
    fn scene_mut(&mut self) -> &mut Scene;
    fn camera(&self) -> &Camera;
    fn update(&mut self, ctx: &FrameContext) -> anyhow::Result<()>;

    /// Extra lines for the navigation window.
    fn status(&self) -> Option<String> {
        None
    }
}

pub fn mount(route: Route, options: &StageOptions) -> anyhow::Result<Box<dyn Stage>> {
    let stage: Box<dyn Stage> = match route {
        Route::Home => Box::new(sphere::SphereStage::new()?),
        Route::Classroom => Box::new(classroom::ClassroomStage::new(options)?),
        Route::Interaction => Box::new(interaction::InteractionStage::new(
            &mut rand::thread_rng(),
            options.emulate_controllers,
        )?),
        Route::Physics => Box::new(physics::PhysicsStage::new()?),
        Route::Movement => Box::new(movement::MovementStage::new()?),
    };

    Ok(stage)
}

/// Owns the mounted stage. Navigating drops the previous stage together with its scene,
/// physics world and controllers.
pub struct Router {
    options: StageOptions,
    stage: Box<dyn Stage>,
    generation: u64,
    mounted_at: f32,
}

impl Router {
    pub fn new(route: Route, options: StageOptions) -> anyhow::Result<Self> {
        let stage = mount(route, &options).with_context(|| format!("Failed to mount {route}"))?;
        log::info!("Mounted {route}");

        Ok(Self {
            options,
            stage,
            generation: 0,
            mounted_at: 0.0,
        })
    }

    pub fn route(&self) -> Route {
        self.stage.route()
    }

    /// Bumped on every navigation. Renderers drop cached GPU data when it changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stage(&self) -> &dyn Stage {
        self.stage.as_ref()
    }

    pub fn stage_mut(&mut self) -> &mut dyn Stage {
        self.stage.as_mut()
    }

    /// Time at which the current stage was mounted, on the caller's clock.
    pub fn mounted_at(&self) -> f32 {
        self.mounted_at
    }

    /// Swaps in a fresh stage for `route`. Navigating to the mounted route does nothing.
    /// On failure the current stage stays mounted.
    pub fn navigate(&mut self, route: Route, now: f32) -> anyhow::Result<bool> {
        if route == self.route() {
            return Ok(false);
        }

        let stage =
            mount(route, &self.options).with_context(|| format!("Failed to mount {route}"))?;
        log::info!("Navigating {} -> {route}", self.route());

        self.stage = stage;
        self.generation += 1;
        self.mounted_at = now;
        Ok(true)
    }

    pub fn update(&mut self, ctx: &FrameContext) -> anyhow::Result<()> {
        self.stage.update(ctx)
    }
}

/// Copies each body's pose onto the mesh that shows it.
pub(crate) fn sync_bodies(
    world: &PhysicsWorld,
    scene: &mut Scene,
    links: &[(BodyId, ObjectId)],
) {
    for &(body_id, object_id) in links {
        if let Some(body) = world.body(body_id) {
            scene.set_object_transform(object_id, body.position, body.orientation, Vec3::ONE);
        }
    }
}
