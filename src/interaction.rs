//! Ray-based grabbing for two tracked controllers.
//!
//! Each controller is a scene node carrying a visible ray and owning its own outline
//! highlight. While idle, a controller highlights the nearest object of the shared group under
//! its ray. Pressing select on a highlighted object attaches it to the controller; releasing
//! select hands it back to the group. Both moves preserve the object's world transform.

use glam::{Mat4, Vec3};

use crate::{
    math::ray::Ray,
    model::ray_segment,
    picking::{self, Hit},
    scene_graph::{Material, Object3D, ObjectId, Scene, SceneError, SceneModelId, Side},
};

pub const DEFAULT_RAY_LENGTH: f32 = 10.0;
const HIGHLIGHT_SCALE: f32 = 1.1;
const HELD_EMISSIVE: Vec3 = Vec3::new(0.0, 0.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];

    fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn other(self) -> Hand {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grip {
    #[default]
    Idle,
    Holding(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    SelectStart(Hand),
    SelectEnd(Hand),
}

struct Controller {
    node: ObjectId,
    ray: ObjectId,
    highlight: ObjectId,
    grip: Grip,
    hovered: Option<Hit>,
    /// Emissive colour of the held object before it was tinted.
    held_emissive: Vec3,
}

pub struct Interaction {
    group: ObjectId,
    controllers: [Controller; 2],
}

impl Interaction {
    /// Adds both controller rigs to the scene. Objects become grabbable by being children of
    /// `group`.
    pub fn new(scene: &mut Scene, group: ObjectId) -> Result<Self, SceneError> {
        if !scene.contains(group) {
            return Err(SceneError::UnknownObject(group));
        }

        let ray_model = scene.add_model(ray_segment("Controller ray"));
        let highlight_material = Material::basic(Vec3::ONE).with_side(Side::Back);

        let mut build = |hand: Hand| -> Result<Controller, SceneError> {
            let mut node = Object3D::named(format!("Controller ({hand:?})"));
            node.raycast = false;
            let node = scene.add_object(node);

            let mut ray = Object3D::mesh("line", ray_model, Material::basic(Vec3::ONE));
            ray.raycast = false;
            ray.transform
                .set_scale(Vec3::new(1.0, 1.0, DEFAULT_RAY_LENGTH));
            let ray = scene.add_child(node, ray)?;

            let mut highlight = Object3D::named(format!("Highlight ({hand:?})"));
            highlight.material = highlight_material;
            highlight.visible = false;
            highlight.raycast = false;
            highlight.transform.set_scale(Vec3::splat(HIGHLIGHT_SCALE));
            let highlight = scene.add_object(highlight);

            Ok(Controller {
                node,
                ray,
                highlight,
                grip: Grip::Idle,
                hovered: None,
                held_emissive: Vec3::ZERO,
            })
        };

        let left = build(Hand::Left)?;
        let right = build(Hand::Right)?;

        Ok(Self {
            group,
            controllers: [left, right],
        })
    }

    fn controller(&self, hand: Hand) -> &Controller {
        &self.controllers[hand.index()]
    }

    fn controller_mut(&mut self, hand: Hand) -> &mut Controller {
        &mut self.controllers[hand.index()]
    }

    pub fn group(&self) -> ObjectId {
        self.group
    }

    pub fn grip(&self, hand: Hand) -> Grip {
        self.controller(hand).grip
    }

    pub fn hovered(&self, hand: Hand) -> Option<Hit> {
        self.controller(hand).hovered
    }

    pub fn controller_node(&self, hand: Hand) -> ObjectId {
        self.controller(hand).node
    }

    pub fn ray_length(&self, scene: &Scene, hand: Hand) -> f32 {
        scene
            .get_object_transform(self.controller(hand).ray)
            .map(|transform| transform.scale().z)
            .unwrap_or(DEFAULT_RAY_LENGTH)
    }

    /// The grabbable object whose outline this controller currently shows, if any.
    pub fn highlighted(&self, scene: &Scene, hand: Hand) -> Option<ObjectId> {
        let highlight = scene.get_object(self.controller(hand).highlight)?;
        if !highlight.visible {
            return None;
        }
        self.controller(hand).hovered.map(|hit| hit.object)
    }

    pub fn set_pose(&self, scene: &mut Scene, hand: Hand, pose: &Mat4) {
        scene.set_object_matrix(self.controller(hand).node, pose);
    }

    fn cast(&self, scene: &Scene, hand: Hand) -> Result<Option<Hit>, SceneError> {
        let pose = scene.world_matrix(self.controller(hand).node)?;
        let ray = Ray::from_pose(&pose);
        Ok(picking::pick(scene, self.group, &ray))
    }

    /// Per-frame hover pass. Every controller's highlight is decided once and written once.
    pub fn update(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        for hand in Hand::ALL {
            match self.grip(hand) {
                Grip::Holding(_) => {
                    self.clear_highlight(scene, hand)?;
                    self.controller_mut(hand).hovered = None;
                }
                Grip::Idle => {
                    let hit = self.cast(scene, hand)?;
                    self.show_hover(scene, hand, hit)?;
                }
            }
        }

        Ok(())
    }

    fn show_hover(
        &mut self,
        scene: &mut Scene,
        hand: Hand,
        hit: Option<Hit>,
    ) -> Result<(), SceneError> {
        let Some(hit) = hit else {
            self.clear_highlight(scene, hand)?;
            self.set_ray_length(scene, hand, DEFAULT_RAY_LENGTH);
            self.controller_mut(hand).hovered = None;
            return Ok(());
        };

        let highlight = self.controller(hand).highlight;
        let outline = outline_target(scene, hit.object);
        // The shell sits on the node carrying the mesh so it inherits that node's transform.
        let anchor = outline.map_or(hit.object, |(node, _)| node);

        let current_parent = scene.get_object(highlight).and_then(|o| o.parent_id);
        if current_parent != Some(anchor) {
            scene.set_object_parent(highlight, Some(anchor))?;
        }

        if let Some(object) = scene.get_object_mut(highlight) {
            object.model_id = outline.map(|(_, model)| model);
            object.visible = outline.is_some();
        }

        self.set_ray_length(scene, hand, hit.distance);
        self.controller_mut(hand).hovered = Some(hit);

        Ok(())
    }

    fn clear_highlight(&self, scene: &mut Scene, hand: Hand) -> Result<(), SceneError> {
        let highlight = self.controller(hand).highlight;
        let Some(object) = scene.get_object_mut(highlight) else {
            return Err(SceneError::UnknownObject(highlight));
        };

        object.visible = false;
        if object.parent_id.is_some() {
            scene.set_object_parent(highlight, None)?;
        }

        Ok(())
    }

    fn set_ray_length(&self, scene: &mut Scene, hand: Hand, length: f32) {
        scene.set_object_scale(self.controller(hand).ray, Vec3::new(1.0, 1.0, length));
    }

    /// Grabs the object under the ray, if any. Returns the grabbed object.
    pub fn select_start(
        &mut self,
        scene: &mut Scene,
        hand: Hand,
    ) -> Result<Option<ObjectId>, SceneError> {
        if let Grip::Holding(_) = self.grip(hand) {
            return Ok(None);
        }

        let Some(hit) = self.cast(scene, hand)? else {
            return Ok(None);
        };

        if self.grip(hand.other()) == Grip::Holding(hit.object) {
            log::warn!("{hand:?} tried to grab an object held by the other controller");
            return Ok(None);
        }

        let node = self.controller(hand).node;
        scene.attach(hit.object, Some(node))?;
        self.clear_highlight(scene, hand)?;
        self.set_ray_length(scene, hand, hit.distance);

        let held_emissive = match scene.material_mut(hit.object) {
            Some(material) => std::mem::replace(&mut material.emissive, HELD_EMISSIVE),
            None => Vec3::ZERO,
        };

        let controller = self.controller_mut(hand);
        controller.grip = Grip::Holding(hit.object);
        controller.hovered = None;
        controller.held_emissive = held_emissive;

        let position = scene.world_position(hit.object)?;
        log::debug!(
            "{hand:?} grabbed {:?} at {:.2}m, world position {position}",
            hit.object,
            hit.distance,
        );
        Ok(Some(hit.object))
    }

    /// Hands the held object back to the group. A no-op while idle.
    pub fn select_end(
        &mut self,
        scene: &mut Scene,
        hand: Hand,
    ) -> Result<Option<ObjectId>, SceneError> {
        let Grip::Holding(object) = self.grip(hand) else {
            return Ok(None);
        };

        scene.attach(object, Some(self.group))?;

        let held_emissive = self.controller(hand).held_emissive;
        if let Some(material) = scene.material_mut(object) {
            material.emissive = held_emissive;
        }

        self.controller_mut(hand).grip = Grip::Idle;

        log::debug!("{hand:?} released {object:?}");
        Ok(Some(object))
    }

    pub fn handle_event(
        &mut self,
        scene: &mut Scene,
        event: ControllerEvent,
    ) -> Result<Option<ObjectId>, SceneError> {
        match event {
            ControllerEvent::SelectStart(hand) => self.select_start(scene, hand),
            ControllerEvent::SelectEnd(hand) => self.select_end(scene, hand),
        }
    }
}

/// The mesh the outline should copy: the object's own, or the first one in its subtree.
/// The first raycastable mesh at or below `object`, with the node that carries it.
fn outline_target(scene: &Scene, object: ObjectId) -> Option<(ObjectId, SceneModelId)> {
    std::iter::once(object)
        .chain(scene.descendants(object))
        .filter_map(|id| Some((id, scene.get_object(id)?)))
        .filter(|(_, o)| o.raycast)
        .find_map(|(id, o)| Some((id, o.model_id?)))
}
