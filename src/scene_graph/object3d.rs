use id_arena::Id;

use crate::scene_graph::material::Material;
use crate::scene_graph::scene_model::SceneModelId;
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub model_id: Option<SceneModelId>,
    pub material: Material,
    pub visible: bool,
    /// Whether ray picking may hit this object's mesh.
    pub raycast: bool,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
}

impl Object3D {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn mesh(name: impl Into<String>, model_id: SceneModelId, material: Material) -> Self {
        Self {
            name: name.into(),
            model_id: Some(model_id),
            material,
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

impl Default for Object3D {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Transform::default(),
            model_id: None,
            material: Material::default(),
            visible: true,
            raycast: true,
            parent_id: None,
            child_ids: Vec::new(),
        }
    }
}
