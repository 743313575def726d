use std::{fmt, path::PathBuf};

use id_arena::Id;

use crate::model::Model;

pub type SceneModelId = Id<SceneModel>;

/// Where a scene model's geometry came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Procedural,
    Gltf { path: PathBuf, mesh_index: usize },
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Procedural => f.write_str("procedural"),
            ModelSource::Gltf { path, mesh_index } => {
                write!(f, "{} mesh #{mesh_index}", path.display())
            }
        }
    }
}

/// Geometry shared by every object that draws it.
pub struct SceneModel {
    pub model: Model,
    pub source: ModelSource,
}

impl SceneModel {
    pub fn procedural(model: Model) -> Self {
        Self {
            model,
            source: ModelSource::Procedural,
        }
    }

    pub fn from_gltf(model: Model, path: PathBuf, mesh_index: usize) -> Self {
        Self {
            model,
            source: ModelSource::Gltf { path, mesh_index },
        }
    }
}
