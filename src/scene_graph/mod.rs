pub mod material;
pub mod object3d;
pub mod scene;
pub mod scene_model;
pub mod transform;

pub use material::{color_from_hex, Light, Material, Side};
pub use object3d::{Object3D, ObjectId};
pub use scene::{Scene, SceneError};
pub use scene_model::SceneModelId;
pub use transform::Transform;
