use glam::{Mat4, Quat, Vec3, Vec4Swizzles};
use id_arena::Arena;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::assets::{AssetError, GltfAsset};
use crate::model::{Buffers, Model};
use crate::scene_graph::material::{Light, Material};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};
use crate::scene_graph::transform::Transform;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("object {0:?} does not exist in this scene")]
    UnknownObject(ObjectId),
    #[error("cannot parent {child:?} under {parent:?}: it is the object itself or one of its descendants")]
    Cycle { child: ObjectId, parent: ObjectId },
}

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    pub background: Vec3,
    pub lights: Vec<Light>,
    gltf_mesh_to_model: HashMap<(PathBuf, usize), SceneModelId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            background: Vec3::ZERO,
            lights: Vec::new(),
            gltf_mesh_to_model: HashMap::new(),
        }
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    /// Adds an object and parents it in one step. The object keeps its local transform.
    pub fn add_child(
        &mut self,
        parent: ObjectId,
        object: Object3D,
    ) -> Result<ObjectId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::UnknownObject(parent));
        }

        let object_id = self.add_object(object);
        self.set_object_parent(object_id, Some(parent))?;
        Ok(object_id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.get(id).is_some()
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Option<&mut Object3D> {
        self.objects.get_mut(id)
    }

    pub fn add_model(&mut self, model: Model) -> SceneModelId {
        self.models.alloc(SceneModel::procedural(model))
    }

    pub fn get_model(&self, id: SceneModelId) -> Option<&SceneModel> {
        self.models.get(id)
    }

    /// Instantiates the default scene of a glTF document as a new subtree. Meshes are shared
    /// between repeated spawns of the same file.
    pub fn spawn_gltf(
        &mut self,
        asset: &GltfAsset,
        parent: Option<ObjectId>,
        root_transform: Transform,
    ) -> Result<ObjectId, AssetError> {
        let gltf_scene = asset.default_scene()?;
        let root_name = asset
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "glTF".to_string());

        let root = self.add_object(Object3D::named(root_name).with_transform(root_transform));
        if let Some(parent) = parent {
            self.set_object_parent(root, Some(parent))?;
        }

        for node in gltf_scene.nodes() {
            self.spawn_gltf_node(asset, asset.buffers(), &node, root)?;
        }

        Ok(root)
    }

    fn spawn_gltf_node(
        &mut self,
        asset: &GltfAsset,
        buffers: Buffers,
        node: &gltf::Node,
        parent: ObjectId,
    ) -> Result<ObjectId, AssetError> {
        let mut object = Object3D::default();
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        object.name = node_name.clone();
        let (translation, rotation, scale) = node.transform().decomposed();

        object.transform.set_transform(
            translation.into(),
            Quat::from_array(rotation),
            scale.into(),
        );

        if let Some(mesh) = node.mesh() {
            let key = (asset.path.clone(), mesh.index());

            let model_id = match self.gltf_mesh_to_model.get(&key).copied() {
                Some(model_id) => model_id,
                None => {
                    let mesh_name = mesh
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("{} (Mesh)", node_name));

                    let model = Model::from_gltf(mesh_name, mesh.clone(), buffers)?;
                    let model_id = self
                        .models
                        .alloc(SceneModel::from_gltf(model, key.0.clone(), key.1));
                    self.gltf_mesh_to_model.insert(key, model_id);

                    model_id
                }
            };

            object.model_id = Some(model_id);
            object.material = material_from_gltf(&mesh);
        }

        let object_id = self.add_object(object);
        self.attach_new_child(object_id, parent);

        for child in node.children() {
            self.spawn_gltf_node(asset, buffers, &child, object_id)?;
        }

        Ok(object_id)
    }

    // Both ids were just allocated by this scene, so there is nothing to validate.
    fn attach_new_child(&mut self, child_id: ObjectId, parent_id: ObjectId) {
        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = Some(parent_id);
        }
        if let Some(parent) = self.objects.get_mut(parent_id) {
            parent.child_ids.push(child_id);
        }
    }

    /// Updates all object transforms in hierarchical order
    fn update_transforms(&self) {
        let root_objects = self
            .objects
            .iter()
            .filter(|(_, object)| object.parent_id.is_none())
            .map(|(id, _)| id);

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY, false);
        }
    }

    fn update_object_transform_recursive(
        &self,
        object_id: ObjectId,
        parent_world_matrix: Mat4,
        parent_changed: bool,
    ) {
        let Some(object) = self.objects.get(object_id) else {
            return;
        };

        let changed = parent_changed || object.transform.is_world_dirty();
        if changed {
            let local_matrix = *object.transform.get_local_matrix();
            object
                .transform
                .set_world_matrix(parent_world_matrix * local_matrix);
        }

        let world_matrix = *object.transform.get_world_matrix();
        for &child_id in &object.child_ids {
            self.update_object_transform_recursive(child_id, world_matrix, changed);
        }
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    /// True if `id` is `ancestor` itself or sits somewhere below it.
    pub fn is_in_subtree(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = Some(id);
        while let Some(current_id) = current {
            if current_id == ancestor {
                return true;
            }
            current = self.objects.get(current_id).and_then(|o| o.parent_id);
        }
        false
    }

    /// Sets the parent of an object, keeping its local transform.
    pub fn set_object_parent(
        &mut self,
        child_id: ObjectId,
        new_parent_id: Option<ObjectId>,
    ) -> Result<(), SceneError> {
        let old_parent_id = self
            .objects
            .get(child_id)
            .ok_or(SceneError::UnknownObject(child_id))?
            .parent_id;

        if let Some(new_parent_id) = new_parent_id {
            if !self.contains(new_parent_id) {
                return Err(SceneError::UnknownObject(new_parent_id));
            }
            if self.is_in_subtree(child_id, new_parent_id) {
                return Err(SceneError::Cycle {
                    child: child_id,
                    parent: new_parent_id,
                });
            }
        }

        if let Some(old_parent) = old_parent_id.and_then(|id| self.objects.get_mut(id)) {
            old_parent.child_ids.retain(|&id| id != child_id);
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;
        }

        if let Some(new_parent) = new_parent_id.and_then(|id| self.objects.get_mut(id)) {
            new_parent.child_ids.push(child_id);
        }

        self.invalidate_object_hierarchy(child_id);
        Ok(())
    }

    /// Reparents an object while keeping its world transform.
    pub fn attach(
        &mut self,
        child_id: ObjectId,
        new_parent_id: Option<ObjectId>,
    ) -> Result<(), SceneError> {
        let child_world = self.world_matrix(child_id)?;
        let parent_world = match new_parent_id {
            Some(parent_id) => self.world_matrix(parent_id)?,
            None => Mat4::IDENTITY,
        };

        self.set_object_parent(child_id, new_parent_id)?;

        let local = parent_world.inverse() * child_world;
        if let Some(child) = self.objects.get_mut(child_id) {
            child.transform.set_from_matrix(&local);
        }
        self.invalidate_object_hierarchy(child_id);

        Ok(())
    }

    /// World matrix computed from the parent chain, independent of `late_update`.
    pub fn world_matrix(&self, object_id: ObjectId) -> Result<Mat4, SceneError> {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(object_id);

        while let Some(current_id) = current {
            let object = self
                .objects
                .get(current_id)
                .ok_or(SceneError::UnknownObject(current_id))?;
            matrix = *object.transform.get_local_matrix() * matrix;
            current = object.parent_id;
        }

        Ok(matrix)
    }

    pub fn world_position(&self, object_id: ObjectId) -> Result<Vec3, SceneError> {
        Ok(self.world_matrix(object_id)?.w_axis.xyz())
    }

    /// An object is drawn only if it and all of its ancestors are visible.
    pub fn is_visible_in_hierarchy(&self, object_id: ObjectId) -> bool {
        let mut current = Some(object_id);
        while let Some(current_id) = current {
            match self.objects.get(current_id) {
                Some(object) if object.visible => current = object.parent_id,
                _ => return false,
            }
        }
        true
    }

    /// Pre-order list of the subtree below `object_id`, excluding the object itself.
    pub fn descendants(&self, object_id: ObjectId) -> Vec<ObjectId> {
        let mut result = Vec::new();
        let mut stack = match self.objects.get(object_id) {
            Some(object) => object.child_ids.iter().rev().copied().collect::<Vec<_>>(),
            None => return result,
        };

        while let Some(id) = stack.pop() {
            result.push(id);
            if let Some(object) = self.objects.get(id) {
                stack.extend(object.child_ids.iter().rev().copied());
            }
        }

        result
    }

    pub fn set_visible(&mut self, object_id: ObjectId, visible: bool) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.visible = visible;
        }
    }

    pub fn material_mut(&mut self, object_id: ObjectId) -> Option<&mut Material> {
        self.objects
            .get_mut(object_id)
            .map(|object| &mut object.material)
    }

    pub fn set_object_rotation(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_rotation(rotation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_scale(&mut self, object_id: ObjectId, scale: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_scale(scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_transform(
        &mut self,
        object_id: ObjectId,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_transform(translation, rotation, scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_matrix(&mut self, object_id: ObjectId, matrix: &Mat4) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_from_matrix(matrix);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn get_object_transform(&self, object_id: ObjectId) -> Option<&Transform> {
        self.objects.get(object_id).map(|object| &object.transform)
    }

    /// Refreshes the cached world matrices of every object whose transform or ancestor changed.
    pub fn late_update(&mut self) {
        self.update_transforms();
    }
}

#[cfg(test)]
impl Scene {
    /// First object with this name, in allocation order.
    pub fn get_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }
}

fn material_from_gltf(mesh: &gltf::Mesh) -> Material {
    let Some(primitive) = mesh.primitives().next() else {
        return Material::default();
    };

    let pbr = primitive.material().pbr_metallic_roughness();
    let [r, g, b, _a] = pbr.base_color_factor();

    Material::standard(Vec3::new(r, g, b)).with_pbr(pbr.metallic_factor(), pbr.roughness_factor())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cuboid;

    fn node_at(scene: &mut Scene, name: &str, translation: Vec3) -> ObjectId {
        scene.add_object(
            Object3D::named(name).with_transform(Transform::from_translation(translation)),
        )
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let parent = node_at(&mut scene, "parent", Vec3::new(1.0, 0.0, 0.0));
        let child = node_at(&mut scene, "child", Vec3::new(0.0, 2.0, 0.0));
        scene.set_object_parent(child, Some(parent)).unwrap();

        let position = scene.world_position(child).unwrap();
        assert!(position.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn late_update_matches_on_demand_world_matrix() {
        let mut scene = Scene::new();
        let parent = node_at(&mut scene, "parent", Vec3::X);
        let child = scene
            .add_child(
                parent,
                Object3D::named("child").with_transform(Transform::from_translation(Vec3::Y)),
            )
            .unwrap();

        scene.late_update();
        scene.set_object_rotation(parent, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        scene.late_update();

        let cached = *scene.get_object_transform(child).unwrap().get_world_matrix();
        assert!(cached.abs_diff_eq(scene.world_matrix(child).unwrap(), 1e-5));
    }

    #[test]
    fn direct_parent_mutation_still_propagates() {
        let mut scene = Scene::new();
        let parent = node_at(&mut scene, "parent", Vec3::ZERO);
        let child = scene.add_child(parent, Object3D::named("child")).unwrap();
        scene.late_update();

        scene
            .get_object_mut(parent)
            .unwrap()
            .transform
            .set_transform(Vec3::Z, Quat::IDENTITY, Vec3::ONE);
        scene.late_update();

        let cached = *scene.get_object_transform(child).unwrap().get_world_matrix();
        assert!(cached.w_axis.xyz().abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn attach_preserves_world_transform() {
        let mut scene = Scene::new();
        let group = node_at(&mut scene, "group", Vec3::new(0.0, 1.0, 0.0));
        let controller = scene.add_object(Object3D::named("controller").with_transform(
            Transform::new(
                Vec3::new(0.5, 1.5, 0.2),
                Quat::from_rotation_y(0.7),
                Vec3::ONE,
            ),
        ));
        let cube = scene
            .add_child(
                group,
                Object3D::named("cube")
                    .with_transform(Transform::from_translation(Vec3::new(0.3, 0.6, -1.0))),
            )
            .unwrap();

        let before = scene.world_matrix(cube).unwrap();
        scene.attach(cube, Some(controller)).unwrap();
        assert_eq!(scene.get_object(cube).unwrap().parent_id, Some(controller));
        assert!(scene.world_matrix(cube).unwrap().abs_diff_eq(before, 1e-5));

        scene.attach(cube, Some(group)).unwrap();
        assert!(scene.world_matrix(cube).unwrap().abs_diff_eq(before, 1e-5));
        assert!(scene.get_object(group).unwrap().child_ids.contains(&cube));
        assert!(scene.get_object(controller).unwrap().child_ids.is_empty());
    }

    #[test]
    fn parenting_under_descendant_is_rejected() {
        let mut scene = Scene::new();
        let a = node_at(&mut scene, "a", Vec3::ZERO);
        let b = scene.add_child(a, Object3D::named("b")).unwrap();
        let c = scene.add_child(b, Object3D::named("c")).unwrap();

        assert_eq!(
            scene.set_object_parent(a, Some(c)),
            Err(SceneError::Cycle { child: a, parent: c })
        );
        assert!(matches!(
            scene.set_object_parent(a, Some(a)),
            Err(SceneError::Cycle { .. })
        ));
        assert_eq!(scene.get_object(a).unwrap().parent_id, None);
    }

    #[test]
    fn unknown_object_errors() {
        let mut scene = Scene::new();
        let a = node_at(&mut scene, "a", Vec3::ZERO);
        let mut other = Scene::new();
        let _ = other.add_object(Object3D::named("x"));
        let foreign = other.add_object(Object3D::named("y"));

        assert_eq!(
            scene.world_matrix(foreign),
            Err(SceneError::UnknownObject(foreign))
        );
        assert!(scene.add_child(foreign, Object3D::named("z")).is_err());
        assert!(scene.set_object_parent(a, Some(foreign)).is_err());
    }

    #[test]
    fn hidden_ancestor_hides_subtree() {
        let mut scene = Scene::new();
        let a = node_at(&mut scene, "a", Vec3::ZERO);
        let b = scene.add_child(a, Object3D::named("b")).unwrap();
        assert!(scene.is_visible_in_hierarchy(b));
        scene.set_visible(a, false);
        assert!(!scene.is_visible_in_hierarchy(b));
    }

    #[test]
    fn descendants_in_preorder() {
        let mut scene = Scene::new();
        let root = node_at(&mut scene, "root", Vec3::ZERO);
        let a = scene.add_child(root, Object3D::named("a")).unwrap();
        let a1 = scene.add_child(a, Object3D::named("a1")).unwrap();
        let b = scene.add_child(root, Object3D::named("b")).unwrap();

        assert_eq!(scene.descendants(root), vec![a, a1, b]);
    }

    #[test]
    fn models_are_addressable() {
        let mut scene = Scene::new();
        let model_id = scene.add_model(cuboid("box", Vec3::ONE));
        let cube = scene.add_object(Object3D::mesh("cube", model_id, Material::default()));
        assert_eq!(scene.get_object_by_name("cube"), Some(cube));
        assert_eq!(scene.get_model(model_id).unwrap().model.name, "box");
    }

    mod gltf_import {
        use super::*;
        use crate::{
            assets::{fixtures::TriangleGltf, AssetCache},
            scene_graph::scene_model::ModelSource,
        };

        fn spawn(scene: &mut Scene, cache: &mut AssetCache) -> Result<ObjectId, AssetError> {
            let asset = cache.load_gltf("triangle.gltf")?;
            scene.spawn_gltf(&asset, None, Transform::default())
        }

        #[test]
        fn repeated_spawns_share_one_model() {
            let dir = TriangleGltf::default().write("shared-spawn");
            let mut cache = AssetCache::new(&dir);
            let mut scene = Scene::new();

            let first = spawn(&mut scene, &mut cache).unwrap();
            let second = spawn(&mut scene, &mut cache).unwrap();
            assert_ne!(first, second);
            assert_eq!(scene.models.len(), 1);

            let mesh_models: Vec<_> = scene
                .objects
                .iter()
                .filter_map(|(_, object)| object.model_id)
                .collect();
            assert_eq!(mesh_models.len(), 2);
            assert_eq!(mesh_models[0], mesh_models[1]);

            let scene_model = scene.get_model(mesh_models[0]).unwrap();
            assert!(matches!(
                &scene_model.source,
                ModelSource::Gltf { path, mesh_index: 0 } if path == &dir.join("triangle.gltf")
            ));
        }

        #[test]
        fn spawned_nodes_keep_hierarchy_transforms_and_material() {
            let dir = TriangleGltf::default().write("hierarchy");
            let mut cache = AssetCache::new(&dir);
            let mut scene = Scene::new();
            let root = spawn(&mut scene, &mut cache).unwrap();

            assert_eq!(scene.get_object(root).unwrap().name, "triangle");
            let group = scene.get_object_by_name("group").unwrap();
            let mesh_ids: Vec<_> = scene.descendants(root);
            assert_eq!(mesh_ids.len(), 2);
            let triangle = mesh_ids[1];
            assert_eq!(scene.get_object(triangle).unwrap().parent_id, Some(group));

            let position = scene.world_position(triangle).unwrap();
            assert!(position.abs_diff_eq(Vec3::new(2.0, 0.0, 1.0), 1e-6));

            let material = scene.get_object(triangle).unwrap().material;
            assert_eq!(material.color, Vec3::X);
            assert_eq!(material.metalness, 0.25);
            assert_eq!(material.roughness, 0.75);
        }

        #[test]
        fn missing_normals_get_flat_face_normals() {
            let dir = TriangleGltf::default().write("flat-normals");
            let mut cache = AssetCache::new(&dir);
            let mut scene = Scene::new();
            spawn(&mut scene, &mut cache).unwrap();

            let (_, scene_model) = scene.models.iter().next().unwrap();
            let primitive = &scene_model.model.primitives[0];
            assert_eq!(primitive.vertices.len(), 3);
            assert!(primitive
                .vertices
                .iter()
                .all(|vertex| vertex.normal.abs_diff_eq(Vec3::Z, 1e-6)));
        }

        #[test]
        fn authored_normals_are_kept() {
            let dir = TriangleGltf {
                normals: Some(Vec3::NEG_Z),
                ..Default::default()
            }
            .write("authored-normals");
            let mut cache = AssetCache::new(&dir);
            let mut scene = Scene::new();
            spawn(&mut scene, &mut cache).unwrap();

            let (_, scene_model) = scene.models.iter().next().unwrap();
            assert!(scene_model.model.primitives[0]
                .vertices
                .iter()
                .all(|vertex| vertex.normal == Vec3::NEG_Z));
        }

        #[test]
        fn line_primitives_are_rejected() {
            let dir = TriangleGltf {
                mode: 1,
                ..Default::default()
            }
            .write("lines");
            let mut cache = AssetCache::new(&dir);
            let mut scene = Scene::new();

            let err = spawn(&mut scene, &mut cache).unwrap_err();
            assert!(matches!(
                err,
                AssetError::UnsupportedPrimitive { mode: gltf::mesh::Mode::Lines, .. }
            ));
        }

        #[test]
        fn document_without_scenes_is_rejected() {
            let dir = TriangleGltf {
                with_scene: false,
                ..Default::default()
            }
            .write("no-scenes");
            let mut cache = AssetCache::new(&dir);
            let mut scene = Scene::new();

            let err = spawn(&mut scene, &mut cache).unwrap_err();
            assert!(matches!(err, AssetError::NoScenes { .. }));
            assert_eq!(scene.objects.len(), 0);
        }
    }
}
