use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{model::Buffers, scene_graph::SceneError};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to import glTF file {}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF file {} failed to load earlier: {reason}", path.display())]
    FailedEarlier { path: PathBuf, reason: String },
    #[error("glTF file {} contains no scenes", path.display())]
    NoScenes { path: PathBuf },
    #[error("mesh {mesh} uses unsupported primitive mode {mode:?}")]
    UnsupportedPrimitive {
        mesh: String,
        mode: gltf::mesh::Mode,
    },
    #[error("mesh {mesh} is missing the {attribute} attribute")]
    MissingAttribute {
        mesh: String,
        attribute: &'static str,
    },
    #[error("mesh {mesh} has no vertices")]
    EmptyMesh { mesh: String },
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// A parsed glTF document with its binary buffers.
pub struct GltfAsset {
    pub path: PathBuf,
    pub document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
}

impl GltfAsset {
    pub fn buffers(&self) -> Buffers {
        &self.buffers
    }

    pub fn default_scene(&self) -> Result<gltf::Scene, AssetError> {
        self.document
            .default_scene()
            .or_else(|| self.document.scenes().next())
            .ok_or_else(|| AssetError::NoScenes {
                path: self.path.clone(),
            })
    }
}

/// Loads each glTF file at most once, remembering failures too. Owned by a single stage and
/// dropped with it.
pub struct AssetCache {
    root: PathBuf,
    gltf: HashMap<PathBuf, Rc<GltfAsset>>,
    failed: HashMap<PathBuf, String>,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            gltf: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn load_gltf(&mut self, relative: impl AsRef<Path>) -> Result<Rc<GltfAsset>, AssetError> {
        let path = self.resolve(relative);

        if let Some(asset) = self.gltf.get(&path) {
            return Ok(asset.clone());
        }
        if let Some(reason) = self.failed.get(&path) {
            return Err(AssetError::FailedEarlier {
                path,
                reason: reason.clone(),
            });
        }

        log::debug!("Loading glTF {}", path.display());
        let (document, buffers, _images) = match gltf::import(&path) {
            Ok(imported) => imported,
            Err(source) => {
                self.failed.insert(path.clone(), source.to_string());
                return Err(AssetError::Import { path, source });
            }
        };

        let asset = Rc::new(GltfAsset {
            path: path.clone(),
            document,
            buffers,
        });
        self.gltf.insert(path, asset.clone());

        Ok(asset)
    }
}

/// Small glTF documents written to a temporary directory.
#[cfg(test)]
pub mod fixtures {
    use std::path::PathBuf;

    use glam::Vec3;

    pub struct TriangleGltf {
        /// glTF primitive mode; 4 is triangles, 1 is lines.
        pub mode: u32,
        pub normals: Option<Vec3>,
        pub with_scene: bool,
    }

    impl Default for TriangleGltf {
        fn default() -> Self {
            Self {
                mode: 4,
                normals: None,
                with_scene: true,
            }
        }
    }

    impl TriangleGltf {
        /// Writes `<dir>/triangle.gltf` with its buffer next to it and returns `dir`.
        ///
        /// The scene holds a `group` node at `(0, 0, 1)` whose child `triangle` sits at
        /// `(2, 0, 0)` and carries the single mesh: the triangle `(0,0,0) (1,0,0) (0,1,0)`
        /// with a red material, metalness 0.25 and roughness 0.75.
        pub fn write(&self, dir_name: &str) -> PathBuf {
            let dir = std::env::temp_dir().join(format!(
                "vr-playground-{dir_name}-{}",
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();

            let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
            let mut bytes: Vec<u8> = bytemuck::cast_slice(&positions).to_vec();
            if let Some(normal) = self.normals {
                bytes.extend_from_slice(bytemuck::cast_slice(&[normal; 3]));
            }
            std::fs::write(dir.join("triangle.bin"), &bytes).unwrap();

            let (attributes, extra_view, extra_accessor) = match self.normals {
                Some(n) => (
                    r#"{"POSITION": 0, "NORMAL": 1}"#.to_string(),
                    r#", {"buffer": 0, "byteOffset": 36, "byteLength": 36}"#.to_string(),
                    format!(
                        r#", {{"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3", "min": [{x}, {y}, {z}], "max": [{x}, {y}, {z}]}}"#,
                        x = n.x,
                        y = n.y,
                        z = n.z
                    ),
                ),
                None => (r#"{"POSITION": 0}"#.to_string(), String::new(), String::new()),
            };
            let scenes = if self.with_scene {
                r#""scene": 0, "scenes": [{"nodes": [0]}],"#
            } else {
                ""
            };

            let json = format!(
                r#"{{
  "asset": {{"version": "2.0"}},
  {scenes}
  "nodes": [
    {{"name": "group", "translation": [0, 0, 1], "children": [1]}},
    {{"name": "triangle", "mesh": 0, "translation": [2, 0, 0]}}
  ],
  "meshes": [{{"name": "triangle", "primitives": [{{"attributes": {attributes}, "mode": {mode}, "material": 0}}]}}],
  "materials": [{{"pbrMetallicRoughness": {{"baseColorFactor": [1, 0, 0, 1], "metallicFactor": 0.25, "roughnessFactor": 0.75}}}}],
  "buffers": [{{"uri": "triangle.bin", "byteLength": {length}}}],
  "bufferViews": [{{"buffer": 0, "byteOffset": 0, "byteLength": 36}}{extra_view}],
  "accessors": [{{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0]}}{extra_accessor}]
}}"#,
                mode = self.mode,
                length = bytes.len(),
            );
            std::fs::write(dir.join("triangle.gltf"), json).unwrap();

            dir
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_against_root() {
        let cache = AssetCache::new("assets");
        assert_eq!(
            cache.resolve("classroom/class.glb"),
            Path::new("assets").join("classroom/class.glb")
        );
    }

    #[test]
    fn missing_file_is_an_import_error() {
        let mut cache = AssetCache::new("definitely/not/here");
        let err = cache.load_gltf("nothing.glb").err().unwrap();
        assert!(matches!(err, AssetError::Import { .. }));
        assert!(err.to_string().contains("nothing.glb"));
    }

    #[test]
    fn failed_loads_are_not_retried() {
        let mut cache = AssetCache::new("definitely/not/here");
        assert!(matches!(
            cache.load_gltf("nothing.glb"),
            Err(AssetError::Import { .. })
        ));

        match cache.load_gltf("nothing.glb") {
            Err(AssetError::FailedEarlier { path, .. }) => {
                assert_eq!(path, Path::new("definitely/not/here").join("nothing.glb"));
            }
            other => panic!("expected a cached failure, got {:?}", other.map(|_| ())),
        }

        assert!(matches!(
            cache.load_gltf("other.glb"),
            Err(AssetError::Import { .. })
        ));
    }

    #[test]
    fn loaded_documents_are_shared() {
        let dir = fixtures::TriangleGltf::default().write("asset-cache");
        let mut cache = AssetCache::new(&dir);
        let first = cache.load_gltf("triangle.gltf").unwrap();
        let second = cache.load_gltf("triangle.gltf").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.document.meshes().count(), 1);
    }
}
