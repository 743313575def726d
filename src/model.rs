use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use gltf::buffer;
use itertools::{izip, Itertools};

use crate::{assets::AssetError, math::bounds::Aabb};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

pub struct ModelPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ModelPrimitive {
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|triangle| {
            [triangle[0], triangle[1], triangle[2]]
                .map(|index| self.vertices[index as usize].position)
        })
    }
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
    pub bounds: Aabb,
}

pub type Buffers<'a> = &'a [buffer::Data];

impl Model {
    /// Builds a model from primitives and computes its bounds.
    pub fn new(name: impl Into<String>, primitives: Vec<ModelPrimitive>) -> Option<Model> {
        let bounds = Aabb::from_points(
            primitives
                .iter()
                .flat_map(|primitive| primitive.vertices.iter().map(|vertex| vertex.position)),
        )?;

        Some(Model {
            name: name.into(),
            primitives,
            bounds,
        })
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.primitives.iter().flat_map(|primitive| primitive.triangles())
    }

    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
    ) -> Result<Model, AssetError> {
        let name = name.into();
        let mut primitives = Vec::new();

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                return Err(AssetError::UnsupportedPrimitive {
                    mesh: name,
                    mode: primitive.mode(),
                });
            }

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d[..]));

            let positions = reader
                .read_positions()
                .ok_or_else(|| AssetError::MissingAttribute {
                    mesh: name.clone(),
                    attribute: "POSITION",
                })?
                .map(Vec3::from)
                .collect::<Vec<_>>();

            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect::<Vec<u32>>(),
                None => (0..positions.len() as u32).collect(),
            };

            let (vertices, indices) = match reader.read_normals() {
                Some(normals) => {
                    let vertices = izip!(positions, normals)
                        .map(|(position, normal)| Vertex::new(position, Vec3::from(normal)))
                        .collect();
                    (vertices, indices)
                }
                None => flat_shaded(&positions, &indices),
            };

            primitives.push(ModelPrimitive {
                index: primitive.index(),
                vertices,
                indices,
            });
        }

        Model::new(name.clone(), primitives).ok_or(AssetError::EmptyMesh { mesh: name })
    }
}

/// Un-indexes the triangles so every face gets its own normal.
fn flat_shaded(positions: &[Vec3], indices: &[u32]) -> (Vec<Vertex>, Vec<u32>) {
    let vertices = indices
        .iter()
        .tuples()
        .flat_map(|(&a, &b, &c)| {
            let [a, b, c] = [a, b, c].map(|index| positions[index as usize]);
            let normal = (b - a).cross(c - a).normalize_or_zero();
            [a, b, c].map(|position| Vertex::new(position, normal))
        })
        .collect::<Vec<_>>();
    let indices = (0..vertices.len() as u32).collect();

    (vertices, indices)
}

/// Axis-aligned box centered on `center`.
pub fn cuboid_at(name: impl Into<String>, center: Vec3, size: Vec3) -> Model {
    let half = size * 0.5;

    // (normal, u, v) with u x v == normal, so each quad winds counter-clockwise from outside.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        let face_center = center + normal * half;
        let u = u * half;
        let v = v * half;

        for corner in [-u - v, u - v, u + v, -u + v] {
            vertices.push(Vertex::new(face_center + corner, normal));
        }

        indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    single_primitive(name, vertices, indices)
}

pub fn cuboid(name: impl Into<String>, size: Vec3) -> Model {
    cuboid_at(name, Vec3::ZERO, size)
}

/// Same layout as a three.js `SphereGeometry`.
pub fn uv_sphere(name: impl Into<String>, radius: f32, segments: u32, rings: u32) -> Model {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut vertices = Vec::new();
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * PI;

        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let phi = u * 2.0 * PI;

            let normal = Vec3::new(
                -phi.cos() * theta.sin(),
                theta.cos(),
                phi.sin() * theta.sin(),
            );
            vertices.push(Vertex::new(normal * radius, normal));
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::new();
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * stride + segment + 1;
            let b = ring * stride + segment;
            let c = (ring + 1) * stride + segment;
            let d = (ring + 1) * stride + segment + 1;

            if ring != 0 {
                indices.extend([a, b, d]);
            }
            if ring != rings - 1 {
                indices.extend([b, c, d]);
            }
        }
    }

    single_primitive(name, vertices, indices)
}

/// A rectangle in the local XY plane facing +Z.
pub fn plane(name: impl Into<String>, width: f32, height: f32) -> Model {
    let (w, h) = (width * 0.5, height * 0.5);
    let vertices = [
        Vec3::new(-w, -h, 0.0),
        Vec3::new(w, -h, 0.0),
        Vec3::new(w, h, 0.0),
        Vec3::new(-w, h, 0.0),
    ]
    .map(|position| Vertex::new(position, Vec3::Z))
    .to_vec();

    single_primitive(name, vertices, vec![0, 1, 2, 0, 2, 3])
}

/// A thin unit-length beam from the origin to -Z; scale z to set its length.
pub fn ray_segment(name: impl Into<String>) -> Model {
    cuboid_at(name, Vec3::new(0.0, 0.0, -0.5), Vec3::new(0.004, 0.004, 1.0))
}

fn single_primitive(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Model {
    let bounds = Aabb::from_points(vertices.iter().map(|vertex| vertex.position))
        .unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO));

    Model {
        name: name.into(),
        primitives: vec![ModelPrimitive {
            index: 0,
            vertices,
            indices,
        }],
        bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward_winding(model: &Model) {
        let center = model.bounds.center();
        for [a, b, c] in model.triangles() {
            let normal = (b - a).cross(c - a);
            let face_center = (a + b + c) / 3.0;
            if normal.length_squared() < 1e-12 {
                continue;
            }
            assert!(
                normal.dot(face_center - center) > 0.0,
                "triangle {a} {b} {c} winds inward"
            );
        }
    }

    #[test]
    fn cuboid_bounds_and_counts() {
        let model = cuboid("box", Vec3::splat(0.2));
        assert_eq!(model.primitives[0].vertices.len(), 24);
        assert_eq!(model.primitives[0].indices.len(), 36);
        assert!(model.bounds.min.abs_diff_eq(Vec3::splat(-0.1), 1e-6));
        assert!(model.bounds.max.abs_diff_eq(Vec3::splat(0.1), 1e-6));
    }

    #[test]
    fn cuboid_winds_outward() {
        assert_outward_winding(&cuboid("box", Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn sphere_winds_outward() {
        assert_outward_winding(&uv_sphere("sphere", 0.5, 16, 12));
    }

    #[test]
    fn ray_segment_spans_negative_z() {
        let model = ray_segment("ray");
        assert!((model.bounds.min.z + 1.0).abs() < 1e-6);
        assert!(model.bounds.max.z.abs() < 1e-6);
    }

    #[test]
    fn flat_shading_unindexes() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)];
        let (vertices, indices) = flat_shaded(&positions, &[0, 1, 2, 1, 3, 2]);
        assert_eq!(vertices.len(), 6);
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert!(vertices.iter().all(|v| v.normal.abs_diff_eq(Vec3::Z, 1e-6)));
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!(Model::new("nothing", Vec::new()).is_none());
    }
}
