use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Always normalized.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or(Vec3::NEG_Z),
        }
    }

    /// Casts from the pose's position along its forward (-Z) axis. Scale is ignored.
    pub fn from_pose(pose: &Mat4) -> Self {
        let (_scale, rotation, translation) = pose.to_scale_rotation_translation();
        Self::new(translation, rotation * Vec3::NEG_Z)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Moves the ray into another space without renormalizing, so that a parameter `t`
    /// means the same point in both spaces.
    pub(crate) fn transform_unnormalized(&self, matrix: &Mat4) -> Ray {
        Ray {
            origin: matrix.transform_point3(self.origin),
            direction: matrix.transform_vector3(self.direction),
        }
    }
}

/// Möller–Trumbore. Returns the ray parameter of the hit.
pub fn intersect_triangle(
    ray: &Ray,
    a: Vec3,
    b: Vec3,
    c: Vec3,
    cull_backfaces: bool,
) -> Option<f32> {
    const EPSILON: f32 = 1e-7;
    // Keeps rays through shared edges from slipping between adjacent triangles.
    const EDGE_TOLERANCE: f32 = 1e-6;

    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);

    if cull_backfaces {
        if det < EPSILON {
            return None;
        }
    } else if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(-EDGE_TOLERANCE..=1.0 + EDGE_TOLERANCE).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < -EDGE_TOLERANCE || u + v > 1.0 + EDGE_TOLERANCE {
        return None;
    }

    let t = edge2.dot(q) * inv_det;
    (t >= 0.0).then_some(t)
}
