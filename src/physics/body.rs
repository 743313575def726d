use glam::{Mat3, Quat, Vec3};
use id_arena::Id;

use crate::math::bounds::Aabb;

pub type BodyId = Id<Body>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Infinite plane through the body position. Its normal is the body's local +Z.
    Plane,
    Cuboid { half_extents: Vec3 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub shape: Shape,
    /// Zero means static.
    pub mass: f32,
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Body {
    pub fn new(shape: Shape, mass: f32) -> Self {
        Self {
            shape,
            mass: mass.max(0.0),
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_damping: 0.01,
            angular_damping: 0.01,
            friction: 0.3,
            restitution: 0.3,
        }
    }

    pub fn plane() -> Self {
        Self::new(Shape::Plane, 0.0)
    }

    pub fn cuboid(half_extents: Vec3, mass: f32) -> Self {
        Self::new(Shape::Cuboid { half_extents }, mass)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation.normalize();
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn with_angular_damping(mut self, angular_damping: f32) -> Self {
        self.angular_damping = angular_damping.clamp(0.0, 1.0);
        self
    }

    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }

    pub fn inverse_mass(&self) -> f32 {
        if self.is_static() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    fn inverse_inertia_local(&self) -> Vec3 {
        match self.shape {
            Shape::Cuboid { half_extents } if !self.is_static() => {
                let sq = half_extents * half_extents;
                let inertia = Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (self.mass / 3.0);
                Vec3::select(inertia.cmpgt(Vec3::ZERO), inertia.recip(), Vec3::ZERO)
            }
            _ => Vec3::ZERO,
        }
    }

    pub fn inverse_inertia_world(&self) -> Mat3 {
        let rotation = Mat3::from_quat(self.orientation);
        rotation * Mat3::from_diagonal(self.inverse_inertia_local()) * rotation.transpose()
    }

    pub fn plane_normal(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }

    pub fn corners(&self) -> Option<[Vec3; 8]> {
        let Shape::Cuboid { half_extents } = self.shape else {
            return None;
        };
        let local = Aabb::new(-half_extents, half_extents).corners();
        Some(local.map(|corner| self.position + self.orientation * corner))
    }

    pub fn world_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.corners()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bodies_have_no_inverse_mass() {
        let plane = Body::plane();
        assert!(plane.is_static());
        assert_eq!(plane.inverse_mass(), 0.0);
        assert_eq!(plane.inverse_inertia_world(), Mat3::ZERO);
    }

    #[test]
    fn cube_inertia_is_isotropic() {
        let body = Body::cuboid(Vec3::ONE, 6.0)
            .with_orientation(Quat::from_rotation_z(0.7));
        // I = m/3 * (hy^2 + hz^2) = 4 for a unit-half-extent cube of mass 6.
        let expected = Mat3::from_diagonal(Vec3::splat(0.25));
        assert!(body.inverse_inertia_world().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn plane_normal_follows_orientation() {
        let ground = Body::plane()
            .with_orientation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        assert!(ground.plane_normal().abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn world_bounds_grow_with_rotation() {
        let body = Body::cuboid(Vec3::ONE, 1.0)
            .with_orientation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4));
        let bounds = body.world_bounds().unwrap();
        assert!((bounds.max.x - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!((bounds.max.y - 1.0).abs() < 1e-5);
    }
}
