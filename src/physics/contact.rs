use glam::{Mat3, Vec3};
use id_arena::Arena;

use super::body::{Body, BodyId, Shape};

/// Penetration tolerated without positional correction.
const SLOP: f32 = 0.005;
/// Fraction of the remaining penetration removed per step.
const BAUMGARTE: f32 = 0.2;
const MAX_CORRECTION_SPEED: f32 = 2.0;
/// Approach speeds below this do not bounce.
const RESTITUTION_THRESHOLD: f32 = 1.0;
/// Box corners closer than this across the touching face count as one contact.
const MERGE_DISTANCE: f32 = 1e-4;
/// Lateral tolerance when testing whether a corner lies over the touching face.
const FACE_TOLERANCE: f32 = 1e-4;

/// A contact point between two bodies. `normal` points from `b` towards `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub a: BodyId,
    pub b: BodyId,
    pub point: Vec3,
    pub normal: Vec3,
    pub depth: f32,
}

pub fn find_contacts(bodies: &Arena<Body>) -> Vec<Contact> {
    let mut contacts = Vec::new();
    let all: Vec<(BodyId, &Body)> = bodies.iter().collect();

    for (i, &(id_a, a)) in all.iter().enumerate() {
        for &(id_b, b) in &all[i + 1..] {
            if a.is_static() && b.is_static() {
                continue;
            }

            match (a.shape, b.shape) {
                (Shape::Cuboid { .. }, Shape::Plane) => cuboid_plane(id_a, a, id_b, b, &mut contacts),
                (Shape::Plane, Shape::Cuboid { .. }) => cuboid_plane(id_b, b, id_a, a, &mut contacts),
                (Shape::Cuboid { .. }, Shape::Cuboid { .. }) => {
                    cuboid_cuboid(id_a, a, id_b, b, &mut contacts)
                }
                (Shape::Plane, Shape::Plane) => {}
            }
        }
    }

    contacts
}

fn cuboid_plane(
    cuboid_id: BodyId,
    cuboid: &Body,
    plane_id: BodyId,
    plane: &Body,
    contacts: &mut Vec<Contact>,
) {
    let Some(corners) = cuboid.corners() else {
        return;
    };
    let normal = plane.plane_normal();

    for corner in corners {
        let distance = (corner - plane.position).dot(normal);
        if distance < 0.0 {
            contacts.push(Contact {
                a: cuboid_id,
                b: plane_id,
                point: corner,
                normal,
                depth: -distance,
            });
        }
    }
}

/// Separates overlapping boxes along the axis of least overlap of their world bounds. Every
/// corner of either box that has crossed the other box's touching face becomes a contact, so a
/// resting box is supported at its corners like it is on a plane.
fn cuboid_cuboid(id_a: BodyId, a: &Body, id_b: BodyId, b: &Body, contacts: &mut Vec<Contact>) {
    let (Some(bounds_a), Some(bounds_b)) = (a.world_bounds(), b.world_bounds()) else {
        return;
    };
    let (Some(corners_a), Some(corners_b)) = (a.corners(), b.corners()) else {
        return;
    };
    if !bounds_a.overlaps(&bounds_b) {
        return;
    }

    let overlap_min = bounds_a.min.max(bounds_b.min);
    let overlap_max = bounds_a.max.min(bounds_b.max);
    let overlap = overlap_max - overlap_min;
    let axis = overlap.min_position();

    // Sign of the normal along `axis`: +1 when `a` lies on the positive side of `b`.
    let sign = if bounds_a.center()[axis] >= bounds_b.center()[axis] {
        1.0
    } else {
        -1.0
    };
    let mut normal = Vec3::ZERO;
    normal[axis] = sign;

    let face_of_b = if sign > 0.0 {
        bounds_b.max[axis]
    } else {
        bounds_b.min[axis]
    };
    let face_of_a = if sign > 0.0 {
        bounds_a.min[axis]
    } else {
        bounds_a.max[axis]
    };

    let over_face = |corner: Vec3| {
        (0..3).filter(|&i| i != axis).all(|i| {
            corner[i] >= overlap_min[i] - FACE_TOLERANCE
                && corner[i] <= overlap_max[i] + FACE_TOLERANCE
        })
    };

    let first = contacts.len();
    let push = |contacts: &mut Vec<Contact>, point: Vec3, depth: f32| {
        let duplicate = contacts[first..].iter().any(|c| {
            let mut lateral = c.point - point;
            lateral[axis] = 0.0;
            lateral.length_squared() < MERGE_DISTANCE * MERGE_DISTANCE
        });
        if !duplicate {
            contacts.push(Contact {
                a: id_a,
                b: id_b,
                point,
                normal,
                depth,
            });
        }
    };

    for corner in corners_a {
        let depth = sign * (face_of_b - corner[axis]);
        if depth > 0.0 && over_face(corner) {
            push(contacts, corner, depth);
        }
    }
    for corner in corners_b {
        let depth = sign * (corner[axis] - face_of_a);
        if depth > 0.0 && over_face(corner) {
            push(contacts, corner, depth);
        }
    }

    // Crossed edges leave no corner over a face.
    if contacts.len() == first {
        push(contacts, (overlap_min + overlap_max) * 0.5, overlap[axis]);
    }
}

/// Per-body velocities the solver works on, indexed by arena index.
#[derive(Debug, Clone, Copy)]
pub(super) struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct MassProperties {
    inverse_mass: f32,
    inverse_inertia: Mat3,
    position: Vec3,
}

impl MassProperties {
    fn of(body: &Body) -> Self {
        Self {
            inverse_mass: body.inverse_mass(),
            inverse_inertia: body.inverse_inertia_world(),
            position: body.position,
        }
    }
}

struct ContactConstraint {
    a: usize,
    b: usize,
    ra: Vec3,
    rb: Vec3,
    normal: Vec3,
    tangents: [Vec3; 2],
    normal_mass: f32,
    tangent_mass: [f32; 2],
    target_speed: f32,
    friction: f32,
    normal_impulse: f32,
    tangent_impulse: [f32; 2],
}

/// Sequential impulse solver over one step's contacts.
pub(super) struct ContactSolver {
    properties: Vec<MassProperties>,
    constraints: Vec<ContactConstraint>,
}

impl ContactSolver {
    pub fn new(bodies: &Arena<Body>, contacts: &[Contact], velocities: &[Velocity], dt: f32) -> Self {
        let properties: Vec<MassProperties> = bodies.iter().map(|(_, body)| MassProperties::of(body)).collect();

        let constraints = contacts
            .iter()
            .filter_map(|contact| {
                let (a, b) = (contact.a.index(), contact.b.index());
                let (body_a, body_b) = (&bodies[contact.a], &bodies[contact.b]);
                let (pa, pb) = (&properties[a], &properties[b]);

                let ra = contact.point - pa.position;
                let rb = contact.point - pb.position;
                let normal = contact.normal;
                let (t1, t2) = normal.any_orthonormal_pair();

                let effective_mass = |direction: Vec3| {
                    let k = pa.inverse_mass
                        + pb.inverse_mass
                        + direction.dot((pa.inverse_inertia * ra.cross(direction)).cross(ra))
                        + direction.dot((pb.inverse_inertia * rb.cross(direction)).cross(rb));
                    if k > f32::EPSILON {
                        1.0 / k
                    } else {
                        0.0
                    }
                };

                let normal_mass = effective_mass(normal);
                if normal_mass == 0.0 {
                    return None;
                }

                let relative = relative_velocity(&velocities[a], &velocities[b], ra, rb);
                let approach = relative.dot(normal);
                let restitution = body_a.restitution.max(body_b.restitution);
                let bounce = if approach < -RESTITUTION_THRESHOLD {
                    -restitution * approach
                } else {
                    0.0
                };
                let correction =
                    (BAUMGARTE / dt * (contact.depth - SLOP).max(0.0)).min(MAX_CORRECTION_SPEED);

                Some(ContactConstraint {
                    a,
                    b,
                    ra,
                    rb,
                    normal,
                    tangents: [t1, t2],
                    normal_mass,
                    tangent_mass: [effective_mass(t1), effective_mass(t2)],
                    target_speed: bounce.max(correction),
                    friction: (body_a.friction * body_b.friction).sqrt(),
                    normal_impulse: 0.0,
                    tangent_impulse: [0.0; 2],
                })
            })
            .collect();

        Self {
            properties,
            constraints,
        }
    }

    pub fn solve(&mut self, velocities: &mut [Velocity]) {
        for constraint in &mut self.constraints {
            let (a, b) = (constraint.a, constraint.b);
            let (pa, pb) = (self.properties[a], self.properties[b]);
            let (ra, rb) = (constraint.ra, constraint.rb);

            let apply = |velocities: &mut [Velocity], impulse: Vec3| {
                velocities[a].linear += impulse * pa.inverse_mass;
                velocities[a].angular += pa.inverse_inertia * ra.cross(impulse);
                velocities[b].linear -= impulse * pb.inverse_mass;
                velocities[b].angular -= pb.inverse_inertia * rb.cross(impulse);
            };

            // Friction first, bounded by the normal impulse of the previous iteration.
            let max_friction = constraint.friction * constraint.normal_impulse;
            for i in 0..2 {
                let tangent = constraint.tangents[i];
                let relative = relative_velocity(&velocities[a], &velocities[b], ra, rb);
                let lambda = -relative.dot(tangent) * constraint.tangent_mass[i];
                let previous = constraint.tangent_impulse[i];
                let accumulated = (previous + lambda).clamp(-max_friction, max_friction);
                constraint.tangent_impulse[i] = accumulated;
                apply(velocities, tangent * (accumulated - previous));
            }

            let relative = relative_velocity(&velocities[a], &velocities[b], ra, rb);
            let lambda =
                (constraint.target_speed - relative.dot(constraint.normal)) * constraint.normal_mass;
            let previous = constraint.normal_impulse;
            let accumulated = (previous + lambda).max(0.0);
            constraint.normal_impulse = accumulated;
            apply(velocities, constraint.normal * (accumulated - previous));
        }
    }
}

fn relative_velocity(a: &Velocity, b: &Velocity, ra: Vec3, rb: Vec3) -> Vec3 {
    (a.linear + a.angular.cross(ra)) - (b.linear + b.angular.cross(rb))
}
