//! A small rigid-body world: boxes and static planes, gravity, damping and impulse-based
//! contact resolution.

pub mod body;
pub mod contact;

use glam::{Quat, Vec3};
use id_arena::Arena;

pub use body::{Body, BodyId};
use contact::{find_contacts, ContactSolver, Velocity};

pub struct PhysicsWorld {
    pub gravity: Vec3,
    pub solver_iterations: usize,
    bodies: Arena<Body>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.82, 0.0))
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            solver_iterations: 10,
            bodies: Arena::new(),
        }
    }

    pub fn with_solver_iterations(mut self, iterations: usize) -> Self {
        self.solver_iterations = iterations.max(1);
        self
    }

    pub fn add_body(&mut self, body: Body) -> BodyId {
        self.bodies.alloc(body)
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    /// Advances the world by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }

        let gravity = self.gravity;
        let mut velocities: Vec<Velocity> = self
            .bodies
            .iter()
            .map(|(_, body)| {
                if body.is_static() {
                    return Velocity {
                        linear: Vec3::ZERO,
                        angular: Vec3::ZERO,
                    };
                }

                let linear = (body.velocity + gravity * dt) * (1.0 - body.linear_damping).powf(dt);
                let angular = body.angular_velocity * (1.0 - body.angular_damping).powf(dt);
                Velocity { linear, angular }
            })
            .collect();

        let contacts = find_contacts(&self.bodies);
        let mut solver = ContactSolver::new(&self.bodies, &contacts, &velocities, dt);
        for _ in 0..self.solver_iterations {
            solver.solve(&mut velocities);
        }

        for (id, body) in self.bodies.iter_mut() {
            if body.is_static() {
                continue;
            }

            let Velocity { linear, angular } = velocities[id.index()];
            body.velocity = linear;
            body.angular_velocity = angular;
            body.position += linear * dt;
            body.orientation = integrate_orientation(body.orientation, angular, dt);
        }
    }
}

fn integrate_orientation(orientation: Quat, angular: Vec3, dt: f32) -> Quat {
    let spin = Quat::from_xyzw(angular.x, angular.y, angular.z, 0.0) * orientation;
    (orientation + spin * (0.5 * dt)).normalize()
}
