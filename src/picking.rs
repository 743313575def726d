use glam::Mat4;

use crate::{
    math::{bounds::Aabb, ray::intersect_triangle, ray::Ray},
    model::Model,
    scene_graph::{ObjectId, Scene},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub object: ObjectId,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: glam::Vec3,
}

/// One pickable mesh. `object` is the id reported on a hit, which may be an ancestor of the
/// node that actually carries the mesh.
pub struct Candidate<'a> {
    pub object: ObjectId,
    pub world: Mat4,
    pub model: &'a Model,
}

/// Nearest front-facing hit among the candidates. Equal distances keep the earlier candidate.
pub fn nearest_hit<'a>(
    ray: &Ray,
    candidates: impl IntoIterator<Item = Candidate<'a>>,
) -> Option<Hit> {
    let mut nearest: Option<Hit> = None;

    for candidate in candidates {
        let Some(hit) = intersect_candidate(ray, &candidate) else {
            continue;
        };

        if nearest.is_none_or(|current| hit.distance < current.distance) {
            nearest = Some(hit);
        }
    }

    nearest
}

fn intersect_candidate(ray: &Ray, candidate: &Candidate) -> Option<Hit> {
    let world_to_local = candidate.world.inverse();
    if !world_to_local.is_finite() {
        return None;
    }

    let local_ray = ray.transform_unnormalized(&world_to_local);
    let bounds: Aabb = candidate.model.bounds;
    bounds.intersect_ray(&local_ray)?;

    let t = candidate
        .model
        .triangles()
        .filter_map(|[a, b, c]| intersect_triangle(&local_ray, a, b, c, true))
        .min_by(f32::total_cmp)?;

    let point = candidate.world.transform_point3(local_ray.at(t));

    Some(Hit {
        object: candidate.object,
        distance: point.distance(ray.origin),
        point,
    })
}

/// Raycast-enabled, visible meshes among the children of `root` and their subtrees. Hits on
/// a nested mesh are reported as the direct child of `root` that owns it.
pub fn candidates_under(scene: &Scene, root: ObjectId) -> Vec<Candidate<'_>> {
    let Some(root_object) = scene.get_object(root) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();

    for &child in &root_object.child_ids {
        for id in std::iter::once(child).chain(scene.descendants(child)) {
            let Some(object) = scene.get_object(id) else {
                continue;
            };
            if !object.raycast || !object.visible {
                continue;
            }
            let Some(scene_model) = object.model_id.and_then(|model_id| scene.get_model(model_id))
            else {
                continue;
            };
            let Ok(world) = scene.world_matrix(id) else {
                continue;
            };

            candidates.push(Candidate {
                object: child,
                world,
                model: &scene_model.model,
            });
        }
    }

    candidates
}

/// Convenience for picking straight out of a scene.
pub fn pick(scene: &Scene, root: ObjectId, ray: &Ray) -> Option<Hit> {
    nearest_hit(ray, candidates_under(scene, root))
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::{
        model::cuboid,
        scene_graph::{Material, Object3D, Transform},
    };

    // Off-center so the ray never runs along a triangle diagonal.
    const ORIGIN: Vec3 = Vec3::new(0.03, 0.01, 0.0);

    fn forward() -> Ray {
        Ray::new(ORIGIN, Vec3::NEG_Z)
    }

    struct Fixture {
        scene: Scene,
        group: ObjectId,
        near: ObjectId,
        far: ObjectId,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let model = scene.add_model(cuboid("cube", Vec3::splat(0.2)));
        let group = scene.add_object(Object3D::named("group"));

        let far = scene
            .add_child(
                group,
                Object3D::mesh("far", model, Material::default())
                    .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, -3.0))),
            )
            .unwrap();
        let near = scene
            .add_child(
                group,
                Object3D::mesh("near", model, Material::default())
                    .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, -1.0))),
            )
            .unwrap();

        Fixture {
            scene,
            group,
            near,
            far,
        }
    }

    #[test]
    fn nearest_object_wins_regardless_of_order() {
        let f = fixture();
        let hit = pick(&f.scene, f.group, &forward()).unwrap();
        assert_eq!(hit.object, f.near);
        assert!((hit.distance - 0.9).abs() < 1e-5);
        assert!(hit.point.abs_diff_eq(Vec3::new(0.03, 0.01, -0.9), 1e-5));
    }

    #[test]
    fn miss_returns_none() {
        let f = fixture();
        assert!(pick(&f.scene, f.group, &Ray::new(ORIGIN, Vec3::Z)).is_none());
        assert!(pick(&f.scene, f.group, &Ray::new(Vec3::new(1.0, 0.0, 0.0), Vec3::NEG_Z)).is_none());
    }

    #[test]
    fn distance_is_measured_in_world_units_for_scaled_objects() {
        let mut f = fixture();
        f.scene.set_object_scale(f.near, Vec3::splat(5.0));
        let hit = pick(&f.scene, f.group, &forward()).unwrap();
        assert_eq!(hit.object, f.near);
        assert!((hit.distance - 0.5).abs() < 1e-5);
    }

    #[test]
    fn non_raycast_and_hidden_objects_are_skipped() {
        let mut f = fixture();
        f.scene.get_object_mut(f.near).unwrap().raycast = false;
        let hit = pick(&f.scene, f.group, &forward()).unwrap();
        assert_eq!(hit.object, f.far);

        f.scene.set_visible(f.far, false);
        assert!(pick(&f.scene, f.group, &forward()).is_none());
    }

    #[test]
    fn nested_mesh_reports_owning_child() {
        let mut f = fixture();
        let model = f.scene.get_object(f.near).unwrap().model_id.unwrap();
        let holder = f
            .scene
            .add_child(
                f.group,
                Object3D::named("holder")
                    .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, -0.5))),
            )
            .unwrap();
        f.scene
            .add_child(holder, Object3D::mesh("part", model, Material::default()))
            .unwrap();

        let hit = pick(&f.scene, f.group, &forward()).unwrap();
        assert_eq!(hit.object, holder);
    }

    #[test]
    fn objects_outside_the_root_are_ignored() {
        let mut f = fixture();
        f.scene.attach(f.near, None).unwrap();
        let hit = pick(&f.scene, f.group, &forward()).unwrap();
        assert_eq!(hit.object, f.far);
    }

    #[test]
    fn rotated_object_is_hit() {
        let mut f = fixture();
        f.scene
            .set_object_rotation(f.near, Quat::from_rotation_y(std::f32::consts::FRAC_PI_4));
        let hit = pick(&f.scene, f.group, &forward()).unwrap();
        assert_eq!(hit.object, f.near);
        // A vertical edge of the rotated cube faces the ray; the ray lands 0.03 beside it.
        let expected = 1.0 - 0.1 * std::f32::consts::SQRT_2 + 0.03;
        assert!((hit.distance - expected).abs() < 1e-4);
    }

    #[test]
    fn equal_distances_keep_first_candidate() {
        let mut scene = Scene::new();
        let model = scene.add_model(cuboid("cube", Vec3::ONE));
        let a = scene.add_object(Object3D::named("a"));
        let b = scene.add_object(Object3D::named("b"));
        let model = &scene.get_model(model).unwrap().model;
        let world = Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0));

        let hit = nearest_hit(
            &forward(),
            [
                Candidate { object: a, world, model },
                Candidate { object: b, world, model },
            ],
        )
        .unwrap();
        assert_eq!(hit.object, a);
    }
}
