use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};
use wgpu::BufferUsages;

use crate::scene_graph::{Material, Scene, SceneModelId, Side};

/// This should match `InstanceInput` in mesh.wgsl
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Instance {
    pub model: Mat4,
    /// Columns of the inverse-transpose of the model matrix, padded to vec4.
    pub normal: [[f32; 4]; 3],
    /// rgb base colour, a = 1 for unlit materials.
    pub color: [f32; 4],
    pub emissive: [f32; 4],
    /// x = metalness, y = roughness.
    pub params: [f32; 4],
}

impl Instance {
    pub fn new(model: Mat4, material: &Material) -> Self {
        let normal_matrix = Mat3::from_mat4(model).inverse().transpose();
        let normal = if normal_matrix.is_finite() {
            normal_matrix
        } else {
            Mat3::from_mat4(model)
        };

        Self {
            model,
            normal: [
                normal.x_axis.extend(0.0).to_array(),
                normal.y_axis.extend(0.0).to_array(),
                normal.z_axis.extend(0.0).to_array(),
            ],
            color: material
                .color
                .extend(if material.unlit { 1.0 } else { 0.0 })
                .to_array(),
            emissive: material.emissive.extend(0.0).to_array(),
            params: [material.metalness, material.roughness, 0.0, 0.0],
        }
    }
}

pub const INSTANCE_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Instance>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &wgpu::vertex_attr_array![
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
        11 => Float32x4,
        12 => Float32x4,
        13 => Float32x4,
        14 => Float32x4,
    ],
};

/// Instances grouped by the model they draw and the face side their material shows.
pub type InstanceBatches = HashMap<(SceneModelId, Side), Vec<Instance>>;

/// Collects every object that has a model and is visible together with all of its ancestors.
pub fn gather_instances(scene: &Scene) -> InstanceBatches {
    let mut batches = InstanceBatches::new();

    for (object_id, object) in scene.objects.iter() {
        let Some(model_id) = object.model_id else {
            continue;
        };

        if scene.get_model(model_id).is_none() || !scene.is_visible_in_hierarchy(object_id) {
            continue;
        }

        let Ok(world) = scene.world_matrix(object_id) else {
            continue;
        };

        batches
            .entry((model_id, object.material.side))
            .or_default()
            .push(Instance::new(world, &object.material));
    }

    batches
}

/// Vertex buffer holding one batch of instances. Grows to the next power of two when a batch
/// outgrows it.
pub struct InstanceBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    label: String,
}

impl InstanceBuffer {
    pub fn new(device: &wgpu::Device, name: impl Into<String>, capacity: u64) -> Self {
        let label = format!("Instance buffer ({})", name.into());
        let capacity = capacity.max(1);

        Self {
            buffer: Self::create_buffer(device, &label, capacity),
            capacity,
            label,
        }
    }

    fn create_buffer(device: &wgpu::Device, label: &str, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<Instance>() as u64 * capacity,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, instances: &[Instance]) {
        let needed = instances.len() as u64;
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            log::debug!("Growing {} to {} instances", self.label, self.capacity);
            self.buffer = Self::create_buffer(device, &self.label, self.capacity);
        }

        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(instances));
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(1, self.buffer.slice(..));
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::{
        model::cuboid,
        scene_graph::{Object3D, Transform},
    };

    #[test]
    fn hidden_ancestors_hide_their_subtree() {
        let mut scene = Scene::new();
        let model = scene.add_model(cuboid("box", Vec3::ONE));
        let group = scene.add_object(Object3D::named("group"));
        scene
            .add_child(group, Object3D::mesh("a", model, Material::default()))
            .unwrap();
        scene.add_object(Object3D::mesh("b", model, Material::default()));

        assert_eq!(gather_instances(&scene)[&(model, Side::Front)].len(), 2);

        scene.set_visible(group, false);
        assert_eq!(gather_instances(&scene)[&(model, Side::Front)].len(), 1);
    }

    #[test]
    fn instances_are_batched_by_side_with_world_matrices() {
        let mut scene = Scene::new();
        let model = scene.add_model(cuboid("box", Vec3::ONE));
        let parent = scene.add_object(
            Object3D::named("parent").with_transform(Transform::from_translation(Vec3::X)),
        );
        scene
            .add_child(
                parent,
                Object3D::mesh(
                    "shell",
                    model,
                    Material::basic(Vec3::ONE).with_side(Side::Back),
                )
                .with_transform(Transform::from_translation(Vec3::Y)),
            )
            .unwrap();

        let batches = gather_instances(&scene);
        assert!(!batches.contains_key(&(model, Side::Front)));

        let shell = batches[&(model, Side::Back)][0];
        assert!(shell
            .model
            .w_axis
            .truncate()
            .abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
        assert_eq!(shell.color[3], 1.0);
    }

    #[test]
    fn one_model_drawn_with_both_sides_gets_two_batches() {
        let mut scene = Scene::new();
        let model = scene.add_model(cuboid("box", Vec3::ONE));
        scene.add_object(Object3D::mesh("cube", model, Material::default()));
        scene.add_object(Object3D::mesh(
            "outline",
            model,
            Material::basic(Vec3::ONE).with_side(Side::Back),
        ));

        let batches = gather_instances(&scene);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[&(model, Side::Front)].len(), 1);
        assert_eq!(batches[&(model, Side::Back)].len(), 1);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 1.0),
            Quat::IDENTITY,
            Vec3::ZERO,
        );
        let instance = Instance::new(model, &Material::default());
        assert_eq!(instance.normal[0], [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(instance.params, [0.0, 1.0, 0.0, 0.0]);
    }
}
