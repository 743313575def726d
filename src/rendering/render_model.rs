use std::mem::offset_of;

use wgpu::util::DeviceExt;

use crate::{
    model::{Model, ModelPrimitive, Vertex},
    rendering::instance::InstanceBuffer,
    scene_graph::Side,
};

pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl RenderPrimitive {
    fn from_primitive(device: &wgpu::Device, model: &Model, primitive: &ModelPrimitive) -> Self {
        let vertex_buffer_name = format!(
            "Vertex buffer ({}, primitive {})",
            model.name, primitive.index
        );
        let index_buffer_name = format!(
            "Index buffer ({}, primitive {})",
            model.name, primitive.index
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&vertex_buffer_name),
            contents: bytemuck::cast_slice(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&index_buffer_name),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: primitive.indices.len() as u32,
        }
    }
}

/// GPU copy of a scene model plus one instance buffer per face side.
pub struct RenderModel {
    pub primitives: Vec<RenderPrimitive>,
    front_instances: InstanceBuffer,
    back_instances: InstanceBuffer,
}

impl RenderModel {
    pub fn from_model(device: &wgpu::Device, model: &Model, instance_capacity: u64) -> Self {
        let primitives = model
            .primitives
            .iter()
            .filter(|primitive| !primitive.indices.is_empty())
            .map(|primitive| RenderPrimitive::from_primitive(device, model, primitive))
            .collect();

        RenderModel {
            primitives,
            front_instances: InstanceBuffer::new(
                device,
                format!("{}, front", model.name),
                instance_capacity,
            ),
            back_instances: InstanceBuffer::new(
                device,
                format!("{}, back", model.name),
                instance_capacity,
            ),
        }
    }

    pub fn instances_mut(&mut self, side: Side) -> &mut InstanceBuffer {
        match side {
            Side::Front => &mut self.front_instances,
            Side::Back => &mut self.back_instances,
        }
    }

    pub fn instances(&self, side: Side) -> &InstanceBuffer {
        match side {
            Side::Front => &self.front_instances,
            Side::Back => &self.back_instances,
        }
    }

    /// Draws `instance_count` instances from the buffer of `side`, which must already be written.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, side: Side, instance_count: u32) {
        self.instances(side).bind(render_pass);

        for primitive in &self.primitives {
            render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
            render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..primitive.num_indices, 0, 0..instance_count);
        }
    }
}

pub const RENDER_MODEL_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
    ],
};

/// Front-facing materials cull back faces and vice versa. Outline shells rely on the latter.
pub const fn primitive_state(side: Side) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: match side {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
        },
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    }
}
