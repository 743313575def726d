use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use wgpu::util::DeviceExt;

use crate::{
    camera::{Camera, CameraUniform},
    rendering::config::MAX_LIGHTS,
    scene_graph::Light,
};

/// This should match `GpuLight` in mesh.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// xyz is the direction towards the light when w = 0, or its position when w = 1.
    pub position: [f32; 4],
    /// Colour premultiplied by intensity.
    pub color: [f32; 4],
}

/// This should match `Frame` in mesh.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniformState {
    pub camera: CameraUniform,
    pub hemisphere_sky: [f32; 4],
    pub hemisphere_ground: [f32; 4],
    pub lights: [GpuLight; MAX_LIGHTS],
    pub light_count: [u32; 4],
}

impl FrameUniformState {
    /// Hemisphere and ambient lights add up into one sky/ground pair. Directional and point
    /// lights beyond `MAX_LIGHTS` are dropped.
    pub fn new(camera: &Camera, resolution: Vec2, lights: &[Light]) -> Self {
        let mut sky = Vec3::ZERO;
        let mut ground = Vec3::ZERO;
        let mut packed = [GpuLight::default(); MAX_LIGHTS];
        let mut count = 0;

        for light in lights {
            let gpu_light = match *light {
                Light::Hemisphere {
                    sky: sky_color,
                    ground: ground_color,
                    intensity,
                } => {
                    sky += sky_color * intensity;
                    ground += ground_color * intensity;
                    continue;
                }
                Light::Directional {
                    position,
                    color,
                    intensity,
                } => GpuLight {
                    position: position.normalize_or(Vec3::Y).extend(0.0).to_array(),
                    color: (color * intensity).extend(1.0).to_array(),
                },
                Light::Point {
                    position,
                    color,
                    intensity,
                } => GpuLight {
                    position: position.extend(1.0).to_array(),
                    color: (color * intensity).extend(1.0).to_array(),
                },
            };

            if count < MAX_LIGHTS {
                packed[count] = gpu_light;
                count += 1;
            }
        }

        Self {
            camera: CameraUniform::new(camera, resolution),
            hemisphere_sky: sky.extend(1.0).to_array(),
            hemisphere_ground: ground.extend(1.0).to_array(),
            lights: packed,
            light_count: [count as u32, 0, 0, 0],
        }
    }
}

pub struct FrameUniform {
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl FrameUniform {
    pub fn new(device: &wgpu::Device, initial_state: FrameUniformState) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame uniform buffer"),
            contents: bytemuck::cast_slice(&[initial_state]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame uniform bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame uniform bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, state: FrameUniformState) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[state]));
    }
}
