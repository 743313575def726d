use glam::Vec3;
use wgpu::{
    DepthBiasState, Device, MultisampleState, PipelineCompilationOptions, RenderPassDescriptor,
    ShaderSource, StencilState,
};

use crate::{
    rendering::{
        instance::INSTANCE_VBL,
        render_model::{primitive_state, RENDER_MODEL_VBL},
        shader_loader::{PipelineCache, PipelineCacheBuilder, PipelineId, ShaderDefinition},
        texture::DepthTexture,
    },
    scene_graph::Side,
};

const MESH_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Mesh shader",
    path: "mesh.wgsl",
};

/// Forward pass drawing every instance batch. Front-sided materials and back-sided outline
/// shells use separate pipelines that differ only in their cull mode.
pub struct MeshPass {
    front_pipeline: PipelineId,
    back_pipeline: PipelineId,
}

pub struct MeshPassTargets<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub clear_color: Vec3,
}

impl MeshPass {
    pub fn create(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        frame_bind_group_layout: &wgpu::BindGroupLayout,
        cache_builder: &mut PipelineCacheBuilder,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh pipeline layout"),
            bind_group_layouts: &[frame_bind_group_layout],
            push_constant_ranges: &[],
        });

        let mut add_pipeline = |side: Side| {
            let layout = layout.clone();
            cache_builder.add_shader(
                MESH_SHADER,
                Box::new(
                    move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                            label: Some(shader_def.name),
                            source: ShaderSource::Wgsl(source.into()),
                        });

                        let label = format!("Mesh pipeline ({side:?})");
                        let pipeline =
                            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                                label: Some(&label),
                                layout: Some(&layout),
                                vertex: wgpu::VertexState {
                                    module: &shader,
                                    entry_point: Some("vs_main"),
                                    buffers: &[RENDER_MODEL_VBL, INSTANCE_VBL],
                                    compilation_options: PipelineCompilationOptions::default(),
                                },
                                fragment: Some(wgpu::FragmentState {
                                    module: &shader,
                                    entry_point: Some("fs_main"),
                                    targets: &[Some(wgpu::ColorTargetState {
                                        format: surface_format,
                                        blend: Some(wgpu::BlendState::REPLACE),
                                        write_mask: wgpu::ColorWrites::ALL,
                                    })],
                                    compilation_options: PipelineCompilationOptions::default(),
                                }),
                                primitive: primitive_state(side),
                                depth_stencil: Some(wgpu::DepthStencilState {
                                    format: DepthTexture::DEPTH_FORMAT,
                                    depth_write_enabled: true,
                                    depth_compare: wgpu::CompareFunction::Less,
                                    stencil: StencilState::default(),
                                    bias: DepthBiasState::default(),
                                }),
                                multisample: MultisampleState::default(),
                                multiview: None,
                                cache: None,
                            });

                        Ok(pipeline)
                    },
                ),
            )
        };

        MeshPass {
            front_pipeline: add_pipeline(Side::Front),
            back_pipeline: add_pipeline(Side::Back),
        }
    }

    fn pipeline_id(&self, side: Side) -> PipelineId {
        match side {
            Side::Front => self.front_pipeline,
            Side::Back => self.back_pipeline,
        }
    }

    /// Clears colour and depth, then lets `draw` issue the batches of each side with the
    /// matching pipeline bound.
    pub fn render(
        &self,
        targets: &MeshPassTargets,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
        frame_bind_group: &wgpu::BindGroup,
        mut draw: impl FnMut(&mut wgpu::RenderPass<'_>, Side),
    ) {
        let clear = targets.clear_color.as_dvec3();

        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Mesh pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: targets.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.x,
                        g: clear.y,
                        b: clear.z,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_bind_group(0, frame_bind_group, &[]);

        for side in [Side::Front, Side::Back] {
            let Some(pipeline) = pipeline_cache.get(self.pipeline_id(side)) else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            draw(&mut render_pass, side);
        }
    }
}
