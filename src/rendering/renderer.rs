use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Context;
use glam::Vec2;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    rendering::{
        config::RenderConfig,
        frame_uniform::{FrameUniform, FrameUniformState},
        imgui_renderer::ImguiRenderer,
        instance::gather_instances,
        passes::mesh_pass::{MeshPass, MeshPassTargets},
        render_model::RenderModel,
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::DepthTexture,
    },
    scene_graph::{Scene, SceneModelId},
    stages::Stage,
};

/// A frame whose scene has been recorded but not yet submitted, so the UI can draw on top.
pub struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,

    config: RenderConfig,
    depth_texture: DepthTexture,
    frame_uniform: FrameUniform,

    /// GPU copies of the mounted stage's models. Dropped whenever the router mounts a new stage.
    render_models: HashMap<SceneModelId, RenderModel>,
    models_generation: Option<u64>,

    shader_loader: ShaderLoader,
    mesh_pass: MeshPass,
    imgui_renderer: ImguiRenderer,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        config: RenderConfig,
        shader_dir: &Path,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colours are authored as display values, so write them without sRGB encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no supported formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: config.present_mode(&surface_caps.present_modes),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_texture = DepthTexture::new(&device, &surface_config, "Depth Texture");

        let frame_uniform = FrameUniform::new(
            &device,
            FrameUniformState::new(&Default::default(), Vec2::ONE, &[]),
        );

        let mut cache_builder = PipelineCacheBuilder::new();
        let mesh_pass = MeshPass::create(
            &device,
            surface_format,
            &frame_uniform.bind_group_layout,
            &mut cache_builder,
        );
        let shader_loader = ShaderLoader::new(device.clone(), shader_dir, cache_builder)?;

        let imgui_renderer = ImguiRenderer::new(&device, &queue, surface_format, imgui_context);

        Ok(Self {
            window,
            size,
            surface,
            surface_config,
            device,
            queue,
            config,
            depth_texture,
            frame_uniform,
            render_models: HashMap::new(),
            models_generation: None,
            shader_loader,
            mesh_pass,
            imgui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);
            self.depth_texture.resize(&self.device, &self.surface_config);
        }
    }

    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.size.width as f32, self.size.height as f32)
    }

    fn sync_models(&mut self, scene: &Scene, generation: u64) {
        if self.models_generation != Some(generation) {
            if !self.render_models.is_empty() {
                log::debug!("Dropping {} GPU models", self.render_models.len());
            }
            self.render_models.clear();
            self.models_generation = Some(generation);
        }

        for (model_id, scene_model) in scene.models.iter() {
            self.render_models.entry(model_id).or_insert_with(|| {
                log::debug!(
                    "Uploading model {} ({}) with {} primitives",
                    scene_model.model.name,
                    scene_model.source,
                    scene_model.model.primitives.len()
                );
                RenderModel::from_model(
                    &self.device,
                    &scene_model.model,
                    self.config.initial_instance_capacity,
                )
            });
        }
    }

    /// Records the stage's scene. `generation` identifies the mounted stage.
    pub fn render(&mut self, stage: &dyn Stage, generation: u64) -> Result<Frame, wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();

        let scene = stage.scene();
        self.sync_models(scene, generation);

        self.frame_uniform.update(
            &self.queue,
            FrameUniformState::new(stage.camera(), self.viewport(), &scene.lights),
        );

        let batches = gather_instances(scene);
        for ((model_id, side), instances) in &batches {
            if let Some(render_model) = self.render_models.get_mut(model_id) {
                render_model
                    .instances_mut(*side)
                    .write(&self.device, &self.queue, instances);
            }
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let render_models = &self.render_models;
        self.mesh_pass.render(
            &MeshPassTargets {
                color: &view,
                depth: self.depth_texture.view(),
                clear_color: scene.background,
            },
            &mut encoder,
            &self.shader_loader.cache,
            &self.frame_uniform.bind_group,
            |render_pass, side| {
                for ((model_id, batch_side), instances) in &batches {
                    if *batch_side != side {
                        continue;
                    }
                    if let Some(render_model) = render_models.get(model_id) {
                        render_model.draw(render_pass, side, instances.len() as u32);
                    }
                }
            },
        );

        Ok(Frame {
            output,
            view,
            encoder,
        })
    }

    /// Draws the UI over `frame`, then submits and presents it.
    pub fn finish_frame(&mut self, frame: Frame, imgui_context: &mut imgui::Context) {
        let Frame {
            output,
            view,
            mut encoder,
        } = frame;

        self.imgui_renderer
            .render(imgui_context, &self.device, &self.queue, &mut encoder, &view);

        self.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        output.present();
    }
}
