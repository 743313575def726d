use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, channel},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use id_arena::{Arena, Id};
use notify_debouncer_mini::{
    new_debouncer_opt, notify::*, DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::{PollType, RenderPipeline};

type PipelineFactory = Box<
    dyn Sync
        + Send
        + Fn(&wgpu::Device, &ShaderDefinition, &str) -> anyhow::Result<wgpu::RenderPipeline>,
>;

#[derive(Debug, Clone)]
pub struct ShaderDefinition {
    pub name: &'static str,
    /// Relative to the shader directory.
    pub path: &'static str,
}

impl ShaderDefinition {
    fn matches(&self, changed: &Path) -> bool {
        changed.ends_with(self.path)
    }
}

pub struct ShaderEntry {
    pipeline_id: PipelineId,
    def: ShaderDefinition,
    factory: PipelineFactory,
}

pub type PipelineId = Id<PipelineCacheEntry>;

#[derive(Default)]
pub struct PipelineCacheEntry(Option<wgpu::RenderPipeline>);

pub struct PipelineCacheBuilder {
    shaders: Arena<ShaderEntry>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCacheBuilder {
    pub fn new() -> Self {
        Self {
            shaders: Arena::new(),
            pipelines: Arena::new(),
        }
    }

    /// Several pipelines may share one shader file; each gets its own factory.
    pub fn add_shader(
        &mut self,
        shader_def: ShaderDefinition,
        factory: PipelineFactory,
    ) -> PipelineId {
        let pipeline_id = self.pipelines.alloc(PipelineCacheEntry::default());
        self.shaders.alloc(ShaderEntry {
            pipeline_id,
            def: shader_def,
            factory,
        });
        pipeline_id
    }

    pub fn build(self) -> PipelineCache {
        PipelineCache {
            shaders: Arc::new(self.shaders),
            pipelines: self.pipelines,
        }
    }
}

pub struct PipelineCache {
    shaders: Arc<Arena<ShaderEntry>>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCache {
    pub fn get(&self, id: PipelineId) -> Option<&RenderPipeline> {
        self.pipelines.get(id).and_then(|entry| entry.0.as_ref())
    }

    fn set(&mut self, id: PipelineId, pipeline: RenderPipeline) {
        if let Some(entry) = self.pipelines.get_mut(id) {
            entry.0 = Some(pipeline);
        }
    }
}

type ReloadedPipeline = (&'static str, PipelineId, wgpu::RenderPipeline);

/// Compiles every registered pipeline up front, then recompiles pipelines whose WGSL file
/// changes on disk. Recompilation happens on the watcher thread; results are swapped in by
/// `load_pending_shaders`. A shader that fails to recompile keeps its previous pipeline.
pub struct ShaderLoader {
    pub cache: PipelineCache,
    device: wgpu::Device,
    shader_dir: PathBuf,
    receiver: mpsc::Receiver<ReloadedPipeline>,
    _debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl ShaderLoader {
    pub fn new(
        device: wgpu::Device,
        shader_dir: impl Into<PathBuf>,
        cache_builder: PipelineCacheBuilder,
    ) -> anyhow::Result<Self> {
        let shader_dir = shader_dir.into();
        let cache = cache_builder.build();
        let (sender, receiver) = channel();

        let debouncer = watch_shaders(&device, &shader_dir, cache.shaders.clone(), sender)
            .map_err(|e| {
                log::warn!(
                    "Shader hot reload disabled for {}: {e:#}",
                    shader_dir.display()
                )
            })
            .ok();

        let mut shader_loader = Self {
            cache,
            device,
            shader_dir,
            receiver,
            _debouncer: debouncer,
        };

        shader_loader.create_all_pipelines()?;

        Ok(shader_loader)
    }

    fn create_all_pipelines(&mut self) -> anyhow::Result<()> {
        let shaders = self.cache.shaders.clone();

        for (_, shader) in shaders.iter() {
            let pipeline = compile_file(&self.device, &self.shader_dir, &shader.def, &shader.factory)
                .with_context(|| format!("Failed to compile shader: {}", shader.def.name))?;
            self.cache.set(shader.pipeline_id, pipeline);
        }

        Ok(())
    }

    pub fn load_pending_shaders(&mut self) {
        while let Ok((name, pipeline_id, pipeline)) = self.receiver.try_recv() {
            log::info!("Shader reloaded: {name}");
            self.cache.set(pipeline_id, pipeline);
        }
    }
}

fn watch_shaders(
    device: &wgpu::Device,
    shader_dir: &Path,
    shaders: Arc<Arena<ShaderEntry>>,
    sender: mpsc::Sender<ReloadedPipeline>,
) -> anyhow::Result<Debouncer<RecommendedWatcher>> {
    let absolute_shader_dir = shader_dir
        .canonicalize()
        .with_context(|| format!("Shader directory {} not found", shader_dir.display()))?;

    let device = device.clone();
    let watched_dir = absolute_shader_dir.clone();

    let mut debouncer = new_debouncer_opt(
        notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
        move |res: DebounceEventResult| match res {
            Ok(events) => {
                for event in events {
                    if event.kind != DebouncedEventKind::Any {
                        continue;
                    }

                    for (_, entry) in shaders.iter().filter(|(_, e)| e.def.matches(&event.path)) {
                        match compile_file(&device, &watched_dir, &entry.def, &entry.factory) {
                            Ok(pipeline) => {
                                if sender
                                    .send((entry.def.name, entry.pipeline_id, pipeline))
                                    .is_err()
                                {
                                    return;
                                }
                            }
                            Err(e) => log::error!("Failed to reload shader: {e:#}"),
                        }
                    }
                }
            }
            Err(e) => log::error!("Error debouncing shader changes: {e}"),
        },
    )
    .context("Failed to create shader watcher")?;

    debouncer
        .watcher()
        .watch(&absolute_shader_dir, RecursiveMode::Recursive)
        .context("Failed to watch shader directory")?;

    Ok(debouncer)
}

fn compile_file(
    device: &wgpu::Device,
    shader_dir: &Path,
    shader_def: &ShaderDefinition,
    factory: &PipelineFactory,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let path = shader_dir.join(shader_def.path);
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read shader file {}", path.display()))?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = factory(device, shader_def, &shader_code);

    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation.")?;

    if let Some(error) = block_on(device.pop_error_scope()) {
        return Err(anyhow::anyhow!(
            "Shader compilation failed for {}: {}",
            shader_def.name,
            error
        ));
    };

    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_match_changed_files_by_suffix() {
        let def = ShaderDefinition {
            name: "Mesh",
            path: "mesh.wgsl",
        };
        assert!(def.matches(Path::new("/srv/assets/shaders/mesh.wgsl")));
        assert!(!def.matches(Path::new("/srv/assets/shaders/other_mesh.wgsl")));
        assert!(!def.matches(Path::new("/srv/assets/shaders/mesh.wgsl.swp")));
    }
}
