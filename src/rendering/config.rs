use crate::config::AppConfig;

/// Upper bound on directional and point lights per frame. Must match `MAX_LIGHTS` in mesh.wgsl.
pub const MAX_LIGHTS: usize = 4;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub vsync: bool,
    /// Instances the per-batch buffers start with before they grow.
    pub initial_instance_capacity: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            initial_instance_capacity: 128,
        }
    }
}

impl RenderConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            vsync: config.vsync,
            ..Default::default()
        }
    }

    /// Picks a present mode the surface supports, preferring a tear-free one when vsync is on.
    pub fn present_mode(&self, supported: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let preferred: &[wgpu::PresentMode] = if self.vsync {
            &[wgpu::PresentMode::Fifo]
        } else {
            &[wgpu::PresentMode::Mailbox, wgpu::PresentMode::Immediate]
        };

        preferred
            .iter()
            .find(|mode| supported.contains(mode))
            .or_else(|| supported.first())
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo)
    }
}
