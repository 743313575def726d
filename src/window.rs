use std::{sync::Arc, time::Instant};

use anyhow::Context;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    event::{Event, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    config::AppConfig,
    engine,
    input::InputState,
    rendering::{config::RenderConfig, renderer::Renderer},
    stages::{FrameContext, Route, Router},
};

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

struct App {
    config: AppConfig,
    router: Router,
    input: InputState,
    renderer: Option<Renderer>,
    imgui: Option<ImguiState>,
    started: Instant,
    last_frame: Instant,
    navigation_error: Option<String>,
}

impl App {
    fn new(config: AppConfig) -> anyhow::Result<Self> {
        let router = Router::new(config.route, config.stage_options())?;

        Ok(Self {
            config,
            router,
            input: InputState::new(),
            renderer: None,
            imgui: None,
            started: Instant::now(),
            last_frame: Instant::now(),
            navigation_error: None,
        })
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 14.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // Disable INI support because it's broken in the published version of imgui
        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes().with_title(self.config.title.clone());
        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;

        let mut imgui = Self::setup_imgui(&window);
        let renderer = pollster::block_on(Renderer::new(
            Arc::new(window),
            RenderConfig::from_app_config(&self.config),
            &self.config.shader_dir(),
            &mut imgui.context,
        ))?;

        renderer.window.request_redraw();
        self.imgui = Some(imgui);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn navigate(&mut self, route: Route) {
        let now = self.started.elapsed().as_secs_f32();
        match self.router.navigate(route, now) {
            Ok(_) => self.navigation_error = None,
            Err(e) => {
                log::error!("{e:#}");
                self.navigation_error = Some(format!("{e:#}"));
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return;
        };

        let now = Instant::now();
        let delta_time = now - self.last_frame;
        self.last_frame = now;
        imgui.context.io_mut().update_delta_time(delta_time);

        renderer.window.request_redraw();

        if let Err(e) = imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
        {
            log::error!("Failed to prepare imgui frame: {e}");
            return;
        }

        let ui = imgui.context.new_frame();
        let pointer_captured = ui.io().want_capture_mouse;
        let keyboard_captured = ui.io().want_capture_keyboard;

        let mut requested =
            engine::navigation_window(ui, &self.router, self.navigation_error.as_deref());
        if !keyboard_captured {
            requested = requested.or_else(|| engine::route_shortcut(&self.input));
        }

        let elapsed = self.started.elapsed().as_secs_f32();
        let ctx = FrameContext {
            time: elapsed - self.router.mounted_at(),
            dt: delta_time.as_secs_f32(),
            input: &self.input,
            viewport: renderer.viewport(),
            pointer_captured,
        };

        if let Err(e) = engine::update(&mut self.router, &ctx) {
            log::error!("Error during engine::update: {e:#}");
        }

        imgui.platform.prepare_render(ui, &renderer.window);

        match renderer.render(self.router.stage(), self.router.generation()) {
            Ok(frame) => renderer.finish_frame(frame, &mut imgui.context),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(renderer.size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
            }
        }

        self.input.end_frame();

        if let Some(route) = requested {
            self.navigate(route);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(e) = self.create_renderer(event_loop) {
            log::error!("Failed to initialise renderer: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(new_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => (),
        }

        if let (Some(renderer), Some(imgui)) = (self.renderer.as_ref(), self.imgui.as_mut()) {
            imgui.platform.handle_event::<()>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent { window_id, event },
            );
        }
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config).context("Failed to create app state")?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
