//! Application event loop.
//!
//! [`run`] opens the window, sets up wgpu, loads the configured model once and
//! then renders it every frame while routing input to the camera and the
//! viewer toggles.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and the [`Context`], then loads the model
//! 2. window and device events drive the camera and the toggles
//! 3. `RedrawRequested` advances the camera by the frame time and draws

use std::{iter, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window},
};

use crate::{
    config::ViewerConfig,
    context::Context,
    data_structures::model::Model,
    gpu::WgpuDevice,
    input::{Action, ViewerToggles},
    render::{self, ModelRenderer},
    resources::{self, defaults::DefaultTextures},
};

/// Everything that exists once the window is up. Fields drop in order, so
/// GPU resources go before the device that owns them.
struct Viewer {
    renderer: ModelRenderer,
    /// Also holds the shared default textures.
    model: Model<WgpuDevice>,
    toggles: ViewerToggles,
    is_surface_configured: bool,
    ctx: Context,
}

impl Viewer {
    fn new(ctx: Context, config: &ViewerConfig) -> Self {
        let defaults = DefaultTextures::shared(ctx.gpu.clone(), config.search().clone());
        let model = resources::load_model(&config.model, &ctx.gpu, Some(defaults), &config.load);
        if model.is_empty() {
            log::warn!("{} produced no meshes, the scene will be empty", config.model.display());
        }
        let triangles: usize = model.meshes.iter().map(render::triangle_count).sum();
        log::info!("{} meshes, {} triangles", model.meshes.len(), triangles);

        let renderer = ModelRenderer::new(&ctx.gpu, &ctx.pbr, &model, config.use_tangent_space);
        Self {
            renderer,
            model,
            toggles: ViewerToggles::new(config.use_tangent_space, config.albedo_is_srgb),
            is_surface_configured: false,
            ctx,
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.is_surface_configured = true;
        }
    }

    fn set_cursor_lock(&mut self, locked: bool) {
        let window = &self.ctx.window;
        if locked {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                log::warn!("cursor could not be locked: {}", e);
            }
            window.set_cursor_visible(false);
            self.ctx.camera.controller.reset_mouse();
            log::info!("Mouse cursor: locked");
        } else {
            if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
                log::warn!("cursor could not be released: {}", e);
            }
            window.set_cursor_visible(true);
            log::info!("Mouse cursor: released");
        }
    }

    /// Returns `false` when the viewer should close.
    fn handle_key(&mut self, event: &KeyEvent) -> bool {
        let PhysicalKey::Code(code) = event.physical_key else {
            return true;
        };
        let pressed = event.state.is_pressed();
        self.ctx.camera.controller.handle_key(code, pressed);

        match self.toggles.handle_key(code, pressed) {
            Some(Action::Exit) => return false,
            Some(Action::TangentSpace(on)) => {
                self.renderer
                    .set_tangent_space(self.ctx.queue(), &self.model, on);
                log::info!("Tangent Space: {}", on_off(on));
            }
            Some(Action::AlbedoSrgb(on)) => {
                self.ctx.light.uniform.set_albedo_is_srgb(on);
                self.ctx.light.write(self.ctx.queue());
                log::info!("Albedo sRGB: {}", on_off(on));
            }
            Some(Action::CursorLock(locked)) => self.set_cursor_lock(locked),
            None => (),
        }
        true
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.draw(
                &mut render_pass,
                &self.ctx.pbr,
                &self.ctx.camera.bind_group,
                &self.ctx.light.bind_group,
            );
        }

        self.ctx.queue().submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "ON" } else { "OFF" }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    config: ViewerConfig,
    viewer: Option<Viewer>,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: ViewerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            viewer: None,
            last_time: Instant::now(),
            error: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title("PBR Viewer")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let ctx = match self
            .async_runtime
            .block_on(Context::new(window, &self.config))
        {
            Ok(ctx) => ctx,
            Err(e) => return self.fail(event_loop, e.context("App initialization failed")),
        };

        log::info!("=== PBR Viewer controls ===");
        log::info!("W/A/S/D: move camera, Space/Shift: up/down");
        log::info!("Mouse: look around, wheel: zoom");
        log::info!("V: toggle tangent space, N: toggle albedo sRGB");
        log::info!("0: lock/release mouse cursor, Esc: quit");

        let mut viewer = Viewer::new(ctx, &self.config);
        let size = viewer.ctx.window.inner_size();
        viewer.resize(size.width, size.height);
        viewer.set_cursor_lock(viewer.toggles.cursor_locked.value);
        viewer.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.viewer = Some(viewer);
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if viewer.toggles.cursor_locked.value {
                let camera = &mut viewer.ctx.camera;
                camera.controller.handle_mouse(&mut camera.camera, dx, dy);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => viewer.resize(size.width, size.height),
            WindowEvent::Focused(false) => viewer.ctx.camera.controller.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                if !viewer.handle_key(&event) {
                    event_loop.exit();
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let camera = &mut viewer.ctx.camera;
                camera.controller.handle_scroll(&mut camera.camera, &delta);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                let camera = &mut viewer.ctx.camera;
                camera.controller.update(&mut camera.camera, dt);
                viewer.ctx.write_camera();

                match viewer.render() {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = viewer.ctx.window.inner_size();
                        viewer.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Install the logger, defaulting to `info`.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // Fails only when a logger is already installed.
    let _ = env_logger::Builder::from_env(env).try_init();
}

pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    init_logging();
    log::info!(
        "starting viewer: model={}, window={}x{}",
        config.model.display(),
        config.width,
        config.height
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
