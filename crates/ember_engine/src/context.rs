//! Engine context: ownership root for every subsystem
//!
//! There are no global singletons; the context is constructed once from a
//! validated config, a backend box, and a resource loader, and is passed by
//! reference wherever subsystem access is needed. Lifecycle rules
//! (initialize-before-use, no use after shutdown) are enforced by
//! ownership instead of runtime null checks.

use crate::assets::loader::ResourceLoader;
use crate::assets::pipeline::LoadPipeline;
use crate::core::config::{ConfigError, EngineConfig};
use crate::events::{Event, EventBus, EventCode};
use crate::foundation::time::{self, Timer};
use crate::render::backend::RenderBackend;
use crate::render::packet::SceneRenderData;
use crate::render::view_system::{FramePacing, RenderViewSystem, RESIZE_FRAME_PACING_MS};
use crate::render::RenderError;
use crate::resources::camera::CameraSystem;
use crate::resources::geometry::{GeometryConfig, GeometrySystem};
use crate::resources::material::MaterialSystem;
use crate::resources::registry::Handle;
use crate::resources::shader::ShaderSystem;
use crate::resources::texture::TextureSystem;
use crate::resources::{ResourceError, ResourceResult};
use std::sync::Arc;
use thiserror::Error;

/// Top-level engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal configuration problem at startup
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Resource system failure
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Rendering failure; aborts the current frame, the loop continues
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Ownership root for the backend, resource systems, and view pipeline
pub struct EngineContext {
    backend: Box<dyn RenderBackend>,
    loader: Arc<dyn ResourceLoader>,
    pipeline: LoadPipeline,
    /// Engine event bus, drained once per frame
    pub events: EventBus,
    /// Texture registry
    pub textures: TextureSystem,
    /// Material registry
    pub materials: MaterialSystem,
    /// Geometry registry
    pub geometries: GeometrySystem,
    /// Shader registry
    pub shaders: ShaderSystem,
    /// Camera registry
    pub cameras: CameraSystem,
    /// Render views and frame orchestration
    pub views: RenderViewSystem,
    timer: Timer,
    frame_number: u64,
    shut_down: bool,
}

impl EngineContext {
    /// Construct every subsystem from a validated config
    ///
    /// Backend-independent systems come up first, then the defaults that
    /// need uploads, then the configured shaders and views.
    pub fn new(
        config: &EngineConfig,
        mut backend: Box<dyn RenderBackend>,
        loader: Arc<dyn ResourceLoader>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let pipeline = LoadPipeline::new(config.loader.worker_count, Arc::clone(&loader));
        let mut textures =
            TextureSystem::new(config.resources.max_texture_count, backend.as_mut())?;
        let materials = MaterialSystem::new(config.resources.max_material_count);
        let geometries =
            GeometrySystem::new(config.resources.max_geometry_count, backend.as_mut())?;
        let mut shaders = ShaderSystem::new(config.resources.max_shader_count);
        let cameras = CameraSystem::new(config.resources.max_camera_count);

        for shader_config in &config.shaders {
            shaders.acquire_from_config(shader_config, false, backend.as_mut())?;
        }

        let (width, height) = backend.window_extent();
        let mut views = RenderViewSystem::new(width, height);
        for view_config in &config.views {
            views.create(
                view_config,
                &mut shaders,
                &mut textures,
                &pipeline,
                backend.as_mut(),
            )?;
        }

        log::info!(
            "Engine context initialized: {} shader(s), {} view(s)",
            config.shaders.len(),
            config.views.len()
        );
        Ok(Self {
            backend,
            loader,
            pipeline,
            events: EventBus::new(),
            textures,
            materials,
            geometries,
            shaders,
            cameras,
            views,
            timer: Timer::new(),
            frame_number: 0,
            shut_down: false,
        })
    }

    /// Queue a resize notification from the platform layer
    pub fn on_window_resize(&mut self, width: u32, height: u32) {
        self.events
            .send(Event::resized(width, height, f64::from(self.timer.total_time())));
    }

    /// Run one frame: drain events and load completions, advance the
    /// resize debounce, then build and render a packet per view
    ///
    /// While a resize is debouncing the frame sleeps briefly instead of
    /// rendering. A render failure aborts this frame with an error; the
    /// context stays usable for the next frame.
    pub fn frame(&mut self, scene: &SceneRenderData) -> Result<(), EngineError> {
        self.timer.update();
        self.events.update_time(f64::from(self.timer.total_time()));

        for event in self.events.drain_due() {
            match event.code {
                EventCode::WindowResized => {
                    if let Some((width, height)) = event.get_size() {
                        self.views.on_resized(width, height);
                    }
                }
                EventCode::RenderModeChanged => {
                    log::debug!("render mode changed to {:?}", event.get_mode());
                }
                EventCode::TextureReloaded => {
                    log::trace!("texture '{}' reloaded", event.get_name().unwrap_or("?"));
                }
            }
        }

        self.textures
            .drain_completions(&self.pipeline, self.backend.as_mut());

        match self.views.tick(&mut self.textures, self.backend.as_mut())? {
            FramePacing::Skip => {
                time::sleep_ms(RESIZE_FRAME_PACING_MS);
                return Ok(());
            }
            FramePacing::Render => {}
        }

        self.backend.begin_frame(self.timer.delta_time())?;
        let target_index =
            (self.frame_number as usize) % self.backend.window_attachment_count().max(1);
        for key in self.views.keys_in_order() {
            let packet = self.views.build_packet(
                key,
                scene,
                &mut self.cameras,
                &self.geometries,
                &self.materials,
                &self.textures,
            )?;
            if let Err(e) = self.views.on_render(
                key,
                &packet,
                self.frame_number,
                target_index,
                &mut self.shaders,
                &mut self.materials,
                &self.geometries,
                &self.textures,
                self.backend.as_mut(),
            ) {
                log::error!("frame {} render aborted: {e}", self.frame_number);
                return Err(e.into());
            }
        }
        self.backend.end_frame()?;
        self.frame_number += 1;
        Ok(())
    }

    /// Frames completed so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Acquire a disk-backed texture (async load)
    pub fn acquire_texture(&mut self, name: &str, auto_release: bool) -> ResourceResult<Handle> {
        self.textures.acquire(name, auto_release, &self.pipeline)
    }

    /// Acquire a cube map texture (async load of six faces)
    pub fn acquire_cube_texture(
        &mut self,
        name: &str,
        auto_release: bool,
    ) -> ResourceResult<Handle> {
        self.textures.acquire_cube(name, auto_release, &self.pipeline)
    }

    /// Release a texture reference
    pub fn release_texture(&mut self, name: &str) {
        self.textures.release(name, self.backend.as_mut());
    }

    /// Acquire a material by name, loading its config when unknown
    pub fn acquire_material(&mut self, name: &str) -> ResourceResult<Handle> {
        self.materials.acquire(
            name,
            self.loader.as_ref(),
            &mut self.textures,
            &self.pipeline,
        )
    }

    /// Release a material reference
    pub fn release_material(&mut self, name: &str) {
        self.materials
            .release(name, &mut self.textures, self.backend.as_mut());
    }

    /// Acquire a geometry from config, uploading it to the backend
    pub fn acquire_geometry(
        &mut self,
        config: &GeometryConfig,
        auto_release: bool,
    ) -> ResourceResult<Handle> {
        self.geometries.acquire_from_config(
            config,
            auto_release,
            &mut self.materials,
            &mut self.textures,
            self.loader.as_ref(),
            &self.pipeline,
            self.backend.as_mut(),
        )
    }

    /// Release a geometry reference
    pub fn release_geometry(&mut self, name: &str) {
        self.geometries.release(
            name,
            &mut self.materials,
            &mut self.textures,
            self.backend.as_mut(),
        );
    }

    /// Tear everything down in reverse construction order
    ///
    /// Joins the load pipeline first so deferred destroys can run, then
    /// views, geometries, materials, shaders, textures. Safe to call more
    /// than once; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.pipeline.shutdown();
        self.textures
            .drain_completions(&self.pipeline, self.backend.as_mut());

        self.views.shutdown(
            &mut self.shaders,
            &mut self.textures,
            self.backend.as_mut(),
        );
        self.geometries.shutdown(
            &mut self.materials,
            &mut self.textures,
            self.backend.as_mut(),
        );
        self.materials
            .shutdown(&mut self.textures, self.backend.as_mut());
        self.shaders.shutdown(self.backend.as_mut());
        self.textures.shutdown(self.backend.as_mut());
        log::info!("Engine context shut down");
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
