//! Render view system and frame orchestration
//!
//! Owns every view, dispatches per-frame packet construction and rendering,
//! and runs the resize-debounce state machine: window resizes latch the new
//! size and suspend rendering for a settle period so render targets are
//! regenerated exactly once per drag instead of on every event.

use crate::assets::pipeline::LoadPipeline;
use crate::render::pass::{AttachmentKind, AttachmentSource};
use crate::render::view::{regenerate_view_attachment, RenderView, RenderViewConfig};
use crate::render::{backend::RenderBackend, packet::RenderPacket, packet::SceneRenderData};
use crate::render::{RenderError, RenderResult};
use crate::resources::camera::CameraSystem;
use crate::resources::geometry::GeometrySystem;
use crate::resources::material::MaterialSystem;
use crate::resources::shader::ShaderSystem;
use crate::resources::texture::TextureSystem;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

new_key_type! {
    /// Stable key addressing a view in the system
    pub struct ViewKey;
}

/// Frames a resize must settle for before targets are regenerated
pub const RESIZE_SETTLE_FRAMES: u32 = 30;

/// Sleep applied by the caller for each skipped frame, keeping pacing
/// steady while rendering is suspended
pub const RESIZE_FRAME_PACING_MS: u64 = 16;

/// What the caller should do with the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePacing {
    /// Render normally
    Render,
    /// Skip rendering and sleep [`RESIZE_FRAME_PACING_MS`]
    Skip,
}

/// Owner of every render view plus the resize state machine
pub struct RenderViewSystem {
    views: SlotMap<ViewKey, RenderView>,
    by_name: HashMap<String, ViewKey>,
    order: Vec<ViewKey>,
    window_width: u32,
    window_height: u32,
    resizing: bool,
    frames_since_resize: u32,
    pending_width: u32,
    pending_height: u32,
    next_view_id: u16,
}

impl RenderViewSystem {
    /// Create the system against the current window size
    pub fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            views: SlotMap::with_key(),
            by_name: HashMap::new(),
            order: Vec::new(),
            window_width,
            window_height,
            resizing: false,
            frames_since_resize: 0,
            pending_width: window_width,
            pending_height: window_height,
            next_view_id: 0,
        }
    }

    /// Create a view from config and regenerate its targets immediately
    ///
    /// A config without passes or with a name already in use is a fatal
    /// configuration error.
    pub fn create(
        &mut self,
        config: &RenderViewConfig,
        shaders: &mut ShaderSystem,
        textures: &mut TextureSystem,
        pipeline: &LoadPipeline,
        backend: &mut dyn RenderBackend,
    ) -> RenderResult<ViewKey> {
        if config.passes.is_empty() {
            log::error!("view '{}' configured without passes", config.name);
            return Err(RenderError::InvalidConfiguration(format!(
                "view '{}' must configure at least one pass",
                config.name
            )));
        }
        if self.by_name.contains_key(&config.name) {
            log::error!("view name '{}' already in use", config.name);
            return Err(RenderError::InvalidConfiguration(format!(
                "view name '{}' already in use",
                config.name
            )));
        }

        let id = self.next_view_id;
        let mut view = RenderView::create(
            id,
            config,
            self.window_width,
            self.window_height,
            backend.window_attachment_count(),
            shaders,
            textures,
            pipeline,
            backend,
        )?;
        regenerate_targets(
            &mut view,
            self.window_width,
            self.window_height,
            textures,
            backend,
        )?;

        self.next_view_id += 1;
        let key = self.views.insert(view);
        self.by_name.insert(config.name.clone(), key);
        self.order.push(key);
        Ok(key)
    }

    /// Latch a window resize and restart the settle countdown
    ///
    /// Rendering is suspended until the size has been stable for
    /// [`RESIZE_SETTLE_FRAMES`] ticks; continuous drag-resize keeps
    /// resetting the countdown instead of thrashing target recreation.
    pub fn on_resized(&mut self, width: u32, height: u32) {
        if !self.resizing && width == self.window_width && height == self.window_height {
            return;
        }
        self.resizing = true;
        self.pending_width = width;
        self.pending_height = height;
        self.frames_since_resize = 0;
        log::debug!("resize latched at {width}x{height}; debouncing");
    }

    /// Advance the resize state machine by one frame
    ///
    /// Returns [`FramePacing::Skip`] while debouncing (the caller sleeps
    /// and skips rendering). On the settle tick the new size is applied:
    /// the backend is notified, every view is resized, and render targets
    /// are regenerated exactly once.
    pub fn tick(
        &mut self,
        textures: &mut TextureSystem,
        backend: &mut dyn RenderBackend,
    ) -> RenderResult<FramePacing> {
        if !self.resizing {
            return Ok(FramePacing::Render);
        }
        self.frames_since_resize += 1;
        if self.frames_since_resize < RESIZE_SETTLE_FRAMES {
            return Ok(FramePacing::Skip);
        }

        self.window_width = self.pending_width;
        self.window_height = self.pending_height;
        backend.on_resized(self.window_width, self.window_height);
        log::info!(
            "resize settled at {}x{}; regenerating render targets",
            self.window_width,
            self.window_height
        );

        for key in self.order.clone() {
            if let Some(view) = self.views.get_mut(key) {
                view.on_resized(self.window_width, self.window_height);
                regenerate_targets(
                    view,
                    self.window_width,
                    self.window_height,
                    textures,
                    backend,
                )?;
            }
        }

        self.resizing = false;
        self.frames_since_resize = 0;
        Ok(FramePacing::Render)
    }

    /// Build a packet for one view from this frame's scene data
    pub fn build_packet(
        &self,
        key: ViewKey,
        scene: &SceneRenderData,
        cameras: &mut CameraSystem,
        geometries: &GeometrySystem,
        materials: &MaterialSystem,
        textures: &TextureSystem,
    ) -> RenderResult<RenderPacket> {
        let view = self
            .views
            .get(key)
            .ok_or_else(|| RenderError::UnknownView(format!("{key:?}")))?;
        Ok(view.build_packet(scene, cameras, geometries, materials, textures))
    }

    /// Render a packet through one view
    pub fn on_render(
        &self,
        key: ViewKey,
        packet: &RenderPacket,
        frame_number: u64,
        target_index: usize,
        shaders: &mut ShaderSystem,
        materials: &mut MaterialSystem,
        geometries: &GeometrySystem,
        textures: &TextureSystem,
        backend: &mut dyn RenderBackend,
    ) -> RenderResult<()> {
        let view = self
            .views
            .get(key)
            .ok_or_else(|| RenderError::UnknownView(format!("{key:?}")))?;
        view.render(
            packet,
            frame_number,
            target_index,
            shaders,
            materials,
            geometries,
            textures,
            backend,
        )
    }

    /// Key of the view registered under `name`
    pub fn key_of(&self, name: &str) -> Option<ViewKey> {
        self.by_name.get(name).copied()
    }

    /// Resolve a key to its view
    pub fn get(&self, key: ViewKey) -> Option<&RenderView> {
        self.views.get(key)
    }

    /// View keys in creation order
    pub fn keys_in_order(&self) -> Vec<ViewKey> {
        self.order.clone()
    }

    /// Number of registered views
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether no views are registered
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Whether a resize is currently debouncing
    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    /// Currently applied window size
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    /// Destroy every view, releasing shaders, owned textures and targets
    pub fn shutdown(
        &mut self,
        shaders: &mut ShaderSystem,
        textures: &mut TextureSystem,
        backend: &mut dyn RenderBackend,
    ) {
        for key in self.order.drain(..) {
            if let Some(mut view) = self.views.remove(key) {
                log::trace!("destroying render view '{}'", view.name);
                view.destroy(shaders, textures, backend);
            }
        }
        self.by_name.clear();
        log::info!("Render view system shut down");
    }
}

/// Rebuild every target of a view's passes at the current sizes
///
/// Window-sourced attachments are re-fetched from the backend; view-sourced
/// attachments go through the kind-dispatched regeneration hook. Old
/// framebuffers are destroyed before new ones are created.
fn regenerate_targets(
    view: &mut RenderView,
    window_width: u32,
    window_height: u32,
    textures: &mut TextureSystem,
    backend: &mut dyn RenderBackend,
) -> RenderResult<()> {
    let RenderView {
        passes,
        kind,
        width,
        height,
        ..
    } = view;

    for pass in passes.iter_mut() {
        for (target_index, target) in pass.targets.iter_mut().enumerate() {
            let (target_width, target_height) = if target.sync_to_window_size {
                (window_width, window_height)
            } else {
                (*width, *height)
            };

            if let Some(internal) = target.internal.take() {
                backend.destroy_render_target(internal)?;
            }

            let mut attachment_ids = Vec::with_capacity(target.attachments.len());
            for attachment in &mut target.attachments {
                attachment.texture = match attachment.source {
                    AttachmentSource::Window => Some(match attachment.kind {
                        AttachmentKind::Colour => backend.window_attachment(target_index)?,
                        AttachmentKind::Depth => backend.depth_attachment()?,
                    }),
                    AttachmentSource::View => regenerate_view_attachment(
                        kind,
                        attachment.kind,
                        target_width,
                        target_height,
                        textures,
                        backend,
                    )?,
                };
                if let Some(id) = attachment.texture {
                    attachment_ids.push(id);
                }
            }
            target.internal =
                Some(backend.create_render_target(&attachment_ids, target_width, target_height)?);
        }
    }
    Ok(())
}
