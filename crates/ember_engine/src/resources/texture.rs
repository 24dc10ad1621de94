//! Texture system
//!
//! Disk-backed textures load through the async pipeline: `acquire` returns
//! immediately with a slot whose content generation is `None` (pending);
//! the decoded pixels are uploaded and swapped into the live slot when the
//! frame loop drains completions. Writeable and backend-wrapped textures
//! are created synchronously and are never auto-released.

use crate::assets::pipeline::{LoadCompletion, LoadPayload, LoadPipeline, LoadRequest};
use crate::render::backend::{RenderBackend, TextureInternalId};
use crate::resources::registry::{Handle, Release, SlotRegistry};
use crate::resources::{ResourceError, ResourceResult};
use bitflags::bitflags;
use std::collections::HashMap;

/// Reserved name of the registry-bypassing default texture
pub const DEFAULT_TEXTURE_NAME: &str = "default";

const DEFAULT_TEXTURE_DIM: u32 = 256;
const DEFAULT_CHECKER_CELL: u32 = 16;

bitflags! {
    /// Texture property flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureFlags: u8 {
        /// CPU-updatable; created synchronously, never auto-released
        const WRITEABLE = 0b0001;
        /// Wraps a backend-owned resource the registry must never destroy
        const WRAPPED = 0b0010;
        /// At least one texel has non-opaque alpha
        const HAS_TRANSPARENCY = 0b0100;
        /// Six-face cube map
        const CUBE = 0b1000;
    }
}

/// A texture resource payload
#[derive(Debug, Clone)]
pub struct Texture {
    /// Stable id: the slot index this texture is bound to
    pub id: u32,
    /// Width in pixels (0 while a load is pending)
    pub width: u32,
    /// Height in pixels (0 while a load is pending)
    pub height: u32,
    /// Colour channel count
    pub channel_count: u8,
    /// Property flags
    pub flags: TextureFlags,
    /// Content generation; `None` means the texture is not yet
    /// generation-valid (load pending) and must be skipped when drawing
    pub generation: Option<u32>,
    /// Backend resource key; `None` until the first upload completes
    pub internal: Option<TextureInternalId>,
}

impl Texture {
    fn pending(id: u32, flags: TextureFlags) -> Self {
        Self {
            id,
            width: 0,
            height: 0,
            channel_count: 0,
            flags,
            generation: None,
            internal: None,
        }
    }

    fn bump_generation(&mut self) {
        self.generation = Some(self.generation.map_or(0, |g| g.wrapping_add(1)));
    }
}

#[derive(Debug, Default)]
struct PendingLoad {
    /// Set when the last reference was released mid-flight; the completion
    /// is discarded and the slot freed when it arrives
    destroy_on_complete: bool,
}

/// Name-addressed registry of textures plus the default fallback
pub struct TextureSystem {
    registry: SlotRegistry<Texture>,
    default_texture: Texture,
    pending: HashMap<String, PendingLoad>,
}

impl TextureSystem {
    /// Create the system and its default checkerboard texture
    pub fn new(capacity: usize, backend: &mut dyn RenderBackend) -> ResourceResult<Self> {
        let pixels = default_checkerboard_pixels();
        let internal = backend.create_texture(
            DEFAULT_TEXTURE_NAME,
            DEFAULT_TEXTURE_DIM,
            DEFAULT_TEXTURE_DIM,
            4,
            &pixels,
        )?;
        let default_texture = Texture {
            id: u32::MAX,
            width: DEFAULT_TEXTURE_DIM,
            height: DEFAULT_TEXTURE_DIM,
            channel_count: 4,
            flags: TextureFlags::empty(),
            generation: Some(0),
            internal: Some(internal),
        };
        log::info!("Texture system initialized with {capacity} slots");
        Ok(Self {
            registry: SlotRegistry::new("texture", capacity),
            default_texture,
            pending: HashMap::new(),
        })
    }

    /// Acquire a disk-backed 2D texture, starting an async load if needed
    ///
    /// Returns immediately; until the load completes the texture's content
    /// generation is `None` and renderers substitute the default texture.
    pub fn acquire(
        &mut self,
        name: &str,
        auto_release: bool,
        pipeline: &LoadPipeline,
    ) -> ResourceResult<Handle> {
        self.acquire_async(name, auto_release, pipeline, false)
    }

    /// Acquire a cube map assembled from six suffixed face images
    pub fn acquire_cube(
        &mut self,
        name: &str,
        auto_release: bool,
        pipeline: &LoadPipeline,
    ) -> ResourceResult<Handle> {
        self.acquire_async(name, auto_release, pipeline, true)
    }

    fn acquire_async(
        &mut self,
        name: &str,
        auto_release: bool,
        pipeline: &LoadPipeline,
        cube: bool,
    ) -> ResourceResult<Handle> {
        if name == DEFAULT_TEXTURE_NAME {
            return Ok(Handle::DEFAULT);
        }
        let flags = if cube {
            TextureFlags::CUBE
        } else {
            TextureFlags::empty()
        };
        let handle = self
            .registry
            .acquire_with(name, auto_release, |h| {
                Ok::<_, ResourceError>(Texture::pending(h.index(), flags))
            })?;

        // A re-acquire cancels any deferred destroy from an earlier
        // release-while-loading.
        if let Some(pending) = self.pending.get_mut(name) {
            pending.destroy_on_complete = false;
        }

        let needs_load = self
            .registry
            .get(handle)
            .is_some_and(|t| t.internal.is_none() && t.generation.is_none())
            && !self.pending.contains_key(name);
        if needs_load {
            let request = if cube {
                LoadRequest::CubeMap {
                    name: name.to_string(),
                    handle,
                }
            } else {
                LoadRequest::Image {
                    name: name.to_string(),
                    handle,
                }
            };
            if pipeline.submit(request) {
                self.pending.insert(name.to_string(), PendingLoad::default());
            } else {
                log::warn!("load pipeline unavailable; texture '{name}' stays pending");
            }
        }
        Ok(handle)
    }

    /// Create a writeable texture synchronously
    ///
    /// Writeable textures are never auto-released regardless of the
    /// caller's wishes.
    pub fn acquire_writeable(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        has_transparency: bool,
        backend: &mut dyn RenderBackend,
    ) -> ResourceResult<Handle> {
        if name == DEFAULT_TEXTURE_NAME {
            return Ok(Handle::DEFAULT);
        }
        self.registry.acquire_with(name, false, |h| {
            let internal = backend.create_writeable_texture(name, width, height, channel_count)?;
            let mut flags = TextureFlags::WRITEABLE;
            flags.set(TextureFlags::HAS_TRANSPARENCY, has_transparency);
            Ok::<_, ResourceError>(Texture {
                id: h.index(),
                width,
                height,
                channel_count,
                flags,
                generation: Some(0),
                internal: Some(internal),
            })
        })
    }

    /// Register a backend-owned texture under a name
    ///
    /// The registry will never destroy the wrapped resource; teardown only
    /// forgets it.
    pub fn wrap_internal(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        internal: TextureInternalId,
    ) -> ResourceResult<Handle> {
        self.registry.acquire_with(name, false, |h| {
            Ok::<_, ResourceError>(Texture {
                id: h.index(),
                width,
                height,
                channel_count,
                flags: TextureFlags::WRAPPED,
                generation: Some(0),
                internal: Some(internal),
            })
        })
    }

    /// Write pixel data into a writeable texture
    ///
    /// Writing a non-writeable texture is a misuse warning, not an error.
    pub fn write_data(
        &mut self,
        handle: Handle,
        pixels: &[u8],
        backend: &mut dyn RenderBackend,
    ) -> ResourceResult<()> {
        let Some(texture) = self.registry.get_mut(handle) else {
            log::warn!("write_data on a stale texture handle");
            return Ok(());
        };
        if !texture.flags.contains(TextureFlags::WRITEABLE) {
            log::warn!("write_data on non-writeable texture {}", texture.id);
            return Ok(());
        }
        if let Some(internal) = texture.internal {
            backend.write_texture(internal, pixels)?;
            texture.bump_generation();
        }
        Ok(())
    }

    /// Resize a writeable texture, discarding its contents
    pub fn resize(
        &mut self,
        handle: Handle,
        width: u32,
        height: u32,
        backend: &mut dyn RenderBackend,
    ) -> ResourceResult<()> {
        let Some(texture) = self.registry.get_mut(handle) else {
            log::warn!("resize on a stale texture handle");
            return Ok(());
        };
        if !texture.flags.contains(TextureFlags::WRITEABLE) {
            log::warn!("resize on non-writeable texture {}", texture.id);
            return Ok(());
        }
        if let Some(internal) = texture.internal {
            backend.resize_texture(internal, width, height)?;
        }
        texture.width = width;
        texture.height = height;
        texture.bump_generation();
        Ok(())
    }

    /// Release one reference to `name`
    ///
    /// If the last reference drops while an async load is still in flight
    /// the destroy is deferred until the completion is drained; the slot
    /// is never freed out from under the worker's result.
    pub fn release(&mut self, name: &str, backend: &mut dyn RenderBackend) {
        if name == DEFAULT_TEXTURE_NAME {
            log::trace!("release of the default texture ignored");
            return;
        }
        if let Release::ShouldDestroy(_) = self.registry.release(name) {
            if let Some(pending) = self.pending.get_mut(name) {
                log::debug!("texture '{name}' released while loading; destroy deferred");
                pending.destroy_on_complete = true;
            } else if let Some(texture) = self.registry.destroy(name) {
                destroy_backend_texture(&texture, backend);
            }
        }
    }

    /// Drain load completions, uploading and swapping results in place
    ///
    /// Must be called once per frame from the owning thread. Returns the
    /// number of completions processed.
    pub fn drain_completions(
        &mut self,
        pipeline: &LoadPipeline,
        backend: &mut dyn RenderBackend,
    ) -> usize {
        pipeline.drain(|completion| self.apply_completion(completion, backend))
    }

    fn apply_completion(&mut self, completion: LoadCompletion, backend: &mut dyn RenderBackend) {
        let LoadCompletion {
            name,
            handle,
            result,
        } = completion;

        let destroy_requested = self
            .pending
            .remove(&name)
            .is_some_and(|p| p.destroy_on_complete);
        if destroy_requested {
            log::debug!("discarding late load result for released texture '{name}'");
            if let Some(texture) = self.registry.destroy(&name) {
                destroy_backend_texture(&texture, backend);
            }
            return;
        }

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                // The live slot keeps its previous (possibly default) state.
                log::error!("failed to load texture '{name}': {e}");
                return;
            }
        };

        let uploaded = match payload {
            LoadPayload::Image(image) => {
                let transparent = image.has_transparency();
                backend
                    .create_texture(&name, image.width, image.height, image.channels, &image.data)
                    .map(|internal| (internal, image.width, image.height, image.channels, transparent))
            }
            LoadPayload::CubeMap {
                width,
                height,
                channels,
                pixels,
            } => backend
                .create_cube_texture(&name, width, height, channels, &pixels)
                .map(|internal| (internal, width, height, channels, false)),
        };

        let (internal, width, height, channels, transparent) = match uploaded {
            Ok(u) => u,
            Err(e) => {
                log::error!("GPU upload failed for texture '{name}': {e}");
                return;
            }
        };

        let Some(texture) = self.registry.get_mut(handle) else {
            log::warn!("texture '{name}' slot is gone; dropping completed upload");
            if let Err(e) = backend.destroy_texture(internal) {
                log::error!("failed to destroy orphaned texture upload: {e}");
            }
            return;
        };

        // Swap in place: the slot (and every outstanding handle) stays
        // stable while the contents move to a new generation.
        let previous = texture.internal.replace(internal);
        texture.width = width;
        texture.height = height;
        texture.channel_count = channels;
        texture
            .flags
            .set(TextureFlags::HAS_TRANSPARENCY, transparent);
        texture.bump_generation();
        if let Some(previous) = previous {
            if let Err(e) = backend.destroy_texture(previous) {
                log::error!("failed to destroy replaced texture contents: {e}");
            }
        }
        log::info!("texture '{name}' loaded ({width}x{height})");
    }

    /// Resolve a handle; the default sentinel resolves to the default texture
    pub fn get(&self, handle: Handle) -> Option<&Texture> {
        if handle.is_default() {
            return Some(&self.default_texture);
        }
        self.registry.get(handle)
    }

    /// Handle bound to `name`, if any
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        if name == DEFAULT_TEXTURE_NAME {
            return Some(Handle::DEFAULT);
        }
        self.registry.handle_of(name)
    }

    /// The always-valid default texture
    pub fn default_texture(&self) -> &Texture {
        &self.default_texture
    }

    /// Current reference count for `name`
    pub fn ref_count(&self, name: &str) -> usize {
        self.registry.ref_count(name)
    }

    /// Whether a load for `name` is still in flight
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Number of live registry slots
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Destroy every texture and the default, returning backend resources
    pub fn shutdown(&mut self, backend: &mut dyn RenderBackend) {
        self.pending.clear();
        for (_, texture) in self.registry.drain_all() {
            destroy_backend_texture(&texture, backend);
        }
        if let Some(internal) = self.default_texture.internal.take() {
            if let Err(e) = backend.destroy_texture(internal) {
                log::error!("failed to destroy default texture: {e}");
            }
        }
        log::info!("Texture system shut down");
    }
}

/// Return a texture's GPU resources unless it wraps a backend-owned one
fn destroy_backend_texture(texture: &Texture, backend: &mut dyn RenderBackend) {
    if texture.flags.contains(TextureFlags::WRAPPED) {
        return;
    }
    if let Some(internal) = texture.internal {
        if let Err(e) = backend.destroy_texture(internal) {
            log::error!("failed to destroy texture {}: {e}", texture.id);
        }
    }
}

fn default_checkerboard_pixels() -> Vec<u8> {
    let dim = DEFAULT_TEXTURE_DIM;
    let mut pixels = vec![255u8; (dim * dim * 4) as usize];
    for y in 0..dim {
        for x in 0..dim {
            let even = ((x / DEFAULT_CHECKER_CELL) + (y / DEFAULT_CHECKER_CELL)) % 2 == 0;
            if even {
                let offset = ((y * dim + x) * 4) as usize;
                pixels[offset] = 0;
                pixels[offset + 1] = 0;
                // Blue cell; alpha stays opaque.
            }
        }
    }
    pixels
}
