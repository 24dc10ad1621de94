//! Shader system
//!
//! Shaders are registered from serde configs naming their stage files and
//! owning render pass. Compilation happens behind the backend facade;
//! the system tracks the registry discipline and the per-frame global
//! uniform gate.

use crate::render::backend::{GlobalUniforms, RenderBackend, ShaderInternalId};
use crate::render::{RenderError, RenderResult};
use crate::resources::registry::{Handle, Release, SlotRegistry};
use crate::resources::{ResourceError, ResourceResult};
use serde::{Deserialize, Serialize};

/// Shader stage file paths and pass binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Shader name, also the registry key
    pub name: String,
    /// Render pass this shader is compatible with
    #[serde(default = "default_renderpass_name")]
    pub renderpass_name: String,
    /// Path to the vertex stage
    pub vertex_shader_path: String,
    /// Path to the fragment stage
    pub fragment_shader_path: String,
}

fn default_renderpass_name() -> String {
    "world".to_string()
}

/// A shader resource payload
#[derive(Debug, Clone)]
pub struct Shader {
    /// Stable id: the slot index this shader is bound to
    pub id: u32,
    /// Shader name
    pub name: String,
    /// Render pass this shader is compatible with
    pub renderpass_name: String,
    /// Backend program key
    pub internal: Option<ShaderInternalId>,
    /// Frame stamp gating global uniform uploads to once per frame
    pub render_frame_number: Option<u64>,
}

/// Name-addressed registry of shaders
pub struct ShaderSystem {
    registry: SlotRegistry<Shader>,
}

impl ShaderSystem {
    /// Create the system
    pub fn new(capacity: usize) -> Self {
        log::info!("Shader system initialized with {capacity} slots");
        Self {
            registry: SlotRegistry::new("shader", capacity),
        }
    }

    /// Register and compile a shader from config
    pub fn acquire_from_config(
        &mut self,
        config: &ShaderConfig,
        auto_release: bool,
        backend: &mut dyn RenderBackend,
    ) -> ResourceResult<Handle> {
        self.registry.acquire_with(&config.name, auto_release, |h| {
            let internal = backend.create_shader(config)?;
            Ok::<_, ResourceError>(Shader {
                id: h.index(),
                name: config.name.clone(),
                renderpass_name: config.renderpass_name.clone(),
                internal: Some(internal),
                render_frame_number: None,
            })
        })
    }

    /// Acquire another reference to an already-registered shader
    pub fn acquire(&mut self, name: &str) -> ResourceResult<Handle> {
        if self.registry.handle_of(name).is_none() {
            return Err(ResourceError::NotFound {
                kind: "shader",
                name: name.to_string(),
            });
        }
        self.registry.acquire_with(name, true, |_| {
            Err(ResourceError::NotFound {
                kind: "shader",
                name: name.to_string(),
            })
        })
    }

    /// Release one reference; at zero with auto-release the program is
    /// returned to the backend
    pub fn release(&mut self, name: &str, backend: &mut dyn RenderBackend) {
        if let Release::ShouldDestroy(_) = self.registry.release(name) {
            if let Some(shader) = self.registry.destroy(name) {
                destroy_backend_shader(&shader, backend);
            }
        }
    }

    /// Bind a shader for subsequent draws
    ///
    /// Binding a shader that was never compiled is a misuse error: logged,
    /// the frame's render aborts, the process does not.
    pub fn use_shader(&self, handle: Handle, backend: &mut dyn RenderBackend) -> RenderResult<()> {
        let Some(internal) = self.registry.get(handle).and_then(|s| s.internal) else {
            log::error!("attempt to bind an uninitialized shader");
            return Err(RenderError::RenderingFailed(
                "attempt to bind an uninitialized shader".to_string(),
            ));
        };
        backend.use_shader(internal)
    }

    /// Upload global uniforms, at most once per shader per frame
    pub fn apply_globals(
        &mut self,
        handle: Handle,
        frame_number: u64,
        globals: &GlobalUniforms,
        backend: &mut dyn RenderBackend,
    ) -> RenderResult<()> {
        let Some(shader) = self.registry.get_mut(handle) else {
            log::warn!("apply_globals on a stale shader handle");
            return Ok(());
        };
        if shader.render_frame_number == Some(frame_number) {
            return Ok(());
        }
        let Some(internal) = shader.internal else {
            log::warn!("apply_globals on an uninitialized shader");
            return Ok(());
        };
        backend.apply_globals(internal, globals)?;
        shader.render_frame_number = Some(frame_number);
        Ok(())
    }

    /// Resolve a handle to its payload
    pub fn get(&self, handle: Handle) -> Option<&Shader> {
        self.registry.get(handle)
    }

    /// Handle bound to `name`, if any
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        self.registry.handle_of(name)
    }

    /// Current reference count for `name`
    pub fn ref_count(&self, name: &str) -> usize {
        self.registry.ref_count(name)
    }

    /// Number of live registry slots
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Destroy every shader, returning programs to the backend
    pub fn shutdown(&mut self, backend: &mut dyn RenderBackend) {
        for (name, shader) in self.registry.drain_all() {
            log::trace!("destroying shader '{name}' at shutdown");
            destroy_backend_shader(&shader, backend);
        }
        log::info!("Shader system shut down");
    }
}

fn destroy_backend_shader(shader: &Shader, backend: &mut dyn RenderBackend) {
    if let Some(internal) = shader.internal {
        if let Err(e) = backend.destroy_shader(internal) {
            log::error!("failed to destroy shader '{}': {e}", shader.name);
        }
    }
}
