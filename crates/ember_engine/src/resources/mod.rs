//! Resource systems: registries for textures, materials, geometries,
//! shaders, and cameras
//!
//! Every system is a [`SlotRegistry`](registry::SlotRegistry) instantiation
//! plus domain logic: acquire/release semantics, a registry-bypassing
//! default resource, and content generation counters.

pub mod camera;
pub mod geometry;
pub mod material;
pub mod primitives;
pub mod registry;
pub mod shader;
pub mod texture;

pub use camera::{Camera, CameraSystem};
pub use geometry::{Geometry, GeometryConfig, GeometrySystem, Vertex3d};
pub use material::{Material, MaterialConfig, MaterialSystem};
pub use registry::{Handle, RegistryError, SlotRegistry};
pub use shader::{Shader, ShaderConfig, ShaderSystem};
pub use texture::{Texture, TextureFlags, TextureSystem};

use crate::assets::loader::LoaderError;
use crate::render::RenderError;
use thiserror::Error;

/// Errors produced by resource system operations
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Registry-level failure (capacity exhaustion)
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Loader-level failure surfaced synchronously
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Backend failure while creating or destroying a resource
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A name was requested that the system does not know
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Resource kind
        kind: &'static str,
        /// Requested name
        name: String,
    },
}

/// Result type for resource system operations
pub type ResourceResult<T> = Result<T, ResourceError>;
