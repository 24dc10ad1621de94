//! # Ember Engine
//!
//! Resource-registry and render-pipeline core for a real-time 3D engine.
//!
//! ## Features
//!
//! - **Resource Registries**: Reference-counted, name-addressable handles
//!   for textures, materials, geometries, shaders, and cameras
//! - **Async Loading**: File I/O and decode off the main thread, results
//!   drained and applied once per frame
//! - **Render Views**: Per-view pass ownership, packet construction with
//!   transparency-aware sorting, and per-frame dispatch
//! - **Resize Debouncing**: Render targets regenerate once per resize
//!   instead of thrashing during drags
//! - **Backend Agnostic**: Every GPU interaction goes through a narrow
//!   facade trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::prelude::*;
//! use std::sync::Arc;
//!
//! fn run(backend: Box<dyn RenderBackend>) -> Result<(), EngineError> {
//!     let config = EngineConfig::load("engine.toml")?;
//!     let loader = Arc::new(FileResourceLoader::new(&config.loader.asset_base_path));
//!     let mut engine = EngineContext::new(&config, backend, loader)?;
//!
//!     let scene = SceneRenderData::default();
//!     loop {
//!         engine.frame(&scene)?;
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod core;
pub mod events;
pub mod foundation;
pub mod render;
pub mod resources;

mod context;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{EngineContext, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::assets::{FileResourceLoader, ImageData, LoaderError, ResourceLoader};
    pub use crate::context::{EngineContext, EngineError};
    pub use crate::core::config::{ConfigError, EngineConfig};
    pub use crate::events::{Event, EventBus, EventCode};
    pub use crate::foundation::math::{Mat4, Transform, Vec2, Vec3, Vec4};
    pub use crate::render::packet::{GeometryRenderData, RenderPacket, SceneRenderData};
    pub use crate::render::view::{RenderViewConfig, ViewKindConfig};
    pub use crate::render::{RenderBackend, RenderError};
    pub use crate::resources::{
        GeometryConfig, Handle, MaterialConfig, ResourceError, ShaderConfig, Vertex3d,
    };
}
