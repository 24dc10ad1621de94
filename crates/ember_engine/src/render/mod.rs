//! # Rendering pipeline core
//!
//! High-level, backend-agnostic rendering orchestration: render passes and
//! targets, per-frame packet construction, and the view system that turns
//! scene data into ordered draw submissions.
//!
//! The engine never talks to a GPU API directly. Every GPU interaction
//! goes through the [`RenderBackend`] facade, which keeps the backend
//! swappable and lets the whole pipeline run against a mock in tests.

pub mod backend;
pub mod packet;
pub mod pass;
pub mod view;
pub mod view_system;

pub use backend::{
    GeometryInternalId, GlobalUniforms, InstanceUniforms, RenderBackend, RenderTargetId,
    ShaderInternalId, TextureInternalId,
};
pub use packet::{GeometryRenderData, RenderPacket};
pub use pass::{Attachment, AttachmentKind, AttachmentSource, ClearFlags, RenderPass, RenderTarget};
pub use view::{RenderView, ViewKind};
pub use view_system::{FramePacing, RenderViewSystem};

use thiserror::Error;

/// Errors produced by rendering operations
#[derive(Debug, Error)]
pub enum RenderError {
    /// A rendering operation failed during execution
    ///
    /// A pass failing to begin or end aborts the current frame's render;
    /// the frame loop continues with the next frame.
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// GPU resource creation or management failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A view or pass referenced something that does not exist
    #[error("Unknown render view: {0}")]
    UnknownView(String),

    /// A view was configured without required fields at startup
    #[error("Invalid view configuration: {0}")]
    InvalidConfiguration(String),

    /// Backend-specific error wrapped in a generic form
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
