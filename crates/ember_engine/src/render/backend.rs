//! Backend abstraction for the rendering system
//!
//! Defines the trait a rendering backend must implement to serve the
//! high-level pipeline. The core issues no GPU calls of its own; textures,
//! geometries, shaders and render targets are referred to by opaque
//! internal ids minted by the backend.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::pass::RenderPass;
use crate::render::RenderResult;
use crate::resources::geometry::Vertex3d;
use crate::resources::shader::ShaderConfig;

/// Opaque backend key for a texture resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureInternalId(pub u64);

/// Opaque backend key for an uploaded geometry (vertex + index buffers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryInternalId(pub u64);

/// Opaque backend key for a compiled shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderInternalId(pub u64);

/// Opaque backend key for a framebuffer / render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub u64);

/// Per-frame global uniform data, applied at most once per shader per frame
#[derive(Debug, Clone)]
pub struct GlobalUniforms {
    /// Projection matrix for the current view
    pub projection: Mat4,
    /// View matrix for the current view
    pub view: Mat4,
    /// World-space camera position
    pub view_position: Vec3,
    /// Scene ambient colour
    pub ambient_colour: Vec4,
}

/// Per-instance (per-material) uniform data
#[derive(Debug, Clone)]
pub struct InstanceUniforms {
    /// Material diffuse colour
    pub diffuse_colour: Vec4,
    /// Specular exponent
    pub shininess: f32,
    /// Bound diffuse map, if the material's texture has finished loading
    pub diffuse_map: Option<TextureInternalId>,
    /// Bound specular map
    pub specular_map: Option<TextureInternalId>,
    /// Bound normal map
    pub normal_map: Option<TextureInternalId>,
}

/// Main rendering backend trait
///
/// Implementations own the actual GPU objects; the engine core only holds
/// the internal ids handed back from the `create_*` calls and returns them
/// through the matching `destroy_*` calls at teardown.
pub trait RenderBackend {
    /// Upload an immutable texture from decoded pixel data
    fn create_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        pixels: &[u8],
    ) -> RenderResult<TextureInternalId>;

    /// Upload a cube map from six concatenated faces of equal size
    fn create_cube_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        pixels: &[u8],
    ) -> RenderResult<TextureInternalId>;

    /// Create a writeable (CPU-updatable) texture with no initial data
    fn create_writeable_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
    ) -> RenderResult<TextureInternalId>;

    /// Write pixel data into a writeable texture
    fn write_texture(&mut self, id: TextureInternalId, pixels: &[u8]) -> RenderResult<()>;

    /// Resize a writeable texture, discarding its contents
    fn resize_texture(
        &mut self,
        id: TextureInternalId,
        width: u32,
        height: u32,
    ) -> RenderResult<()>;

    /// Release a texture's GPU resources
    fn destroy_texture(&mut self, id: TextureInternalId) -> RenderResult<()>;

    /// Upload vertex and index data for a geometry
    fn create_geometry(
        &mut self,
        vertices: &[Vertex3d],
        indices: &[u32],
    ) -> RenderResult<GeometryInternalId>;

    /// Release a geometry's GPU buffers
    fn destroy_geometry(&mut self, id: GeometryInternalId) -> RenderResult<()>;

    /// Compile and register a shader program from its config
    fn create_shader(&mut self, config: &ShaderConfig) -> RenderResult<ShaderInternalId>;

    /// Release a shader program
    fn destroy_shader(&mut self, id: ShaderInternalId) -> RenderResult<()>;

    /// Bind a shader for subsequent draws
    fn use_shader(&mut self, id: ShaderInternalId) -> RenderResult<()>;

    /// Upload per-frame global uniforms to the bound shader
    fn apply_globals(&mut self, id: ShaderInternalId, globals: &GlobalUniforms)
        -> RenderResult<()>;

    /// Upload per-material instance uniforms to the bound shader
    fn apply_instance(
        &mut self,
        id: ShaderInternalId,
        instance: &InstanceUniforms,
    ) -> RenderResult<()>;

    /// Upload per-draw local uniforms (model matrix) to the bound shader
    fn apply_local(&mut self, id: ShaderInternalId, model: &Mat4) -> RenderResult<()>;

    /// Issue the draw for an uploaded geometry
    fn draw_geometry(&mut self, id: GeometryInternalId) -> RenderResult<()>;

    /// Begin recording a frame
    fn begin_frame(&mut self, delta_time: f32) -> RenderResult<()>;

    /// Finish and submit the frame
    fn end_frame(&mut self) -> RenderResult<()>;

    /// Begin a render pass on one of its targets
    fn begin_renderpass(&mut self, pass: &RenderPass, target_index: usize) -> RenderResult<()>;

    /// End the active render pass
    fn end_renderpass(&mut self, pass: &RenderPass) -> RenderResult<()>;

    /// Create a framebuffer over the given attachments
    fn create_render_target(
        &mut self,
        attachments: &[TextureInternalId],
        width: u32,
        height: u32,
    ) -> RenderResult<RenderTargetId>;

    /// Destroy a framebuffer (the attachments themselves are not touched)
    fn destroy_render_target(&mut self, id: RenderTargetId) -> RenderResult<()>;

    /// Number of swapchain images (one window attachment per image)
    fn window_attachment_count(&self) -> usize;

    /// Fetch the swapchain colour attachment for the given image index
    fn window_attachment(&mut self, index: usize) -> RenderResult<TextureInternalId>;

    /// Fetch the shared swapchain depth attachment
    fn depth_attachment(&mut self) -> RenderResult<TextureInternalId>;

    /// Current drawable surface size (width, height)
    fn window_extent(&self) -> (u32, u32);

    /// Notify the backend that the drawable surface changed size
    fn on_resized(&mut self, width: u32, height: u32);
}
