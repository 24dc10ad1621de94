//! Shared test doubles: a recording mock backend and an in-memory loader

use crate::assets::loader::{ImageData, LoaderError, ResourceLoader};
use crate::assets::pipeline::LoadPipeline;
use crate::foundation::math::Mat4;
use crate::render::backend::{
    GeometryInternalId, GlobalUniforms, InstanceUniforms, RenderBackend, RenderTargetId,
    ShaderInternalId, TextureInternalId,
};
use crate::render::pass::RenderPass;
use crate::render::{RenderError, RenderResult};
use crate::resources::geometry::Vertex3d;
use crate::resources::material::MaterialConfig;
use crate::resources::shader::ShaderConfig;
use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Recording backend: mints ids and logs every call relevant to a test
pub struct MockBackend {
    next_id: u64,
    live_textures: HashSet<u64>,
    destroyed_textures: Vec<u64>,
    live_geometries: HashSet<u64>,
    /// Shader ids minted so far
    pub created_shaders: Vec<ShaderInternalId>,
    /// Shader binds in order
    pub used_shaders: Vec<ShaderInternalId>,
    /// Framebuffer creations
    pub render_target_creates: usize,
    /// Framebuffer destructions
    pub render_target_destroys: usize,
    /// Swapchain colour attachment fetches
    pub window_attachment_fetches: usize,
    /// `(pass name, target index)` per begin
    pub begin_renderpass_log: Vec<(String, usize)>,
    /// End-of-pass count
    pub end_renderpass_count: usize,
    /// Global uniform uploads
    pub globals_applied: usize,
    /// Instance uniform uploads
    pub instance_applied: usize,
    /// Local (model matrix) uploads
    pub locals_applied: usize,
    /// Geometry draws in submission order
    pub draw_log: Vec<GeometryInternalId>,
    /// Texture writes `(id, byte len)`
    pub writes: Vec<(TextureInternalId, usize)>,
    /// Reported surface size
    pub extent: (u32, u32),
    /// Force `begin_renderpass` to fail (frame-abort tests)
    pub fail_begin_renderpass: bool,
}

impl MockBackend {
    /// Fresh mock with a 1280x720 surface and 3 swapchain images
    pub fn new() -> Self {
        Self {
            next_id: 1,
            live_textures: HashSet::new(),
            destroyed_textures: Vec::new(),
            live_geometries: HashSet::new(),
            created_shaders: Vec::new(),
            used_shaders: Vec::new(),
            render_target_creates: 0,
            render_target_destroys: 0,
            window_attachment_fetches: 0,
            begin_renderpass_log: Vec::new(),
            end_renderpass_count: 0,
            globals_applied: 0,
            instance_applied: 0,
            locals_applied: 0,
            draw_log: Vec::new(),
            writes: Vec::new(),
            extent: (1280, 720),
            fail_begin_renderpass: false,
        }
    }

    fn mint(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Number of textures created and not yet destroyed
    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    /// Whether `destroy_texture` was ever called with this id
    pub fn was_texture_destroyed(&self, id: TextureInternalId) -> bool {
        self.destroyed_textures.contains(&id.0)
    }

    /// Number of geometries created and not yet destroyed
    pub fn live_geometry_count(&self) -> usize {
        self.live_geometries.len()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for MockBackend {
    fn create_texture(
        &mut self,
        _name: &str,
        _width: u32,
        _height: u32,
        _channel_count: u8,
        _pixels: &[u8],
    ) -> RenderResult<TextureInternalId> {
        let id = self.mint();
        self.live_textures.insert(id);
        Ok(TextureInternalId(id))
    }

    fn create_cube_texture(
        &mut self,
        _name: &str,
        _width: u32,
        _height: u32,
        _channel_count: u8,
        _pixels: &[u8],
    ) -> RenderResult<TextureInternalId> {
        let id = self.mint();
        self.live_textures.insert(id);
        Ok(TextureInternalId(id))
    }

    fn create_writeable_texture(
        &mut self,
        _name: &str,
        _width: u32,
        _height: u32,
        _channel_count: u8,
    ) -> RenderResult<TextureInternalId> {
        let id = self.mint();
        self.live_textures.insert(id);
        Ok(TextureInternalId(id))
    }

    fn write_texture(&mut self, id: TextureInternalId, pixels: &[u8]) -> RenderResult<()> {
        self.writes.push((id, pixels.len()));
        Ok(())
    }

    fn resize_texture(
        &mut self,
        _id: TextureInternalId,
        _width: u32,
        _height: u32,
    ) -> RenderResult<()> {
        Ok(())
    }

    fn destroy_texture(&mut self, id: TextureInternalId) -> RenderResult<()> {
        self.live_textures.remove(&id.0);
        self.destroyed_textures.push(id.0);
        Ok(())
    }

    fn create_geometry(
        &mut self,
        _vertices: &[Vertex3d],
        _indices: &[u32],
    ) -> RenderResult<GeometryInternalId> {
        let id = self.mint();
        self.live_geometries.insert(id);
        Ok(GeometryInternalId(id))
    }

    fn destroy_geometry(&mut self, id: GeometryInternalId) -> RenderResult<()> {
        self.live_geometries.remove(&id.0);
        Ok(())
    }

    fn create_shader(&mut self, _config: &ShaderConfig) -> RenderResult<ShaderInternalId> {
        let id = ShaderInternalId(self.mint());
        self.created_shaders.push(id);
        Ok(id)
    }

    fn destroy_shader(&mut self, _id: ShaderInternalId) -> RenderResult<()> {
        Ok(())
    }

    fn use_shader(&mut self, id: ShaderInternalId) -> RenderResult<()> {
        self.used_shaders.push(id);
        Ok(())
    }

    fn apply_globals(
        &mut self,
        _id: ShaderInternalId,
        _globals: &GlobalUniforms,
    ) -> RenderResult<()> {
        self.globals_applied += 1;
        Ok(())
    }

    fn apply_instance(
        &mut self,
        _id: ShaderInternalId,
        _instance: &InstanceUniforms,
    ) -> RenderResult<()> {
        self.instance_applied += 1;
        Ok(())
    }

    fn apply_local(&mut self, _id: ShaderInternalId, _model: &Mat4) -> RenderResult<()> {
        self.locals_applied += 1;
        Ok(())
    }

    fn draw_geometry(&mut self, id: GeometryInternalId) -> RenderResult<()> {
        self.draw_log.push(id);
        Ok(())
    }

    fn begin_frame(&mut self, _delta_time: f32) -> RenderResult<()> {
        Ok(())
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn begin_renderpass(&mut self, pass: &RenderPass, target_index: usize) -> RenderResult<()> {
        if self.fail_begin_renderpass {
            return Err(RenderError::RenderingFailed(format!(
                "mock failure beginning pass '{}'",
                pass.name
            )));
        }
        self.begin_renderpass_log
            .push((pass.name.clone(), target_index));
        Ok(())
    }

    fn end_renderpass(&mut self, _pass: &RenderPass) -> RenderResult<()> {
        self.end_renderpass_count += 1;
        Ok(())
    }

    fn create_render_target(
        &mut self,
        _attachments: &[TextureInternalId],
        _width: u32,
        _height: u32,
    ) -> RenderResult<RenderTargetId> {
        self.render_target_creates += 1;
        Ok(RenderTargetId(self.mint()))
    }

    fn destroy_render_target(&mut self, _id: RenderTargetId) -> RenderResult<()> {
        self.render_target_destroys += 1;
        Ok(())
    }

    fn window_attachment_count(&self) -> usize {
        3
    }

    fn window_attachment(&mut self, index: usize) -> RenderResult<TextureInternalId> {
        self.window_attachment_fetches += 1;
        Ok(TextureInternalId(1_000_000 + index as u64))
    }

    fn depth_attachment(&mut self) -> RenderResult<TextureInternalId> {
        Ok(TextureInternalId(2_000_000))
    }

    fn window_extent(&self) -> (u32, u32) {
        self.extent
    }

    fn on_resized(&mut self, width: u32, height: u32) {
        self.extent = (width, height);
    }
}

/// Mock backend behind shared ownership, for code that takes the backend
/// by value (`Box<dyn RenderBackend>`) while the test keeps inspecting it
#[derive(Clone)]
pub struct SharedBackend(Rc<RefCell<MockBackend>>);

impl SharedBackend {
    /// Fresh shared mock
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(MockBackend::new())))
    }

    /// Borrow the underlying mock for inspection or configuration
    pub fn inner(&self) -> RefMut<'_, MockBackend> {
        self.0.borrow_mut()
    }
}

impl Default for SharedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for SharedBackend {
    fn create_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        pixels: &[u8],
    ) -> RenderResult<TextureInternalId> {
        self.0
            .borrow_mut()
            .create_texture(name, width, height, channel_count, pixels)
    }

    fn create_cube_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        pixels: &[u8],
    ) -> RenderResult<TextureInternalId> {
        self.0
            .borrow_mut()
            .create_cube_texture(name, width, height, channel_count, pixels)
    }

    fn create_writeable_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
    ) -> RenderResult<TextureInternalId> {
        self.0
            .borrow_mut()
            .create_writeable_texture(name, width, height, channel_count)
    }

    fn write_texture(&mut self, id: TextureInternalId, pixels: &[u8]) -> RenderResult<()> {
        self.0.borrow_mut().write_texture(id, pixels)
    }

    fn resize_texture(
        &mut self,
        id: TextureInternalId,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        self.0.borrow_mut().resize_texture(id, width, height)
    }

    fn destroy_texture(&mut self, id: TextureInternalId) -> RenderResult<()> {
        self.0.borrow_mut().destroy_texture(id)
    }

    fn create_geometry(
        &mut self,
        vertices: &[Vertex3d],
        indices: &[u32],
    ) -> RenderResult<GeometryInternalId> {
        self.0.borrow_mut().create_geometry(vertices, indices)
    }

    fn destroy_geometry(&mut self, id: GeometryInternalId) -> RenderResult<()> {
        self.0.borrow_mut().destroy_geometry(id)
    }

    fn create_shader(&mut self, config: &ShaderConfig) -> RenderResult<ShaderInternalId> {
        self.0.borrow_mut().create_shader(config)
    }

    fn destroy_shader(&mut self, id: ShaderInternalId) -> RenderResult<()> {
        self.0.borrow_mut().destroy_shader(id)
    }

    fn use_shader(&mut self, id: ShaderInternalId) -> RenderResult<()> {
        self.0.borrow_mut().use_shader(id)
    }

    fn apply_globals(
        &mut self,
        id: ShaderInternalId,
        globals: &GlobalUniforms,
    ) -> RenderResult<()> {
        self.0.borrow_mut().apply_globals(id, globals)
    }

    fn apply_instance(
        &mut self,
        id: ShaderInternalId,
        instance: &InstanceUniforms,
    ) -> RenderResult<()> {
        self.0.borrow_mut().apply_instance(id, instance)
    }

    fn apply_local(&mut self, id: ShaderInternalId, model: &Mat4) -> RenderResult<()> {
        self.0.borrow_mut().apply_local(id, model)
    }

    fn draw_geometry(&mut self, id: GeometryInternalId) -> RenderResult<()> {
        self.0.borrow_mut().draw_geometry(id)
    }

    fn begin_frame(&mut self, delta_time: f32) -> RenderResult<()> {
        self.0.borrow_mut().begin_frame(delta_time)
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        self.0.borrow_mut().end_frame()
    }

    fn begin_renderpass(&mut self, pass: &RenderPass, target_index: usize) -> RenderResult<()> {
        self.0.borrow_mut().begin_renderpass(pass, target_index)
    }

    fn end_renderpass(&mut self, pass: &RenderPass) -> RenderResult<()> {
        self.0.borrow_mut().end_renderpass(pass)
    }

    fn create_render_target(
        &mut self,
        attachments: &[TextureInternalId],
        width: u32,
        height: u32,
    ) -> RenderResult<RenderTargetId> {
        self.0
            .borrow_mut()
            .create_render_target(attachments, width, height)
    }

    fn destroy_render_target(&mut self, id: RenderTargetId) -> RenderResult<()> {
        self.0.borrow_mut().destroy_render_target(id)
    }

    fn window_attachment_count(&self) -> usize {
        self.0.borrow().window_attachment_count()
    }

    fn window_attachment(&mut self, index: usize) -> RenderResult<TextureInternalId> {
        self.0.borrow_mut().window_attachment(index)
    }

    fn depth_attachment(&mut self) -> RenderResult<TextureInternalId> {
        self.0.borrow_mut().depth_attachment()
    }

    fn window_extent(&self) -> (u32, u32) {
        self.0.borrow().window_extent()
    }

    fn on_resized(&mut self, width: u32, height: u32) {
        self.0.borrow_mut().on_resized(width, height);
    }
}

/// In-memory loader serving canned images and material configs
pub struct StaticLoader {
    images: HashMap<String, ImageData>,
    materials: HashMap<String, MaterialConfig>,
}

impl StaticLoader {
    /// Loader with no resources; every load fails with `NotFound`
    pub fn empty() -> Self {
        Self {
            images: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    /// Loader serving opaque white images of the given sizes
    pub fn with_images(images: &[(&str, u32, u32)]) -> Self {
        let mut loader = Self::empty();
        for &(name, width, height) in images {
            loader.images.insert(
                name.to_string(),
                ImageData {
                    data: vec![255; (width * height * 4) as usize],
                    width,
                    height,
                    channels: 4,
                },
            );
        }
        loader
    }

    /// Add an image whose alpha channel is not fully opaque
    pub fn add_transparent_image(&mut self, name: &str, width: u32, height: u32) {
        let mut data = vec![255u8; (width * height * 4) as usize];
        data[3] = 128;
        self.images.insert(
            name.to_string(),
            ImageData {
                data,
                width,
                height,
                channels: 4,
            },
        );
    }

    /// Add a material config served by name
    pub fn add_material(&mut self, config: MaterialConfig) {
        self.materials.insert(config.name.clone(), config);
    }
}

impl ResourceLoader for StaticLoader {
    fn load_image(&self, name: &str) -> Result<ImageData, LoaderError> {
        self.images
            .get(name)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(name.to_string()))
    }

    fn load_material(&self, name: &str) -> Result<MaterialConfig, LoaderError> {
        self.materials
            .get(name)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(name.to_string()))
    }
}

/// Initialize logging for a test run; safe to call repeatedly
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `step` until it reports progress or a 5-second deadline passes
///
/// Used to wait for worker-thread completions without assuming timing.
pub fn settle(_pipeline: &LoadPipeline, mut step: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if step() {
            return;
        }
        assert!(Instant::now() < deadline, "load pipeline timed out");
        std::thread::sleep(Duration::from_millis(1));
    }
}
