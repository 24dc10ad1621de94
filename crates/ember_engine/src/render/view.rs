//! Render views
//!
//! A view is a per-output configuration: its passes, projection, and the
//! kind-specific behaviour selecting how packets are built and rendered.
//! The kind set is fixed and exhaustive, so views are a tagged union
//! matched everywhere rather than an open class hierarchy; each variant
//! carries only the fields it needs.

use crate::assets::pipeline::LoadPipeline;
use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::backend::{GlobalUniforms, RenderBackend, TextureInternalId};
use crate::render::packet::{self, RenderPacket, SceneRenderData};
use crate::render::pass::{AttachmentKind, RenderPass, RenderPassConfig};
use crate::render::{RenderError, RenderResult};
use crate::resources::camera::CameraSystem;
use crate::resources::geometry::GeometrySystem;
use crate::resources::material::MaterialSystem;
use crate::resources::registry::Handle;
use crate::resources::shader::ShaderSystem;
use crate::resources::texture::TextureSystem;
use serde::{Deserialize, Serialize};

const UI_NEAR_CLIP: f32 = -100.0;
const UI_FAR_CLIP: f32 = 100.0;

/// View kind discriminator used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKindConfig {
    /// 3D world rendering with transparency sorting
    World,
    /// Orthographic UI overlay
    Ui,
    /// Skybox drawn with a cube map
    Skybox,
    /// Off-screen picking buffer
    Pick,
}

/// Configuration for a render view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderViewConfig {
    /// View name, unique across the view system
    pub name: String,
    /// Kind discriminator
    pub kind: ViewKindConfig,
    /// Shader the view binds by default
    pub shader_name: String,
    /// Shader name overriding `shader_name` every frame, if set
    #[serde(default)]
    pub custom_shader_name: Option<String>,
    /// Vertical field of view in radians (perspective kinds)
    #[serde(default = "default_fov")]
    pub fov_radians: f32,
    /// Near clip distance (perspective kinds)
    #[serde(default = "default_near_clip")]
    pub near_clip: f32,
    /// Far clip distance (perspective kinds)
    #[serde(default = "default_far_clip")]
    pub far_clip: f32,
    /// Ambient colour handed to world shaders
    #[serde(default = "default_ambient_colour")]
    pub ambient_colour: [f32; 4],
    /// Cube map base name (skybox kind)
    #[serde(default)]
    pub cube_map_name: Option<String>,
    /// Pass configurations; at least one is required
    #[serde(default)]
    pub passes: Vec<RenderPassConfig>,
}

fn default_fov() -> f32 {
    std::f32::consts::FRAC_PI_4
}

fn default_near_clip() -> f32 {
    0.1
}

fn default_far_clip() -> f32 {
    1000.0
}

fn default_ambient_colour() -> [f32; 4] {
    [0.25, 0.25, 0.25, 1.0]
}

/// Kind-specific view state
#[derive(Debug)]
pub enum ViewKind {
    /// 3D world rendering with transparency sorting
    World {
        /// Perspective projection, rebuilt on resize
        projection: Mat4,
        /// Ambient colour handed to shaders
        ambient_colour: Vec4,
    },
    /// Orthographic UI overlay
    Ui {
        /// Orthographic projection, rebuilt on resize
        projection: Mat4,
    },
    /// Skybox drawn with a cube map around the camera
    Skybox {
        /// Perspective projection, rebuilt on resize
        projection: Mat4,
        /// Cube map texture
        cube_map: Handle,
    },
    /// Off-screen picking buffer with view-owned attachments
    Pick {
        /// Perspective projection, rebuilt on resize
        projection: Mat4,
        /// View-owned colour attachment (writeable texture)
        colour_attachment: Handle,
        /// View-owned depth attachment (writeable texture)
        depth_attachment: Handle,
    },
}

/// A live render view
#[derive(Debug)]
pub struct RenderView {
    /// View id assigned at creation
    pub id: u16,
    /// View name
    pub name: String,
    /// Current width in pixels
    pub width: u32,
    /// Current height in pixels
    pub height: u32,
    /// Kind-specific state
    pub kind: ViewKind,
    /// Passes owned by this view
    pub passes: Vec<RenderPass>,
    /// Shader name overriding the default every frame, if set
    pub custom_shader_name: Option<String>,
    /// Default shader
    shader: Handle,
    /// Shader name, released at teardown
    shader_name: String,
    /// Projection parameters for resize rebuilds
    fov_radians: f32,
    near_clip: f32,
    far_clip: f32,
    /// Textures this view acquired and must release at teardown
    owned_texture_names: Vec<String>,
}

impl RenderView {
    /// Build a view from config, acquiring its shader and owned textures
    pub fn create(
        id: u16,
        config: &RenderViewConfig,
        width: u32,
        height: u32,
        window_target_count: usize,
        shaders: &mut ShaderSystem,
        textures: &mut TextureSystem,
        pipeline: &LoadPipeline,
        backend: &mut dyn RenderBackend,
    ) -> RenderResult<Self> {
        let aspect = width as f32 / height.max(1) as f32;
        let perspective =
            Mat4::new_perspective(aspect, config.fov_radians, config.near_clip, config.far_clip);

        let mut owned_texture_names = Vec::new();
        let kind = match config.kind {
            ViewKindConfig::World => ViewKind::World {
                projection: perspective,
                ambient_colour: Vec4::from(config.ambient_colour),
            },
            ViewKindConfig::Ui => ViewKind::Ui {
                projection: ui_projection(width, height),
            },
            ViewKindConfig::Skybox => {
                let cube_name = config.cube_map_name.as_deref().unwrap_or("skybox");
                let cube_map = textures.acquire_cube(cube_name, true, pipeline).map_err(|e| {
                    RenderError::ResourceCreationFailed(format!(
                        "view '{}' cube map '{cube_name}': {e}",
                        config.name
                    ))
                })?;
                owned_texture_names.push(cube_name.to_string());
                ViewKind::Skybox {
                    projection: perspective,
                    cube_map,
                }
            }
            ViewKindConfig::Pick => {
                let colour_name = format!("{}.pick_colour", config.name);
                let depth_name = format!("{}.pick_depth", config.name);
                let colour_attachment = textures
                    .acquire_writeable(&colour_name, width, height, 4, false, backend)
                    .map_err(|e| RenderError::ResourceCreationFailed(e.to_string()))?;
                let depth_attachment = match textures
                    .acquire_writeable(&depth_name, width, height, 4, false, backend)
                {
                    Ok(handle) => handle,
                    Err(e) => {
                        // Unwind the partially-acquired attachment set.
                        textures.release(&colour_name, backend);
                        return Err(RenderError::ResourceCreationFailed(e.to_string()));
                    }
                };
                owned_texture_names.push(colour_name);
                owned_texture_names.push(depth_name);
                ViewKind::Pick {
                    projection: perspective,
                    colour_attachment,
                    depth_attachment,
                }
            }
        };

        let shader = match shaders.acquire(&config.shader_name) {
            Ok(handle) => handle,
            Err(e) => {
                for name in &owned_texture_names {
                    textures.release(name, backend);
                }
                return Err(RenderError::ResourceCreationFailed(format!(
                    "view '{}' requires shader '{}': {e}",
                    config.name, config.shader_name
                )));
            }
        };

        let passes = config
            .passes
            .iter()
            .enumerate()
            .map(|(i, pass_config)| {
                let window_synced = pass_config
                    .target
                    .attachments
                    .iter()
                    .any(|a| a.source == crate::render::pass::AttachmentSource::Window);
                let target_count = if window_synced { window_target_count } else { 1 };
                RenderPass::from_config(i as u16, pass_config, target_count)
            })
            .collect();

        log::info!("Created render view '{}' ({:?})", config.name, config.kind);
        Ok(Self {
            id,
            name: config.name.clone(),
            width,
            height,
            kind,
            passes,
            custom_shader_name: config.custom_shader_name.clone(),
            shader,
            shader_name: config.shader_name.clone(),
            fov_radians: config.fov_radians,
            near_clip: config.near_clip,
            far_clip: config.far_clip,
            owned_texture_names,
        })
    }

    /// Update dimensions and rebuild the projection for the new aspect
    pub fn on_resized(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        let aspect = width as f32 / height.max(1) as f32;
        let perspective =
            Mat4::new_perspective(aspect, self.fov_radians, self.near_clip, self.far_clip);
        match &mut self.kind {
            ViewKind::World { projection, .. }
            | ViewKind::Skybox { projection, .. }
            | ViewKind::Pick { projection, .. } => *projection = perspective,
            ViewKind::Ui { projection } => *projection = ui_projection(width, height),
        }
    }

    /// Build this frame's packet from scene data
    pub fn build_packet(
        &self,
        scene: &SceneRenderData,
        cameras: &mut CameraSystem,
        geometries: &GeometrySystem,
        materials: &MaterialSystem,
        textures: &TextureSystem,
    ) -> RenderPacket {
        let camera_handle = scene.camera.unwrap_or(Handle::DEFAULT);
        match &self.kind {
            ViewKind::World {
                projection,
                ambient_colour,
            } => {
                let (view_matrix, view_position) = camera_state(cameras, camera_handle);
                let ordered = packet::partition_and_sort(
                    &scene.geometries,
                    view_position,
                    geometries,
                    materials,
                    textures,
                );
                RenderPacket {
                    view_matrix,
                    projection_matrix: *projection,
                    view_position,
                    ambient_colour: *ambient_colour,
                    geometries: ordered,
                    custom_shader_name: self.custom_shader_name.clone(),
                }
            }
            ViewKind::Ui { projection } => RenderPacket {
                view_matrix: Mat4::identity(),
                projection_matrix: *projection,
                view_position: Vec3::zeros(),
                ambient_colour: Vec4::new(1.0, 1.0, 1.0, 1.0),
                geometries: scene.ui_geometries.clone(),
                custom_shader_name: self.custom_shader_name.clone(),
            },
            ViewKind::Skybox { projection, .. } => {
                let (mut view_matrix, view_position) = camera_state(cameras, camera_handle);
                // The skybox stays centered on the camera: drop translation.
                view_matrix.m14 = 0.0;
                view_matrix.m24 = 0.0;
                view_matrix.m34 = 0.0;
                RenderPacket {
                    view_matrix,
                    projection_matrix: *projection,
                    view_position,
                    ambient_colour: Vec4::new(1.0, 1.0, 1.0, 1.0),
                    geometries: vec![crate::render::packet::GeometryRenderData {
                        geometry: Handle::DEFAULT,
                        model: Mat4::identity(),
                    }],
                    custom_shader_name: self.custom_shader_name.clone(),
                }
            }
            ViewKind::Pick { projection, .. } => {
                let (view_matrix, view_position) = camera_state(cameras, camera_handle);
                RenderPacket {
                    view_matrix,
                    projection_matrix: *projection,
                    view_position,
                    ambient_colour: Vec4::new(0.0, 0.0, 0.0, 1.0),
                    geometries: scene.geometries.clone(),
                    custom_shader_name: self.custom_shader_name.clone(),
                }
            }
        }
    }

    /// Render a packet through every pass this view owns
    ///
    /// Any backend failure aborts this frame's render; the error propagates
    /// and the frame loop moves on to the next frame.
    pub fn render(
        &self,
        packet: &RenderPacket,
        frame_number: u64,
        target_index: usize,
        shaders: &mut ShaderSystem,
        materials: &mut MaterialSystem,
        geometries: &GeometrySystem,
        textures: &TextureSystem,
        backend: &mut dyn RenderBackend,
    ) -> RenderResult<()> {
        let shader_handle = packet
            .custom_shader_name
            .as_deref()
            .and_then(|name| {
                let handle = shaders.handle_of(name);
                if handle.is_none() {
                    log::warn!("custom shader '{name}' not found; using view default");
                }
                handle
            })
            .unwrap_or(self.shader);

        for pass in &self.passes {
            backend.begin_renderpass(pass, target_index)?;
            shaders.use_shader(shader_handle, backend)?;
            let Some(shader_internal) = shaders.get(shader_handle).and_then(|s| s.internal) else {
                return Err(RenderError::RenderingFailed(format!(
                    "view '{}' has no usable shader",
                    self.name
                )));
            };

            shaders.apply_globals(
                shader_handle,
                frame_number,
                &GlobalUniforms {
                    projection: packet.projection_matrix,
                    view: packet.view_matrix,
                    view_position: packet.view_position,
                    ambient_colour: packet.ambient_colour,
                },
                backend,
            )?;

            for data in &packet.geometries {
                let Some(geometry) = geometries.get(data.geometry) else {
                    log::trace!("skipping stale geometry handle during render");
                    continue;
                };
                let Some(geometry_internal) = geometry.internal else {
                    continue; // upload still pending
                };

                let material_handle = if materials.get(geometry.material).is_some() {
                    geometry.material
                } else {
                    log::warn!(
                        "geometry {} has no material; using default",
                        geometry.id
                    );
                    Handle::DEFAULT
                };
                materials.apply_instance(
                    material_handle,
                    frame_number,
                    shader_internal,
                    textures,
                    backend,
                )?;

                backend.apply_local(shader_internal, &data.model)?;
                backend.draw_geometry(geometry_internal)?;
            }

            backend.end_renderpass(pass)?;
        }
        Ok(())
    }

    /// Shader handle the view binds when no custom override applies
    pub fn shader(&self) -> Handle {
        self.shader
    }

    /// Release the shader and owned textures this view acquired
    pub fn destroy(
        &mut self,
        shaders: &mut ShaderSystem,
        textures: &mut TextureSystem,
        backend: &mut dyn RenderBackend,
    ) {
        for pass in &mut self.passes {
            for target in &mut pass.targets {
                if let Some(internal) = target.internal.take() {
                    if let Err(e) = backend.destroy_render_target(internal) {
                        log::error!("failed to destroy render target: {e}");
                    }
                }
            }
        }
        for name in self.owned_texture_names.drain(..) {
            textures.release(&name, backend);
        }
        shaders.release(&self.shader_name, backend);
    }
}

/// Recreate a view-owned attachment at the new size and return its backend id
///
/// Only Pick views own attachments; any other kind reaching this hook is a
/// configuration mistake.
pub fn regenerate_view_attachment(
    kind: &mut ViewKind,
    attachment_kind: AttachmentKind,
    width: u32,
    height: u32,
    textures: &mut TextureSystem,
    backend: &mut dyn RenderBackend,
) -> RenderResult<Option<TextureInternalId>> {
    match kind {
        ViewKind::Pick {
            colour_attachment,
            depth_attachment,
            ..
        } => {
            let handle = match attachment_kind {
                AttachmentKind::Colour => *colour_attachment,
                AttachmentKind::Depth => *depth_attachment,
            };
            textures
                .resize(handle, width, height, backend)
                .map_err(|e| RenderError::ResourceCreationFailed(e.to_string()))?;
            Ok(textures.get(handle).and_then(|t| t.internal))
        }
        _ => {
            log::warn!("view kind without owned attachments asked to regenerate one");
            Ok(None)
        }
    }
}

fn ui_projection(width: u32, height: u32) -> Mat4 {
    Mat4::new_orthographic(
        0.0,
        width.max(1) as f32,
        height.max(1) as f32,
        0.0,
        UI_NEAR_CLIP,
        UI_FAR_CLIP,
    )
}

fn camera_state(cameras: &mut CameraSystem, handle: Handle) -> (Mat4, Vec3) {
    match cameras.get_mut(handle) {
        Some(camera) => (camera.view_matrix(), camera.position()),
        None => {
            log::warn!("stale camera handle in scene data; using default camera");
            let camera = cameras.default_camera_mut();
            (camera.view_matrix(), camera.position())
        }
    }
}
