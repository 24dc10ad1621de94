//! Material system
//!
//! Materials are built from serde configs (TOML or RON on disk). Named
//! sub-textures resolve through the texture system; a map that cannot be
//! acquired falls back to the default texture with a warning. Releasing a
//! material symmetrically releases the sub-texture references it holds.

use crate::assets::loader::ResourceLoader;
use crate::assets::pipeline::LoadPipeline;
use crate::foundation::math::Vec4;
use crate::render::backend::{InstanceUniforms, RenderBackend, ShaderInternalId, TextureInternalId};
use crate::render::RenderResult;
use crate::resources::registry::{Handle, Release, SlotRegistry};
use crate::resources::texture::{TextureFlags, TextureSystem};
use crate::resources::{ResourceError, ResourceResult};
use serde::{Deserialize, Serialize};

/// Reserved name of the registry-bypassing default material
pub const DEFAULT_MATERIAL_NAME: &str = "default";

/// On-disk material description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialConfig {
    /// Material name, also the registry key
    pub name: String,
    /// Shader this material is drawn with
    #[serde(default = "default_shader_name")]
    pub shader_name: String,
    /// Diffuse colour multiplier
    #[serde(default = "default_diffuse_colour")]
    pub diffuse_colour: [f32; 4],
    /// Specular exponent
    #[serde(default = "default_shininess")]
    pub shininess: f32,
    /// Diffuse map texture name
    #[serde(default)]
    pub diffuse_map_name: Option<String>,
    /// Specular map texture name
    #[serde(default)]
    pub specular_map_name: Option<String>,
    /// Normal map texture name
    #[serde(default)]
    pub normal_map_name: Option<String>,
    /// Destroy automatically when the last reference is released
    #[serde(default = "default_true")]
    pub auto_release: bool,
}

fn default_shader_name() -> String {
    "builtin.material".to_string()
}

fn default_diffuse_colour() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_shininess() -> f32 {
    32.0
}

fn default_true() -> bool {
    true
}

/// A material resource payload
#[derive(Debug, Clone)]
pub struct Material {
    /// Stable id: the slot index this material is bound to
    pub id: u32,
    /// Content generation, bumped on reload
    pub generation: u32,
    /// Shader this material is drawn with
    pub shader_name: String,
    /// Diffuse colour multiplier
    pub diffuse_colour: Vec4,
    /// Specular exponent
    pub shininess: f32,
    /// Resolved diffuse map
    pub diffuse_map: Handle,
    /// Resolved specular map
    pub specular_map: Handle,
    /// Resolved normal map
    pub normal_map: Handle,
    /// Frame stamp gating instance uniform uploads to once per frame
    pub render_frame_number: Option<u64>,
    /// Texture names actually acquired, released symmetrically on destroy
    map_names: Vec<String>,
}

/// Name-addressed registry of materials plus the default fallback
pub struct MaterialSystem {
    registry: SlotRegistry<Material>,
    default_material: Material,
}

impl MaterialSystem {
    /// Create the system and its default material
    pub fn new(capacity: usize) -> Self {
        let default_material = Material {
            id: u32::MAX,
            generation: 0,
            shader_name: default_shader_name(),
            diffuse_colour: Vec4::new(1.0, 1.0, 1.0, 1.0),
            shininess: default_shininess(),
            diffuse_map: Handle::DEFAULT,
            specular_map: Handle::DEFAULT,
            normal_map: Handle::DEFAULT,
            render_frame_number: None,
            map_names: Vec::new(),
        };
        log::info!("Material system initialized with {capacity} slots");
        Self {
            registry: SlotRegistry::new("material", capacity),
            default_material,
        }
    }

    /// Acquire a material by name, loading its config when unknown
    pub fn acquire(
        &mut self,
        name: &str,
        loader: &dyn ResourceLoader,
        textures: &mut TextureSystem,
        pipeline: &LoadPipeline,
    ) -> ResourceResult<Handle> {
        if name == DEFAULT_MATERIAL_NAME {
            return Ok(Handle::DEFAULT);
        }
        if self.registry.handle_of(name).is_some() {
            return self.registry.acquire_with(name, true, |_| {
                Err(ResourceError::NotFound {
                    kind: "material",
                    name: name.to_string(),
                })
            });
        }
        let config = loader.load_material(name)?;
        self.acquire_from_config(&config, textures, pipeline)
    }

    /// Acquire a material from an already-loaded config
    pub fn acquire_from_config(
        &mut self,
        config: &MaterialConfig,
        textures: &mut TextureSystem,
        pipeline: &LoadPipeline,
    ) -> ResourceResult<Handle> {
        if config.name == DEFAULT_MATERIAL_NAME {
            return Ok(Handle::DEFAULT);
        }
        self.registry.acquire_with(&config.name, config.auto_release, |h| {
            Ok::<_, ResourceError>(build_material(h.index(), config, textures, pipeline))
        })
    }

    /// Release one reference; at zero with auto-release the material and
    /// its sub-texture references are destroyed
    pub fn release(
        &mut self,
        name: &str,
        textures: &mut TextureSystem,
        backend: &mut dyn RenderBackend,
    ) {
        if name == DEFAULT_MATERIAL_NAME {
            log::trace!("release of the default material ignored");
            return;
        }
        if let Release::ShouldDestroy(_) = self.registry.release(name) {
            if let Some(material) = self.registry.destroy(name) {
                for map_name in &material.map_names {
                    textures.release(map_name, backend);
                }
            }
        }
    }

    /// Upload instance uniforms for a material, at most once per frame
    ///
    /// Maps whose textures are still pending resolve to the default
    /// texture so a draw never binds an invalid image.
    pub fn apply_instance(
        &mut self,
        handle: Handle,
        frame_number: u64,
        shader: ShaderInternalId,
        textures: &TextureSystem,
        backend: &mut dyn RenderBackend,
    ) -> RenderResult<()> {
        let material = if handle.is_default() {
            &mut self.default_material
        } else {
            match self.registry.get_mut(handle) {
                Some(m) => m,
                None => {
                    log::warn!("apply_instance on a stale material handle");
                    return Ok(());
                }
            }
        };
        if material.render_frame_number == Some(frame_number) {
            return Ok(());
        }

        let uniforms = InstanceUniforms {
            diffuse_colour: material.diffuse_colour,
            shininess: material.shininess,
            diffuse_map: resolve_map(textures, material.diffuse_map),
            specular_map: resolve_map(textures, material.specular_map),
            normal_map: resolve_map(textures, material.normal_map),
        };
        backend.apply_instance(shader, &uniforms)?;
        material.render_frame_number = Some(frame_number);
        Ok(())
    }

    /// Whether a material should be drawn in the transparent partition
    pub fn is_transparent(&self, handle: Handle, textures: &TextureSystem) -> bool {
        let Some(material) = self.get(handle) else {
            return false;
        };
        textures
            .get(material.diffuse_map)
            .is_some_and(|t| t.flags.contains(TextureFlags::HAS_TRANSPARENCY))
    }

    /// Resolve a handle; the default sentinel resolves to the default material
    pub fn get(&self, handle: Handle) -> Option<&Material> {
        if handle.is_default() {
            return Some(&self.default_material);
        }
        self.registry.get(handle)
    }

    /// Handle bound to `name`, if any
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        if name == DEFAULT_MATERIAL_NAME {
            return Some(Handle::DEFAULT);
        }
        self.registry.handle_of(name)
    }

    /// The always-valid default material
    pub fn default_material(&self) -> &Material {
        &self.default_material
    }

    /// Current reference count for `name`
    pub fn ref_count(&self, name: &str) -> usize {
        self.registry.ref_count(name)
    }

    /// Number of live registry slots
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Destroy every material, releasing their sub-texture references
    pub fn shutdown(&mut self, textures: &mut TextureSystem, backend: &mut dyn RenderBackend) {
        for (name, material) in self.registry.drain_all() {
            log::trace!("destroying material '{name}' at shutdown");
            for map_name in &material.map_names {
                textures.release(map_name, backend);
            }
        }
        log::info!("Material system shut down");
    }
}

fn build_material(
    id: u32,
    config: &MaterialConfig,
    textures: &mut TextureSystem,
    pipeline: &LoadPipeline,
) -> Material {
    let mut map_names = Vec::new();
    let mut resolve = |map_name: &Option<String>| -> Handle {
        let Some(texture_name) = map_name else {
            return Handle::DEFAULT;
        };
        match textures.acquire(texture_name, true, pipeline) {
            Ok(handle) => {
                if !handle.is_default() {
                    map_names.push(texture_name.clone());
                }
                handle
            }
            Err(e) => {
                log::warn!(
                    "unable to acquire texture '{}' for material '{}', using default: {}",
                    texture_name,
                    config.name,
                    e
                );
                Handle::DEFAULT
            }
        }
    };

    let diffuse_map = resolve(&config.diffuse_map_name);
    let specular_map = resolve(&config.specular_map_name);
    let normal_map = resolve(&config.normal_map_name);

    Material {
        id,
        generation: 0,
        shader_name: config.shader_name.clone(),
        diffuse_colour: Vec4::from(config.diffuse_colour),
        shininess: config.shininess,
        diffuse_map,
        specular_map,
        normal_map,
        render_frame_number: None,
        map_names,
    }
}

/// Backend texture to bind for a map: the texture itself when its contents
/// are generation-valid, the default texture otherwise
fn resolve_map(textures: &TextureSystem, handle: Handle) -> Option<TextureInternalId> {
    textures
        .get(handle)
        .filter(|t| t.generation.is_some())
        .and_then(|t| t.internal)
        .or(textures.default_texture().internal)
}
