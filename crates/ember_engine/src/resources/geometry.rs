//! Geometry system
//!
//! Bridges vertex/index data to the backend. Geometry configs come from
//! procedural generators (see [`primitives`](crate::resources::primitives))
//! or from external mesh importers; the system itself owns no file-format
//! knowledge.

use crate::assets::loader::ResourceLoader;
use crate::assets::pipeline::LoadPipeline;
use crate::foundation::math::Vec3;
use crate::render::backend::{GeometryInternalId, RenderBackend};
use crate::resources::material::MaterialSystem;
use crate::resources::registry::{Handle, Release, SlotRegistry};
use crate::resources::texture::TextureSystem;
use crate::resources::{ResourceError, ResourceResult};
use bytemuck::{Pod, Zeroable};

/// Reserved name of the registry-bypassing default geometry
pub const DEFAULT_GEOMETRY_NAME: &str = "default";

/// Standard 3D vertex layout for GPU upload
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex3d {
    /// Position in model space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
    /// Texture coordinates
    pub texcoord: [f32; 2],
    /// Tangent (xyz) and handedness (w)
    pub tangent: [f32; 4],
}

impl Vertex3d {
    /// Create a vertex with a zero tangent (filled in by tangent generation)
    pub fn new(position: [f32; 3], normal: [f32; 3], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            texcoord,
            tangent: [0.0; 4],
        }
    }
}

/// CPU-side description of a geometry awaiting upload
#[derive(Debug, Clone)]
pub struct GeometryConfig {
    /// Geometry name, also the registry key
    pub name: String,
    /// Material resolved at acquire time
    pub material_name: String,
    /// Vertex data
    pub vertices: Vec<Vertex3d>,
    /// Index data (triangle list)
    pub indices: Vec<u32>,
    /// Model-space center
    pub center: Vec3,
    /// Model-space minimum extents
    pub min_extents: Vec3,
    /// Model-space maximum extents
    pub max_extents: Vec3,
}

/// A geometry resource payload
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Stable id: the slot index this geometry is bound to
    pub id: u32,
    /// Content generation, bumped on reload
    pub generation: u32,
    /// Model-space center, used for transparency distance sorting
    pub center: Vec3,
    /// Model-space minimum extents
    pub min_extents: Vec3,
    /// Model-space maximum extents
    pub max_extents: Vec3,
    /// Resolved material
    pub material: Handle,
    /// Backend buffers; `None` only for a geometry that failed upload
    pub internal: Option<GeometryInternalId>,
    /// Material name for symmetric release
    material_name: Option<String>,
}

/// Name-addressed registry of geometries plus the default unit cube
pub struct GeometrySystem {
    registry: SlotRegistry<Geometry>,
    default_geometry: Geometry,
}

impl GeometrySystem {
    /// Create the system and upload its default unit cube
    pub fn new(capacity: usize, backend: &mut dyn RenderBackend) -> ResourceResult<Self> {
        let config = crate::resources::primitives::cube_config(
            1.0,
            1.0,
            1.0,
            1.0,
            1.0,
            DEFAULT_GEOMETRY_NAME,
            crate::resources::material::DEFAULT_MATERIAL_NAME,
        );
        let internal = backend.create_geometry(&config.vertices, &config.indices)?;
        let default_geometry = Geometry {
            id: u32::MAX,
            generation: 0,
            center: config.center,
            min_extents: config.min_extents,
            max_extents: config.max_extents,
            material: Handle::DEFAULT,
            internal: Some(internal),
            material_name: None,
        };
        log::info!("Geometry system initialized with {capacity} slots");
        Ok(Self {
            registry: SlotRegistry::new("geometry", capacity),
            default_geometry,
        })
    }

    /// Acquire a geometry from config, uploading it through the backend
    ///
    /// The named material is resolved through the material system; a
    /// material that cannot be acquired falls back to the default material
    /// with a warning.
    pub fn acquire_from_config(
        &mut self,
        config: &GeometryConfig,
        auto_release: bool,
        materials: &mut MaterialSystem,
        textures: &mut TextureSystem,
        loader: &dyn ResourceLoader,
        pipeline: &LoadPipeline,
        backend: &mut dyn RenderBackend,
    ) -> ResourceResult<Handle> {
        if config.name == DEFAULT_GEOMETRY_NAME {
            return Ok(Handle::DEFAULT);
        }
        self.registry.acquire_with(&config.name, auto_release, |h| {
            let internal = backend.create_geometry(&config.vertices, &config.indices)?;

            let (material, material_name) =
                match materials.acquire(&config.material_name, loader, textures, pipeline) {
                    Ok(handle) if !handle.is_default() => {
                        (handle, Some(config.material_name.clone()))
                    }
                    Ok(handle) => (handle, None),
                    Err(e) => {
                        log::warn!(
                            "unable to acquire material '{}' for geometry '{}', using default: {}",
                            config.material_name,
                            config.name,
                            e
                        );
                        (Handle::DEFAULT, None)
                    }
                };

            Ok::<_, ResourceError>(Geometry {
                id: h.index(),
                generation: 0,
                center: config.center,
                min_extents: config.min_extents,
                max_extents: config.max_extents,
                material,
                internal: Some(internal),
                material_name,
            })
        })
    }

    /// Acquire another reference to an already-loaded geometry
    pub fn acquire(&mut self, name: &str) -> ResourceResult<Handle> {
        if name == DEFAULT_GEOMETRY_NAME {
            return Ok(Handle::DEFAULT);
        }
        if self.registry.handle_of(name).is_none() {
            return Err(ResourceError::NotFound {
                kind: "geometry",
                name: name.to_string(),
            });
        }
        self.registry.acquire_with(name, true, |_| {
            Err(ResourceError::NotFound {
                kind: "geometry",
                name: name.to_string(),
            })
        })
    }

    /// Release one reference; at zero with auto-release the buffers are
    /// returned and the material reference released
    pub fn release(
        &mut self,
        name: &str,
        materials: &mut MaterialSystem,
        textures: &mut TextureSystem,
        backend: &mut dyn RenderBackend,
    ) {
        if name == DEFAULT_GEOMETRY_NAME {
            log::trace!("release of the default geometry ignored");
            return;
        }
        if let Release::ShouldDestroy(_) = self.registry.release(name) {
            if let Some(geometry) = self.registry.destroy(name) {
                destroy_backend_geometry(&geometry, backend);
                if let Some(material_name) = &geometry.material_name {
                    materials.release(material_name, textures, backend);
                }
            }
        }
    }

    /// Resolve a handle; the default sentinel resolves to the unit cube
    pub fn get(&self, handle: Handle) -> Option<&Geometry> {
        if handle.is_default() {
            return Some(&self.default_geometry);
        }
        self.registry.get(handle)
    }

    /// Handle bound to `name`, if any
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        if name == DEFAULT_GEOMETRY_NAME {
            return Some(Handle::DEFAULT);
        }
        self.registry.handle_of(name)
    }

    /// The always-valid default geometry (unit cube, default material)
    pub fn default_geometry(&self) -> &Geometry {
        &self.default_geometry
    }

    /// Current reference count for `name`
    pub fn ref_count(&self, name: &str) -> usize {
        self.registry.ref_count(name)
    }

    /// Number of live registry slots
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Destroy every geometry, releasing materials and backend buffers
    pub fn shutdown(
        &mut self,
        materials: &mut MaterialSystem,
        textures: &mut TextureSystem,
        backend: &mut dyn RenderBackend,
    ) {
        for (name, geometry) in self.registry.drain_all() {
            log::trace!("destroying geometry '{name}' at shutdown");
            destroy_backend_geometry(&geometry, backend);
            if let Some(material_name) = &geometry.material_name {
                materials.release(material_name, textures, backend);
            }
        }
        if let Some(internal) = self.default_geometry.internal.take() {
            if let Err(e) = backend.destroy_geometry(internal) {
                log::error!("failed to destroy default geometry: {e}");
            }
        }
        log::info!("Geometry system shut down");
    }
}

fn destroy_backend_geometry(geometry: &Geometry, backend: &mut dyn RenderBackend) {
    if let Some(internal) = geometry.internal {
        if let Err(e) = backend.destroy_geometry(internal) {
            log::error!("failed to destroy geometry {}: {e}", geometry.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::primitives::cube_config;
    use crate::testing::{MockBackend, StaticLoader};
    use std::sync::Arc;

    fn fixture() -> (
        GeometrySystem,
        MaterialSystem,
        TextureSystem,
        MockBackend,
        LoadPipeline,
        Arc<StaticLoader>,
    ) {
        let mut backend = MockBackend::new();
        let textures = TextureSystem::new(8, &mut backend).unwrap();
        let materials = MaterialSystem::new(8);
        let geometries = GeometrySystem::new(8, &mut backend).unwrap();
        let loader = Arc::new(StaticLoader::empty());
        let pipeline = LoadPipeline::new(
            1,
            Arc::clone(&loader) as Arc<dyn crate::assets::loader::ResourceLoader>,
        );
        (geometries, materials, textures, backend, pipeline, loader)
    }

    #[test]
    fn test_acquire_uploads_and_falls_back_to_default_material() {
        let (mut geometries, mut materials, mut textures, mut backend, pipeline, loader) =
            fixture();
        let config = cube_config(1.0, 1.0, 1.0, 1.0, 1.0, "crate_box", "missing_material");
        let handle = geometries
            .acquire_from_config(
                &config,
                true,
                &mut materials,
                &mut textures,
                loader.as_ref(),
                &pipeline,
                &mut backend,
            )
            .unwrap();

        let geometry = geometries.get(handle).unwrap();
        assert!(geometry.internal.is_some());
        assert_eq!(
            geometry.material,
            Handle::DEFAULT,
            "unknown material falls back to default"
        );
    }

    #[test]
    fn test_release_returns_buffers() {
        let (mut geometries, mut materials, mut textures, mut backend, pipeline, loader) =
            fixture();
        let config = cube_config(1.0, 1.0, 1.0, 1.0, 1.0, "crate_box", "default");
        geometries
            .acquire_from_config(
                &config,
                true,
                &mut materials,
                &mut textures,
                loader.as_ref(),
                &pipeline,
                &mut backend,
            )
            .unwrap();
        let live_before = backend.live_geometry_count();

        geometries.release("crate_box", &mut materials, &mut textures, &mut backend);
        assert_eq!(geometries.live_count(), 0);
        assert_eq!(backend.live_geometry_count(), live_before - 1);
    }

    #[test]
    fn test_acquire_unknown_name_is_not_found() {
        let (mut geometries, ..) = fixture();
        assert!(matches!(
            geometries.acquire("nope"),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_default_geometry_bypasses_registry() {
        let (mut geometries, ..) = fixture();
        let handle = geometries.acquire(DEFAULT_GEOMETRY_NAME).unwrap();
        assert!(handle.is_default());
        assert_eq!(geometries.live_count(), 0);
        let via_acquire = geometries.get(handle).unwrap() as *const Geometry;
        assert_eq!(via_acquire, geometries.default_geometry() as *const Geometry);
    }
}
