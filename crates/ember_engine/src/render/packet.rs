//! Per-frame render packets
//!
//! A packet is one frame's worth of render input for a single view:
//! matrices, view position, ambient colour, and the geometry list in final
//! submission order. Packets are built fresh every frame and never
//! persisted.

use crate::foundation::math::{self, Mat4, Vec3, Vec4};
use crate::resources::geometry::GeometrySystem;
use crate::resources::material::MaterialSystem;
use crate::resources::registry::Handle;
use crate::resources::texture::TextureSystem;

/// One geometry to draw: its handle plus the world transform
#[derive(Debug, Clone)]
pub struct GeometryRenderData {
    /// Geometry handle
    pub geometry: Handle,
    /// World (model) transform
    pub model: Mat4,
}

/// Scene input handed to packet construction each frame
#[derive(Debug, Clone, Default)]
pub struct SceneRenderData {
    /// Camera driving world-type views; the default camera when unset
    pub camera: Option<Handle>,
    /// World geometries, unsorted
    pub geometries: Vec<GeometryRenderData>,
    /// UI geometries, drawn in input order
    pub ui_geometries: Vec<GeometryRenderData>,
}

/// One frame's render input for a view
#[derive(Debug, Clone)]
pub struct RenderPacket {
    /// View matrix
    pub view_matrix: Mat4,
    /// Projection matrix
    pub projection_matrix: Mat4,
    /// World-space camera position
    pub view_position: Vec3,
    /// Scene ambient colour
    pub ambient_colour: Vec4,
    /// Geometries in final submission order
    pub geometries: Vec<GeometryRenderData>,
    /// Shader name overriding the view's own, if any
    pub custom_shader_name: Option<String>,
}

/// Partition geometries into opaque and transparent, sort the transparent
/// set back-to-front, and return the combined submission order
///
/// Opaque entries keep their input order. Transparent entries (diffuse map
/// carries the transparency flag) are annotated with the distance between
/// the camera and the geometry's model-transformed center, then
/// stable-sorted descending so the farthest draws first — standard
/// back-to-front alpha compositing order.
pub fn partition_and_sort(
    input: &[GeometryRenderData],
    camera_position: Vec3,
    geometries: &GeometrySystem,
    materials: &MaterialSystem,
    textures: &TextureSystem,
) -> Vec<GeometryRenderData> {
    let mut opaque = Vec::with_capacity(input.len());
    let mut transparent: Vec<(f32, GeometryRenderData)> = Vec::new();

    for data in input {
        let Some(geometry) = geometries.get(data.geometry) else {
            log::trace!("skipping stale geometry handle in packet build");
            continue;
        };
        if materials.is_transparent(geometry.material, textures) {
            let world_center = math::transform_point(&data.model, geometry.center);
            let distance = math::distance(camera_position, world_center).abs();
            transparent.push((distance, data.clone()));
        } else {
            opaque.push(data.clone());
        }
    }

    // Stable sort keeps equal-distance entries in input order.
    transparent.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    opaque.extend(transparent.into_iter().map(|(_, data)| data));
    opaque
}
