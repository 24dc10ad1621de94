//! Procedural geometry generators
//!
//! Plane and cube configs are pure functions of their dimensions, segment
//! counts, and UV tiling factors. Outputs are deterministic and covered by
//! golden-value tests.

use crate::foundation::math::Vec3;
use crate::resources::geometry::{GeometryConfig, Vertex3d};

/// Generate a segmented plane in the XY plane, centered on the origin
///
/// Produces `x_segments * y_segments` quads (4 vertices, 6 indices each)
/// with UVs tiled `tile_x`/`tile_y` times across the full plane, +Z
/// normals, and +X tangents. Non-positive dimensions, segment counts, or
/// tiling factors are clamped to usable values with a warning.
pub fn plane_config(
    width: f32,
    height: f32,
    x_segments: u32,
    y_segments: u32,
    tile_x: f32,
    tile_y: f32,
    name: &str,
    material_name: &str,
) -> GeometryConfig {
    let width = clamp_dimension("width", width, 1.0);
    let height = clamp_dimension("height", height, 1.0);
    let x_segments = clamp_segments("x_segments", x_segments);
    let y_segments = clamp_segments("y_segments", y_segments);
    let tile_x = clamp_dimension("tile_x", tile_x, 1.0);
    let tile_y = clamp_dimension("tile_y", tile_y, 1.0);

    let vertex_count = (x_segments * y_segments * 4) as usize;
    let index_count = (x_segments * y_segments * 6) as usize;
    let mut vertices = Vec::with_capacity(vertex_count);
    let mut indices = Vec::with_capacity(index_count);

    let seg_width = width / x_segments as f32;
    let seg_height = height / y_segments as f32;
    let half_width = width * 0.5;
    let half_height = height * 0.5;

    for y in 0..y_segments {
        for x in 0..x_segments {
            let min_x = x as f32 * seg_width - half_width;
            let min_y = y as f32 * seg_height - half_height;
            let max_x = min_x + seg_width;
            let max_y = min_y + seg_height;
            let min_u = (x as f32 / x_segments as f32) * tile_x;
            let min_v = (y as f32 / y_segments as f32) * tile_y;
            let max_u = ((x + 1) as f32 / x_segments as f32) * tile_x;
            let max_v = ((y + 1) as f32 / y_segments as f32) * tile_y;

            let base = vertices.len() as u32;
            let normal = [0.0, 0.0, 1.0];
            let tangent = [1.0, 0.0, 0.0, 1.0];
            let corners = [
                ([min_x, min_y, 0.0], [min_u, min_v]),
                ([max_x, max_y, 0.0], [max_u, max_v]),
                ([min_x, max_y, 0.0], [min_u, max_v]),
                ([max_x, min_y, 0.0], [max_u, min_v]),
            ];
            for (position, texcoord) in corners {
                vertices.push(Vertex3d {
                    position,
                    normal,
                    texcoord,
                    tangent,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 3, base + 1]);
        }
    }

    GeometryConfig {
        name: name.to_string(),
        material_name: material_name.to_string(),
        vertices,
        indices,
        center: Vec3::zeros(),
        min_extents: Vec3::new(-half_width, -half_height, 0.0),
        max_extents: Vec3::new(half_width, half_height, 0.0),
    }
}

/// Generate an axis-aligned cube centered on the origin
///
/// Produces 24 vertices (4 per face) and 36 indices with per-face normals,
/// UVs tiled `tile_x`/`tile_y` times per face, and computed tangents.
pub fn cube_config(
    width: f32,
    height: f32,
    depth: f32,
    tile_x: f32,
    tile_y: f32,
    name: &str,
    material_name: &str,
) -> GeometryConfig {
    let width = clamp_dimension("width", width, 1.0);
    let height = clamp_dimension("height", height, 1.0);
    let depth = clamp_dimension("depth", depth, 1.0);
    let tile_x = clamp_dimension("tile_x", tile_x, 1.0);
    let tile_y = clamp_dimension("tile_y", tile_y, 1.0);

    let half_w = width * 0.5;
    let half_h = height * 0.5;
    let half_d = depth * 0.5;
    let min = Vec3::new(-half_w, -half_h, -half_d);
    let max = Vec3::new(half_w, half_h, half_d);

    // Four corner positions per face, wound to match the shared
    // (0,1,2)(0,3,1) index pattern.
    let faces: [([[f32; 3]; 4], [f32; 3]); 6] = [
        // Front (+z)
        (
            [
                [min.x, min.y, max.z],
                [max.x, max.y, max.z],
                [min.x, max.y, max.z],
                [max.x, min.y, max.z],
            ],
            [0.0, 0.0, 1.0],
        ),
        // Back (-z)
        (
            [
                [max.x, min.y, min.z],
                [min.x, max.y, min.z],
                [max.x, max.y, min.z],
                [min.x, min.y, min.z],
            ],
            [0.0, 0.0, -1.0],
        ),
        // Left (-x)
        (
            [
                [min.x, min.y, min.z],
                [min.x, max.y, max.z],
                [min.x, max.y, min.z],
                [min.x, min.y, max.z],
            ],
            [-1.0, 0.0, 0.0],
        ),
        // Right (+x)
        (
            [
                [max.x, min.y, max.z],
                [max.x, max.y, min.z],
                [max.x, max.y, max.z],
                [max.x, min.y, min.z],
            ],
            [1.0, 0.0, 0.0],
        ),
        // Bottom (-y)
        (
            [
                [max.x, min.y, max.z],
                [min.x, min.y, min.z],
                [max.x, min.y, min.z],
                [min.x, min.y, max.z],
            ],
            [0.0, -1.0, 0.0],
        ),
        // Top (+y)
        (
            [
                [min.x, max.y, max.z],
                [max.x, max.y, min.z],
                [min.x, max.y, min.z],
                [max.x, max.y, max.z],
            ],
            [0.0, 1.0, 0.0],
        ),
    ];

    let uvs = [
        [0.0, 0.0],
        [tile_x, tile_y],
        [0.0, tile_y],
        [tile_x, 0.0],
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face_index, (corners, normal)) in faces.iter().enumerate() {
        for (corner, uv) in corners.iter().zip(uvs) {
            vertices.push(Vertex3d::new(*corner, *normal, uv));
        }
        let base = (face_index * 4) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 3, base + 1]);
    }

    generate_tangents(&mut vertices, &indices);

    GeometryConfig {
        name: name.to_string(),
        material_name: material_name.to_string(),
        vertices,
        indices,
        center: Vec3::zeros(),
        min_extents: min,
        max_extents: max,
    }
}

/// Compute per-vertex tangents for an indexed triangle list
///
/// Tangents are accumulated per triangle from the UV-space edge deltas,
/// orthogonalized against the vertex normal, and stored with handedness in
/// `w`. Triangles with degenerate UVs are skipped.
pub fn generate_tangents(vertices: &mut [Vertex3d], indices: &[u32]) {
    let mut tangents = vec![Vec3::zeros(); vertices.len()];
    let mut bitangents = vec![Vec3::zeros(); vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let (i0, i1, i2) = (
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        );
        let p0 = Vec3::from(vertices[i0].position);
        let p1 = Vec3::from(vertices[i1].position);
        let p2 = Vec3::from(vertices[i2].position);
        let edge1 = p1 - p0;
        let edge2 = p2 - p0;

        let du1 = vertices[i1].texcoord[0] - vertices[i0].texcoord[0];
        let dv1 = vertices[i1].texcoord[1] - vertices[i0].texcoord[1];
        let du2 = vertices[i2].texcoord[0] - vertices[i0].texcoord[0];
        let dv2 = vertices[i2].texcoord[1] - vertices[i0].texcoord[1];

        let denominator = du1 * dv2 - du2 * dv1;
        if denominator.abs() < f32::EPSILON {
            continue;
        }
        let f = 1.0 / denominator;
        let tangent = (edge1 * dv2 - edge2 * dv1) * f;
        let bitangent = (edge2 * du1 - edge1 * du2) * f;

        for &i in &[i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    for (i, vertex) in vertices.iter_mut().enumerate() {
        let normal = Vec3::from(vertex.normal);
        let raw = tangents[i];
        // Gram-Schmidt orthogonalize against the normal.
        let tangent = raw - normal * normal.dot(&raw);
        if tangent.magnitude() < f32::EPSILON {
            vertex.tangent = [1.0, 0.0, 0.0, 1.0];
            continue;
        }
        let tangent = tangent.normalize();
        let handedness = if normal.cross(&tangent).dot(&bitangents[i]) < 0.0 {
            -1.0
        } else {
            1.0
        };
        vertex.tangent = [tangent.x, tangent.y, tangent.z, handedness];
    }
}

fn clamp_dimension(label: &str, value: f32, fallback: f32) -> f32 {
    if value <= 0.0 {
        log::warn!("{label} must be positive; using {fallback}");
        fallback
    } else {
        value
    }
}

fn clamp_segments(label: &str, value: u32) -> u32 {
    if value == 0 {
        log::warn!("{label} must be at least 1; using 1");
        1
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_cube_golden_values() {
        let config = cube_config(1.0, 1.0, 1.0, 1.0, 1.0, "cube", "default");

        assert_eq!(config.vertices.len(), 24);
        assert_eq!(config.indices.len(), 36);
        assert_relative_eq!(config.min_extents.x, -0.5);
        assert_relative_eq!(config.min_extents.y, -0.5);
        assert_relative_eq!(config.min_extents.z, -0.5);
        assert_relative_eq!(config.max_extents.x, 0.5);
        assert_relative_eq!(config.max_extents.y, 0.5);
        assert_relative_eq!(config.max_extents.z, 0.5);

        for vertex in &config.vertices {
            for component in vertex.position {
                assert_relative_eq!(component.abs(), 0.5);
            }
            // Per-face unit axis normal
            let normal = Vec3::from(vertex.normal);
            assert_relative_eq!(normal.magnitude(), 1.0);
        }
        assert!(config.indices.iter().all(|&i| (i as usize) < 24));
    }

    #[test]
    fn test_cube_dimensions_set_extents() {
        let config = cube_config(2.0, 4.0, 6.0, 1.0, 1.0, "box", "default");
        assert_relative_eq!(config.min_extents.x, -1.0);
        assert_relative_eq!(config.min_extents.y, -2.0);
        assert_relative_eq!(config.min_extents.z, -3.0);
        assert_relative_eq!(config.max_extents.x, 1.0);
        assert_relative_eq!(config.max_extents.y, 2.0);
        assert_relative_eq!(config.max_extents.z, 3.0);
    }

    #[test]
    fn test_cube_tangents_are_unit_and_orthogonal_to_normals() {
        let config = cube_config(1.0, 1.0, 1.0, 1.0, 1.0, "cube", "default");
        for vertex in &config.vertices {
            let tangent = Vec3::new(vertex.tangent[0], vertex.tangent[1], vertex.tangent[2]);
            let normal = Vec3::from(vertex.normal);
            assert_relative_eq!(tangent.magnitude(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(tangent.dot(&normal), 0.0, epsilon = 1e-5);
            assert!(vertex.tangent[3] == 1.0 || vertex.tangent[3] == -1.0);
        }
    }

    #[test]
    fn test_plane_segment_and_index_counts() {
        let config = plane_config(2.0, 2.0, 2, 3, 1.0, 1.0, "floor", "default");
        assert_eq!(config.vertices.len(), 2 * 3 * 4);
        assert_eq!(config.indices.len(), 2 * 3 * 6);
        assert_relative_eq!(config.min_extents.x, -1.0);
        assert_relative_eq!(config.max_extents.y, 1.0);
        assert!(config.indices.iter().all(|&i| (i as usize) < config.vertices.len()));
    }

    #[test]
    fn test_plane_uv_tiling_spans_requested_factors() {
        let config = plane_config(1.0, 1.0, 2, 2, 3.0, 5.0, "floor", "default");
        let max_u = config
            .vertices
            .iter()
            .map(|v| v.texcoord[0])
            .fold(f32::MIN, f32::max);
        let max_v = config
            .vertices
            .iter()
            .map(|v| v.texcoord[1])
            .fold(f32::MIN, f32::max);
        assert_relative_eq!(max_u, 3.0);
        assert_relative_eq!(max_v, 5.0);
    }

    #[test]
    fn test_invalid_inputs_are_clamped() {
        let config = plane_config(-1.0, 0.0, 0, 0, -2.0, 1.0, "floor", "default");
        assert_eq!(config.vertices.len(), 4);
        assert_relative_eq!(config.max_extents.x, 0.5);
    }
}
