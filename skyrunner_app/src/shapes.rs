//! Procedural meshes used when no model file is available

use std::f32::consts::{PI, TAU};

use skyrunner_core::assets::GeometrySource;
use skyrunner_core::foundation::math::Vec3;

/// Axis-aligned cube of half-size 1, positions only
pub fn cube() -> GeometrySource {
    let positions = vec![
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 2, 3, 0, // -z
        5, 4, 7, 7, 6, 5, // +z
        4, 0, 3, 3, 7, 4, // -x
        1, 5, 6, 6, 2, 1, // +x
        3, 2, 6, 6, 7, 3, // +y
        4, 5, 1, 1, 0, 4, // -y
    ];
    GeometrySource {
        positions,
        indices,
        ..GeometrySource::default()
    }
}

/// Unit sphere with smooth normals and equirectangular UVs
pub fn uv_sphere(rings: u32, segments: u32) -> GeometrySource {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let mut source = GeometrySource::default();

    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let phi = u * TAU;
            let normal = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
            source.positions.push(normal);
            source.normals.push(normal);
            source.uvs.push([u, v]);
        }
    }

    let row = segments + 1;
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * row + segment;
            let b = a + row;
            source.indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
        }
    }
    source
}

/// Triangles with one face normal per corner
fn flat_shaded(corners: &[[f32; 3]], triangles: &[[usize; 3]]) -> GeometrySource {
    let mut source = GeometrySource::default();
    for triangle in triangles {
        let [a, b, c] = triangle.map(|i| Vec3::from(corners[i]));
        let normal = (b - a).cross(&(c - a)).normalize();
        for p in [a, b, c] {
            source.indices.push(source.positions.len() as u32);
            source.positions.push(p.into());
            source.normals.push(normal.into());
            source.uvs.push([0.5, 0.5]);
        }
    }
    source
}

/// Faceted crystal: an octahedron stretched along y
pub fn crystal() -> GeometrySource {
    let corners = [
        [0.0, 1.6, 0.0],
        [0.0, -1.6, 0.0],
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    let triangles = [
        [0, 4, 2],
        [0, 2, 5],
        [0, 5, 3],
        [0, 3, 4],
        [1, 2, 4],
        [1, 5, 2],
        [1, 3, 5],
        [1, 4, 3],
    ];
    flat_shaded(&corners, &triangles)
}

/// Arrow-shaped hull pointing down -z
pub fn dart() -> GeometrySource {
    let corners = [
        [0.0, 0.0, -1.0],
        [-0.7, 0.0, 0.6],
        [0.7, 0.0, 0.6],
        [0.0, 0.25, 0.4],
        [0.0, -0.15, 0.4],
    ];
    let triangles = [[0, 1, 3], [0, 3, 2], [0, 4, 1], [0, 2, 4], [1, 4, 3], [2, 3, 4]];
    flat_shaded(&corners, &triangles)
}

/// Quad covering [0,1]^2 in xy with matching UVs
pub fn unit_quad() -> GeometrySource {
    let corners = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    GeometrySource {
        positions: corners.iter().map(|&[x, y]| [x, y, 0.0]).collect(),
        uvs: corners.to_vec(),
        indices: vec![0, 1, 2, 2, 3, 0],
        ..GeometrySource::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_indices_in_range(source: &GeometrySource) {
        let count = source.vertex_count().unwrap();
        assert_eq!(source.indices.len() % 3, 0);
        assert!(source.indices.iter().all(|&i| (i as usize) < count));
    }

    #[test]
    fn test_sphere_counts_and_radius() {
        let sphere = uv_sphere(8, 16);
        assert_eq!(sphere.vertex_count().unwrap(), 9 * 17);
        assert_eq!(sphere.indices.len(), 8 * 16 * 6);
        assert_indices_in_range(&sphere);
        for p in &sphere.positions {
            assert_relative_eq!(Vec3::from(*p).norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_flat_shapes_face_outward() {
        for shape in [crystal(), dart()] {
            assert_indices_in_range(&shape);
            let centroid = shape
                .positions
                .iter()
                .fold(Vec3::zeros(), |sum, p| sum + Vec3::from(*p))
                / shape.positions.len() as f32;
            for (p, n) in shape.positions.iter().zip(&shape.normals) {
                assert!((Vec3::from(*p) - centroid).dot(&Vec3::from(*n)) > 0.0);
            }
        }
    }

    #[test]
    fn test_cube_and_quad() {
        let cube = cube();
        assert_eq!(cube.vertex_count().unwrap(), 8);
        assert_eq!(cube.indices.len(), 36);
        assert_indices_in_range(&cube);

        let quad = unit_quad();
        assert_eq!(quad.vertex_count().unwrap(), 4);
        assert_indices_in_range(&quad);
    }
}
