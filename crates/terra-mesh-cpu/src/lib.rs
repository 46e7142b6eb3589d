//! CPU terrain meshing: padded height field → LOD-simplified triangle grid.
#![forbid(unsafe_code)]

mod mesh_build;

use terra_geom::{Vec2, Vec3};
use terra_world::{HeightCurve, HeightMap};

use crate::mesh_build::{TerrainMeshBuild, VertexRef};

pub const MAX_LOD: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("height map must be square, got {width}x{height}")]
    NotSquare { width: usize, height: usize },
    #[error("height map of size {0} is too small to mesh (need at least 3)")]
    HeightMapTooSmall(usize),
    #[error("level of detail {lod} unsupported for bordered size {bordered_size}")]
    UnsupportedLod { lod: u32, bordered_size: usize },
}

/// Mesh geometry ready for upload. Indices are triangle lists.
#[derive(Clone, Debug, Default)]
pub struct TerrainMeshCPU {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<u32>,
    pub lod: u32,
}

impl TerrainMeshCPU {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }
}

/// Grid step for a level of detail: 1 at LOD 0, otherwise `2 * lod`.
#[inline]
pub fn simplification_increment(lod: u32) -> usize {
    if lod == 0 { 1 } else { lod as usize * 2 }
}

/// True when `lod` steps evenly across a map with `bordered_size` samples per side.
pub fn lod_supported(lod: u32, bordered_size: usize) -> bool {
    lod <= MAX_LOD
        && bordered_size >= 3
        && (bordered_size - 1) % simplification_increment(lod) == 0
        && bordered_size > 2 * simplification_increment(lod)
}

/// Triangulates a padded height map. The outermost ring of samples only
/// contributes to edge normals; the emitted grid covers `bordered_size - 2`
/// world units centred on the origin, with heights `curve(h) * height_multiplier`.
pub fn generate_terrain_mesh(
    heights: &HeightMap,
    height_multiplier: f32,
    curve: &HeightCurve,
    lod: u32,
    use_flat_shading: bool,
) -> Result<TerrainMeshCPU, MeshError> {
    let (width, height) = (heights.width(), heights.height());
    if width != height {
        return Err(MeshError::NotSquare { width, height });
    }
    let bordered = width;
    if bordered < 3 {
        return Err(MeshError::HeightMapTooSmall(bordered));
    }
    if !lod_supported(lod, bordered) {
        return Err(MeshError::UnsupportedLod {
            lod,
            bordered_size: bordered,
        });
    }

    let inc = simplification_increment(lod);
    let mesh_size = bordered - 2 * inc;
    let unsimplified = (bordered - 2) as f32;
    let top_left_x = (unsimplified - 1.0) / -2.0;
    let top_left_z = (unsimplified - 1.0) / 2.0;
    let vertices_per_line = (mesh_size - 1) / inc + 1;

    let mut refs = vec![VertexRef::Inner(0); bordered * bordered];
    let (mut inner, mut border) = (0u32, 0u32);
    for y in (0..bordered).step_by(inc) {
        for x in (0..bordered).step_by(inc) {
            let on_border = y == 0 || y == bordered - 1 || x == 0 || x == bordered - 1;
            refs[y * bordered + x] = if on_border {
                border += 1;
                VertexRef::Border(border - 1)
            } else {
                inner += 1;
                VertexRef::Inner(inner - 1)
            };
        }
    }

    let mut build = TerrainMeshBuild::with_capacity(vertices_per_line);
    for y in (0..bordered).step_by(inc) {
        for x in (0..bordered).step_by(inc) {
            let px = (x as f32 - inc as f32) / mesh_size as f32;
            let py = (y as f32 - inc as f32) / mesh_size as f32;
            let h = curve.evaluate(heights.get(x, y)) * height_multiplier;
            let pos = Vec3::new(
                top_left_x + px * unsimplified,
                h,
                top_left_z - py * unsimplified,
            );
            build.add_vertex(refs[y * bordered + x], pos, Vec2::new(px, py));

            if x < bordered - 1 && y < bordered - 1 {
                let a = refs[y * bordered + x];
                let b = refs[y * bordered + x + inc];
                let c = refs[(y + inc) * bordered + x];
                let d = refs[(y + inc) * bordered + x + inc];
                build.add_triangle(a, d, c);
                build.add_triangle(d, a, b);
            }
        }
    }

    let mesh = build.finish(use_flat_shading, lod);
    log::trace!(
        "terrain mesh lod={} verts={} tris={}",
        lod,
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(size: usize, h: f32) -> HeightMap {
        HeightMap::filled(size, size, h)
    }

    #[test]
    fn increments() {
        assert_eq!(simplification_increment(0), 1);
        assert_eq!(simplification_increment(1), 2);
        assert_eq!(simplification_increment(6), 12);
    }

    #[test]
    fn lod_zero_grid_counts() {
        let mesh = generate_terrain_mesh(&flat(7, 0.5), 10.0, &HeightCurve::linear(), 0, false)
            .unwrap();
        // 5x5 inner vertices, 4x4 quads
        assert_eq!(mesh.vertex_count(), 25);
        assert_eq!(mesh.triangle_count(), 32);
        assert_eq!(mesh.normals.len(), 25);
        assert!(mesh.positions.iter().all(|p| (p.y - 5.0).abs() < 1e-6));
    }

    #[test]
    fn flat_terrain_normals_point_up() {
        let mesh = generate_terrain_mesh(&flat(9, 0.2), 4.0, &HeightCurve::linear(), 0, false)
            .unwrap();
        for n in &mesh.normals {
            assert!((n.y - 1.0).abs() < 1e-5, "{n:?}");
        }
    }

    #[test]
    fn flat_shading_duplicates_vertices() {
        let mesh = generate_terrain_mesh(&flat(7, 0.5), 1.0, &HeightCurve::linear(), 0, true)
            .unwrap();
        assert_eq!(mesh.vertex_count(), mesh.triangles.len());
        assert_eq!(mesh.triangle_count(), 32);
        assert!(mesh.triangles.iter().enumerate().all(|(i, t)| *t == i as u32));
    }

    #[test]
    fn grid_is_centred() {
        let mesh = generate_terrain_mesh(&flat(7, 0.0), 1.0, &HeightCurve::linear(), 0, false)
            .unwrap();
        let min_x = mesh.positions.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let max_x = mesh.positions.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert!((min_x + max_x).abs() < 1e-5);
    }

    #[test]
    fn errors() {
        let c = HeightCurve::linear();
        assert_eq!(
            generate_terrain_mesh(&HeightMap::new(4, 5), 1.0, &c, 0, false).unwrap_err(),
            MeshError::NotSquare { width: 4, height: 5 }
        );
        assert_eq!(
            generate_terrain_mesh(&flat(2, 0.0), 1.0, &c, 0, false).unwrap_err(),
            MeshError::HeightMapTooSmall(2)
        );
        // (8 - 1) is not a multiple of 2
        assert!(matches!(
            generate_terrain_mesh(&flat(8, 0.0), 1.0, &c, 1, false),
            Err(MeshError::UnsupportedLod { lod: 1, .. })
        ));
        assert!(!lod_supported(7, 241));
    }

    #[test]
    fn production_sizes_support_expected_lods() {
        for lod in 0..=MAX_LOD {
            assert!(lod_supported(lod, 241), "lod {lod} on 241");
        }
        assert!(lod_supported(0, 97));
        assert!(lod_supported(1, 97));
        assert!(lod_supported(2, 97));
        assert!(lod_supported(4, 97));
        assert!(!lod_supported(5, 97));
    }
}
