use terra_geom::{Vec2, Vec3};

use crate::TerrainMeshCPU;

/// Vertex handle: border vertices exist only to give edge normals the
/// neighbouring slope and never reach the output mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VertexRef {
    Inner(u32),
    Border(u32),
}

#[derive(Default)]
pub(crate) struct TerrainMeshBuild {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<u32>,
    border_positions: Vec<Vec3>,
    border_triangles: Vec<[VertexRef; 3]>,
}

impl TerrainMeshBuild {
    pub(crate) fn with_capacity(vertices_per_line: usize) -> Self {
        let quads = vertices_per_line.saturating_sub(1).pow(2);
        Self {
            positions: Vec::with_capacity(vertices_per_line * vertices_per_line),
            uvs: Vec::with_capacity(vertices_per_line * vertices_per_line),
            triangles: Vec::with_capacity(quads * 6),
            border_positions: Vec::with_capacity(vertices_per_line * 4 + 4),
            border_triangles: Vec::with_capacity(vertices_per_line * 8),
        }
    }

    /// Appends the next vertex of its kind; `r` must be the next unused index.
    pub(crate) fn add_vertex(&mut self, r: VertexRef, pos: Vec3, uv: Vec2) {
        match r {
            VertexRef::Inner(i) => {
                debug_assert_eq!(i as usize, self.positions.len());
                self.positions.push(pos);
                self.uvs.push(uv);
            }
            VertexRef::Border(i) => {
                debug_assert_eq!(i as usize, self.border_positions.len());
                self.border_positions.push(pos);
            }
        }
    }

    pub(crate) fn add_triangle(&mut self, a: VertexRef, b: VertexRef, c: VertexRef) {
        match (a, b, c) {
            (VertexRef::Inner(a), VertexRef::Inner(b), VertexRef::Inner(c)) => {
                self.triangles.extend_from_slice(&[a, b, c]);
            }
            _ => self.border_triangles.push([a, b, c]),
        }
    }

    #[inline]
    fn position(&self, r: VertexRef) -> Vec3 {
        match r {
            VertexRef::Inner(i) => self.positions[i as usize],
            VertexRef::Border(i) => self.border_positions[i as usize],
        }
    }

    fn smooth_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.triangles.chunks_exact(3) {
            let n = surface_normal(
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            );
            for &i in tri {
                normals[i as usize] += n;
            }
        }
        for tri in &self.border_triangles {
            let n = surface_normal(
                self.position(tri[0]),
                self.position(tri[1]),
                self.position(tri[2]),
            );
            for r in tri {
                if let VertexRef::Inner(i) = *r {
                    normals[i as usize] += n;
                }
            }
        }
        normals.into_iter().map(Vec3::normalized).collect()
    }

    pub(crate) fn finish(self, use_flat_shading: bool, lod: u32) -> TerrainMeshCPU {
        if use_flat_shading {
            return self.finish_flat(lod);
        }
        let normals = self.smooth_normals();
        TerrainMeshCPU {
            positions: self.positions,
            normals,
            uvs: self.uvs,
            triangles: self.triangles,
            lod,
        }
    }

    // One vertex per triangle corner, each carrying its face normal.
    fn finish_flat(self, lod: u32) -> TerrainMeshCPU {
        let n = self.triangles.len();
        let mut positions = Vec::with_capacity(n);
        let mut uvs = Vec::with_capacity(n);
        let mut normals = Vec::with_capacity(n);
        for tri in self.triangles.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let normal = surface_normal(self.positions[a], self.positions[b], self.positions[c]);
            for i in [a, b, c] {
                positions.push(self.positions[i]);
                uvs.push(self.uvs[i]);
                normals.push(normal);
            }
        }
        TerrainMeshCPU {
            positions,
            normals,
            uvs,
            triangles: (0..n as u32).collect(),
            lod,
        }
    }
}

#[inline]
fn surface_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalized()
}
