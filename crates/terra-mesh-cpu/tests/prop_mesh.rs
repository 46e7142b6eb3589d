use proptest::prelude::*;
use terra_mesh_cpu::{generate_terrain_mesh, lod_supported, simplification_increment};
use terra_world::{HeightCurve, HeightMap};

fn height_map() -> impl Strategy<Value = HeightMap> {
    (1usize..=4, 1usize..=4).prop_flat_map(|(cells, step)| {
        // bordered = cells * step + 1 keeps every small LOD step aligned
        let size = cells * step * 2 + 1;
        prop::collection::vec(0.0f32..=1.0, size * size)
            .prop_map(move |v| HeightMap::from_values(size, size, v))
    })
}

proptest! {
    // Every supported LOD produces indices in range, unit normals and the expected grid size
    #[test]
    fn supported_lods_produce_valid_meshes(
        hm in height_map(),
        lod in 0u32..=3,
        flat in any::<bool>()
    ) {
        let size = hm.width();
        prop_assume!(lod_supported(lod, size));
        let mesh = generate_terrain_mesh(&hm, 12.0, &HeightCurve::linear(), lod, flat).unwrap();

        let inc = simplification_increment(lod);
        let per_line = (size - 2 * inc - 1) / inc + 1;
        prop_assert_eq!(mesh.triangle_count(), 2 * (per_line - 1) * (per_line - 1));
        if !flat {
            prop_assert_eq!(mesh.vertex_count(), per_line * per_line);
        }
        prop_assert_eq!(mesh.normals.len(), mesh.vertex_count());
        prop_assert_eq!(mesh.uvs.len(), mesh.vertex_count());
        prop_assert!(mesh.triangles.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        for n in &mesh.normals {
            prop_assert!((n.length() - 1.0).abs() < 1e-3);
        }
        for p in &mesh.positions {
            prop_assert!(p.y >= 0.0 && p.y <= 12.0 + 1e-4);
        }
    }
}
