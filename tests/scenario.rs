//! Reference world: 4000 units, 4-unit cells, seed 42.

use terrain_engine::zones::Zone;
use terrain_engine::{Terrain, TerrainConfig};

fn reference_terrain() -> Terrain {
    let terrain = Terrain::new(TerrainConfig::default()).unwrap();
    terrain.generate().unwrap();
    terrain
}

#[test]
fn reference_world_scenario() {
    let terrain = reference_terrain();
    assert_eq!(terrain.grid().layout().cell_count(), 1_000_000);

    let query = terrain.query();
    assert_eq!(query.get_zone(0.0, -1500.0).unwrap(), Zone::Ocean);

    let (min, max) = terrain.classifier().envelope(Zone::Ocean).unwrap();
    let h = query.get_height(0.0, -1500.0).unwrap();
    assert!(h >= min && h <= max, "ocean height {} outside ({}, {})", h, min, max);

    let pad = terrain.flatten_area(100.0, 600.0, 20.0, None).unwrap();
    assert_eq!(query.get_height(100.0, 600.0).unwrap(), pad);

    // Every zone boundary of the reference layout blends without cliffs
    for index in 0..terrain.classifier().boundaries().len() {
        let report = query.check_zone_continuity(index).unwrap();
        assert!(
            report.is_continuous(),
            "{} -> {}: step {} at {:?}",
            report.lower,
            report.upper,
            report.max_step,
            report.worst_at
        );
    }
}

#[test]
fn flatten_leaves_far_cells_untouched() {
    let terrain = reference_terrain();
    let before = terrain.grid().snapshot().unwrap();
    let blend = terrain.config().flatten.blend_width;
    let (cx, cz, radius) = (-250.0f32, 330.0f32, 16.0f32);

    let h = terrain.flatten_area(cx, cz, radius, Some(35.0)).unwrap();
    assert_eq!(h, 35.0);
    assert_eq!(terrain.query().get_height(cx, cz).unwrap(), 35.0);

    let layout = *terrain.grid().layout();
    let reach = radius + blend;
    let (x0, z0) = layout.cell_of(cx - reach - 20.0, cz - reach - 20.0);
    let (x1, z1) = layout.cell_of(cx + reach + 20.0, cz + reach + 20.0);
    for cell_z in z0..=z1 {
        for cell_x in x0..=x1 {
            let (x, z) = layout.cell_center(cell_x, cell_z);
            let d = ((x - cx).powi(2) + (z - cz).powi(2)).sqrt();
            let now = terrain.get_raw_height(cell_x, cell_z).unwrap();
            if d <= radius {
                assert_eq!(now, 35.0);
            } else if d >= reach {
                assert_eq!(now.to_bits(), before.get(cell_x, cell_z).to_bits());
            }
        }
    }
}

#[test]
fn out_of_bounds_queries_clamp_to_edge() {
    let terrain = reference_terrain();
    let query = terrain.query();
    assert_eq!(
        query.get_height(5000.0, -7000.0).unwrap(),
        query.get_height(2000.0, -2000.0).unwrap()
    );
    assert_eq!(
        query.get_height_interpolated(-2500.0, 100.0).unwrap(),
        query.get_height_interpolated(-2000.0, 100.0).unwrap()
    );
    assert_eq!(query.get_zone(0.0, 9000.0).unwrap(), Zone::Mountains);
}

#[test]
fn flatten_ring_never_overshoots() {
    let terrain = reference_terrain();
    let layout = *terrain.grid().layout();
    // (102, 602) is a cell centre, so each walk below follows one exact ray
    let (x, z, radius) = (102.0f32, 602.0f32, 20.0f32);
    let reach = radius + terrain.config().flatten.blend_width;

    let target = terrain.flatten_area(x, z, radius, None).unwrap();
    let (cx, cz) = layout.cell_of(x, z);
    for (dx, dz) in [(1i64, 0i64), (-1, 0), (0, 1), (0, -1), (1, 1), (-1, 1), (1, -1), (-1, -1)] {
        let mut previous = 0.0f32;
        for step in 1..16i64 {
            let cell_x = (cx as i64 + dx * step) as usize;
            let cell_z = (cz as i64 + dz * step) as usize;
            let (wx, wz) = layout.cell_center(cell_x, cell_z);
            if ((wx - x).powi(2) + (wz - z).powi(2)).sqrt() >= reach {
                break;
            }
            let offset = (terrain.get_raw_height(cell_x, cell_z).unwrap() - target).abs();
            assert!(
                offset + 1e-3 >= previous,
                "ray ({}, {}) step {}: offset fell from {} to {}",
                dx,
                dz,
                step,
                previous,
                offset
            );
            previous = offset;
        }
    }
}
