//! Profiling tool for generation, queries and flattening at full scale

use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use terrain_engine::{Terrain, TerrainConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = TerrainConfig::default();
    let cells = config.cells_per_side() * config.cells_per_side();

    println!("=== Performance Profiling ===");
    println!(
        "World: {} units, cell {} ({} cells), seed {}",
        config.world_size, config.cell_size, cells, config.seed
    );
    println!();

    let start = Instant::now();
    let terrain = Terrain::new(config)?;
    let setup_time = start.elapsed();
    println!("Setup: {:?}", setup_time);

    let start = Instant::now();
    terrain.generate()?;
    let generate_time = start.elapsed();
    println!("Generation: {:?}", generate_time);

    let query = terrain.query();
    let half = terrain.config().half_world();
    let mut rng = ChaCha8Rng::seed_from_u64(1337);
    let points: Vec<(f32, f32)> = (0..200_000)
        .map(|_| (rng.gen_range(-half..half), rng.gen_range(-half..half)))
        .collect();

    let start = Instant::now();
    let mut checksum = 0.0f64;
    for &(x, z) in &points {
        checksum += query.get_height(x, z)? as f64;
    }
    let point_time = start.elapsed();
    println!("{} point queries: {:?}", points.len(), point_time);

    let start = Instant::now();
    for &(x, z) in &points {
        checksum += query.get_height_interpolated(x, z)? as f64;
    }
    let interp_time = start.elapsed();
    println!("{} interpolated queries: {:?}", points.len(), interp_time);

    let start = Instant::now();
    for &(x, z) in points.iter().take(20_000) {
        checksum += query.get_slope_angle(x, z)? as f64;
    }
    let slope_time = start.elapsed();
    println!("20000 slope queries: {:?}", slope_time);

    let start = Instant::now();
    for &(x, z) in points.iter().take(500) {
        terrain.flatten_area(x, z, 12.0, None)?;
    }
    let flatten_time = start.elapsed();
    println!("500 flattens: {:?}", flatten_time);

    let start = Instant::now();
    let raster = terrain.export_raster()?;
    let export_time = start.elapsed();
    println!("Raster quantisation: {:?} ({} samples)", export_time, raster.samples().len());

    let total = setup_time
        + generate_time
        + point_time
        + interp_time
        + slope_time
        + flatten_time
        + export_time;
    let pct = |d: std::time::Duration| 100.0 * d.as_secs_f64() / total.as_secs_f64();
    println!("\n=== Summary ===");
    println!("Setup:        {:>8.2}% ({:?})", pct(setup_time), setup_time);
    println!("Generation:   {:>8.2}% ({:?})", pct(generate_time), generate_time);
    println!("Point:        {:>8.2}% ({:?})", pct(point_time), point_time);
    println!("Interpolated: {:>8.2}% ({:?})", pct(interp_time), interp_time);
    println!("Slope:        {:>8.2}% ({:?})", pct(slope_time), slope_time);
    println!("Flatten:      {:>8.2}% ({:?})", pct(flatten_time), flatten_time);
    println!("Export:       {:>8.2}% ({:?})", pct(export_time), export_time);
    println!("─────────────────────────────────");
    println!("TOTAL:        {:>8}  {:?}", "100%", total);
    println!("(checksum {:.3})", checksum);
    Ok(())
}
