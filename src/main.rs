use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use terrain_engine::{BitDepth, Terrain, TerrainConfig};

#[derive(Parser, Debug)]
#[command(name = "terrain_engine")]
#[command(about = "Generate a deterministic terrain heightfield and export it")]
struct Args {
    /// JSON terrain configuration (built-in reference world if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed (uses the config seed, or a random one with --random-seed)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Pick a random seed instead of the configured one
    #[arg(long, conflicts_with = "seed")]
    random_seed: bool,

    /// Override the world edge length
    #[arg(long)]
    world_size: Option<f32>,

    /// Override the cell edge length
    #[arg(long)]
    cell_size: Option<f32>,

    /// Write <PREFIX>.png and <PREFIX>.json after generation
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Raster sample depth (8 or 16)
    #[arg(long, value_parser = parse_bit_depth)]
    bit_depth: Option<BitDepth>,

    /// Flatten a pad before export: x,z,radius[,height] (repeatable)
    #[arg(long, value_parser = parse_flatten)]
    flatten: Vec<FlattenArg>,

    /// Print height, zone and material at x,z (repeatable)
    #[arg(long, value_parser = parse_point)]
    probe: Vec<(f32, f32)>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Debug)]
struct FlattenArg {
    x: f32,
    z: f32,
    radius: f32,
    height: Option<f32>,
}

fn parse_numbers(s: &str) -> Result<Vec<f32>, String> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| format!("'{}': {}", part.trim(), e))
        })
        .collect()
}

fn parse_flatten(s: &str) -> Result<FlattenArg, String> {
    match parse_numbers(s)?.as_slice() {
        &[x, z, radius] => Ok(FlattenArg { x, z, radius, height: None }),
        &[x, z, radius, h] => Ok(FlattenArg { x, z, radius, height: Some(h) }),
        _ => Err("expected x,z,radius[,height]".to_string()),
    }
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    match parse_numbers(s)?.as_slice() {
        &[x, z] => Ok((x, z)),
        _ => Err("expected x,z".to_string()),
    }
}

fn parse_bit_depth(s: &str) -> Result<BitDepth, String> {
    s.parse::<u8>()
        .ok()
        .and_then(BitDepth::from_bits)
        .ok_or_else(|| format!("bit depth must be 8 or 16, got '{}'", s))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            TerrainConfig::from_json_file(path)?
        }
        None => TerrainConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    } else if args.random_seed {
        config.seed = rand::random();
    }
    if let Some(world_size) = args.world_size {
        config.world_size = world_size;
    }
    if let Some(cell_size) = args.cell_size {
        config.cell_size = cell_size;
    }
    if let Some(bit_depth) = args.bit_depth {
        config.export.bit_depth = bit_depth;
    }

    info!("Generating terrain with seed: {}", config.seed);
    let terrain = Terrain::new(config)?;
    terrain.generate()?;

    let (min_h, max_h) = terrain.grid().height_range()?;
    info!("Height range: {:.1} to {:.1}", min_h, max_h);

    let query = terrain.query();
    for index in 0..terrain.classifier().boundaries().len() {
        let report = query.check_zone_continuity(index)?;
        if !report.is_continuous() {
            warn!(
                "Boundary {} -> {} has a {:.2} step at ({:.0}, {:.0})",
                report.lower, report.upper, report.max_step, report.worst_at.0, report.worst_at.1
            );
        }
    }

    for pad in &args.flatten {
        let h = terrain.flatten_area(pad.x, pad.z, pad.radius, pad.height)?;
        println!("Flattened ({}, {}) r={} to height {:.2}", pad.x, pad.z, pad.radius, h);
    }

    for &(x, z) in &args.probe {
        println!(
            "({}, {}): height {:.2} (interpolated {:.2}), slope {:.1} deg, zone {}, material {}{}",
            x,
            z,
            query.get_height(x, z)?,
            query.get_height_interpolated(x, z)?,
            query.get_slope_angle(x, z)?,
            query.get_zone(x, z)?,
            query.get_material(x, z)?,
            if query.is_underwater(x, z)? { ", underwater" } else { "" },
        );
    }

    if let Some(prefix) = &args.export {
        let raster = terrain.export_raster()?;
        let (png, json) = raster.write_files(prefix)?;
        println!("Exported {} and {}", png.display(), json.display());
    }

    Ok(())
}
