//! Error types for configuration, readiness and export failures.

use thiserror::Error;

use crate::heightgrid::GridState;
use crate::zones::Zone;

/// Invalid configuration; fatal at construction, before generation runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("world size {world_size} is not a whole multiple of cell size {cell_size}")]
    IndivisibleWorld { world_size: f32, cell_size: f32 },
    #[error("{cells_per_side} cells per side exceeds the {max_cells} cell limit")]
    GridTooLarge { cells_per_side: f64, max_cells: usize },
    #[error("export height range ({min}, {max}) must be finite with min < max")]
    InvalidHeightRange { min: f32, max: f32 },
    #[error("no zone bands configured")]
    NoZones,
    #[error("zone {zone} has start {start} >= end {end}")]
    EmptyZone { zone: Zone, start: f32, end: f32 },
    #[error("zone {next} starts at {start} but the previous zone ends at {previous_end}")]
    ZoneGap { next: Zone, previous_end: f32, start: f32 },
    #[error("zone bands cover [{start}, {end}] but the world spans +/-{half_world}")]
    ZonesDoNotCoverWorld { start: f32, end: f32, half_world: f32 },
    #[error("zone {zone} is {width} wide, narrower than the blend width {blend_width}")]
    ZoneTooNarrow { zone: Zone, width: f32, blend_width: f32 },
    #[error("zone {zone} has inverted height envelope ({min_height}, {max_height})")]
    InvertedEnvelope { zone: Zone, min_height: f32, max_height: f32 },
    #[error("invalid noise parameters for {context}: {reason}")]
    InvalidNoise { context: String, reason: &'static str },
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced by generation, queries, flattening and export.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A caller touched the heightfield before generation finished.
    #[error("{operation} called before terrain generation finished (state: {state})")]
    NotReady { operation: &'static str, state: GridState },
    #[error("terrain generation already started (state: {state})")]
    AlreadyGenerated { state: GridState },
    #[error("invalid flatten request: {reason}")]
    InvalidFlatten { reason: String },
    #[error("zone boundary {index} does not exist ({count} boundaries configured)")]
    UnknownBoundary { index: usize, count: usize },
    #[error("raster has {actual} samples, metadata expects {expected}")]
    RasterShape { expected: usize, actual: usize },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = TerrainError> = std::result::Result<T, E>;
