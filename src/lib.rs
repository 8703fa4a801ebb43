//! Deterministic terrain heightfield engine
//!
//! Generates a zone-blended elevation grid from a seed, then serves point
//! queries, flattened building pads and raster exports from it.

pub mod blend;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod flatten;
pub mod heightgrid;
pub mod noise_field;
pub mod query;
pub mod seeds;
pub mod terrain;
pub mod tilemap;
pub mod zones;

pub use config::TerrainConfig;
pub use error::{ConfigError, TerrainError};
pub use export::{BitDepth, HeightRaster, RasterMetadata};
pub use flatten::{FlattenRequest, FlattenedArea};
pub use heightgrid::GridState;
pub use query::{AlignmentReport, ElevationProbe, TerrainQuery, WorldPos};
pub use terrain::Terrain;
pub use zones::{Material, Zone};
