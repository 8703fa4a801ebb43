//! The engine handle: owns the configuration, the grid and everything
//! derived from them. Created once per session and shared as
//! `Arc<Terrain>`; there is no global instance.

use tracing::info;

use crate::config::TerrainConfig;
use crate::error::{ConfigError, Result};
use crate::export::HeightRaster;
use crate::features::TerrainFeatures;
use crate::flatten::{FlattenRegistry, FlattenRequest, FlattenedArea};
use crate::heightgrid::{GridLayout, GridState, HeightGrid};
use crate::query::TerrainQuery;
use crate::seeds::TerrainSeeds;
use crate::zones::ZoneClassifier;

pub struct Terrain {
    config: TerrainConfig,
    seeds: TerrainSeeds,
    classifier: ZoneClassifier,
    features: TerrainFeatures,
    grid: HeightGrid,
    flattens: FlattenRegistry,
}

impl Terrain {
    /// Validate `config` and allocate an ungenerated grid.
    pub fn new(config: TerrainConfig) -> std::result::Result<Self, ConfigError> {
        let seeds = TerrainSeeds::from_master(config.seed);
        Self::with_seeds(config, seeds)
    }

    /// Like `new`, with explicitly derived sub-seeds.
    pub fn with_seeds(
        config: TerrainConfig,
        seeds: TerrainSeeds,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let layout = GridLayout::from_config(&config)?;
        let classifier = ZoneClassifier::new(&config, &seeds);
        let features = TerrainFeatures::new(&config.features, config.half_world(), &seeds);
        let flattens = FlattenRegistry::new(config.flatten.blend_width);

        info!(
            world_size = config.world_size,
            cell_size = config.cell_size,
            cells = layout.cell_count(),
            zones = config.zones.len(),
            %seeds,
            "terrain configured"
        );

        Ok(Self {
            grid: HeightGrid::new(layout),
            config,
            seeds,
            classifier,
            features,
            flattens,
        })
    }

    /// Run the one-time generation pass. Blocks until every cell is filled.
    pub fn generate(&self) -> Result<()> {
        self.grid.generate(&self.classifier, &self.features)
    }

    pub fn is_generated(&self) -> bool {
        self.grid.is_generated()
    }

    pub fn state(&self) -> GridState {
        self.grid.state()
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn seeds(&self) -> &TerrainSeeds {
        &self.seeds
    }

    pub fn grid(&self) -> &HeightGrid {
        &self.grid
    }

    pub fn classifier(&self) -> &ZoneClassifier {
        &self.classifier
    }

    pub fn query(&self) -> TerrainQuery<'_> {
        TerrainQuery::new(&self.grid, &self.classifier, &self.config.query)
    }

    /// O(1) read of one cell.
    pub fn get_raw_height(&self, cell_x: usize, cell_z: usize) -> Result<f32> {
        self.grid.raw_height(cell_x, cell_z)
    }

    /// Flatten a pad around (x, z) and return its height.
    pub fn flatten_area(
        &self,
        x: f32,
        z: f32,
        radius: f32,
        target_height: Option<f32>,
    ) -> Result<f32> {
        self.flattens.flatten_area(&self.grid, x, z, radius, target_height)
    }

    pub fn flatten_with(&self, request: FlattenRequest) -> Result<f32> {
        self.flattens.flatten_with(&self.grid, request)
    }

    /// Flattened regions applied so far, oldest first.
    pub fn flattened_areas(&self) -> Vec<FlattenedArea> {
        self.flattens.areas()
    }

    /// Quantise the current grid using the configured export settings.
    pub fn export_raster(&self) -> Result<HeightRaster> {
        HeightRaster::from_grid(&self.grid, &self.config.export, self.seeds.master)
    }
}
