//! Terrain configuration
//!
//! Consumed once when a `Terrain` is constructed and read-only afterwards.
//! All sections default to the reference world so partial JSON files work.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::export::BitDepth;
use crate::features::{FeatureConfig, MountainRange, MountainStyle, ValleyPath};
use crate::heightgrid::GridLayout;
use crate::noise_field::{FractalParams, WarpParams};
use crate::zones::{Zone, ZoneAxis, ZoneBand};

/// Height and slope thresholds used for material selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialRules {
    /// Sea level; cells below it get the zone's bed material
    pub water_level: f32,
    /// Height where snow begins
    pub snow_line: f32,
    /// Height where vegetation stops
    pub treeline: f32,
    /// Slopes steeper than this are bare rock at any elevation
    pub rock_slope_degrees: f32,
    /// Slopes must be gentler than this to carry vegetation
    pub vegetation_slope_degrees: f32,
}

impl Default for MaterialRules {
    fn default() -> Self {
        Self {
            water_level: -8.0,
            snow_line: 280.0,
            treeline: 200.0,
            rock_slope_degrees: 45.0,
            vegetation_slope_degrees: 30.0,
        }
    }
}

/// Defaults for flatten requests that omit them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Width of the smoothing ring outside the flat pad
    pub blend_width: f32,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self { blend_width: 12.0 }
    }
}

/// Query tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Finite-difference step for slope; defaults to the cell size
    pub slope_step: Option<f32>,
    /// Largest adjacent-cell height delta tolerated inside a zone blend band
    pub max_blend_step: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            slope_step: None,
            max_blend_step: 40.0,
        }
    }
}

/// Raster export settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub bit_depth: BitDepth,
    /// Fixed (min, max) normalisation range; the grid's own range when unset
    pub height_range: Option<(f32, f32)>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            bit_depth: BitDepth::Sixteen,
            height_range: None,
        }
    }
}

/// Complete engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Edge length of the square world, centred on the origin
    pub world_size: f32,
    /// Edge length of one grid cell
    pub cell_size: f32,
    pub seed: u64,
    pub zone_axis: ZoneAxis,
    /// Width of the band, centred on each zone boundary, where zones mix
    pub zone_blend_width: f32,
    /// Bands in increasing order along `zone_axis`
    pub zones: Vec<ZoneBand>,
    pub warp: WarpParams,
    pub materials: MaterialRules,
    pub features: FeatureConfig,
    pub flatten: FlattenConfig,
    pub query: QueryConfig,
    pub export: ExportConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            world_size: 4000.0,
            cell_size: 4.0,
            seed: 42,
            zone_axis: ZoneAxis::Z,
            zone_blend_width: 100.0,
            zones: default_zones(),
            warp: WarpParams::default(),
            materials: MaterialRules::default(),
            features: FeatureConfig {
                mountains: default_mountains(),
                valleys: default_valleys(),
                ..FeatureConfig::default()
            },
            flatten: FlattenConfig::default(),
            query: QueryConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Reference layout: sea to the south (negative Z), peaks to the north.
fn default_zones() -> Vec<ZoneBand> {
    let gentle = FractalParams {
        octaves: 4,
        base_frequency: 1.0 / 500.0,
        ..FractalParams::default()
    };
    vec![
        ZoneBand::new(Zone::Ocean, -2000.0, -1200.0, -60.0, -12.0).with_noise(gentle.clone()),
        ZoneBand::new(Zone::Beach, -1200.0, -1000.0, -4.0, 6.0).with_noise(gentle),
        ZoneBand::new(Zone::Coastal, -1000.0, -600.0, 4.0, 30.0),
        ZoneBand::new(Zone::Valley, -600.0, 0.0, 10.0, 60.0),
        ZoneBand::new(Zone::FaultLine, 0.0, 200.0, 20.0, 90.0)
            .with_noise(FractalParams::ridged(4, 1.0 / 150.0)),
        ZoneBand::new(Zone::Forest, 200.0, 900.0, 40.0, 180.0),
        ZoneBand::new(Zone::Mountains, 900.0, 2000.0, 120.0, 450.0)
            .with_noise(FractalParams::ridged(6, 1.0 / 300.0)),
    ]
}

/// Two ranges in the northern peaks, clear of the forest blend band.
fn default_mountains() -> Vec<MountainRange> {
    vec![
        MountainRange::new(
            "The Frozen Sentinels",
            (-600.0, 1500.0),
            450.0,
            280.0,
            5,
            MountainStyle::Jagged,
        ),
        MountainRange::new(
            "Giants' Throne",
            (650.0, 1450.0),
            450.0,
            320.0,
            6,
            MountainStyle::Massive,
        ),
    ]
}

fn default_valleys() -> Vec<ValleyPath> {
    vec![
        ValleyPath::new((-500.0, -400.0), (-100.0, 400.0), 60.0, 40.0),
        ValleyPath::new((100.0, -300.0), (350.0, 300.0), 40.0, 40.0),
        ValleyPath::new((-300.0, 100.0), (200.0, 400.0), 50.0, 40.0),
    ]
}

impl TerrainConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TerrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn half_world(&self) -> f32 {
        self.world_size * 0.5
    }

    /// Cells along one edge of the world. Only meaningful once validated.
    pub fn cells_per_side(&self) -> usize {
        (self.world_size as f64 / self.cell_size as f64).round() as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        GridLayout::from_config(self)?;
        positive("flatten.blend_width", self.flatten.blend_width)?;
        positive("query.max_blend_step", self.query.max_blend_step)?;
        if let Some(step) = self.query.slope_step {
            positive("query.slope_step", step)?;
        }
        if self.zone_blend_width < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "zone_blend_width",
                value: self.zone_blend_width as f64,
            });
        }

        if let Some((min, max)) = self.export.height_range {
            if !(min < max) || !min.is_finite() || !max.is_finite() {
                return Err(ConfigError::InvalidHeightRange { min, max });
            }
        }

        self.validate_zones()?;
        validate_noise("warp", self.warp.frequency, 1, self.warp.strength >= 0.0)?;
        self.features.validate()
    }

    fn validate_zones(&self) -> Result<(), ConfigError> {
        let (first, last) = match (self.zones.first(), self.zones.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ConfigError::NoZones),
        };

        for (i, band) in self.zones.iter().enumerate() {
            if band.start >= band.end {
                return Err(ConfigError::EmptyZone {
                    zone: band.zone,
                    start: band.start,
                    end: band.end,
                });
            }
            if band.min_height > band.max_height {
                return Err(ConfigError::InvertedEnvelope {
                    zone: band.zone,
                    min_height: band.min_height,
                    max_height: band.max_height,
                });
            }
            if band.width() < self.zone_blend_width {
                return Err(ConfigError::ZoneTooNarrow {
                    zone: band.zone,
                    width: band.width(),
                    blend_width: self.zone_blend_width,
                });
            }
            if i > 0 {
                let previous = &self.zones[i - 1];
                if previous.end != band.start {
                    return Err(ConfigError::ZoneGap {
                        next: band.zone,
                        previous_end: previous.end,
                        start: band.start,
                    });
                }
            }
            validate_noise(
                &format!("zone {}", band.zone),
                band.noise.base_frequency,
                band.noise.octaves,
                band.noise.lacunarity > 0.0,
            )?;
        }

        let half = self.half_world();
        if first.start > -half || last.end < half {
            return Err(ConfigError::ZonesDoNotCoverWorld {
                start: first.start,
                end: last.end,
                half_world: half,
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value: value as f64 })
    }
}

fn validate_noise(
    context: &str,
    frequency: f64,
    octaves: u32,
    extra_ok: bool,
) -> Result<(), ConfigError> {
    let reason = if octaves == 0 {
        "octaves must be at least 1"
    } else if !(frequency > 0.0) {
        "frequency must be positive"
    } else if !extra_ok {
        "lacunarity and warp strength must be positive"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidNoise {
        context: context.to_string(),
        reason,
    })
}
