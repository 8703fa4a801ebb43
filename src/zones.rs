//! Zone classification along the primary world axis.
//!
//! Zones are ordered bands (Ocean, Beach, ... Mountains). Each boundary has a
//! blend band of the configured width centred on it; inside it the height of
//! the two neighbouring zones is mixed with a smoothstep so elevation stays
//! continuous across the boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blend::{lerp, smooth_step};
use crate::config::{MaterialRules, TerrainConfig};
use crate::noise_field::{FractalParams, NoiseField, WarpParams};
use crate::seeds::TerrainSeeds;

/// Named terrain band
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Ocean,
    Beach,
    Coastal,
    Valley,
    FaultLine,
    Forest,
    Mountains,
}

impl Zone {
    pub fn all() -> &'static [Zone] {
        &[
            Zone::Ocean,
            Zone::Beach,
            Zone::Coastal,
            Zone::Valley,
            Zone::FaultLine,
            Zone::Forest,
            Zone::Mountains,
        ]
    }

    /// Surface materials as (submerged bed, vegetated, bare).
    fn palette(&self) -> (Material, Material, Material) {
        use Material::*;
        match self {
            Zone::Ocean => (Sand, Sand, Sand),
            Zone::Beach => (Sand, Sand, Sand),
            Zone::Coastal => (Sand, Grass, Ground),
            Zone::Valley => (Mud, Grass, Ground),
            Zone::FaultLine => (Mud, Ground, Basalt),
            Zone::Forest => (Mud, LeafyGrass, Ground),
            Zone::Mountains => (Ground, Grass, Slate),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Zone::Ocean => "Ocean",
            Zone::Beach => "Beach",
            Zone::Coastal => "Coastal",
            Zone::Valley => "Valley",
            Zone::FaultLine => "FaultLine",
            Zone::Forest => "Forest",
            Zone::Mountains => "Mountains",
        };
        write!(f, "{}", name)
    }
}

/// Surface material id handed to the visual terrain builder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Sand,
    Mud,
    Grass,
    LeafyGrass,
    Ground,
    Rock,
    Slate,
    Basalt,
    Snow,
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// World axis the zone bands are laid out along
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneAxis {
    X,
    #[default]
    Z,
}

impl ZoneAxis {
    #[inline]
    pub fn pick(&self, x: f32, z: f32) -> f32 {
        match self {
            ZoneAxis::X => x,
            ZoneAxis::Z => z,
        }
    }
}

/// One zone's extent along the axis and its height envelope
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub zone: Zone,
    /// Inclusive start along the zone axis
    pub start: f32,
    /// Exclusive end along the zone axis (the last band includes it)
    pub end: f32,
    pub min_height: f32,
    pub max_height: f32,
    #[serde(default)]
    pub noise: FractalParams,
}

impl ZoneBand {
    pub fn new(zone: Zone, start: f32, end: f32, min_height: f32, max_height: f32) -> Self {
        Self {
            zone,
            start,
            end,
            min_height,
            max_height,
            noise: FractalParams::default(),
        }
    }

    pub fn with_noise(mut self, noise: FractalParams) -> Self {
        self.noise = noise;
        self
    }

    pub fn width(&self) -> f32 {
        self.end - self.start
    }
}

/// Result of classifying a coordinate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneSample {
    /// Zone whose band contains the coordinate
    pub primary: Zone,
    /// Neighbouring zone when the coordinate lies in a blend band
    pub secondary: Option<Zone>,
    /// 0.0 = purely primary; reaches 0.5 exactly on the shared boundary
    pub blend: f32,
}

/// Band indices behind a `ZoneSample`
#[derive(Clone, Copy, Debug, PartialEq)]
struct BandBlend {
    primary: usize,
    secondary: Option<usize>,
    t: f32,
}

/// Maps coordinates to zones, envelopes, materials and base heights.
pub struct ZoneClassifier {
    axis: ZoneAxis,
    bands: Vec<ZoneBand>,
    fields: Vec<NoiseField>,
    blend_width: f32,
    warp: WarpParams,
    rules: MaterialRules,
}

impl ZoneClassifier {
    /// Build from an already validated config.
    pub fn new(config: &TerrainConfig, seeds: &TerrainSeeds) -> Self {
        let fields = (0..config.zones.len())
            .map(|i| NoiseField::with_warp_seed(seeds.zone(i), seeds.warp))
            .collect();

        Self {
            axis: config.zone_axis,
            bands: config.zones.clone(),
            fields,
            blend_width: config.zone_blend_width,
            warp: config.warp.clone(),
            rules: config.materials.clone(),
        }
    }

    pub fn axis(&self) -> ZoneAxis {
        self.axis
    }

    pub fn bands(&self) -> &[ZoneBand] {
        &self.bands
    }

    pub fn blend_width(&self) -> f32 {
        self.blend_width
    }

    pub fn rules(&self) -> &MaterialRules {
        &self.rules
    }

    /// Positions of the boundaries between consecutive bands.
    pub fn boundaries(&self) -> Vec<f32> {
        self.bands.iter().skip(1).map(|b| b.start).collect()
    }

    /// Dominant zone, optional neighbour and blend factor at (x, z).
    pub fn classify(&self, x: f32, z: f32) -> ZoneSample {
        let b = self.band_blend(x, z);
        ZoneSample {
            primary: self.bands[b.primary].zone,
            secondary: b.secondary.map(|i| self.bands[i].zone),
            blend: b.t,
        }
    }

    /// Configured (min, max) height for a zone, if the zone is in use.
    pub fn envelope(&self, zone: Zone) -> Option<(f32, f32)> {
        self.bands
            .iter()
            .find(|b| b.zone == zone)
            .map(|b| (b.min_height, b.max_height))
    }

    /// Static threshold rules; steep slopes win at any elevation.
    pub fn material(&self, zone: Zone, height: f32, slope_degrees: f32) -> Material {
        let rules = &self.rules;
        let (bed, vegetated, bare) = zone.palette();

        if slope_degrees > rules.rock_slope_degrees {
            Material::Rock
        } else if height >= rules.snow_line {
            Material::Snow
        } else if height < rules.water_level {
            bed
        } else if height < rules.treeline && slope_degrees < rules.vegetation_slope_degrees {
            vegetated
        } else {
            bare
        }
    }

    /// Zone-blended elevation before terrain features are applied.
    pub fn base_height(&self, x: f32, z: f32) -> f32 {
        let b = self.band_blend(x, z);
        let primary = self.height_from_band(b.primary, x, z);
        match b.secondary {
            Some(secondary) if b.t > 0.0 => {
                lerp(primary, self.height_from_band(secondary, x, z), b.t)
            }
            _ => primary,
        }
    }

    /// Map the band's noise into its envelope.
    fn height_from_band(&self, index: usize, x: f32, z: f32) -> f32 {
        let band = &self.bands[index];
        let n = self.fields[index].sample01(x as f64, z as f64, &band.noise, &self.warp) as f32;
        lerp(band.min_height, band.max_height, n)
    }

    fn band_blend(&self, x: f32, z: f32) -> BandBlend {
        let last = self.bands.len() - 1;
        let s = self
            .axis
            .pick(x, z)
            .clamp(self.bands[0].start, self.bands[last].end);
        let primary = self
            .bands
            .partition_point(|b| b.start <= s)
            .saturating_sub(1);
        let half = self.blend_width * 0.5;
        let band = &self.bands[primary];

        if primary < last && s > band.end - half {
            let boundary = band.end;
            let t = smooth_step(boundary - half, boundary + half, s);
            if t > 0.0 {
                return BandBlend { primary, secondary: Some(primary + 1), t };
            }
        }
        if primary > 0 && s < band.start + half {
            let boundary = band.start;
            let t = 1.0 - smooth_step(boundary - half, boundary + half, s);
            if t > 0.0 {
                return BandBlend { primary, secondary: Some(primary - 1), t };
            }
        }
        BandBlend { primary, secondary: None, t: 0.0 }
    }
}
