//! Terrain features layered on top of the zone blend during generation:
//! named mountain ranges, river valleys carved along line segments, a
//! fall-off toward the world edge, and a guaranteed-dry spawn area around
//! the origin.
//!
//! Every feature is a continuous function of position, so applying them
//! keeps the heightfield free of seams.

use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::blend::{lerp, smooth_step};
use crate::error::ConfigError;
use crate::noise_field::{FractalParams, NoiseField};
use crate::seeds::TerrainSeeds;

/// Sub-peaks reach this fraction of the range's peak height.
const SUB_PEAK_HEIGHT: f32 = 0.6;
/// Sub-peak footprint as a fraction of the range radius.
const SUB_PEAK_RADIUS: f32 = 0.3;

/// Silhouette of a mountain range's main massif
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountainStyle {
    /// Sharp peaks roughened by fine ridged noise
    #[default]
    Jagged,
    /// One connected ridgeline
    Ridged,
    /// Smooth cone with a crater at the summit
    Volcanic,
    /// Broad, imposing shoulders
    Massive,
    /// Weathered, irregular slopes
    Eroded,
}

impl MountainStyle {
    /// Profile exponent in quarters: the massif rises as `influence^(q / 4)`.
    fn quarter_exponent(self) -> u32 {
        match self {
            MountainStyle::Jagged => 6,
            MountainStyle::Ridged => 5,
            MountainStyle::Volcanic => 10,
            MountainStyle::Massive => 5,
            MountainStyle::Eroded => 7,
        }
    }

    /// Noise layer roughening the massif, `None` for a smooth profile.
    fn roughness(self) -> Option<FractalParams> {
        match self {
            MountainStyle::Jagged => Some(FractalParams::ridged(6, 1.0 / 150.0)),
            MountainStyle::Ridged => Some(FractalParams::ridged(5, 1.0 / 200.0)),
            MountainStyle::Volcanic => None,
            MountainStyle::Massive => Some(FractalParams::ridged(4, 1.0 / 300.0)),
            MountainStyle::Eroded => Some(FractalParams {
                octaves: 5,
                base_frequency: 1.0 / 100.0,
                ..FractalParams::default()
            }),
        }
    }

    /// `(base, gain)`: the massif is scaled by `base + noise * gain`.
    fn noise_mix(self) -> (f32, f32) {
        match self {
            MountainStyle::Jagged => (0.7, 0.5),
            MountainStyle::Ridged => (0.6, 0.6),
            MountainStyle::Volcanic => (1.0, 0.0),
            MountainStyle::Massive => (0.8, 0.3),
            MountainStyle::Eroded => (0.5, 0.3),
        }
    }
}

/// A named mountain range: a central massif plus sub-peaks around it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MountainRange {
    pub name: String,
    /// (x, z) of the main summit
    pub center: (f32, f32),
    /// Distance at which the main massif reaches the surrounding terrain
    pub radius: f32,
    /// Height added at the main summit
    pub peak_height: f32,
    /// Number of sub-peaks scattered around the summit
    pub peaks: u32,
    #[serde(default)]
    pub style: MountainStyle,
}

impl MountainRange {
    pub fn new(
        name: impl Into<String>,
        center: (f32, f32),
        radius: f32,
        peak_height: f32,
        peaks: u32,
        style: MountainStyle,
    ) -> Self {
        Self {
            name: name.into(),
            center,
            radius,
            peak_height,
            peaks,
            style,
        }
    }
}

/// A mountain range with its noise and sub-peak positions resolved
#[derive(Clone)]
struct PlacedRange {
    range: MountainRange,
    noise: NoiseField,
    roughness: Option<FractalParams>,
    sub_peaks: Vec<(f32, f32)>,
}

impl PlacedRange {
    fn new(range: &MountainRange, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let count = range.peaks.max(1) as f32;
        let sub_peaks = (0..range.peaks)
            .map(|i| {
                let angle = i as f32 / count * TAU + rng.gen_range(-0.3..0.3);
                let dist = range.radius * (0.3 + rng.gen::<f32>() * 0.5);
                (range.center.0 + angle.cos() * dist, range.center.1 + angle.sin() * dist)
            })
            .collect();

        Self {
            range: range.clone(),
            noise: NoiseField::new(seed),
            roughness: range.style.roughness(),
            sub_peaks,
        }
    }

    /// Height this range adds at (x, z); zero well outside its radius.
    fn height_at(&self, x: f32, z: f32) -> f32 {
        let range = &self.range;
        let influence = (1.0 - distance(x, z, range.center) / range.radius).max(0.0);

        let mut height = 0.0;
        if influence > 0.0 {
            let style = range.style;
            let mut peak = quarter_power(influence, style.quarter_exponent());
            if style == MountainStyle::Volcanic {
                // Crater: the summit sinks to half height inside the rim
                peak *= 1.0 - 0.5 * smooth_step(0.85, 1.0, influence);
            }
            if let Some(params) = &self.roughness {
                let (base, gain) = style.noise_mix();
                let n = self.noise.sample(x as f64, z as f64, params) as f32;
                peak *= base + n * gain;
            }
            height = peak * range.peak_height;
        }

        let sub_radius = range.radius * SUB_PEAK_RADIUS;
        for &peak in &self.sub_peaks {
            let d = distance(x, z, peak);
            if d < sub_radius {
                let s = 1.0 - d / sub_radius;
                height = height.max(s * s * range.peak_height * SUB_PEAK_HEIGHT);
            }
        }
        height
    }
}

/// A river valley carved along a straight segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValleyPath {
    /// (x, z) start of the river line
    pub start: (f32, f32),
    /// (x, z) end of the river line
    pub end: (f32, f32),
    /// River width; the carved profile extends to twice this distance
    pub width: f32,
    /// Depth carved at the river line
    pub depth: f32,
}

impl ValleyPath {
    pub fn new(start: (f32, f32), end: (f32, f32), width: f32, depth: f32) -> Self {
        Self { start, end, width, depth }
    }

    /// Carved depth at (x, z): parabolic profile, zero beyond `2 * width`.
    pub fn depth_at(&self, x: f32, z: f32) -> f32 {
        let reach = self.width * 2.0;
        let dist = distance_to_segment(x, z, self.start, self.end);
        if dist >= reach {
            return 0.0;
        }
        let influence = 1.0 - dist / reach;
        influence * influence * self.depth
    }
}

/// Feature configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Fraction of the half world where the edge fall-off begins (>= 1 disables it)
    pub edge_falloff_start: f32,
    /// Height the terrain reaches at the world edge
    pub edge_floor: f32,
    /// Radius around the origin kept above `spawn_min_height` (0 disables it)
    pub spawn_radius: f32,
    pub spawn_min_height: f32,
    pub mountains: Vec<MountainRange>,
    pub valleys: Vec<ValleyPath>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            edge_falloff_start: 0.8,
            edge_floor: -50.0,
            spawn_radius: 100.0,
            spawn_min_height: 5.0,
            mountains: Vec::new(),
            valleys: Vec::new(),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.edge_falloff_start > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "features.edge_falloff_start",
                value: self.edge_falloff_start as f64,
            });
        }
        if self.spawn_radius < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "features.spawn_radius",
                value: self.spawn_radius as f64,
            });
        }
        for range in &self.mountains {
            if !(range.radius > 0.0) || !range.radius.is_finite() {
                return Err(ConfigError::NonPositive {
                    field: "features.mountains.radius",
                    value: range.radius as f64,
                });
            }
            if !(range.peak_height > 0.0) || !range.peak_height.is_finite() {
                return Err(ConfigError::NonPositive {
                    field: "features.mountains.peak_height",
                    value: range.peak_height as f64,
                });
            }
        }
        for valley in &self.valleys {
            if !(valley.width > 0.0) {
                return Err(ConfigError::NonPositive {
                    field: "features.valleys.width",
                    value: valley.width as f64,
                });
            }
        }
        Ok(())
    }
}

/// Applies the configured features to a base height
#[derive(Clone)]
pub struct TerrainFeatures {
    config: FeatureConfig,
    ranges: Vec<PlacedRange>,
    half_world: f32,
}

impl TerrainFeatures {
    pub fn new(config: &FeatureConfig, half_world: f32, seeds: &TerrainSeeds) -> Self {
        let ranges = config
            .mountains
            .iter()
            .enumerate()
            .map(|(i, range)| PlacedRange::new(range, seeds.mountain(i)))
            .collect();
        Self {
            config: config.clone(),
            ranges,
            half_world,
        }
    }

    /// Final generated height for (x, z) given its zone-blended base height.
    pub fn apply(&self, x: f32, z: f32, base_height: f32) -> f32 {
        let mut height = base_height + self.mountain_height(x, z) - self.valley_depth(x, z);
        height = self.edge_falloff(x, z, height);
        self.spawn_floor(x, z, height)
    }

    /// Tallest mountain contribution at (x, z).
    pub fn mountain_height(&self, x: f32, z: f32) -> f32 {
        self.ranges
            .iter()
            .map(|r| r.height_at(x, z))
            .fold(0.0, f32::max)
    }

    /// Resolved sub-peak positions of the `index`th range.
    pub fn sub_peaks(&self, index: usize) -> Option<&[(f32, f32)]> {
        self.ranges.get(index).map(|r| r.sub_peaks.as_slice())
    }

    /// Deepest carve among all valleys at (x, z).
    pub fn valley_depth(&self, x: f32, z: f32) -> f32 {
        self.config
            .valleys
            .iter()
            .map(|v| v.depth_at(x, z))
            .fold(0.0, f32::max)
    }

    fn edge_falloff(&self, x: f32, z: f32, height: f32) -> f32 {
        let start = self.half_world * self.config.edge_falloff_start;
        let edge_dist = x.abs().max(z.abs());
        if start >= self.half_world || edge_dist <= start {
            return height;
        }
        let t = smooth_step(start, self.half_world, edge_dist);
        lerp(height, self.config.edge_floor, t)
    }

    fn spawn_floor(&self, x: f32, z: f32, height: f32) -> f32 {
        let radius = self.config.spawn_radius;
        let floor = self.config.spawn_min_height;
        if radius <= 0.0 || height >= floor {
            return height;
        }
        let dist = (x * x + z * z).sqrt();
        if dist >= radius {
            return height;
        }
        let weight = 1.0 - smooth_step(radius * 0.75, radius, dist);
        height + (floor - height) * weight
    }
}

fn distance(x: f32, z: f32, point: (f32, f32)) -> f32 {
    ((x - point.0).powi(2) + (z - point.1).powi(2)).sqrt()
}

/// `value^(quarters / 4)` for `value` in [0, 1], from square roots only so
/// the result does not depend on the platform's `powf`.
fn quarter_power(value: f32, quarters: u32) -> f32 {
    let root = value.sqrt().sqrt();
    (0..quarters).fold(1.0, |acc, _| acc * root)
}

/// Distance from a point to a line segment
fn distance_to_segment(px: f32, pz: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = b.0 - a.0;
    let dz = b.1 - a.1;
    let length_sq = dx * dx + dz * dz;

    if length_sq == 0.0 {
        return ((px - a.0).powi(2) + (pz - a.1).powi(2)).sqrt();
    }

    let t = (((px - a.0) * dx + (pz - a.1) * dz) / length_sq).clamp(0.0, 1.0);
    let proj_x = a.0 + t * dx;
    let proj_z = a.1 + t * dz;

    ((px - proj_x).powi(2) + (pz - proj_z).powi(2)).sqrt()
}
