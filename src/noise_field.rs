//! Deterministic fractal noise with optional domain warping.
//!
//! Every value is a pure function of (seed, x, z, parameters): no call
//! depends on call order or on mutable state, so offline tools can rebuild
//! the same field independently.

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::seeds::TerrainSeeds;

// Offsets that decorrelate the two warp axes (noise space).
const WARP_OFFSET_X: (f64, f64) = (31.7, 11.3);
const WARP_OFFSET_Z: (f64, f64) = (57.3, 83.9);

/// Shape of the fractal sum
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Fractional Brownian motion, output in [-1, 1]
    #[default]
    Fbm,
    /// Ridged multifractal (sharp crests), output in [0, 1]
    Ridged,
}

/// Parameters for one fractal noise layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalParams {
    /// Number of noise octaves
    pub octaves: u32,
    /// Frequency of the first octave in cycles per world unit
    pub base_frequency: f64,
    /// Amplitude decay per octave (0.0-1.0)
    pub persistence: f64,
    /// Frequency multiplier per octave
    pub lacunarity: f64,
    pub kind: NoiseKind,
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            octaves: 5,
            base_frequency: 1.0 / 400.0,
            persistence: 0.5,
            lacunarity: 2.0,
            kind: NoiseKind::Fbm,
        }
    }
}

impl FractalParams {
    pub fn ridged(octaves: u32, base_frequency: f64) -> Self {
        Self {
            octaves,
            base_frequency,
            persistence: 0.5,
            lacunarity: 2.2,
            kind: NoiseKind::Ridged,
        }
    }
}

/// Domain warp applied before sampling the primary field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpParams {
    /// Maximum displacement in world units (0 disables warping)
    pub strength: f64,
    /// Frequency of the warp field in cycles per world unit
    pub frequency: f64,
    pub octaves: u32,
}

impl Default for WarpParams {
    fn default() -> Self {
        Self {
            strength: 60.0,
            frequency: 1.0 / 600.0,
            octaves: 3,
        }
    }
}

/// A seeded pair of noise primitives: the primary field and the warp field.
#[derive(Clone)]
pub struct NoiseField {
    seed: u64,
    primary: Perlin,
    warp: Perlin,
}

impl NoiseField {
    /// Create a field whose warp seed is derived from the primary seed.
    pub fn new(seed: u64) -> Self {
        Self::with_warp_seed(seed, seed.rotate_left(17) ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn with_warp_seed(seed: u64, warp_seed: u64) -> Self {
        Self {
            seed,
            primary: Perlin::new(TerrainSeeds::to_noise_seed(seed)),
            warp: Perlin::new(TerrainSeeds::to_noise_seed(warp_seed)),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sample the primary field.
    ///
    /// `Fbm` returns a value in [-1, 1], `Ridged` a value in [0, 1].
    pub fn sample(&self, x: f64, z: f64, params: &FractalParams) -> f64 {
        let nx = x * params.base_frequency;
        let nz = z * params.base_frequency;
        match params.kind {
            NoiseKind::Fbm => fbm(
                &self.primary,
                nx,
                nz,
                params.octaves,
                params.persistence,
                params.lacunarity,
            ),
            NoiseKind::Ridged => ridged(
                &self.primary,
                nx,
                nz,
                params.octaves,
                params.persistence,
                params.lacunarity,
            ),
        }
    }

    /// Perturb (x, z) with the warp field, then sample the primary field there.
    pub fn warped_sample(&self, x: f64, z: f64, params: &FractalParams, warp: &WarpParams) -> f64 {
        let (wx, wz) = self.warp_coords(x, z, warp);
        self.sample(wx, wz, params)
    }

    /// Warped sample remapped to [0, 1] for envelope mapping.
    pub fn sample01(&self, x: f64, z: f64, params: &FractalParams, warp: &WarpParams) -> f64 {
        let value = self.warped_sample(x, z, params, warp);
        let unit = match params.kind {
            NoiseKind::Fbm => (value + 1.0) * 0.5,
            NoiseKind::Ridged => value,
        };
        unit.clamp(0.0, 1.0)
    }

    /// Domain-warped coordinates for (x, z), in world units.
    pub fn warp_coords(&self, x: f64, z: f64, warp: &WarpParams) -> (f64, f64) {
        if warp.strength == 0.0 || warp.octaves == 0 {
            return (x, z);
        }
        let nx = x * warp.frequency;
        let nz = z * warp.frequency;

        let dx = fbm(
            &self.warp,
            nx + WARP_OFFSET_X.0,
            nz + WARP_OFFSET_X.1,
            warp.octaves,
            0.5,
            2.0,
        );
        let dz = fbm(
            &self.warp,
            nx + WARP_OFFSET_Z.0,
            nz + WARP_OFFSET_Z.1,
            warp.octaves,
            0.5,
            2.0,
        );

        (x + dx * warp.strength, z + dz * warp.strength)
    }
}

/// Sample a freshly seeded field. Equivalent to `NoiseField::new(seed).sample(..)`.
pub fn sample(seed: u64, x: f64, z: f64, params: &FractalParams) -> f64 {
    NoiseField::new(seed).sample(x, z, params)
}

/// Warped sample from a freshly seeded field.
pub fn warped_sample(seed: u64, x: f64, z: f64, params: &FractalParams, warp: &WarpParams) -> f64 {
    NoiseField::new(seed).warped_sample(x, z, params, warp)
}

/// Fractional Brownian Motion - multi-octave noise
fn fbm(noise: &Perlin, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if max_value == 0.0 {
        return 0.0;
    }
    (total / max_value).clamp(-1.0, 1.0)
}

/// Ridged multifractal: 1 - |noise| folds zero crossings into crests, and
/// each octave is weighted by the previous one so detail gathers on ridges.
fn ridged(noise: &Perlin, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;
    let mut previous = 1.0;

    for _ in 0..octaves {
        let n = noise.get([x * frequency, y * frequency]);
        let ridge = (1.0 - n.abs()).max(0.0);
        // Squared rather than powf: libm powf is not bit-stable across targets.
        let ridge = ridge * ridge;
        let weighted = ridge * previous;
        previous = ridge;

        total += amplitude * weighted;
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if max_value == 0.0 {
        return 0.0;
    }
    (total / max_value).clamp(0.0, 1.0)
}
