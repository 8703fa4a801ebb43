//! Seed management for terrain generation
//!
//! Splits one master seed into a seed per noise system so each layer can be
//! varied independently while the whole world stays reproducible.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ChaCha stream ids; never renumber, exported terrain depends on them.
const STREAM_TERRAIN: u64 = 1;
const STREAM_WARP: u64 = 2;
const STREAM_ZONE_BASE: u64 = 100;
const STREAM_MOUNTAIN_BASE: u64 = 10_000;

/// Seeds for every noise system of the heightfield.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerrainSeeds {
    /// Master seed (used for display/reference)
    pub master: u64,
    /// Shared base noise, mixed into each zone's seed
    pub terrain: u64,
    /// Domain warp offsets
    pub warp: u64,
}

impl TerrainSeeds {
    /// Derive all sub-seeds deterministically from a master seed.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            terrain: derive_seed(master, STREAM_TERRAIN),
            warp: derive_seed(master, STREAM_WARP),
        }
    }

    /// Create a builder for customizing individual seeds
    pub fn builder(master: u64) -> TerrainSeedsBuilder {
        TerrainSeedsBuilder::new(master)
    }

    /// Seed for the noise of one zone band, by its index along the axis.
    pub fn zone(&self, zone_index: usize) -> u64 {
        derive_seed(self.terrain, STREAM_ZONE_BASE + zone_index as u64)
    }

    /// Seed for one mountain range, by its index in the feature list.
    pub fn mountain(&self, range_index: usize) -> u64 {
        derive_seed(self.terrain, STREAM_MOUNTAIN_BASE + range_index as u64)
    }

    /// Fold a 64-bit seed into the 32 bits the noise primitives accept.
    pub fn to_noise_seed(seed: u64) -> u32 {
        (seed ^ (seed >> 32)) as u32
    }
}

/// Builder for overriding individual seeds while deriving the rest
pub struct TerrainSeedsBuilder {
    seeds: TerrainSeeds,
}

impl TerrainSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self {
            seeds: TerrainSeeds::from_master(master),
        }
    }

    /// Override the terrain seed
    pub fn terrain(mut self, seed: u64) -> Self {
        self.seeds.terrain = seed;
        self
    }

    /// Override the warp seed
    pub fn warp(mut self, seed: u64) -> Self {
        self.seeds.warp = seed;
        self
    }

    pub fn build(self) -> TerrainSeeds {
        self.seeds
    }
}

/// ChaCha output is specified bit-exactly, so derived seeds never drift
/// between platforms or toolchain releases.
fn derive_seed(master: u64, stream: u64) -> u64 {
    let mut rng = ChaCha8Rng::seed_from_u64(master);
    rng.set_stream(stream);
    rng.next_u64()
}

impl std::fmt::Display for TerrainSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TerrainSeeds {{ master: {}, terrain: {}, warp: {} }}",
            self.master, self.terrain, self.warp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_derivation() {
        let a = TerrainSeeds::from_master(12345);
        let b = TerrainSeeds::from_master(12345);
        assert_eq!(a, b);
        assert_eq!(a.zone(3), b.zone(3));
    }

    #[test]
    fn test_different_systems_get_different_seeds() {
        let seeds = TerrainSeeds::from_master(12345);
        assert_ne!(seeds.terrain, seeds.warp);
        assert_ne!(seeds.zone(0), seeds.terrain);
        assert_ne!(seeds.zone(0), seeds.zone(1));
        assert_ne!(seeds.mountain(0), seeds.zone(0));
        assert_ne!(seeds.mountain(0), seeds.mountain(1));
    }

    #[test]
    fn test_builder_override() {
        let seeds = TerrainSeeds::builder(12345).warp(99999).build();
        assert_eq!(seeds.warp, 99999);

        let derived = TerrainSeeds::from_master(12345);
        assert_eq!(seeds.terrain, derived.terrain);
        assert_ne!(seeds.warp, derived.warp);
    }
}
