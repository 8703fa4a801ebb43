//! Authoritative elevation storage and the one-time generation pass.
//!
//! Cells hold `f32` bits in `AtomicU32` slots: every read and write of a
//! single elevation is atomic, so queries stay lock-free while flattens
//! mutate the grid in place.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::TerrainConfig;
use crate::error::{ConfigError, Result, TerrainError};
use crate::features::TerrainFeatures;
use crate::tilemap::{bilinear, Tilemap};
use crate::zones::ZoneClassifier;

/// Grid coordinates closer than this (in cells) to a cell centre snap onto it.
const CENTER_SNAP: f64 = 1e-3;

/// Largest grid accepted, in cells (4 GiB of `AtomicU32`).
pub const MAX_CELLS: usize = 1 << 30;

/// Generation lifecycle; transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GridState {
    Uninitialized = 0,
    Generating = 1,
    Ready = 2,
}

impl GridState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => GridState::Uninitialized,
            1 => GridState::Generating,
            _ => GridState::Ready,
        }
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridState::Uninitialized => write!(f, "UNINITIALIZED"),
            GridState::Generating => write!(f, "GENERATING"),
            GridState::Ready => write!(f, "READY"),
        }
    }
}

/// Mapping between world space and cell indices.
///
/// The world is a square of `world_size` centred on the origin, split into
/// `cells_per_side`² cells. Cell (0, 0) is at the most negative (x, z).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    world_size: f32,
    cell_size: f32,
    cells_per_side: usize,
}

impl GridLayout {
    pub fn new(world_size: f32, cell_size: f32) -> std::result::Result<Self, ConfigError> {
        if !(world_size > 0.0) || !world_size.is_finite() {
            return Err(ConfigError::NonPositive {
                field: "world_size",
                value: world_size as f64,
            });
        }
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(ConfigError::NonPositive {
                field: "cell_size",
                value: cell_size as f64,
            });
        }
        // Both sizes carry f32 representation error, so the remainder is
        // judged relative to the world size rather than exactly.
        let cells = (world_size as f64 / cell_size as f64).round();
        let remainder = (cells * cell_size as f64 - world_size as f64).abs();
        if cells < 1.0 || remainder > world_size as f64 * f32::EPSILON as f64 * 4.0 {
            return Err(ConfigError::IndivisibleWorld { world_size, cell_size });
        }
        if cells > MAX_CELLS as f64 {
            return Err(ConfigError::GridTooLarge {
                cells_per_side: cells,
                max_cells: MAX_CELLS,
            });
        }
        let cells_per_side = cells as usize;
        match cells_per_side.checked_mul(cells_per_side) {
            Some(total) if total <= MAX_CELLS => Ok(Self {
                world_size,
                cell_size,
                cells_per_side,
            }),
            _ => Err(ConfigError::GridTooLarge {
                cells_per_side: cells,
                max_cells: MAX_CELLS,
            }),
        }
    }

    pub fn from_config(config: &TerrainConfig) -> std::result::Result<Self, ConfigError> {
        Self::new(config.world_size, config.cell_size)
    }

    pub fn world_size(&self) -> f32 {
        self.world_size
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn half_world(&self) -> f32 {
        self.world_size * 0.5
    }

    pub fn cells_per_side(&self) -> usize {
        self.cells_per_side
    }

    pub fn cell_count(&self) -> usize {
        self.cells_per_side * self.cells_per_side
    }

    /// World coordinate of a cell centre.
    pub fn cell_center(&self, cell_x: usize, cell_z: usize) -> (f32, f32) {
        (self.axis_center(cell_x), self.axis_center(cell_z))
    }

    fn axis_center(&self, cell: usize) -> f32 {
        (-(self.half_world() as f64) + (cell as f64 + 0.5) * self.cell_size as f64) as f32
    }

    /// Clamp a world coordinate into the world bounds.
    pub fn clamp_world(&self, x: f32, z: f32) -> (f32, f32) {
        let half = self.half_world();
        (x.clamp(-half, half), z.clamp(-half, half))
    }

    /// Cell containing (x, z) after clamping, i.e. the cell with the nearest centre.
    pub fn cell_of(&self, x: f32, z: f32) -> (usize, usize) {
        let (x, z) = self.clamp_world(x, z);
        (self.axis_cell(x), self.axis_cell(z))
    }

    fn axis_cell(&self, v: f32) -> usize {
        let cell = ((v as f64 + self.half_world() as f64) / self.cell_size as f64).floor();
        (cell.max(0.0) as usize).min(self.cells_per_side - 1)
    }

    /// Continuous cell coordinates where cell centres are whole numbers,
    /// clamped to the outermost centres.
    pub fn grid_coords(&self, x: f32, z: f32) -> (f32, f32) {
        (self.axis_grid(x), self.axis_grid(z))
    }

    fn axis_grid(&self, v: f32) -> f32 {
        let g = (v as f64 + self.half_world() as f64) / self.cell_size as f64 - 0.5;
        let g = if (g - g.round()).abs() < CENTER_SNAP { g.round() } else { g };
        g.clamp(0.0, (self.cells_per_side - 1) as f64) as f32
    }

    #[inline]
    fn index(&self, cell_x: usize, cell_z: usize) -> usize {
        cell_z * self.cells_per_side + cell_x
    }
}

/// The discretised elevation array covering the world.
pub struct HeightGrid {
    layout: GridLayout,
    cells: Vec<AtomicU32>,
    state: AtomicU8,
}

impl HeightGrid {
    pub fn new(layout: GridLayout) -> Self {
        let cells = (0..layout.cell_count()).map(|_| AtomicU32::new(0)).collect();
        Self {
            layout,
            cells,
            state: AtomicU8::new(GridState::Uninitialized as u8),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn state(&self) -> GridState {
        GridState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The single source of truth for readiness.
    pub fn is_generated(&self) -> bool {
        self.state() == GridState::Ready
    }

    /// Fail with `NotReady` unless generation has completed.
    pub fn ensure_ready(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            GridState::Ready => Ok(()),
            state => Err(TerrainError::NotReady { operation, state }),
        }
    }

    /// Fill every cell with its generated height. Runs exactly once; cells
    /// are computed in parallel, each writing only its own slot.
    pub fn generate(&self, classifier: &ZoneClassifier, features: &TerrainFeatures) -> Result<()> {
        self.state
            .compare_exchange(
                GridState::Uninitialized as u8,
                GridState::Generating as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| TerrainError::AlreadyGenerated {
                state: GridState::from_u8(current),
            })?;

        let n = self.layout.cells_per_side;
        info!(
            cells = self.cells.len(),
            cells_per_side = n,
            cell_size = self.layout.cell_size,
            "generating heightfield"
        );
        let start = Instant::now();
        let layout = self.layout;

        self.cells.par_iter().enumerate().for_each(|(i, cell)| {
            let (x, z) = layout.cell_center(i % n, i / n);
            let height = features.apply(x, z, classifier.base_height(x, z));
            cell.store(height.to_bits(), Ordering::Relaxed);
        });

        self.state.store(GridState::Ready as u8, Ordering::Release);
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "heightfield ready");
        Ok(())
    }

    /// O(1) read of one cell. Indices past the edge clamp to the boundary cell.
    pub fn raw_height(&self, cell_x: usize, cell_z: usize) -> Result<f32> {
        self.ensure_ready("raw_height")?;
        let max = self.layout.cells_per_side - 1;
        Ok(self.load(cell_x.min(max), cell_z.min(max)))
    }

    /// Copy of the whole grid, row-major by z then x.
    pub fn snapshot(&self) -> Result<Tilemap<f32>> {
        self.ensure_ready("snapshot")?;
        let n = self.layout.cells_per_side;
        let data = self
            .cells
            .iter()
            .map(|c| f32::from_bits(c.load(Ordering::Relaxed)))
            .collect();
        let map = Tilemap::from_vec(n, n, data).ok_or(TerrainError::RasterShape {
            expected: n * n,
            actual: self.cells.len(),
        })?;
        debug!(cells = n * n, "grid snapshot taken");
        Ok(map)
    }

    /// (min, max) elevation currently stored.
    pub fn height_range(&self) -> Result<(f32, f32)> {
        self.ensure_ready("height_range")?;
        let (min_h, max_h) = self
            .cells
            .par_iter()
            .map(|c| f32::from_bits(c.load(Ordering::Relaxed)))
            .fold(
                || (f32::MAX, f32::MIN),
                |(lo, hi), h| (lo.min(h), hi.max(h)),
            )
            .reduce(
                || (f32::MAX, f32::MIN),
                |(a_lo, a_hi), (b_lo, b_hi)| (a_lo.min(b_lo), a_hi.max(b_hi)),
            );
        Ok((min_h, max_h))
    }

    /// Unchecked read; callers must have passed `ensure_ready`.
    #[inline]
    pub(crate) fn load(&self, cell_x: usize, cell_z: usize) -> f32 {
        f32::from_bits(self.cells[self.layout.index(cell_x, cell_z)].load(Ordering::Relaxed))
    }

    /// Unchecked bilinear read over cell centres; exact at a centre.
    pub(crate) fn interpolate(&self, x: f32, z: f32) -> f32 {
        let max = self.layout.cells_per_side - 1;
        let (gx, gz) = self.layout.grid_coords(x, z);
        let x0 = gx.floor();
        let z0 = gz.floor();
        let (fx, fz) = (gx - x0, gz - z0);
        let (x0, z0) = (x0 as usize, z0 as usize);
        let (x1, z1) = ((x0 + 1).min(max), (z0 + 1).min(max));

        bilinear(
            self.load(x0, z0),
            self.load(x1, z0),
            self.load(x0, z1),
            self.load(x1, z1),
            fx,
            fz,
        )
    }

    /// Single-cell atomic write used by the flatten registry.
    #[inline]
    pub(crate) fn store(&self, cell_x: usize, cell_z: usize, height: f32) {
        self.cells[self.layout.index(cell_x, cell_z)].store(height.to_bits(), Ordering::Relaxed);
    }
}
