//! Flattened building pads carved into the authoritative grid.
//!
//! A flatten forces every cell within `radius` of the centre to a target
//! height and smoothsteps back to the existing terrain over a ring of
//! `blend_width`. Along each ray the ring blends toward the height found
//! where the ray leaves the ring, so heights never overshoot or wobble
//! between the pad and the untouched terrain. Results are written straight
//! into the `HeightGrid`, so overlapping pads resolve as "most recent call
//! wins".

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blend::{lerp, smooth_step};
use crate::error::{Result, TerrainError};
use crate::heightgrid::HeightGrid;

/// A region that has been flattened, as recorded in the registry
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlattenedArea {
    pub center_x: f32,
    pub center_z: f32,
    pub radius: f32,
    pub blend_width: f32,
    pub target_height: f32,
}

/// Parameters of one flatten call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlattenRequest {
    pub center_x: f32,
    pub center_z: f32,
    pub radius: f32,
    /// Mean height of the cells inside `radius` when unset
    pub target_height: Option<f32>,
    /// Registry default when unset
    pub blend_width: Option<f32>,
}

impl FlattenRequest {
    pub fn new(center_x: f32, center_z: f32, radius: f32) -> Self {
        Self {
            center_x,
            center_z,
            radius,
            target_height: None,
            blend_width: None,
        }
    }

    pub fn with_target(mut self, height: f32) -> Self {
        self.target_height = Some(height);
        self
    }

    pub fn with_blend_width(mut self, width: f32) -> Self {
        self.blend_width = Some(width);
        self
    }

    fn validate(&self) -> Result<()> {
        let reason = if !self.center_x.is_finite() || !self.center_z.is_finite() {
            "centre must be finite".to_string()
        } else if !(self.radius > 0.0) || !self.radius.is_finite() {
            format!("radius must be positive, got {}", self.radius)
        } else if matches!(self.target_height, Some(h) if !h.is_finite()) {
            "target height must be finite".to_string()
        } else if matches!(self.blend_width, Some(w) if !(w >= 0.0) || !w.is_finite()) {
            format!("blend width must be non-negative, got {:?}", self.blend_width)
        } else {
            return Ok(());
        };
        Err(TerrainError::InvalidFlatten { reason })
    }
}

/// Weight of the original height at `distance` from a pad centre.
///
/// 0.0 inside `radius` (pure target), 1.0 at `radius + blend_width` and
/// beyond (untouched), monotonic in between.
pub fn flatten_weight(distance: f32, radius: f32, blend_width: f32) -> f32 {
    smooth_step(radius, radius + blend_width, distance)
}

#[derive(Default)]
struct RegistryState {
    areas: Vec<FlattenedArea>,
    /// Most recent request and the height it produced
    last: Option<(FlattenRequest, f32)>,
}

/// Applies flattens to a grid and keeps the ordered audit list.
///
/// One mutex serialises every flatten's read-compute-write against the
/// others. Readers are not blocked; each cell write is a single atomic store.
pub struct FlattenRegistry {
    default_blend_width: f32,
    state: Mutex<RegistryState>,
}

impl FlattenRegistry {
    pub fn new(default_blend_width: f32) -> Self {
        Self {
            default_blend_width,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn default_blend_width(&self) -> f32 {
        self.default_blend_width
    }

    /// Flatten a pad with the default blend width and return its height.
    pub fn flatten_area(
        &self,
        grid: &HeightGrid,
        center_x: f32,
        center_z: f32,
        radius: f32,
        target_height: Option<f32>,
    ) -> Result<f32> {
        let mut request = FlattenRequest::new(center_x, center_z, radius);
        request.target_height = target_height;
        self.flatten_with(grid, request)
    }

    /// Flatten a pad described by `request` and return its height.
    ///
    /// Repeating the previous request verbatim returns the recorded height
    /// and leaves the grid as it is.
    pub fn flatten_with(&self, grid: &HeightGrid, request: FlattenRequest) -> Result<f32> {
        grid.ensure_ready("flatten_area")?;
        request.validate()?;

        let mut state = self.lock();
        if let Some((last, height)) = state.last {
            if last == request {
                debug!(
                    x = request.center_x,
                    z = request.center_z,
                    "repeated flatten request, grid unchanged"
                );
                return Ok(height);
            }
        }

        let area = self.apply(grid, &request);
        state.areas.push(area);
        state.last = Some((request, area.target_height));
        Ok(area.target_height)
    }

    /// Applied regions, oldest first.
    pub fn areas(&self) -> Vec<FlattenedArea> {
        self.lock().areas.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panic mid-flatten leaves only fully written cells behind
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, grid: &HeightGrid, request: &FlattenRequest) -> FlattenedArea {
        let layout = grid.layout();
        let (cx, cz) = layout.clamp_world(request.center_x, request.center_z);
        let radius = request.radius;
        let blend_width = request.blend_width.unwrap_or(self.default_blend_width);
        let reach = radius + blend_width;
        let center_cell = layout.cell_of(cx, cz);

        let (x0, z0) = layout.cell_of(cx - reach, cz - reach);
        let (x1, z1) = layout.cell_of(cx + reach, cz + reach);

        let target = match request.target_height {
            Some(h) => h,
            None => {
                let mut sum = 0.0f64;
                let mut count = 0usize;
                for cell_z in z0..=z1 {
                    for cell_x in x0..=x1 {
                        let (wx, wz) = layout.cell_center(cell_x, cell_z);
                        if distance(wx, wz, cx, cz) <= radius {
                            sum += grid.load(cell_x, cell_z) as f64;
                            count += 1;
                        }
                    }
                }
                if count == 0 {
                    grid.load(center_cell.0, center_cell.1)
                } else {
                    (sum / count as f64) as f32
                }
            }
        };

        // Rim heights are read from the pre-flatten grid, so nothing is
        // stored until every new height is known.
        let mut writes = Vec::new();
        for cell_z in z0..=z1 {
            for cell_x in x0..=x1 {
                let (wx, wz) = layout.cell_center(cell_x, cell_z);
                let d = distance(wx, wz, cx, cz);
                let new_height = if (cell_x, cell_z) == center_cell || d <= radius {
                    target
                } else if d < reach {
                    let scale = reach / d;
                    let rim = grid.interpolate(cx + (wx - cx) * scale, cz + (wz - cz) * scale);
                    lerp(target, rim, flatten_weight(d, radius, blend_width))
                } else {
                    continue;
                };
                writes.push((cell_x, cell_z, new_height));
            }
        }
        for &(cell_x, cell_z, height) in &writes {
            grid.store(cell_x, cell_z, height);
        }
        let touched = writes.len();

        debug!(
            x = cx,
            z = cz,
            radius,
            blend_width,
            target,
            cells = touched,
            "flattened area"
        );

        FlattenedArea {
            center_x: cx,
            center_z: cz,
            radius,
            blend_width,
            target_height: target,
        }
    }
}

fn distance(ax: f32, az: f32, bx: f32, bz: f32) -> f32 {
    let dx = ax - bx;
    let dz = az - bz;
    (dx * dx + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainConfig;
    use crate::features::TerrainFeatures;
    use crate::heightgrid::{GridLayout, GridState};
    use crate::seeds::TerrainSeeds;
    use crate::zones::{Zone, ZoneBand, ZoneClassifier};
    use proptest::prelude::*;

    fn test_config() -> TerrainConfig {
        TerrainConfig {
            world_size: 400.0,
            cell_size: 2.0,
            zone_blend_width: 40.0,
            zones: vec![
                ZoneBand::new(Zone::Valley, -200.0, 0.0, 0.0, 60.0),
                ZoneBand::new(Zone::Forest, 0.0, 200.0, 20.0, 120.0),
            ],
            ..TerrainConfig::default()
        }
    }

    fn generated_grid() -> HeightGrid {
        let config = test_config();
        let seeds = TerrainSeeds::from_master(7);
        let classifier = ZoneClassifier::new(&config, &seeds);
        let features = TerrainFeatures::new(&config.features, config.half_world(), &seeds);
        let grid = HeightGrid::new(GridLayout::from_config(&config).unwrap());
        grid.generate(&classifier, &features).unwrap();
        grid
    }

    fn bits(grid: &HeightGrid) -> Vec<u32> {
        grid.snapshot()
            .unwrap()
            .as_slice()
            .iter()
            .map(|h| h.to_bits())
            .collect()
    }

    #[test]
    fn test_weight_profile() {
        assert_eq!(flatten_weight(0.0, 10.0, 5.0), 0.0);
        assert_eq!(flatten_weight(10.0, 10.0, 5.0), 0.0);
        assert_eq!(flatten_weight(15.0, 10.0, 5.0), 1.0);
        assert_eq!(flatten_weight(40.0, 10.0, 5.0), 1.0);
        assert!((flatten_weight(12.5, 10.0, 5.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_flatten_before_generation_fails() {
        let grid = HeightGrid::new(GridLayout::new(40.0, 4.0).unwrap());
        let registry = FlattenRegistry::new(8.0);
        assert!(matches!(
            registry.flatten_area(&grid, 0.0, 0.0, 5.0, Some(1.0)),
            Err(TerrainError::NotReady { state: GridState::Uninitialized, .. })
        ));
        assert!(registry.areas().is_empty());
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let grid = generated_grid();
        let registry = FlattenRegistry::new(8.0);
        for request in [
            FlattenRequest::new(0.0, 0.0, 0.0),
            FlattenRequest::new(0.0, 0.0, -3.0),
            FlattenRequest::new(f32::NAN, 0.0, 3.0),
            FlattenRequest::new(0.0, 0.0, 3.0).with_target(f32::INFINITY),
            FlattenRequest::new(0.0, 0.0, 3.0).with_blend_width(-1.0),
        ] {
            assert!(matches!(
                registry.flatten_with(&grid, request),
                Err(TerrainError::InvalidFlatten { .. })
            ));
        }
    }

    #[test]
    fn test_flatten_sets_pad_and_preserves_outside() {
        let grid = generated_grid();
        let before = grid.snapshot().unwrap();
        let registry = FlattenRegistry::new(8.0);

        let h = registry
            .flatten_area(&grid, 31.0, -47.0, 12.0, Some(42.5))
            .unwrap();
        assert_eq!(h, 42.5);

        let layout = *grid.layout();
        let n = layout.cells_per_side();
        for cz in 0..n {
            for cx in 0..n {
                let (wx, wz) = layout.cell_center(cx, cz);
                let d = distance(wx, wz, 31.0, -47.0);
                let now = grid.load(cx, cz);
                if d <= 12.0 {
                    assert_eq!(now, 42.5);
                } else if d >= 20.0 {
                    assert_eq!(now.to_bits(), before.get(cx, cz).to_bits());
                }
            }
        }
        let (ccx, ccz) = layout.cell_of(31.0, -47.0);
        assert_eq!(grid.load(ccx, ccz), 42.5);
    }

    #[test]
    fn test_blend_ring_is_monotonic() {
        let grid = generated_grid();
        let registry = FlattenRegistry::new(20.0);
        // (1, 101) is a cell centre, so the walks below stay on exact rays
        let target = registry.flatten_area(&grid, 1.0, 101.0, 10.0, None).unwrap();

        let layout = *grid.layout();
        let (cx, cz) = layout.cell_of(1.0, 101.0);
        let rays = [(1i64, 0i64), (-1, 0), (0, 1), (0, -1), (1, 1), (-1, 1), (1, -1), (-1, -1)];
        for (dx, dz) in rays {
            let mut previous = 0.0f32;
            for step in 1..16i64 {
                let (x, z) = ((cx as i64 + dx * step) as usize, (cz as i64 + dz * step) as usize);
                let (wx, wz) = layout.cell_center(x, z);
                if distance(wx, wz, 1.0, 101.0) >= 30.0 {
                    break;
                }
                let offset = (grid.load(x, z) - target).abs();
                assert!(
                    offset + 1e-3 >= previous,
                    "ray ({}, {}) step {}: offset fell from {} to {}",
                    dx,
                    dz,
                    step,
                    previous,
                    offset
                );
                previous = offset;
            }
        }
    }

    #[test]
    fn test_blend_ring_meets_untouched_terrain() {
        let grid = generated_grid();
        let before = grid.snapshot().unwrap();
        let registry = FlattenRegistry::new(16.0);
        let target = registry.flatten_area(&grid, -81.0, 41.0, 12.0, None).unwrap();

        // Cells just inside the rim sit close to the original terrain there
        let layout = *grid.layout();
        for cell_z in 0..layout.cells_per_side() {
            for cell_x in 0..layout.cells_per_side() {
                let (wx, wz) = layout.cell_center(cell_x, cell_z);
                let d = distance(wx, wz, -81.0, 41.0);
                if d > 26.0 && d < 28.0 {
                    let original = *before.get(cell_x, cell_z);
                    let now = grid.load(cell_x, cell_z);
                    assert!(
                        (now - original).abs() <= (original - target).abs() * 0.1 + 4.0,
                        "rim cell ({}, {}) moved from {} to {}",
                        cell_x,
                        cell_z,
                        original,
                        now
                    );
                }
            }
        }
    }

    #[test]
    fn test_omitted_target_uses_mean_inside_radius() {
        let grid = generated_grid();
        let layout = *grid.layout();
        let mut expected = 0.0f64;
        let mut count = 0;
        for cz in 0..layout.cells_per_side() {
            for cx in 0..layout.cells_per_side() {
                let (wx, wz) = layout.cell_center(cx, cz);
                if distance(wx, wz, -60.0, 60.0) <= 9.0 {
                    expected += grid.load(cx, cz) as f64;
                    count += 1;
                }
            }
        }
        let expected = (expected / count as f64) as f32;

        let registry = FlattenRegistry::new(6.0);
        let h = registry.flatten_area(&grid, -60.0, 60.0, 9.0, None).unwrap();
        assert!((h - expected).abs() < 1e-3);
    }

    #[test]
    fn test_tiny_radius_still_sets_centre_cell() {
        let grid = generated_grid();
        let registry = FlattenRegistry::new(4.0);
        let h = registry.flatten_area(&grid, 0.3, 0.3, 0.1, None).unwrap();
        let (cx, cz) = grid.layout().cell_of(0.3, 0.3);
        assert_eq!(grid.load(cx, cz), h);
    }

    #[test]
    fn test_repeat_is_idempotent() {
        let grid = generated_grid();
        let registry = FlattenRegistry::new(8.0);

        let first = registry.flatten_area(&grid, 50.0, 50.0, 10.0, Some(77.0)).unwrap();
        let after_first = bits(&grid);
        let second = registry.flatten_area(&grid, 50.0, 50.0, 10.0, Some(77.0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(after_first, bits(&grid));

        let a = registry.flatten_area(&grid, -50.0, -50.0, 10.0, None).unwrap();
        let after_a = bits(&grid);
        let b = registry.flatten_area(&grid, -50.0, -50.0, 10.0, None).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(after_a, bits(&grid));

        assert_eq!(registry.areas().len(), 2);
    }

    #[test]
    fn test_most_recent_flatten_wins_overlap() {
        let grid = generated_grid();
        let registry = FlattenRegistry::new(4.0);
        registry.flatten_area(&grid, 0.0, 0.0, 20.0, Some(10.0)).unwrap();
        registry.flatten_area(&grid, 10.0, 0.0, 20.0, Some(30.0)).unwrap();

        let (cx, cz) = grid.layout().cell_of(5.0, 1.0);
        assert_eq!(grid.load(cx, cz), 30.0);

        let areas = registry.areas();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].target_height, 10.0);
        assert_eq!(areas[1].target_height, 30.0);
        assert_eq!(areas[1].blend_width, 4.0);
    }

    #[test]
    fn test_centre_outside_world_is_clamped() {
        let grid = generated_grid();
        let registry = FlattenRegistry::new(4.0);
        registry.flatten_area(&grid, 900.0, 0.0, 6.0, Some(3.0)).unwrap();
        let area = registry.areas()[0];
        assert_eq!(area.center_x, 200.0);
        let n = grid.layout().cells_per_side();
        let (_, cz) = grid.layout().cell_of(200.0, 0.0);
        assert_eq!(grid.load(n - 1, cz), 3.0);
    }

    proptest! {
        #[test]
        fn prop_weight_monotonic(
            radius in 0.5f32..50.0,
            blend in 0.0f32..30.0,
            a in 0.0f32..100.0,
            b in 0.0f32..100.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(flatten_weight(lo, radius, blend) <= flatten_weight(hi, radius, blend));
        }
    }
}
