//! Read API used by gameplay code: point lookups, interpolation, slope,
//! zone and material, plus checks that keep external representations of
//! the terrain in sync with the grid.
//!
//! Coordinates outside the world are clamped to the boundary; that is a
//! documented fallback, not an error. Calling anything before the grid is
//! ready is an error.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::error::{Result, TerrainError};
use crate::heightgrid::HeightGrid;
use crate::zones::{Material, Zone, ZoneAxis, ZoneClassifier, ZoneSample};

/// A position in world space; `y` is up
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Anything that can report an elevation independently of the grid, such
/// as a ray probe against rendered geometry or a decoded raster export.
pub trait ElevationProbe {
    /// Height at (x, z), or `None` where the probe has no data.
    fn probe_height(&self, x: f32, z: f32) -> Option<f32>;
}

impl<F> ElevationProbe for F
where
    F: Fn(f32, f32) -> Option<f32>,
{
    fn probe_height(&self, x: f32, z: f32) -> Option<f32> {
        self(x, z)
    }
}

/// A point where the probe disagreed with the grid
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignmentMismatch {
    pub x: f32,
    pub z: f32,
    pub engine_height: f32,
    pub reference_height: f32,
}

impl AlignmentMismatch {
    pub fn error(&self) -> f32 {
        (self.engine_height - self.reference_height).abs()
    }
}

/// Outcome of comparing the grid against an `ElevationProbe`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlignmentReport {
    /// Points the probe answered
    pub checked: usize,
    /// Points the probe had no data for
    pub skipped: usize,
    pub mismatches: Vec<AlignmentMismatch>,
    /// Largest absolute difference over the checked points
    pub max_error: f32,
}

impl AlignmentReport {
    pub fn is_aligned(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Largest adjacent-cell height step found inside one boundary's blend band
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContinuityReport {
    /// Position of the boundary along the zone axis
    pub boundary: f32,
    pub lower: Zone,
    pub upper: Zone,
    pub cells_checked: usize,
    pub max_step: f32,
    /// World (x, z) of the cell where `max_step` starts
    pub worst_at: (f32, f32),
    pub threshold: f32,
}

impl ContinuityReport {
    pub fn is_continuous(&self) -> bool {
        self.max_step <= self.threshold
    }
}

/// Borrowed view over a generated grid and its classifier.
#[derive(Clone, Copy)]
pub struct TerrainQuery<'a> {
    grid: &'a HeightGrid,
    classifier: &'a ZoneClassifier,
    config: &'a QueryConfig,
}

impl<'a> TerrainQuery<'a> {
    pub fn new(
        grid: &'a HeightGrid,
        classifier: &'a ZoneClassifier,
        config: &'a QueryConfig,
    ) -> Self {
        Self { grid, classifier, config }
    }

    /// Height of the cell containing (x, z). O(1).
    pub fn get_height(&self, x: f32, z: f32) -> Result<f32> {
        self.grid.ensure_ready("get_height")?;
        let (cx, cz) = self.grid.layout().cell_of(x, z);
        Ok(self.grid.load(cx, cz))
    }

    /// Bilinear interpolation over the four surrounding cell centres.
    /// Equals `get_height` exactly at a cell centre.
    pub fn get_height_interpolated(&self, x: f32, z: f32) -> Result<f32> {
        self.grid.ensure_ready("get_height_interpolated")?;
        Ok(self.interpolate(x, z))
    }

    /// `position` with `y` replaced by the ground height plus `offset_y`.
    pub fn snap_to_terrain(&self, position: WorldPos, offset_y: f32) -> Result<WorldPos> {
        let ground = self.get_height(position.x, position.z)?;
        Ok(WorldPos {
            y: ground + offset_y,
            ..position
        })
    }

    /// Slope in degrees from a central difference of the interpolated height.
    pub fn get_slope_angle(&self, x: f32, z: f32) -> Result<f32> {
        self.grid.ensure_ready("get_slope_angle")?;
        Ok(self.slope_at(x, z))
    }

    pub fn get_zone(&self, x: f32, z: f32) -> Result<Zone> {
        Ok(self.zone_sample(x, z)?.primary)
    }

    /// Full classification at (x, z), including the blend neighbour.
    pub fn zone_sample(&self, x: f32, z: f32) -> Result<ZoneSample> {
        self.grid.ensure_ready("get_zone")?;
        let (x, z) = self.grid.layout().clamp_world(x, z);
        Ok(self.classifier.classify(x, z))
    }

    /// Material from the current (possibly flattened) height and slope.
    pub fn get_material(&self, x: f32, z: f32) -> Result<Material> {
        self.grid.ensure_ready("get_material")?;
        let (x, z) = self.grid.layout().clamp_world(x, z);
        let zone = self.classifier.classify(x, z).primary;
        let (cx, cz) = self.grid.layout().cell_of(x, z);
        let height = self.grid.load(cx, cz);
        Ok(self.classifier.material(zone, height, self.slope_at(x, z)))
    }

    pub fn is_underwater(&self, x: f32, z: f32) -> Result<bool> {
        Ok(self.get_height(x, z)? < self.classifier.rules().water_level)
    }

    /// Whether an independently measured `reference` height at (x, z) agrees
    /// with the interpolated grid height within `tolerance`.
    pub fn validate_alignment(
        &self,
        x: f32,
        z: f32,
        reference: f32,
        tolerance: f32,
    ) -> Result<bool> {
        let engine = self.get_height_interpolated(x, z)?;
        let aligned = (engine - reference).abs() <= tolerance;
        if !aligned {
            warn!(x, z, engine, reference, tolerance, "terrain alignment mismatch");
        }
        Ok(aligned)
    }

    /// Compare the grid against `probe` at every point.
    pub fn validate_alignment_with<P>(
        &self,
        probe: &P,
        points: &[(f32, f32)],
        tolerance: f32,
    ) -> Result<AlignmentReport>
    where
        P: ElevationProbe + ?Sized,
    {
        self.grid.ensure_ready("validate_alignment")?;
        let mut report = AlignmentReport::default();

        for &(x, z) in points {
            let Some(reference) = probe.probe_height(x, z) else {
                report.skipped += 1;
                continue;
            };
            let engine = self.interpolate(x, z);
            let error = (engine - reference).abs();
            report.checked += 1;
            report.max_error = report.max_error.max(error);
            if !(error <= tolerance) {
                report.mismatches.push(AlignmentMismatch {
                    x,
                    z,
                    engine_height: engine,
                    reference_height: reference,
                });
            }
        }

        if report.is_aligned() {
            debug!(
                checked = report.checked,
                skipped = report.skipped,
                max_error = report.max_error,
                "alignment check passed"
            );
        } else {
            warn!(
                checked = report.checked,
                mismatches = report.mismatches.len(),
                max_error = report.max_error,
                tolerance,
                "terrain is out of sync with reference"
            );
        }
        Ok(report)
    }

    /// Scan the blend band around zone boundary `boundary_index` for the
    /// largest height step between adjacent cells.
    pub fn check_zone_continuity(&self, boundary_index: usize) -> Result<ContinuityReport> {
        self.grid.ensure_ready("check_zone_continuity")?;
        let boundaries = self.classifier.boundaries();
        let boundary = *boundaries
            .get(boundary_index)
            .ok_or(TerrainError::UnknownBoundary {
                index: boundary_index,
                count: boundaries.len(),
            })?;
        let bands = self.classifier.bands();
        let lower = bands[boundary_index].zone;
        let upper = bands[boundary_index + 1].zone;

        let layout = *self.grid.layout();
        let n = layout.cells_per_side();
        let half = self.classifier.blend_width() * 0.5;
        let (lo, _) = layout.cell_of(boundary - half, 0.0);
        let (hi, _) = layout.cell_of(boundary + half, 0.0);
        let axis = self.classifier.axis();
        let to_cell = |along: usize, across: usize| match axis {
            ZoneAxis::Z => (across, along),
            ZoneAxis::X => (along, across),
        };

        let (max_step, worst, cells) = (lo..=hi)
            .into_par_iter()
            .map(|along| {
                let mut best = (0.0f32, to_cell(along, 0));
                for across in 0..n {
                    let (cx, cz) = to_cell(along, across);
                    let h = self.grid.load(cx, cz);
                    if along < hi {
                        let (nx, nz) = to_cell(along + 1, across);
                        let step = (self.grid.load(nx, nz) - h).abs();
                        if step > best.0 {
                            best = (step, (cx, cz));
                        }
                    }
                    if across + 1 < n {
                        let (nx, nz) = to_cell(along, across + 1);
                        let step = (self.grid.load(nx, nz) - h).abs();
                        if step > best.0 {
                            best = (step, (cx, cz));
                        }
                    }
                }
                (best.0, best.1, n)
            })
            .reduce(
                || (0.0, (0, 0), 0),
                |a, b| {
                    let worst = if b.0 > a.0 { (b.0, b.1) } else { (a.0, a.1) };
                    (worst.0, worst.1, a.2 + b.2)
                },
            );

        let report = ContinuityReport {
            boundary,
            lower,
            upper,
            cells_checked: cells,
            max_step,
            worst_at: layout.cell_center(worst.0, worst.1),
            threshold: self.config.max_blend_step,
        };
        if report.is_continuous() {
            debug!(%lower, %upper, boundary, max_step, "zone boundary is continuous");
        } else {
            warn!(
                %lower,
                %upper,
                boundary,
                max_step,
                threshold = report.threshold,
                "height step across zone boundary exceeds threshold"
            );
        }
        Ok(report)
    }

    fn interpolate(&self, x: f32, z: f32) -> f32 {
        self.grid.interpolate(x, z)
    }

    fn slope_at(&self, x: f32, z: f32) -> f32 {
        let step = self
            .config
            .slope_step
            .unwrap_or_else(|| self.grid.layout().cell_size());
        let dh_dx = (self.interpolate(x + step, z) - self.interpolate(x - step, z)) / (2.0 * step);
        let dh_dz = (self.interpolate(x, z + step) - self.interpolate(x, z - step)) / (2.0 * step);
        (dh_dx * dh_dx + dh_dz * dh_dz).sqrt().atan().to_degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainConfig;
    use crate::features::TerrainFeatures;
    use crate::heightgrid::{GridLayout, GridState};
    use crate::seeds::TerrainSeeds;
    use crate::zones::ZoneBand;
    use proptest::prelude::*;
    use std::sync::OnceLock;

    struct Fixture {
        grid: HeightGrid,
        classifier: ZoneClassifier,
        config: TerrainConfig,
    }

    impl Fixture {
        fn query(&self) -> TerrainQuery<'_> {
            TerrainQuery::new(&self.grid, &self.classifier, &self.config.query)
        }
    }

    fn fixture_with(config: TerrainConfig) -> Fixture {
        let seeds = TerrainSeeds::from_master(config.seed);
        let classifier = ZoneClassifier::new(&config, &seeds);
        let features = TerrainFeatures::new(&config.features, config.half_world(), &seeds);
        let grid = HeightGrid::new(GridLayout::from_config(&config).unwrap());
        grid.generate(&classifier, &features).unwrap();
        Fixture { grid, classifier, config }
    }

    fn fixture() -> Fixture {
        fixture_with(TerrainConfig {
            world_size: 800.0,
            cell_size: 4.0,
            zone_blend_width: 80.0,
            zones: vec![
                ZoneBand::new(Zone::Ocean, -400.0, -100.0, -40.0, -10.0),
                ZoneBand::new(Zone::Valley, -100.0, 150.0, 10.0, 60.0),
                ZoneBand::new(Zone::Mountains, 150.0, 400.0, 120.0, 300.0),
            ],
            ..TerrainConfig::default()
        })
    }

    /// `fixture()` built once and shared by the property tests.
    fn shared_fixture() -> &'static Fixture {
        static FIXTURE: OnceLock<Fixture> = OnceLock::new();
        FIXTURE.get_or_init(fixture)
    }

    /// A 40x40 world with flat zones: heights come only from the blend.
    fn flat_fixture() -> Fixture {
        let mut config = TerrainConfig {
            world_size: 40.0,
            cell_size: 4.0,
            zone_blend_width: 16.0,
            zones: vec![
                ZoneBand::new(Zone::Valley, -20.0, 0.0, 0.0, 0.0),
                ZoneBand::new(Zone::Mountains, 0.0, 20.0, 20.0, 20.0),
            ],
            ..TerrainConfig::default()
        };
        config.features.edge_falloff_start = 1.0;
        config.features.spawn_radius = 0.0;
        config.features.valleys.clear();
        fixture_with(config)
    }

    #[test]
    fn test_queries_before_generation_fail() {
        let config = TerrainConfig::default();
        let classifier = ZoneClassifier::new(&config, &TerrainSeeds::from_master(1));
        let grid = HeightGrid::new(GridLayout::new(40.0, 4.0).unwrap());
        let q = TerrainQuery::new(&grid, &classifier, &config.query);

        assert!(matches!(
            q.get_height(0.0, 0.0),
            Err(TerrainError::NotReady { state: GridState::Uninitialized, .. })
        ));
        assert!(q.get_height_interpolated(0.0, 0.0).is_err());
        assert!(q.snap_to_terrain(WorldPos::default(), 1.0).is_err());
        assert!(q.get_slope_angle(0.0, 0.0).is_err());
        assert!(q.get_zone(0.0, 0.0).is_err());
        assert!(q.get_material(0.0, 0.0).is_err());
        assert!(q.is_underwater(0.0, 0.0).is_err());
        assert!(q.validate_alignment(0.0, 0.0, 0.0, 1.0).is_err());
        assert!(q.check_zone_continuity(0).is_err());
    }

    #[test]
    fn test_get_height_matches_raw_cell() {
        let f = fixture();
        let q = f.query();
        let (cx, cz) = f.grid.layout().cell_of(37.0, -211.0);
        assert_eq!(q.get_height(37.0, -211.0).unwrap(), f.grid.raw_height(cx, cz).unwrap());
    }

    #[test]
    fn test_interpolated_equals_cell_value_at_centres() {
        let f = fixture();
        let q = f.query();
        let layout = *f.grid.layout();
        for &(cx, cz) in &[(0, 0), (17, 93), (100, 100), (199, 199), (199, 0)] {
            let (x, z) = layout.cell_center(cx, cz);
            let exact = f.grid.raw_height(cx, cz).unwrap();
            assert_eq!(q.get_height_interpolated(x, z).unwrap().to_bits(), exact.to_bits());
            assert_eq!(q.get_height(x, z).unwrap().to_bits(), exact.to_bits());
        }
    }

    #[test]
    fn test_interpolation_between_centres() {
        let f = flat_fixture();
        let q = f.query();
        let layout = *f.grid.layout();
        let (x0, z0) = layout.cell_center(4, 4);
        let a = f.grid.raw_height(4, 4).unwrap();
        let b = f.grid.raw_height(4, 5).unwrap();
        let mid = q.get_height_interpolated(x0, z0 + 2.0).unwrap();
        assert!((mid - (a + b) * 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_snap_to_terrain() {
        let f = fixture();
        let q = f.query();
        let pos = WorldPos::new(12.0, 999.0, 40.0);
        let snapped = q.snap_to_terrain(pos, 1.5).unwrap();
        assert_eq!(snapped.x, 12.0);
        assert_eq!(snapped.z, 40.0);
        assert_eq!(snapped.y, q.get_height(12.0, 40.0).unwrap() + 1.5);
    }

    #[test]
    fn test_slope_flat_and_ramp() {
        let f = flat_fixture();
        let q = f.query();
        assert!(q.get_slope_angle(0.0, -18.0).unwrap() < 1e-3);
        // 20 units of rise across the 16-unit blend band
        let ramp = q.get_slope_angle(0.0, 0.0).unwrap();
        assert!(ramp > 30.0 && ramp < 89.0, "ramp slope {}", ramp);
    }

    #[test]
    fn test_zone_and_material() {
        let f = fixture();
        let q = f.query();
        assert_eq!(q.get_zone(0.0, -300.0).unwrap(), Zone::Ocean);
        assert_eq!(q.get_zone(0.0, 300.0).unwrap(), Zone::Mountains);
        assert_eq!(q.get_zone(0.0, -9_999.0).unwrap(), Zone::Ocean);
        assert!(q.is_underwater(0.0, -300.0).unwrap());
        assert!(!q.is_underwater(0.0, 300.0).unwrap());
        assert_eq!(q.get_material(0.0, -300.0).unwrap(), Material::Sand);
    }

    #[test]
    fn test_material_follows_flattened_height() {
        let f = fixture();
        let registry = crate::flatten::FlattenRegistry::new(8.0);
        registry
            .flatten_area(&f.grid, 0.0, -300.0, 30.0, Some(400.0))
            .unwrap();
        assert_eq!(f.query().get_material(0.0, -300.0).unwrap(), Material::Snow);
        assert!(!f.query().is_underwater(0.0, -300.0).unwrap());
    }

    #[test]
    fn test_validate_alignment() {
        let f = fixture();
        let q = f.query();
        let h = q.get_height_interpolated(10.0, 10.0).unwrap();
        assert!(q.validate_alignment(10.0, 10.0, h + 0.05, 0.1).unwrap());
        assert!(!q.validate_alignment(10.0, 10.0, h + 5.0, 0.1).unwrap());
    }

    #[test]
    fn test_validate_alignment_with_probe() {
        let f = fixture();
        let q = f.query();
        let grid = &f.grid;
        let classifier = &f.classifier;
        let config = &f.config.query;
        let probe = |x: f32, z: f32| {
            if x > 100.0 {
                return None;
            }
            let h = TerrainQuery::new(grid, classifier, config)
                .get_height_interpolated(x, z)
                .ok()?;
            Some(if z > 200.0 { h + 3.0 } else { h })
        };

        let points = [(0.0, 0.0), (50.0, -50.0), (150.0, 0.0), (0.0, 250.0)];
        let report = q.validate_alignment_with(&probe, &points, 0.5).unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].z, 250.0);
        assert!((report.max_error - 3.0).abs() < 1e-3);
        assert!(!report.is_aligned());
    }

    #[test]
    fn test_zone_continuity() {
        let f = fixture();
        let q = f.query();
        let report = q.check_zone_continuity(0).unwrap();
        assert_eq!(report.lower, Zone::Ocean);
        assert_eq!(report.upper, Zone::Valley);
        assert_eq!(report.boundary, -100.0);
        assert!(report.cells_checked > 0);
        assert!(report.is_continuous(), "step {} at {:?}", report.max_step, report.worst_at);

        assert!(matches!(
            q.check_zone_continuity(2),
            Err(TerrainError::UnknownBoundary { index: 2, count: 2 })
        ));
    }

    proptest! {
        #[test]
        fn prop_centre_queries_agree_with_cell(cx in 0usize..200, cz in 0usize..200) {
            let f = shared_fixture();
            let q = f.query();
            let layout = *f.grid.layout();
            let (x, z) = layout.cell_center(cx, cz);
            let exact = f.grid.raw_height(cx, cz).unwrap();
            prop_assert_eq!(layout.cell_of(x, z), (cx, cz));
            prop_assert_eq!(q.get_height(x, z).unwrap().to_bits(), exact.to_bits());
            prop_assert_eq!(q.get_height_interpolated(x, z).unwrap().to_bits(), exact.to_bits());
        }

        #[test]
        fn prop_out_of_bounds_clamps(x in -5000.0f32..5000.0, z in -5000.0f32..5000.0) {
            let f = flat_fixture();
            let q = f.query();
            let (cx, cz) = f.grid.layout().clamp_world(x, z);
            prop_assert_eq!(q.get_height(x, z).unwrap(), q.get_height(cx, cz).unwrap());
            prop_assert_eq!(q.get_zone(x, z).unwrap(), q.get_zone(cx, cz).unwrap());
        }

        #[test]
        fn prop_interpolated_bounded_by_neighbours(x in -20.0f32..20.0, z in -20.0f32..20.0) {
            let f = flat_fixture();
            let q = f.query();
            let h = q.get_height_interpolated(x, z).unwrap();
            prop_assert!(h >= -1e-3 && h <= 20.0 + 1e-3);
        }
    }
}
