/// A row-major 2D grid, indexed `(x, y)` with `y` selecting the row.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T> Tilemap<T> {
    /// Wrap existing row-major data; `None` if the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self { width, height, data })
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    /// Row-major backing storage.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl Tilemap<f32> {
    /// (min, max) over all cells, or `None` for an empty map.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        if self.data.is_empty() {
            return None;
        }
        let mut min_h = f32::MAX;
        let mut max_h = f32::MIN;
        for &h in &self.data {
            if h < min_h { min_h = h; }
            if h > max_h { max_h = h; }
        }
        Some((min_h, max_h))
    }
}

/// Bilinear blend of four corners. With `fx == 0` and `fy == 0` the result
/// is `v00` bit-for-bit.
pub fn bilinear(v00: f32, v10: f32, v01: f32, v11: f32, fx: f32, fy: f32) -> f32 {
    let top = if fx == 0.0 { v00 } else { v00 + (v10 - v00) * fx };
    let bottom = if fx == 0.0 { v01 } else { v01 + (v11 - v01) * fx };
    if fy == 0.0 {
        top
    } else {
        top + (bottom - top) * fy
    }
}
