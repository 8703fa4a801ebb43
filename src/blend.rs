//! Interpolation helpers shared by zone blending and flattening.
//!
//! Kept free of any grid storage so blend behaviour can be tested on its own.

/// Smooth step interpolation.
///
/// Returns 0.0 at or below `edge0`, 1.0 at or above `edge1`, and a cubic
/// Hermite ramp in between. `edge0 > edge1` gives the mirrored ramp.
pub fn smooth_step(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge0 == edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Linear interpolation written so that `t == 0.0` returns `a` bit-for-bit.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
