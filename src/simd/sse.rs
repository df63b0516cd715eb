//! Lane helpers for the SSE kernels.

use std::arch::x86_64::*;

use glam::Vec2;

// Lanes 0,2 of each operand: x0 x1 x2 x3.
const EVEN_LANES: i32 = 0b10_00_10_00;
// Lanes 1,3 of each operand: y0 y1 y2 y3.
const ODD_LANES: i32 = 0b11_01_11_01;

/// Loads four consecutive points and splits them into x and y lanes.
#[inline]
pub(crate) unsafe fn load_xy4(v: &[Vec2]) -> (__m128, __m128) {
    let floats: &[f32] = bytemuck::cast_slice(&v[..4]);
    let lo = _mm_loadu_ps(floats.as_ptr()); // x0 y0 x1 y1
    let hi = _mm_loadu_ps(floats.as_ptr().add(4)); // x2 y2 x3 y3
    (
        _mm_shuffle_ps::<EVEN_LANES>(lo, hi),
        _mm_shuffle_ps::<ODD_LANES>(lo, hi),
    )
}

/// Interleaves x and y lanes back into four consecutive points.
#[inline]
pub(crate) unsafe fn store_xy4(v: &mut [Vec2], xs: __m128, ys: __m128) {
    let floats: &mut [f32] = bytemuck::cast_slice_mut(&mut v[..4]);
    _mm_storeu_ps(floats.as_mut_ptr(), _mm_unpacklo_ps(xs, ys));
    _mm_storeu_ps(floats.as_mut_ptr().add(4), _mm_unpackhi_ps(xs, ys));
}

/// Gathers four arbitrary points into x and y lanes.
#[inline]
pub(crate) unsafe fn gather_xy4(v: &[Vec2], indices: [usize; 4]) -> (__m128, __m128) {
    let (p0, p1, p2, p3) = (v[indices[0]], v[indices[1]], v[indices[2]], v[indices[3]]);
    (
        _mm_setr_ps(p0.x, p1.x, p2.x, p3.x),
        _mm_setr_ps(p0.y, p1.y, p2.y, p3.y),
    )
}

#[inline]
pub(crate) unsafe fn to_array(v: __m128) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    _mm_storeu_ps(out.as_mut_ptr(), v);
    out
}

/// `sqrt(x)` and `1 / sqrt(x)`, with the reciprocal forced to zero where `x == 0`.
#[inline]
pub(crate) unsafe fn length_and_reciprocal(square_length: __m128) -> (__m128, __m128) {
    let length = _mm_sqrt_ps(square_length);
    let valid = _mm_cmpneq_ps(square_length, _mm_setzero_ps());
    let reciprocal = _mm_and_ps(_mm_div_ps(_mm_set1_ps(1.0), length), valid);
    (length, reciprocal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_splits_and_store_interleaves() {
        let points = [
            Vec2::new(1.0, -1.0),
            Vec2::new(2.0, -2.0),
            Vec2::new(3.0, -3.0),
            Vec2::new(4.0, -4.0),
        ];
        let mut stored = [Vec2::ZERO; 4];
        unsafe {
            let (xs, ys) = load_xy4(&points);
            assert_eq!(to_array(xs), [1.0, 2.0, 3.0, 4.0]);
            assert_eq!(to_array(ys), [-1.0, -2.0, -3.0, -4.0]);
            store_xy4(&mut stored, xs, ys);
        }
        assert_eq!(stored, points);
    }
}
