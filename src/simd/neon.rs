//! Lane helpers for the NEON kernels.

use std::arch::aarch64::*;

use glam::Vec2;

/// Loads four consecutive points and splits them into x and y lanes.
#[inline]
pub(crate) unsafe fn load_xy4(v: &[Vec2]) -> (float32x4_t, float32x4_t) {
    let floats: &[f32] = bytemuck::cast_slice(&v[..4]);
    let xy = vld2q_f32(floats.as_ptr());
    (xy.0, xy.1)
}

/// Interleaves x and y lanes back into four consecutive points.
#[inline]
pub(crate) unsafe fn store_xy4(v: &mut [Vec2], xs: float32x4_t, ys: float32x4_t) {
    let floats: &mut [f32] = bytemuck::cast_slice_mut(&mut v[..4]);
    vst2q_f32(floats.as_mut_ptr(), float32x4x2_t(xs, ys));
}

/// Gathers four arbitrary points into x and y lanes.
#[inline]
pub(crate) unsafe fn gather_xy4(v: &[Vec2], indices: [usize; 4]) -> (float32x4_t, float32x4_t) {
    let (p0, p1, p2, p3) = (v[indices[0]], v[indices[1]], v[indices[2]], v[indices[3]]);
    let xs = [p0.x, p1.x, p2.x, p3.x];
    let ys = [p0.y, p1.y, p2.y, p3.y];
    (vld1q_f32(xs.as_ptr()), vld1q_f32(ys.as_ptr()))
}

#[inline]
pub(crate) unsafe fn to_array(v: float32x4_t) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    vst1q_f32(out.as_mut_ptr(), v);
    out
}

#[inline]
unsafe fn zero_where_zero(value: float32x4_t, x: float32x4_t) -> float32x4_t {
    let is_zero = vceqq_f32(x, vdupq_n_f32(0.0));
    vreinterpretq_f32_u32(vbicq_u32(vreinterpretq_u32_f32(value), is_zero))
}

/// `sqrt(x)` and `1 / sqrt(x)`, with the reciprocal forced to zero where `x == 0`.
#[inline]
pub(crate) unsafe fn length_and_reciprocal(square_length: float32x4_t) -> (float32x4_t, float32x4_t) {
    let length = vsqrtq_f32(square_length);
    let reciprocal = vdivq_f32(vdupq_n_f32(1.0), length);
    (length, zero_where_zero(reciprocal, square_length))
}
