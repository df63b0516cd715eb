use glam::Vec4;

use crate::simd::KernelVariant;

/// Linear interpolation `a + (b - a) * weight` across four components.
///
/// Evaluated as `a * (1 - weight) + b * weight`, which returns `a` and `b`
/// exactly at weights 0 and 1. `weight` is not clamped.
#[inline]
pub fn mix_vec4f(a: Vec4, b: Vec4, weight: f32) -> Vec4 {
    mix_vec4f_with(crate::simd::selected(), a, b, weight)
}

#[inline]
pub(crate) fn mix_vec4f_with(variant: KernelVariant, a: Vec4, b: Vec4, weight: f32) -> Vec4 {
    match variant {
        #[cfg(target_arch = "x86_64")]
        KernelVariant::Sse => unsafe { mix_vec4f_sse(a, b, weight) },
        #[cfg(target_arch = "aarch64")]
        KernelVariant::Neon => unsafe { mix_vec4f_neon(a, b, weight) },
        _ => mix_vec4f_portable(a, b, weight),
    }
}

#[inline]
pub fn mix_vec4f_portable(a: Vec4, b: Vec4, weight: f32) -> Vec4 {
    a * (1.0 - weight) + b * weight
}

/// # Safety
///
/// The host must support SSE2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
pub unsafe fn mix_vec4f_sse(a: Vec4, b: Vec4, weight: f32) -> Vec4 {
    use std::arch::x86_64::*;

    use crate::simd::sse;

    let (a, b) = (a.to_array(), b.to_array());
    let mixed = _mm_add_ps(
        _mm_mul_ps(_mm_loadu_ps(a.as_ptr()), _mm_set1_ps(1.0 - weight)),
        _mm_mul_ps(_mm_loadu_ps(b.as_ptr()), _mm_set1_ps(weight)),
    );
    Vec4::from_array(sse::to_array(mixed))
}

/// # Safety
///
/// The host must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn mix_vec4f_neon(a: Vec4, b: Vec4, weight: f32) -> Vec4 {
    use std::arch::aarch64::*;

    use crate::simd::neon;

    let (a, b) = (a.to_array(), b.to_array());
    let mixed = vaddq_f32(
        vmulq_n_f32(vld1q_f32(a.as_ptr()), 1.0 - weight),
        vmulq_n_f32(vld1q_f32(b.as_ptr()), weight),
    );
    Vec4::from_array(neon::to_array(mixed))
}
