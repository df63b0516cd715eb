use glam::Vec2;

use crate::{simd::KernelVariant, Aabb, WeightedAabb};

/// Folds the boxes weighing more than `min_weight` into one box biased towards
/// the heavier ones.
///
/// The result is centred on the weighted centroid of the box centres; each box
/// then contributes its offsets from that centroid scaled by
/// `weight / max_weight`, and the outer envelope of those offsets (which
/// always includes the centroid itself) gives the extent.
///
/// Returns `None` when no box survives the threshold.
pub fn make_aabb_weighted_union(aabbs: &[WeightedAabb], min_weight: f32) -> Option<Aabb> {
    make_aabb_weighted_union_with(crate::simd::selected(), aabbs, min_weight)
}

pub(crate) fn make_aabb_weighted_union_with(
    variant: KernelVariant,
    aabbs: &[WeightedAabb],
    min_weight: f32,
) -> Option<Aabb> {
    match variant {
        #[cfg(target_arch = "x86_64")]
        KernelVariant::Sse => unsafe { make_aabb_weighted_union_sse(aabbs, min_weight) },
        #[cfg(target_arch = "aarch64")]
        KernelVariant::Neon => unsafe { make_aabb_weighted_union_neon(aabbs, min_weight) },
        _ => make_aabb_weighted_union_portable(aabbs, min_weight),
    }
}

/// Sum and maximum of the surviving weights, or `None` if nothing survives.
#[inline]
fn surviving_weights(aabbs: &[WeightedAabb], min_weight: f32) -> Option<(f32, f32)> {
    let (sum, max) = aabbs
        .iter()
        .filter(|a| a.weight > min_weight)
        .fold((0.0f32, 0.0f32), |(sum, max), a| (sum + a.weight, max.max(a.weight)));

    (sum != 0.0).then_some((sum, max))
}

pub fn make_aabb_weighted_union_portable(aabbs: &[WeightedAabb], min_weight: f32) -> Option<Aabb> {
    let (weights_sum, max_weight) = surviving_weights(aabbs, min_weight)?;
    let survivors = || aabbs.iter().filter(|a| a.weight > min_weight);

    let mut centers_sum = Vec2::ZERO;
    for a in survivors() {
        centers_sum += (a.aabb.top_right + a.aabb.bottom_left) * a.weight;
    }
    let center = centers_sum * 0.5 / weights_sum;

    let max_weight_reciprocal = 1.0 / max_weight;
    let mut max_offset = Vec2::ZERO;
    let mut min_offset = Vec2::ZERO;
    for a in survivors() {
        let w = a.weight * max_weight_reciprocal;
        max_offset = max_offset.max((a.aabb.top_right - center) * w);
        min_offset = min_offset.min((a.aabb.bottom_left - center) * w);
    }

    Some(Aabb::new(center + min_offset, center + max_offset))
}

/// Lanes hold `[right, top, left, bottom]`.
///
/// # Safety
///
/// The host must support SSE2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
pub unsafe fn make_aabb_weighted_union_sse(aabbs: &[WeightedAabb], min_weight: f32) -> Option<Aabb> {
    use std::arch::x86_64::*;

    use crate::simd::sse;

    // [r t l b] -> [l b r t]
    const SWAP_HALVES: i32 = 0b01_00_11_10;
    // Lanes 0,1 from the first operand, lanes 2,3 from the second.
    const LOW_FROM_FIRST_HIGH_FROM_SECOND: i32 = 0b11_10_01_00;

    #[inline(always)]
    unsafe fn rtlb(a: &Aabb) -> __m128 {
        _mm_setr_ps(a.top_right.x, a.top_right.y, a.bottom_left.x, a.bottom_left.y)
    }

    let (weights_sum, max_weight) = surviving_weights(aabbs, min_weight)?;

    let mut centers_sum = _mm_setzero_ps(); // cx cy cx cy
    for a in aabbs.iter().filter(|a| a.weight > min_weight) {
        let corners = rtlb(&a.aabb);
        let swapped = _mm_shuffle_ps::<SWAP_HALVES>(corners, corners);
        centers_sum = _mm_add_ps(
            centers_sum,
            _mm_mul_ps(_mm_add_ps(corners, swapped), _mm_set1_ps(a.weight)),
        );
    }
    let center = _mm_div_ps(
        _mm_mul_ps(centers_sum, _mm_set1_ps(0.5)),
        _mm_set1_ps(weights_sum),
    );

    let max_weight_reciprocal = 1.0 / max_weight;
    let mut offsets_max = _mm_setzero_ps();
    let mut offsets_min = _mm_setzero_ps();
    for a in aabbs.iter().filter(|a| a.weight > min_weight) {
        let offsets = _mm_mul_ps(
            _mm_sub_ps(rtlb(&a.aabb), center),
            _mm_set1_ps(a.weight * max_weight_reciprocal),
        );
        offsets_max = _mm_max_ps(offsets_max, offsets);
        offsets_min = _mm_min_ps(offsets_min, offsets);
    }

    // right/top from the maxima, left/bottom from the minima
    let result = sse::to_array(_mm_shuffle_ps::<LOW_FROM_FIRST_HIGH_FROM_SECOND>(
        _mm_add_ps(center, offsets_max),
        _mm_add_ps(center, offsets_min),
    ));

    Some(Aabb::new(
        Vec2::new(result[2], result[3]),
        Vec2::new(result[0], result[1]),
    ))
}

/// Lanes hold `[right, top, left, bottom]`.
///
/// # Safety
///
/// The host must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn make_aabb_weighted_union_neon(aabbs: &[WeightedAabb], min_weight: f32) -> Option<Aabb> {
    use std::arch::aarch64::*;

    use crate::simd::neon;

    #[inline(always)]
    unsafe fn rtlb(a: &Aabb) -> float32x4_t {
        let lanes = [a.top_right.x, a.top_right.y, a.bottom_left.x, a.bottom_left.y];
        vld1q_f32(lanes.as_ptr())
    }

    let (weights_sum, max_weight) = surviving_weights(aabbs, min_weight)?;

    let mut centers_sum = vdupq_n_f32(0.0);
    for a in aabbs.iter().filter(|a| a.weight > min_weight) {
        let corners = rtlb(&a.aabb);
        let swapped = vextq_f32::<2>(corners, corners);
        centers_sum = vaddq_f32(
            centers_sum,
            vmulq_f32(vaddq_f32(corners, swapped), vdupq_n_f32(a.weight)),
        );
    }
    let center = vdivq_f32(
        vmulq_f32(centers_sum, vdupq_n_f32(0.5)),
        vdupq_n_f32(weights_sum),
    );

    let max_weight_reciprocal = 1.0 / max_weight;
    let mut offsets_max = vdupq_n_f32(0.0);
    let mut offsets_min = vdupq_n_f32(0.0);
    for a in aabbs.iter().filter(|a| a.weight > min_weight) {
        let offsets = vmulq_f32(
            vsubq_f32(rtlb(&a.aabb), center),
            vdupq_n_f32(a.weight * max_weight_reciprocal),
        );
        offsets_max = vmaxq_f32(offsets_max, offsets);
        offsets_min = vminq_f32(offsets_min, offsets);
    }

    let result = neon::to_array(vcombine_f32(
        vget_low_f32(vaddq_f32(center, offsets_max)),
        vget_high_f32(vaddq_f32(center, offsets_min)),
    ));

    Some(Aabb::new(
        Vec2::new(result[2], result[3]),
        Vec2::new(result[0], result[1]),
    ))
}
