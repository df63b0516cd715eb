use glam::Vec2;

use crate::{simd::KernelVariant, Lamps, PlaneId};

/// Lights points `start..end` with the brightest lamp sharing their plane.
///
/// A lamp on the point's plane contributes
/// `max(0, distance_coeff * (spread_max_distance - |point - lamp|))`; the
/// point keeps the maximum contribution, or zero if no lamp is eligible.
/// `out_light[i]` receives the light of point `start + i`.
pub fn diffuse_light(
    start: usize,
    end: usize,
    point_positions: &[Vec2],
    point_planes: &[PlaneId],
    lamps: &Lamps,
    out_light: &mut [f32],
) {
    diffuse_light_with(
        crate::simd::selected(),
        start,
        end,
        point_positions,
        point_planes,
        lamps,
        out_light,
    )
}

pub(crate) fn diffuse_light_with(
    variant: KernelVariant,
    start: usize,
    end: usize,
    point_positions: &[Vec2],
    point_planes: &[PlaneId],
    lamps: &Lamps,
    out_light: &mut [f32],
) {
    debug_assert!(start <= end);
    debug_assert!(end <= point_positions.len() && end <= point_planes.len());
    debug_assert!(out_light.len() >= end - start);

    match variant {
        #[cfg(target_arch = "x86_64")]
        KernelVariant::Sse => unsafe {
            diffuse_light_sse(start, end, point_positions, point_planes, lamps, out_light)
        },
        #[cfg(target_arch = "aarch64")]
        KernelVariant::Neon => unsafe {
            diffuse_light_neon(start, end, point_positions, point_planes, lamps, out_light)
        },
        _ => diffuse_light_portable(start, end, point_positions, point_planes, lamps, out_light),
    }
}

pub fn diffuse_light_portable(
    start: usize,
    end: usize,
    point_positions: &[Vec2],
    point_planes: &[PlaneId],
    lamps: &Lamps,
    out_light: &mut [f32],
) {
    for p in start..end {
        let mut light = 0.0f32;
        for l in 0..lamps.len() {
            if lamps.plane_ids()[l] != point_planes[p] {
                continue;
            }
            let distance = (point_positions[p] - lamps.positions()[l]).length();
            let contribution =
                lamps.distance_coeffs()[l] * (lamps.spread_max_distances()[l] - distance);
            light = light.max(contribution.max(0.0));
        }
        out_light[p - start] = light;
    }
}

/// # Safety
///
/// The host must support SSE2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
pub unsafe fn diffuse_light_sse(
    start: usize,
    end: usize,
    point_positions: &[Vec2],
    point_planes: &[PlaneId],
    lamps: &Lamps,
    out_light: &mut [f32],
) {
    use std::arch::x86_64::*;

    use crate::simd::sse;

    let zero = _mm_setzero_ps();

    let mut p = start;
    while p + 4 <= end {
        let (px, py) = sse::load_xy4(&point_positions[p..p + 4]);
        let planes = _mm_loadu_si128(point_planes[p..p + 4].as_ptr() as *const __m128i);

        let mut light = zero;
        for l in 0..lamps.len() {
            let lamp_position = lamps.positions()[l];
            let dx = _mm_sub_ps(px, _mm_set1_ps(lamp_position.x));
            let dy = _mm_sub_ps(py, _mm_set1_ps(lamp_position.y));
            let distance = _mm_sqrt_ps(_mm_add_ps(_mm_mul_ps(dx, dx), _mm_mul_ps(dy, dy)));

            let contribution = _mm_max_ps(
                _mm_mul_ps(
                    _mm_set1_ps(lamps.distance_coeffs()[l]),
                    _mm_sub_ps(_mm_set1_ps(lamps.spread_max_distances()[l]), distance),
                ),
                zero,
            );

            let same_plane = _mm_castsi128_ps(_mm_cmpeq_epi32(
                planes,
                _mm_set1_epi32(lamps.plane_ids()[l] as i32),
            ));
            light = _mm_max_ps(light, _mm_and_ps(contribution, same_plane));
        }

        _mm_storeu_ps(out_light[p - start..p - start + 4].as_mut_ptr(), light);
        p += 4;
    }

    diffuse_light_portable(
        p,
        end,
        point_positions,
        point_planes,
        lamps,
        &mut out_light[p - start..],
    );
}

/// # Safety
///
/// The host must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn diffuse_light_neon(
    start: usize,
    end: usize,
    point_positions: &[Vec2],
    point_planes: &[PlaneId],
    lamps: &Lamps,
    out_light: &mut [f32],
) {
    use std::arch::aarch64::*;

    use crate::simd::neon;

    let zero = vdupq_n_f32(0.0);

    let mut p = start;
    while p + 4 <= end {
        let (px, py) = neon::load_xy4(&point_positions[p..p + 4]);
        let planes = vld1q_u32(point_planes[p..p + 4].as_ptr());

        let mut light = zero;
        for l in 0..lamps.len() {
            let lamp_position = lamps.positions()[l];
            let dx = vsubq_f32(px, vdupq_n_f32(lamp_position.x));
            let dy = vsubq_f32(py, vdupq_n_f32(lamp_position.y));
            let distance = vsqrtq_f32(vaddq_f32(vmulq_f32(dx, dx), vmulq_f32(dy, dy)));

            let contribution = vmaxq_f32(
                vmulq_f32(
                    vdupq_n_f32(lamps.distance_coeffs()[l]),
                    vsubq_f32(vdupq_n_f32(lamps.spread_max_distances()[l]), distance),
                ),
                zero,
            );

            let same_plane = vceqq_u32(planes, vdupq_n_u32(lamps.plane_ids()[l]));
            light = vmaxq_f32(
                light,
                vreinterpretq_f32_u32(vandq_u32(vreinterpretq_u32_f32(contribution), same_plane)),
            );
        }

        vst1q_f32(out_light[p - start..p - start + 4].as_mut_ptr(), light);
        p += 4;
    }

    diffuse_light_portable(
        p,
        end,
        point_positions,
        point_planes,
        lamps,
        &mut out_light[p - start..],
    );
}
