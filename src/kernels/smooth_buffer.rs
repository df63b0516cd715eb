use crate::simd::KernelVariant;

/// Adds a triangular moving average of `in_buffer` into `out_buffer`.
///
/// `in_buffer` carries `SMOOTHING_SIZE / 2` padding samples (normally zeroes)
/// on each side, so sample `i` of the body is `in_buffer[SMOOTHING_SIZE / 2 + i]`
/// and `in_buffer.len() == out_buffer.len() + 2 * (SMOOTHING_SIZE / 2)`.
/// Offset `l` from the centre weighs `SMOOTHING_SIZE / 2 + 1 - |l|`, and the
/// weighted sum is scaled by `1 / SMOOTHING_SIZE²` (`[1, 2, 3, 2, 1] / 25` for 5).
pub fn smooth_buffer_and_add<const SMOOTHING_SIZE: usize>(in_buffer: &[f32], out_buffer: &mut [f32]) {
    smooth_buffer_and_add_with::<SMOOTHING_SIZE>(crate::simd::selected(), in_buffer, out_buffer)
}

pub(crate) fn smooth_buffer_and_add_with<const SMOOTHING_SIZE: usize>(
    variant: KernelVariant,
    in_buffer: &[f32],
    out_buffer: &mut [f32],
) {
    const { assert!(SMOOTHING_SIZE % 2 == 1, "smoothing window must be odd") };
    debug_assert_eq!(in_buffer.len(), out_buffer.len() + 2 * (SMOOTHING_SIZE / 2));

    match variant {
        #[cfg(target_arch = "x86_64")]
        KernelVariant::Sse => unsafe {
            smooth_buffer_and_add_sse::<SMOOTHING_SIZE>(in_buffer, out_buffer)
        },
        #[cfg(target_arch = "aarch64")]
        KernelVariant::Neon => unsafe {
            smooth_buffer_and_add_neon::<SMOOTHING_SIZE>(in_buffer, out_buffer)
        },
        _ => smooth_range_portable::<SMOOTHING_SIZE>(in_buffer, out_buffer, 0),
    }
}

#[inline]
const fn lateral_weight<const SMOOTHING_SIZE: usize>(l: usize) -> f32 {
    (SMOOTHING_SIZE / 2 + 1 - l) as f32
}

#[inline]
fn scaling<const SMOOTHING_SIZE: usize>() -> f32 {
    (1.0 / SMOOTHING_SIZE as f32) * (1.0 / SMOOTHING_SIZE as f32)
}

fn smooth_range_portable<const SMOOTHING_SIZE: usize>(
    in_buffer: &[f32],
    out_buffer: &mut [f32],
    start: usize,
) {
    let half = SMOOTHING_SIZE / 2;
    let scaling = scaling::<SMOOTHING_SIZE>();

    for i in start..out_buffer.len() {
        let c = half + i;
        let mut accumulated = in_buffer[c] * lateral_weight::<SMOOTHING_SIZE>(0);
        for l in 1..=half {
            accumulated += (in_buffer[c - l] + in_buffer[c + l]) * lateral_weight::<SMOOTHING_SIZE>(l);
        }
        out_buffer[i] += accumulated * scaling;
    }
}

/// # Safety
///
/// The host must support SSE2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
pub unsafe fn smooth_buffer_and_add_sse<const SMOOTHING_SIZE: usize>(
    in_buffer: &[f32],
    out_buffer: &mut [f32],
) {
    use std::arch::x86_64::*;

    let half = SMOOTHING_SIZE / 2;
    let central_weight = _mm_set1_ps(lateral_weight::<SMOOTHING_SIZE>(0));
    let scaling = _mm_set1_ps(scaling::<SMOOTHING_SIZE>());

    let mut i = 0;
    while i + 4 <= out_buffer.len() {
        let c = half + i;
        let mut accumulated = _mm_mul_ps(_mm_loadu_ps(in_buffer[c..c + 4].as_ptr()), central_weight);
        for l in 1..=half {
            accumulated = _mm_add_ps(
                accumulated,
                _mm_mul_ps(
                    _mm_add_ps(
                        _mm_loadu_ps(in_buffer[c - l..c - l + 4].as_ptr()),
                        _mm_loadu_ps(in_buffer[c + l..c + l + 4].as_ptr()),
                    ),
                    _mm_set1_ps(lateral_weight::<SMOOTHING_SIZE>(l)),
                ),
            );
        }

        let out = out_buffer[i..i + 4].as_mut_ptr();
        _mm_storeu_ps(out, _mm_add_ps(_mm_loadu_ps(out), _mm_mul_ps(accumulated, scaling)));
        i += 4;
    }

    smooth_range_portable::<SMOOTHING_SIZE>(in_buffer, out_buffer, i);
}

/// # Safety
///
/// The host must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn smooth_buffer_and_add_neon<const SMOOTHING_SIZE: usize>(
    in_buffer: &[f32],
    out_buffer: &mut [f32],
) {
    use std::arch::aarch64::*;

    let half = SMOOTHING_SIZE / 2;
    let central_weight = vdupq_n_f32(lateral_weight::<SMOOTHING_SIZE>(0));
    let scaling = vdupq_n_f32(scaling::<SMOOTHING_SIZE>());

    let mut i = 0;
    while i + 4 <= out_buffer.len() {
        let c = half + i;
        let mut accumulated = vmulq_f32(vld1q_f32(in_buffer[c..c + 4].as_ptr()), central_weight);
        for l in 1..=half {
            accumulated = vaddq_f32(
                accumulated,
                vmulq_f32(
                    vaddq_f32(
                        vld1q_f32(in_buffer[c - l..c - l + 4].as_ptr()),
                        vld1q_f32(in_buffer[c + l..c + l + 4].as_ptr()),
                    ),
                    vdupq_n_f32(lateral_weight::<SMOOTHING_SIZE>(l)),
                ),
            );
        }

        let out = out_buffer[i..i + 4].as_mut_ptr();
        vst1q_f32(out, vaddq_f32(vld1q_f32(out), vmulq_f32(accumulated, scaling)));
        i += 4;
    }

    smooth_range_portable::<SMOOTHING_SIZE>(in_buffer, out_buffer, i);
}
