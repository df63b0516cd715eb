use glam::Vec2;

use crate::{math::Vec2Ext, simd::KernelVariant, SpringEndpoints};

/// Computes length and normalized direction (A towards B) of springs
/// `start..end`, writing them at the same indices of the output buffers.
///
/// Zero-length springs get a zero direction. The vector variants take a full
/// square root and divide, so they stay finite down to subnormal squared
/// lengths and agree with the portable one to 1e-3.
pub fn calculate_spring_vectors(
    start: usize,
    end: usize,
    positions: &[Vec2],
    endpoints: &[SpringEndpoints],
    out_lengths: &mut [f32],
    out_directions: &mut [Vec2],
) {
    calculate_spring_vectors_with(
        crate::simd::selected(),
        start,
        end,
        positions,
        endpoints,
        out_lengths,
        out_directions,
    )
}

pub(crate) fn calculate_spring_vectors_with(
    variant: KernelVariant,
    start: usize,
    end: usize,
    positions: &[Vec2],
    endpoints: &[SpringEndpoints],
    out_lengths: &mut [f32],
    out_directions: &mut [Vec2],
) {
    debug_assert!(start <= end);
    debug_assert!(end <= endpoints.len());
    debug_assert!(end <= out_lengths.len() && end <= out_directions.len());

    match variant {
        #[cfg(target_arch = "x86_64")]
        KernelVariant::Sse => unsafe {
            calculate_spring_vectors_sse(start, end, positions, endpoints, out_lengths, out_directions)
        },
        #[cfg(target_arch = "aarch64")]
        KernelVariant::Neon => unsafe {
            calculate_spring_vectors_neon(start, end, positions, endpoints, out_lengths, out_directions)
        },
        _ => calculate_spring_vectors_portable(
            start,
            end,
            positions,
            endpoints,
            out_lengths,
            out_directions,
        ),
    }
}

pub fn calculate_spring_vectors_portable(
    start: usize,
    end: usize,
    positions: &[Vec2],
    endpoints: &[SpringEndpoints],
    out_lengths: &mut [f32],
    out_directions: &mut [Vec2],
) {
    for s in start..end {
        let SpringEndpoints { point_a, point_b } = endpoints[s];
        let dis = positions[point_b as usize] - positions[point_a as usize];
        let length = dis.length();
        out_lengths[s] = length;
        out_directions[s] = dis.normalise_with_length(length);
    }
}

#[inline]
fn endpoint_indices(endpoints: &[SpringEndpoints], s: usize) -> ([usize; 4], [usize; 4]) {
    let e = &endpoints[s..s + 4];
    (
        [
            e[0].point_a as usize,
            e[1].point_a as usize,
            e[2].point_a as usize,
            e[3].point_a as usize,
        ],
        [
            e[0].point_b as usize,
            e[1].point_b as usize,
            e[2].point_b as usize,
            e[3].point_b as usize,
        ],
    )
}

/// # Safety
///
/// The host must support SSE2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
pub unsafe fn calculate_spring_vectors_sse(
    start: usize,
    end: usize,
    positions: &[Vec2],
    endpoints: &[SpringEndpoints],
    out_lengths: &mut [f32],
    out_directions: &mut [Vec2],
) {
    use std::arch::x86_64::*;

    use crate::simd::sse;

    let mut s = start;
    while s + 4 <= end {
        let (a, b) = endpoint_indices(endpoints, s);
        let (ax, ay) = sse::gather_xy4(positions, a);
        let (bx, by) = sse::gather_xy4(positions, b);

        let dx = _mm_sub_ps(bx, ax);
        let dy = _mm_sub_ps(by, ay);
        let square_length = _mm_add_ps(_mm_mul_ps(dx, dx), _mm_mul_ps(dy, dy));

        let (length, reciprocal) = sse::length_and_reciprocal(square_length);

        _mm_storeu_ps(out_lengths[s..s + 4].as_mut_ptr(), length);
        sse::store_xy4(
            &mut out_directions[s..s + 4],
            _mm_mul_ps(dx, reciprocal),
            _mm_mul_ps(dy, reciprocal),
        );

        s += 4;
    }

    calculate_spring_vectors_portable(s, end, positions, endpoints, out_lengths, out_directions);
}

/// # Safety
///
/// The host must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn calculate_spring_vectors_neon(
    start: usize,
    end: usize,
    positions: &[Vec2],
    endpoints: &[SpringEndpoints],
    out_lengths: &mut [f32],
    out_directions: &mut [Vec2],
) {
    use std::arch::aarch64::*;

    use crate::simd::neon;

    let mut s = start;
    while s + 4 <= end {
        let (a, b) = endpoint_indices(endpoints, s);
        let (ax, ay) = neon::gather_xy4(positions, a);
        let (bx, by) = neon::gather_xy4(positions, b);

        let dx = vsubq_f32(bx, ax);
        let dy = vsubq_f32(by, ay);
        let square_length = vaddq_f32(vmulq_f32(dx, dx), vmulq_f32(dy, dy));

        let (length, reciprocal) = neon::length_and_reciprocal(square_length);

        vst1q_f32(out_lengths[s..s + 4].as_mut_ptr(), length);
        neon::store_xy4(
            &mut out_directions[s..s + 4],
            vmulq_f32(dx, reciprocal),
            vmulq_f32(dy, reciprocal),
        );

        s += 4;
    }

    calculate_spring_vectors_portable(s, end, positions, endpoints, out_lengths, out_directions);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn fixture() -> (Vec<Vec2>, Vec<SpringEndpoints>) {
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 4.0),
            Vec2::new(-1.5, 2.25),
            Vec2::new(10.0, -7.0),
            Vec2::new(0.001, 0.002),
            Vec2::new(3.0, 4.0),
        ];
        let endpoints = vec![
            SpringEndpoints::new(0, 1),
            SpringEndpoints::new(1, 2),
            SpringEndpoints::new(2, 3),
            SpringEndpoints::new(1, 5), // zero length
            SpringEndpoints::new(0, 4),
            SpringEndpoints::new(3, 0),
            SpringEndpoints::new(4, 2),
            SpringEndpoints::new(5, 3),
            SpringEndpoints::new(2, 0),
            SpringEndpoints::new(3, 1),
        ];
        (positions, endpoints)
    }

    fn run(variant: KernelVariant, start: usize, end: usize) -> (Vec<f32>, Vec<Vec2>) {
        let (positions, endpoints) = fixture();
        let mut lengths = vec![-1.0; endpoints.len()];
        let mut directions = vec![Vec2::splat(-1.0); endpoints.len()];
        calculate_spring_vectors_with(
            variant,
            start,
            end,
            &positions,
            &endpoints,
            &mut lengths,
            &mut directions,
        );
        (lengths, directions)
    }

    #[test]
    fn test_lengths_and_directions_match_geometry() {
        let (positions, endpoints) = fixture();
        for variant in KernelVariant::available() {
            let (lengths, directions) = run(variant, 0, endpoints.len());
            for (s, e) in endpoints.iter().enumerate() {
                let dis = positions[e.point_b as usize] - positions[e.point_a as usize];
                if dis == Vec2::ZERO {
                    assert_eq!(lengths[s], 0.0, "{variant}");
                    assert_eq!(directions[s], Vec2::ZERO, "{variant}");
                    continue;
                }
                let expected = dis.normalize();
                assert_relative_eq!(lengths[s], dis.length(), max_relative = 1e-3);
                assert_relative_eq!(directions[s].x, expected.x, max_relative = 1e-3, epsilon = 1e-6);
                assert_relative_eq!(directions[s].y, expected.y, max_relative = 1e-3, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_unit_example() {
        for variant in KernelVariant::available() {
            let (lengths, directions) = run(variant, 0, 4);
            assert_relative_eq!(lengths[0], 5.0, max_relative = 1e-3);
            assert_relative_eq!(directions[0].x, 0.6, max_relative = 1e-3);
            assert_relative_eq!(directions[0].y, 0.8, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_outside_range_untouched() {
        for variant in KernelVariant::available() {
            let (lengths, directions) = run(variant, 2, 7);
            for s in (0..2).chain(7..10) {
                assert_eq!(lengths[s], -1.0);
                assert_eq!(directions[s], Vec2::splat(-1.0));
            }
            assert!(lengths[2..7].iter().all(|l| *l >= 0.0));
        }
    }

    #[test]
    fn test_variants_agree_with_portable() {
        let (_, endpoints) = fixture();
        let (reference_lengths, reference_directions) =
            run(KernelVariant::Portable, 0, endpoints.len());
        for variant in KernelVariant::available() {
            let (lengths, directions) = run(variant, 0, endpoints.len());
            for s in 0..endpoints.len() {
                assert_relative_eq!(lengths[s], reference_lengths[s], max_relative = 1e-3);
                assert_relative_eq!(
                    directions[s].x,
                    reference_directions[s].x,
                    max_relative = 1e-3,
                    epsilon = 1e-6
                );
                assert_relative_eq!(
                    directions[s].y,
                    reference_directions[s].y,
                    max_relative = 1e-3,
                    epsilon = 1e-6
                );
            }
        }
    }

    #[test]
    fn test_nearly_coincident_endpoints_stay_finite() {
        // Squared lengths here are subnormal.
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1e-20, 0.0),
            Vec2::new(0.0, 1e-21),
            Vec2::new(3e-20, 4e-20),
        ];
        let endpoints = vec![
            SpringEndpoints::new(0, 1),
            SpringEndpoints::new(0, 2),
            SpringEndpoints::new(0, 3),
            SpringEndpoints::new(1, 2),
        ];
        let calculate = |variant| {
            let mut lengths = vec![-1.0; endpoints.len()];
            let mut directions = vec![Vec2::ZERO; endpoints.len()];
            calculate_spring_vectors_with(
                variant,
                0,
                endpoints.len(),
                &positions,
                &endpoints,
                &mut lengths,
                &mut directions,
            );
            (lengths, directions)
        };

        let (reference_lengths, reference_directions) = calculate(KernelVariant::Portable);
        for variant in KernelVariant::available() {
            let (lengths, directions) = calculate(variant);
            for s in 0..endpoints.len() {
                assert!(lengths[s].is_finite() && lengths[s] > 0.0, "{variant} {s}");
                assert!(directions[s].is_finite(), "{variant} {s}");
                assert_relative_eq!(lengths[s], reference_lengths[s], max_relative = 1e-3);
                assert_relative_eq!(
                    directions[s].x,
                    reference_directions[s].x,
                    max_relative = 1e-3,
                    epsilon = 1e-3
                );
                assert_relative_eq!(
                    directions[s].y,
                    reference_directions[s].y,
                    max_relative = 1e-3,
                    epsilon = 1e-3
                );
            }
        }
    }
}
