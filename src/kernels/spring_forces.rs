use glam::Vec2;

use crate::{math::Vec2Ext, simd::KernelVariant, Points, Springs};

/// Accumulates the Hooke and damper forces of springs `start..end` into one
/// partition's dynamic-force buffer.
///
/// Per spring, with `direction` pointing from A to B:
///
/// ```text
/// magnitude = (length - rest_length) * stiffness + dot(velocity_b - velocity_a, direction) * damping
/// force     = direction * magnitude
/// ```
///
/// `force` is added to A and subtracted from B, so a stretched spring pulls its
/// endpoints together. Springs inside the perfect-square prefix are processed
/// four at a time; `start` (and `end`, if it falls inside the prefix) must then
/// sit on a square boundary. The remaining springs are accumulated one by one.
pub fn apply_springs_forces(
    points: &Points,
    springs: &Springs,
    start: usize,
    end: usize,
    dynamic_force: &mut [Vec2],
) {
    apply_springs_forces_with(
        crate::simd::selected(),
        points,
        springs,
        start,
        end,
        dynamic_force,
    )
}

pub(crate) fn apply_springs_forces_with(
    variant: KernelVariant,
    points: &Points,
    springs: &Springs,
    start: usize,
    end: usize,
    dynamic_force: &mut [Vec2],
) {
    debug_assert!(start <= end && end <= springs.len());
    debug_assert_eq!(dynamic_force.len(), points.len());

    let square_end = end.min(springs.perfect_square_count() * 4);
    debug_assert!(start >= square_end || start % 4 == 0);
    debug_assert!(square_end % 4 == 0);

    let s = start.min(square_end);
    let squares = s..square_end.max(s);
    match variant {
        #[cfg(target_arch = "x86_64")]
        KernelVariant::Sse => unsafe { apply_squares_sse(points, springs, squares, dynamic_force) },
        #[cfg(target_arch = "aarch64")]
        KernelVariant::Neon => unsafe { apply_squares_neon(points, springs, squares, dynamic_force) },
        _ => apply_squares_portable(points, springs, squares, dynamic_force),
    }

    apply_remainder(points, springs, start.max(square_end), end, dynamic_force);
}

pub fn apply_springs_forces_portable(
    points: &Points,
    springs: &Springs,
    start: usize,
    end: usize,
    dynamic_force: &mut [Vec2],
) {
    apply_springs_forces_with(
        KernelVariant::Portable,
        points,
        springs,
        start,
        end,
        dynamic_force,
    )
}

/// Force on endpoint A of one spring.
#[inline]
fn spring_force(springs: &Springs, s: usize, positions: &[Vec2], velocities: &[Vec2]) -> Vec2 {
    let endpoints = springs.endpoints()[s];
    let (a, b) = (endpoints.point_a as usize, endpoints.point_b as usize);

    let displacement = positions[b] - positions[a];
    let length = displacement.length();
    let direction = displacement.normalise_with_length(length);

    let hooke = (length - springs.rest_lengths()[s]) * springs.stiffnesses()[s];
    let damp = (velocities[b] - velocities[a]).dot(direction) * springs.dampings()[s];

    direction * (hooke + damp)
}

fn apply_remainder(
    points: &Points,
    springs: &Springs,
    start: usize,
    end: usize,
    dynamic_force: &mut [Vec2],
) {
    let (positions, velocities) = (points.positions(), points.velocities());
    let endpoints = springs.endpoints();

    for s in start..end {
        let force_a = spring_force(springs, s, positions, velocities);
        dynamic_force[endpoints[s].point_a as usize] += force_a;
        dynamic_force[endpoints[s].point_b as usize] -= force_a;
    }
}

/// Corner indices `[J, K, L, M]` of the square starting at spring `s`.
#[inline]
fn square_corners(springs: &Springs, s: usize) -> [usize; 4] {
    let e = springs.endpoints();
    let corners = [
        e[s].point_a as usize,
        e[s + 1].point_b as usize,
        e[s].point_b as usize,
        e[s + 1].point_a as usize,
    ];
    debug_assert_eq!(e[s + 2].point_a as usize, corners[0]);
    debug_assert_eq!(e[s + 2].point_b as usize, corners[1]);
    debug_assert_eq!(e[s + 3].point_b as usize, corners[2]);
    debug_assert_eq!(e[s + 3].point_a as usize, corners[3]);
    corners
}

/// Scatters the endpoint-A forces of a square's four springs onto its corners.
#[inline]
fn scatter_square(dynamic_force: &mut [Vec2], [j, k, l, m]: [usize; 4], f: [Vec2; 4]) {
    dynamic_force[j] += f[0] + f[2];
    dynamic_force[l] -= f[0] + f[3];
    dynamic_force[m] += f[1] + f[3];
    dynamic_force[k] -= f[1] + f[2];
}

fn apply_squares_portable(
    points: &Points,
    springs: &Springs,
    squares: std::ops::Range<usize>,
    dynamic_force: &mut [Vec2],
) {
    let (positions, velocities) = (points.positions(), points.velocities());

    for s in squares.step_by(4) {
        let corners = square_corners(springs, s);
        let forces = [
            spring_force(springs, s, positions, velocities),
            spring_force(springs, s + 1, positions, velocities),
            spring_force(springs, s + 2, positions, velocities),
            spring_force(springs, s + 3, positions, velocities),
        ];
        scatter_square(dynamic_force, corners, forces);
    }
}

/// # Safety
///
/// The host must support SSE2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn apply_squares_sse(
    points: &Points,
    springs: &Springs,
    squares: std::ops::Range<usize>,
    dynamic_force: &mut [Vec2],
) {
    use std::arch::x86_64::*;

    use crate::simd::sse;

    let (positions, velocities) = (points.positions(), points.velocities());

    for s in squares.step_by(4) {
        let corners @ [j, k, l, m] = square_corners(springs, s);
        // Lanes are springs s0..s3: A = [J, M, J, M], B = [L, K, K, L]
        let a = [j, m, j, m];
        let b = [l, k, k, l];

        let (pax, pay) = sse::gather_xy4(positions, a);
        let (pbx, pby) = sse::gather_xy4(positions, b);
        let dx = _mm_sub_ps(pbx, pax);
        let dy = _mm_sub_ps(pby, pay);

        let (length, reciprocal) =
            sse::length_and_reciprocal(_mm_add_ps(_mm_mul_ps(dx, dx), _mm_mul_ps(dy, dy)));
        let dir_x = _mm_mul_ps(dx, reciprocal);
        let dir_y = _mm_mul_ps(dy, reciprocal);

        let hooke = _mm_mul_ps(
            _mm_sub_ps(length, _mm_loadu_ps(springs.rest_lengths()[s..s + 4].as_ptr())),
            _mm_loadu_ps(springs.stiffnesses()[s..s + 4].as_ptr()),
        );

        let (vax, vay) = sse::gather_xy4(velocities, a);
        let (vbx, vby) = sse::gather_xy4(velocities, b);
        let damp = _mm_mul_ps(
            _mm_add_ps(
                _mm_mul_ps(_mm_sub_ps(vbx, vax), dir_x),
                _mm_mul_ps(_mm_sub_ps(vby, vay), dir_y),
            ),
            _mm_loadu_ps(springs.dampings()[s..s + 4].as_ptr()),
        );

        let magnitude = _mm_add_ps(hooke, damp);
        let fx = sse::to_array(_mm_mul_ps(dir_x, magnitude));
        let fy = sse::to_array(_mm_mul_ps(dir_y, magnitude));

        scatter_square(
            dynamic_force,
            corners,
            [
                Vec2::new(fx[0], fy[0]),
                Vec2::new(fx[1], fy[1]),
                Vec2::new(fx[2], fy[2]),
                Vec2::new(fx[3], fy[3]),
            ],
        );
    }
}

/// # Safety
///
/// The host must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn apply_squares_neon(
    points: &Points,
    springs: &Springs,
    squares: std::ops::Range<usize>,
    dynamic_force: &mut [Vec2],
) {
    use std::arch::aarch64::*;

    use crate::simd::neon;

    let (positions, velocities) = (points.positions(), points.velocities());

    for s in squares.step_by(4) {
        let corners @ [j, k, l, m] = square_corners(springs, s);
        // Lanes are springs s0..s3: A = [J, M, J, M], B = [L, K, K, L]
        let a = [j, m, j, m];
        let b = [l, k, k, l];

        let (pax, pay) = neon::gather_xy4(positions, a);
        let (pbx, pby) = neon::gather_xy4(positions, b);
        let dx = vsubq_f32(pbx, pax);
        let dy = vsubq_f32(pby, pay);

        let (length, reciprocal) =
            neon::length_and_reciprocal(vaddq_f32(vmulq_f32(dx, dx), vmulq_f32(dy, dy)));
        let dir_x = vmulq_f32(dx, reciprocal);
        let dir_y = vmulq_f32(dy, reciprocal);

        let hooke = vmulq_f32(
            vsubq_f32(length, vld1q_f32(springs.rest_lengths()[s..s + 4].as_ptr())),
            vld1q_f32(springs.stiffnesses()[s..s + 4].as_ptr()),
        );

        let (vax, vay) = neon::gather_xy4(velocities, a);
        let (vbx, vby) = neon::gather_xy4(velocities, b);
        let damp = vmulq_f32(
            vaddq_f32(
                vmulq_f32(vsubq_f32(vbx, vax), dir_x),
                vmulq_f32(vsubq_f32(vby, vay), dir_y),
            ),
            vld1q_f32(springs.dampings()[s..s + 4].as_ptr()),
        );

        let magnitude = vaddq_f32(hooke, damp);
        let fx = neon::to_array(vmulq_f32(dir_x, magnitude));
        let fy = neon::to_array(vmulq_f32(dir_y, magnitude));

        scatter_square(
            dynamic_force,
            corners,
            [
                Vec2::new(fx[0], fy[0]),
                Vec2::new(fx[1], fy[1]),
                Vec2::new(fx[2], fy[2]),
                Vec2::new(fx[3], fy[3]),
            ],
        );
    }
}
