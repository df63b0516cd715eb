use glam::Vec2;

use crate::{points::IntegrationBuffers, simd::KernelVariant, Points};

/// Integrates points `start..end` with semi-implicit Euler and clears their
/// dynamic forces in every partition:
///
/// ```text
/// total_dynamic = Σ dynamic_forces[p][i]
/// delta         = velocity * dt + (total_dynamic + static_force) * integration_factor
/// position     += delta
/// velocity      = delta * velocity_factor
/// ```
///
/// Points outside the range, and their dynamic forces, are left untouched.
/// Every partition must have finished accumulating before this runs.
pub fn integrate_and_reset_dynamic_forces<P: AsMut<[Vec2]>>(
    points: &mut Points,
    start: usize,
    end: usize,
    dynamic_forces: &mut [P],
    dt: f32,
    velocity_factor: f32,
) {
    integrate_and_reset_dynamic_forces_with(
        crate::simd::selected(),
        points,
        start,
        end,
        dynamic_forces,
        dt,
        velocity_factor,
    )
}

pub(crate) fn integrate_and_reset_dynamic_forces_with<P: AsMut<[Vec2]>>(
    variant: KernelVariant,
    points: &mut Points,
    start: usize,
    end: usize,
    dynamic_forces: &mut [P],
    dt: f32,
    velocity_factor: f32,
) {
    debug_assert!(start <= end && end <= points.len());

    let IntegrationBuffers {
        position,
        velocity,
        static_force,
        integration_factor,
    } = points.integration_buffers_mut();

    integrate_slices(
        variant,
        IntegrationBuffers {
            position: &mut position[start..end],
            velocity: &mut velocity[start..end],
            static_force: &static_force[start..end],
            integration_factor: &integration_factor[start..end],
        },
        dynamic_forces,
        start,
        dt,
        velocity_factor,
    )
}

/// Integrates already sliced point buffers; element `i` of the slices pairs with
/// element `offset + i` of every dynamic-force partition.
pub(crate) fn integrate_slices<P: AsMut<[Vec2]>>(
    variant: KernelVariant,
    buffers: IntegrationBuffers<'_>,
    dynamic_forces: &mut [P],
    offset: usize,
    dt: f32,
    velocity_factor: f32,
) {
    debug_assert_eq!(buffers.position.len(), buffers.velocity.len());
    debug_assert_eq!(buffers.position.len(), buffers.static_force.len());
    debug_assert_eq!(buffers.position.len(), buffers.integration_factor.len());
    debug_assert!(dynamic_forces
        .iter_mut()
        .all(|p| p.as_mut().len() >= offset + buffers.position.len()));

    match variant {
        #[cfg(target_arch = "x86_64")]
        KernelVariant::Sse => unsafe {
            integrate_sse(buffers, dynamic_forces, offset, dt, velocity_factor)
        },
        #[cfg(target_arch = "aarch64")]
        KernelVariant::Neon => unsafe {
            integrate_neon(buffers, dynamic_forces, offset, dt, velocity_factor)
        },
        _ => integrate_portable(buffers, dynamic_forces, offset, dt, velocity_factor),
    }
}

fn integrate_portable<P: AsMut<[Vec2]>>(
    buffers: IntegrationBuffers<'_>,
    dynamic_forces: &mut [P],
    offset: usize,
    dt: f32,
    velocity_factor: f32,
) {
    let IntegrationBuffers {
        position,
        velocity,
        static_force,
        integration_factor,
    } = buffers;

    for i in 0..position.len() {
        let mut total_dynamic_force = Vec2::ZERO;
        for partition in dynamic_forces.iter_mut() {
            total_dynamic_force += partition.as_mut()[offset + i];
        }

        let delta =
            velocity[i] * dt + (total_dynamic_force + static_force[i]) * integration_factor[i];

        position[i] += delta;
        velocity[i] = delta * velocity_factor;

        for partition in dynamic_forces.iter_mut() {
            partition.as_mut()[offset + i] = Vec2::ZERO;
        }
    }
}

/// Integrates two points (four floats) per iteration.
///
/// # Safety
///
/// The host must support SSE2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn integrate_sse<P: AsMut<[Vec2]>>(
    buffers: IntegrationBuffers<'_>,
    dynamic_forces: &mut [P],
    offset: usize,
    dt: f32,
    velocity_factor: f32,
) {
    use std::arch::x86_64::*;

    let IntegrationBuffers {
        position,
        velocity,
        static_force,
        integration_factor,
    } = buffers;

    let count = position.len();
    let dt_4 = _mm_set1_ps(dt);
    let velocity_factor_4 = _mm_set1_ps(velocity_factor);

    let mut i = 0;
    while i + 2 <= count {
        let mut total_dynamic_force = _mm_setzero_ps();
        for partition in dynamic_forces.iter_mut() {
            let forces: &[f32] = bytemuck::cast_slice(&partition.as_mut()[offset + i..offset + i + 2]);
            total_dynamic_force = _mm_add_ps(total_dynamic_force, _mm_loadu_ps(forces.as_ptr()));
        }

        let position_f: &mut [f32] = bytemuck::cast_slice_mut(&mut position[i..i + 2]);
        let velocity_f: &mut [f32] = bytemuck::cast_slice_mut(&mut velocity[i..i + 2]);
        let static_force_f: &[f32] = bytemuck::cast_slice(&static_force[i..i + 2]);
        let integration_factor_f: &[f32] = bytemuck::cast_slice(&integration_factor[i..i + 2]);

        // delta = v * dt + (total + static) * factor
        let delta = _mm_add_ps(
            _mm_mul_ps(_mm_loadu_ps(velocity_f.as_ptr()), dt_4),
            _mm_mul_ps(
                _mm_add_ps(total_dynamic_force, _mm_loadu_ps(static_force_f.as_ptr())),
                _mm_loadu_ps(integration_factor_f.as_ptr()),
            ),
        );

        _mm_storeu_ps(
            position_f.as_mut_ptr(),
            _mm_add_ps(_mm_loadu_ps(position_f.as_ptr()), delta),
        );
        _mm_storeu_ps(velocity_f.as_mut_ptr(), _mm_mul_ps(delta, velocity_factor_4));

        for partition in dynamic_forces.iter_mut() {
            let forces: &mut [f32] =
                bytemuck::cast_slice_mut(&mut partition.as_mut()[offset + i..offset + i + 2]);
            _mm_storeu_ps(forces.as_mut_ptr(), _mm_setzero_ps());
        }

        i += 2;
    }

    integrate_portable(
        IntegrationBuffers {
            position: &mut position[i..],
            velocity: &mut velocity[i..],
            static_force: &static_force[i..],
            integration_factor: &integration_factor[i..],
        },
        dynamic_forces,
        offset + i,
        dt,
        velocity_factor,
    );
}

/// Integrates two points (four floats) per iteration.
///
/// # Safety
///
/// The host must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn integrate_neon<P: AsMut<[Vec2]>>(
    buffers: IntegrationBuffers<'_>,
    dynamic_forces: &mut [P],
    offset: usize,
    dt: f32,
    velocity_factor: f32,
) {
    use std::arch::aarch64::*;

    let IntegrationBuffers {
        position,
        velocity,
        static_force,
        integration_factor,
    } = buffers;

    let count = position.len();
    let dt_4 = vdupq_n_f32(dt);
    let velocity_factor_4 = vdupq_n_f32(velocity_factor);

    let mut i = 0;
    while i + 2 <= count {
        let mut total_dynamic_force = vdupq_n_f32(0.0);
        for partition in dynamic_forces.iter_mut() {
            let forces: &[f32] = bytemuck::cast_slice(&partition.as_mut()[offset + i..offset + i + 2]);
            total_dynamic_force = vaddq_f32(total_dynamic_force, vld1q_f32(forces.as_ptr()));
        }

        let position_f: &mut [f32] = bytemuck::cast_slice_mut(&mut position[i..i + 2]);
        let velocity_f: &mut [f32] = bytemuck::cast_slice_mut(&mut velocity[i..i + 2]);
        let static_force_f: &[f32] = bytemuck::cast_slice(&static_force[i..i + 2]);
        let integration_factor_f: &[f32] = bytemuck::cast_slice(&integration_factor[i..i + 2]);

        let delta = vaddq_f32(
            vmulq_f32(vld1q_f32(velocity_f.as_ptr()), dt_4),
            vmulq_f32(
                vaddq_f32(total_dynamic_force, vld1q_f32(static_force_f.as_ptr())),
                vld1q_f32(integration_factor_f.as_ptr()),
            ),
        );

        vst1q_f32(
            position_f.as_mut_ptr(),
            vaddq_f32(vld1q_f32(position_f.as_ptr()), delta),
        );
        vst1q_f32(velocity_f.as_mut_ptr(), vmulq_f32(delta, velocity_factor_4));

        for partition in dynamic_forces.iter_mut() {
            let forces: &mut [f32] =
                bytemuck::cast_slice_mut(&mut partition.as_mut()[offset + i..offset + i + 2]);
            vst1q_f32(forces.as_mut_ptr(), vdupq_n_f32(0.0));
        }

        i += 2;
    }

    integrate_portable(
        IntegrationBuffers {
            position: &mut position[i..],
            velocity: &mut velocity[i..],
            static_force: &static_force[i..],
            integration_factor: &integration_factor[i..],
        },
        dynamic_forces,
        offset + i,
        dt,
        velocity_factor,
    );
}
