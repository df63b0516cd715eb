//! The structural kernels.
//!
//! Each entry point dispatches on [`crate::simd::selected`]; the portable and
//! hardware-specific variants are public as well and agree with each other
//! within the tolerance documented on the entry point.

pub mod aabb_union;
pub mod diffuse_light;
pub mod integrate;
pub mod mix;
pub mod smooth_buffer;
pub mod spring_forces;
pub mod spring_vectors;

pub use self::{
    aabb_union::make_aabb_weighted_union, diffuse_light::diffuse_light,
    integrate::integrate_and_reset_dynamic_forces, mix::mix_vec4f,
    smooth_buffer::smooth_buffer_and_add, spring_forces::apply_springs_forces,
    spring_vectors::calculate_spring_vectors,
};
