use bytemuck::{Pod, Zeroable};
use glam::Vec2;

pub mod buffer;
pub mod cpu;
pub mod error;
pub mod kernels;
pub mod lamps;
pub mod math;
pub mod points;
pub mod simd;
pub mod springs;

pub use buffer::AlignedBuffer;
pub use error::{Result, TrussworkError};
pub use lamps::Lamps;
pub use points::{DynamicForces, Points};
pub use simd::KernelVariant;
pub use springs::Springs;

pub type ElementIndex = u32;

/// Tag partitioning points and lamps into independent lighting domains.
pub type PlaneId = u32;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct SpringEndpoints {
    pub point_a: ElementIndex,
    pub point_b: ElementIndex,
}

impl SpringEndpoints {
    pub fn new(point_a: ElementIndex, point_b: ElementIndex) -> Self {
        Self { point_a, point_b }
    }

    /// The four springs of a perfect square, in the order the spring force
    /// kernel expects them:
    ///
    /// ```text
    ///    J          M
    ///    |\        /|
    ///    | \s0  s1/ |
    ///  s2|  \    /  |s3
    ///    |   \  /   |
    ///    |   /  \   |
    ///    |  /    \  |
    ///    | /      \ |
    ///    |/        \|
    ///    K          L
    /// ```
    pub fn square(
        j: ElementIndex,
        k: ElementIndex,
        l: ElementIndex,
        m: ElementIndex,
    ) -> [SpringEndpoints; 4] {
        [
            Self::new(j, l),
            Self::new(m, k),
            Self::new(j, k),
            Self::new(m, l),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub endpoints: SpringEndpoints,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl Spring {
    pub fn new(endpoints: SpringEndpoints, rest_length: f32, stiffness: f32, damping: f32) -> Self {
        assert!(rest_length >= 0.);
        Self {
            endpoints,
            rest_length,
            stiffness,
            damping,
        }
    }

    /// A spring whose rest length is the current distance between its endpoints.
    pub fn at_rest(endpoints: SpringEndpoints, positions: &[Vec2], stiffness: f32, damping: f32) -> Self {
        let rest_length = (positions[endpoints.point_b as usize]
            - positions[endpoints.point_a as usize])
            .length();
        Self::new(endpoints, rest_length, stiffness, damping)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lamp {
    pub position: Vec2,
    pub plane_id: PlaneId,
    pub distance_coeff: f32,
    pub spread_max_distance: f32,
}

impl Lamp {
    pub fn new(position: Vec2, plane_id: PlaneId, distance_coeff: f32, spread_max_distance: f32) -> Self {
        Self {
            position,
            plane_id,
            distance_coeff,
            spread_max_distance,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub bottom_left: Vec2,
    pub top_right: Vec2,
}

impl Aabb {
    pub fn new(bottom_left: Vec2, top_right: Vec2) -> Self {
        Self {
            bottom_left,
            top_right,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.bottom_left + self.top_right) / 2.0
    }
}

/// A box carrying a non-negative weight, e.g. the number of elements it bounds.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedAabb {
    pub aabb: Aabb,
    pub weight: f32,
}

impl WeightedAabb {
    pub fn new(bottom_left: Vec2, top_right: Vec2, weight: f32) -> Self {
        debug_assert!(weight >= 0.);
        Self {
            aabb: Aabb::new(bottom_left, top_right),
            weight,
        }
    }
}
