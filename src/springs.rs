use glam::Vec2;

use crate::{
    buffer::AlignedBuffer,
    error::{Result, TrussworkError},
    Spring, SpringEndpoints,
};

/// Structure-of-arrays spring storage.
///
/// The first `perfect_square_count * 4` springs form perfect squares (see
/// [`SpringEndpoints::square`]); the layout is verified on construction, the
/// spring force kernel relies on it.
#[derive(Clone, Debug)]
pub struct Springs {
    endpoints: AlignedBuffer<SpringEndpoints>,
    rest_length: AlignedBuffer<f32>,
    stiffness: AlignedBuffer<f32>,
    damping: AlignedBuffer<f32>,
    perfect_square_count: usize,
    length: AlignedBuffer<f32>,
    direction: AlignedBuffer<Vec2>,
}

impl Springs {
    pub fn new(springs: &[Spring], perfect_square_count: usize, point_count: usize) -> Result<Self> {
        if perfect_square_count * 4 > springs.len() {
            return Err(TrussworkError::invalid_topology(format!(
                "{perfect_square_count} perfect squares need {} springs, got {}",
                perfect_square_count * 4,
                springs.len()
            )));
        }

        for (s, spring) in springs.iter().enumerate() {
            let SpringEndpoints { point_a, point_b } = spring.endpoints;
            if point_a as usize >= point_count || point_b as usize >= point_count {
                return Err(TrussworkError::index_out_of_bounds(format!(
                    "spring {s} connects {point_a} and {point_b}, but there are {point_count} points"
                )));
            }
        }

        for square in 0..perfect_square_count {
            verify_square(springs, square * 4)?;
        }

        let mut endpoints = AlignedBuffer::new(springs.len());
        let mut rest_length = AlignedBuffer::new(springs.len());
        let mut stiffness = AlignedBuffer::new(springs.len());
        let mut damping = AlignedBuffer::new(springs.len());
        for (s, spring) in springs.iter().enumerate() {
            endpoints[s] = spring.endpoints;
            rest_length[s] = spring.rest_length;
            stiffness[s] = spring.stiffness;
            damping[s] = spring.damping;
        }

        log::debug!(
            "Created {} springs, {} in perfect squares",
            springs.len(),
            perfect_square_count * 4
        );

        Ok(Self {
            endpoints,
            rest_length,
            stiffness,
            damping,
            perfect_square_count,
            length: AlignedBuffer::new(springs.len()),
            direction: AlignedBuffer::new(springs.len()),
        })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn perfect_square_count(&self) -> usize {
        self.perfect_square_count
    }

    pub fn endpoints(&self) -> &[SpringEndpoints] {
        &self.endpoints
    }

    pub fn rest_lengths(&self) -> &[f32] {
        &self.rest_length
    }

    pub fn stiffnesses(&self) -> &[f32] {
        &self.stiffness
    }

    pub fn dampings(&self) -> &[f32] {
        &self.damping
    }

    /// Lengths cached by the last spring geometry pass.
    pub fn lengths(&self) -> &[f32] {
        &self.length
    }

    /// Normalized directions cached by the last spring geometry pass.
    pub fn directions(&self) -> &[Vec2] {
        &self.direction
    }

    /// Endpoints plus the geometry cache, borrowed apart for the spring geometry kernel.
    pub fn geometry_buffers_mut(&mut self) -> (&[SpringEndpoints], &mut [f32], &mut [Vec2]) {
        (
            self.endpoints.as_slice(),
            self.length.as_mut_slice(),
            self.direction.as_mut_slice(),
        )
    }
}

fn verify_square(springs: &[Spring], s: usize) -> Result<()> {
    let j = springs[s].endpoints.point_a;
    let l = springs[s].endpoints.point_b;
    let m = springs[s + 1].endpoints.point_a;
    let k = springs[s + 1].endpoints.point_b;

    let expected = SpringEndpoints::square(j, k, l, m);
    let actual = [
        springs[s].endpoints,
        springs[s + 1].endpoints,
        springs[s + 2].endpoints,
        springs[s + 3].endpoints,
    ];
    if actual != expected {
        return Err(TrussworkError::invalid_topology(format!(
            "springs {s}..{} are not a perfect square: {actual:?}",
            s + 4
        )));
    }

    let corners = [j, k, l, m];
    for (i, a) in corners.iter().enumerate() {
        if corners[i + 1..].contains(a) {
            return Err(TrussworkError::invalid_topology(format!(
                "square at spring {s} repeats point {a}"
            )));
        }
    }

    Ok(())
}
