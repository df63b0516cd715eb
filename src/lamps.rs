use glam::Vec2;

use crate::{buffer::AlignedBuffer, Lamp, PlaneId};

/// Structure-of-arrays lamp storage consumed by the light diffusion kernel.
#[derive(Clone, Debug)]
pub struct Lamps {
    position: AlignedBuffer<Vec2>,
    plane_id: AlignedBuffer<PlaneId>,
    distance_coeff: AlignedBuffer<f32>,
    spread_max_distance: AlignedBuffer<f32>,
}

impl Lamps {
    pub fn new(lamps: &[Lamp]) -> Self {
        let mut position = AlignedBuffer::new(lamps.len());
        let mut plane_id = AlignedBuffer::new(lamps.len());
        let mut distance_coeff = AlignedBuffer::new(lamps.len());
        let mut spread_max_distance = AlignedBuffer::new(lamps.len());
        for (l, lamp) in lamps.iter().enumerate() {
            position[l] = lamp.position;
            plane_id[l] = lamp.plane_id;
            distance_coeff[l] = lamp.distance_coeff;
            spread_max_distance[l] = lamp.spread_max_distance;
        }

        Self {
            position,
            plane_id,
            distance_coeff,
            spread_max_distance,
        }
    }

    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.position
    }

    pub fn plane_ids(&self) -> &[PlaneId] {
        &self.plane_id
    }

    pub fn distance_coeffs(&self) -> &[f32] {
        &self.distance_coeff
    }

    pub fn spread_max_distances(&self) -> &[f32] {
        &self.spread_max_distance
    }
}
