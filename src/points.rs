use glam::Vec2;

use crate::{
    buffer::AlignedBuffer,
    error::{Result, TrussworkError},
    PlaneId,
};

/// Structure-of-arrays point storage; every buffer has the same logical length.
#[derive(Clone, Debug)]
pub struct Points {
    position: AlignedBuffer<Vec2>,
    velocity: AlignedBuffer<Vec2>,
    static_force: AlignedBuffer<Vec2>,
    integration_factor: AlignedBuffer<Vec2>,
    plane_id: AlignedBuffer<PlaneId>,
}

/// Mutable views of the buffers the force integration kernel advances.
pub struct IntegrationBuffers<'a> {
    pub position: &'a mut [Vec2],
    pub velocity: &'a mut [Vec2],
    pub static_force: &'a [Vec2],
    pub integration_factor: &'a [Vec2],
}

impl Points {
    /// `count` points at the origin, at rest, with a zero integration factor.
    pub fn new(count: usize) -> Self {
        Self {
            position: AlignedBuffer::new(count),
            velocity: AlignedBuffer::new(count),
            static_force: AlignedBuffer::new(count),
            integration_factor: AlignedBuffer::new(count),
            plane_id: AlignedBuffer::new(count),
        }
    }

    /// Points at `positions`, each of unit mass integrated with time step `dt`.
    pub fn from_positions(positions: &[Vec2], dt: f32) -> Self {
        let mut points = Self::new(positions.len());
        points.position.copy_from_slice(positions);
        points.integration_factor.fill(Vec2::splat(dt * dt));
        points
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

    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.position
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocity
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocity
    }

    pub fn static_forces(&self) -> &[Vec2] {
        &self.static_force
    }

    pub fn static_forces_mut(&mut self) -> &mut [Vec2] {
        &mut self.static_force
    }

    pub fn integration_factors(&self) -> &[Vec2] {
        &self.integration_factor
    }

    pub fn integration_factors_mut(&mut self) -> &mut [Vec2] {
        &mut self.integration_factor
    }

    pub fn plane_ids(&self) -> &[PlaneId] {
        &self.plane_id
    }

    pub fn plane_ids_mut(&mut self) -> &mut [PlaneId] {
        &mut self.plane_id
    }

    /// Folds the point's inverse mass and the squared time step into its integration factor.
    pub fn set_mass(&mut self, index: usize, mass: f32, dt: f32) -> Result<()> {
        if index >= self.len() {
            return Err(TrussworkError::index_out_of_bounds(format!(
                "point {index} of {}",
                self.len()
            )));
        }
        if !(mass > 0.) {
            return Err(TrussworkError::invalid_config(format!(
                "mass of point {index} must be positive, got {mass}"
            )));
        }
        self.integration_factor[index] = Vec2::splat(dt * dt / mass);
        Ok(())
    }

    /// Freezes the point: its integration factor becomes zero, so forces no longer move it.
    pub fn pin(&mut self, index: usize) {
        self.integration_factor[index] = Vec2::ZERO;
        self.velocity[index] = Vec2::ZERO;
    }

    pub fn is_pinned(&self, index: usize) -> bool {
        self.integration_factor[index] == Vec2::ZERO
    }

    pub fn integration_buffers_mut(&mut self) -> IntegrationBuffers<'_> {
        IntegrationBuffers {
            position: &mut self.position,
            velocity: &mut self.velocity,
            static_force: &self.static_force,
            integration_factor: &self.integration_factor,
        }
    }
}

/// One dynamic-force accumulator per worker partition, each indexed by global point index.
///
/// Spring forces are scattered into a single partition by a single worker;
/// integration sums every partition and clears it again.
#[derive(Clone, Debug)]
pub struct DynamicForces {
    partitions: Vec<AlignedBuffer<Vec2>>,
}

impl DynamicForces {
    pub fn new(partition_count: usize, point_count: usize) -> Self {
        assert!(partition_count > 0);
        Self {
            partitions: (0..partition_count)
                .map(|_| AlignedBuffer::new(point_count))
                .collect(),
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn point_count(&self) -> usize {
        self.partitions[0].len()
    }

    pub fn partition(&self, index: usize) -> &[Vec2] {
        &self.partitions[index]
    }

    pub fn partition_mut(&mut self, index: usize) -> &mut [Vec2] {
        &mut self.partitions[index]
    }

    pub fn partitions_mut(&mut self) -> &mut [AlignedBuffer<Vec2>] {
        &mut self.partitions
    }

    /// Sum of every partition's force at `point`.
    pub fn total(&self, point: usize) -> Vec2 {
        self.partitions
            .iter()
            .fold(Vec2::ZERO, |total, p| total + p[point])
    }

    pub fn is_zero(&self) -> bool {
        self.partitions
            .iter()
            .all(|p| p.iter().all(|f| *f == Vec2::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions() {
        let points = Points::from_positions(&[Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)], 0.5);

        assert_eq!(points.len(), 2);
        assert_eq!(points.positions()[1], Vec2::new(3.0, 4.0));
        assert_eq!(points.velocities()[0], Vec2::ZERO);
        assert_eq!(points.integration_factors()[0], Vec2::splat(0.25));
    }

    #[test]
    fn test_set_mass_and_pin() {
        let mut points = Points::new(3);

        points.set_mass(1, 2.0, 0.1).unwrap();
        assert!((points.integration_factors()[1].x - 0.005).abs() < 1e-9);
        assert!(!points.is_pinned(1));

        points.pin(1);
        assert!(points.is_pinned(1));

        assert!(matches!(
            points.set_mass(3, 1.0, 0.1),
            Err(TrussworkError::IndexOutOfBounds(_))
        ));
        assert!(matches!(
            points.set_mass(0, 0.0, 0.1),
            Err(TrussworkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dynamic_forces_total() {
        let mut forces = DynamicForces::new(3, 4);
        assert!(forces.is_zero());

        forces.partition_mut(0)[2] = Vec2::new(1.0, 0.0);
        forces.partition_mut(2)[2] = Vec2::new(0.5, -1.0);

        assert_eq!(forces.partition_count(), 3);
        assert_eq!(forces.point_count(), 4);
        assert_eq!(forces.total(2), Vec2::new(1.5, -1.0));
        assert_eq!(forces.total(1), Vec2::ZERO);
        assert!(!forces.is_zero());
    }
}
