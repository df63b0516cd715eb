use std::ops::Range;

use rayon::prelude::*;

use crate::{
    buffer::{make_aligned_float_element_count, VECTORIZATION_FLOAT_COUNT},
    error::{Result, TrussworkError},
    kernels::{diffuse_light, integrate, spring_forces, spring_vectors},
    points::IntegrationBuffers,
    simd::KernelVariant,
    DynamicForces, Lamps, Points, Springs,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParams {
    /// Duration of one `simulate` call.
    pub dt: f32,
    /// Spring relaxation iterations per `simulate` call.
    pub iterations: u32,
    /// Fraction of velocity lost every iteration.
    pub global_damping: f32,
    /// Number of dynamic-force partitions, i.e. of parallel spring force tasks.
    pub partitions: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            dt: 0.02,
            iterations: 10,
            global_damping: 0.0004,
            partitions: rayon::current_num_threads().max(1),
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.) {
            return Err(TrussworkError::invalid_config(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if self.iterations == 0 {
            return Err(TrussworkError::invalid_config("iterations must be at least 1"));
        }
        if !(0. ..1.).contains(&self.global_damping) {
            return Err(TrussworkError::invalid_config(format!(
                "global damping must be in [0, 1), got {}",
                self.global_damping
            )));
        }
        if self.partitions == 0 {
            return Err(TrussworkError::invalid_config("partitions must be at least 1"));
        }
        Ok(())
    }

    /// Time step of a single iteration; point integration factors are `dt_iteration² / mass`.
    #[inline]
    pub fn dt_iteration(&self) -> f32 {
        self.dt / self.iterations as f32
    }

    #[inline]
    pub fn velocity_factor(&self) -> f32 {
        (1. - self.global_damping) / self.dt_iteration()
    }
}

/// Multi-threaded mass-spring driver running the structural kernels.
pub struct CpuSimulation {
    points: Points,
    springs: Springs,
    dynamic_forces: DynamicForces,
    spring_ranges: Vec<Range<usize>>,
    params: SimulationParams,
    variant: KernelVariant,
}

impl CpuSimulation {
    pub fn new(points: Points, springs: Springs, params: SimulationParams) -> Result<Self> {
        params.validate()?;

        if let Some((s, e)) = springs
            .endpoints()
            .iter()
            .enumerate()
            .find(|(_, e)| e.point_a.max(e.point_b) as usize >= points.len())
        {
            return Err(TrussworkError::index_out_of_bounds(format!(
                "spring {s} connects {} and {}, but there are {} points",
                e.point_a,
                e.point_b,
                points.len()
            )));
        }

        let spring_ranges = partition_springs(&springs, params.partitions);
        let dynamic_forces = DynamicForces::new(params.partitions, points.len());
        let variant = crate::simd::selected();

        log::info!(
            "Created {} simulation: {} points, {} springs, {} partitions",
            variant,
            points.len(),
            springs.len(),
            params.partitions
        );

        Ok(Self {
            points,
            springs,
            dynamic_forces,
            spring_ranges,
            params,
            variant,
        })
    }

    pub fn points(&self) -> &Points {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut Points {
        &mut self.points
    }

    pub fn springs(&self) -> &Springs {
        &self.springs
    }

    pub fn springs_mut(&mut self) -> &mut Springs {
        &mut self.springs
    }

    pub fn dynamic_forces(&self) -> &DynamicForces {
        &self.dynamic_forces
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Spring ranges handled by each partition.
    pub fn spring_ranges(&self) -> &[Range<usize>] {
        &self.spring_ranges
    }

    /// Advances the structure by `params.dt`, then refreshes the spring geometry cache.
    pub fn simulate(&mut self) {
        let dt = self.params.dt_iteration();
        let velocity_factor = self.params.velocity_factor();

        for _ in 0..self.params.iterations {
            self.apply_spring_forces();
            // The join above is the barrier: every partition is complete before integration.
            self.integrate(dt, velocity_factor);
        }

        self.update_spring_geometry();
        log::debug!("Spring strain error: {}", self.spring_strain_error());
    }

    fn apply_spring_forces(&mut self) {
        let Self {
            points,
            springs,
            dynamic_forces,
            spring_ranges,
            variant,
            ..
        } = self;
        let (points, springs, variant) = (&*points, &*springs, *variant);

        dynamic_forces
            .partitions_mut()
            .par_iter_mut()
            .zip(spring_ranges.par_iter())
            .for_each(|(partition, range)| {
                spring_forces::apply_springs_forces_with(
                    variant,
                    points,
                    springs,
                    range.start,
                    range.end,
                    partition.as_mut_slice(),
                );
            });
    }

    fn integrate(&mut self, dt: f32, velocity_factor: f32) {
        let chunk_size = self.point_chunk_size();
        let variant = self.variant;

        let IntegrationBuffers {
            position,
            velocity,
            static_force,
            integration_factor,
        } = self.points.integration_buffers_mut();

        // Transpose partitions x chunks into chunks x partitions.
        let mut partition_chunks: Vec<_> = self
            .dynamic_forces
            .partitions_mut()
            .iter_mut()
            .map(|p| p.as_mut_slice().chunks_mut(chunk_size))
            .collect();
        let mut forces_per_chunk: Vec<Vec<&mut [glam::Vec2]>> = position
            .chunks(chunk_size)
            .map(|_| partition_chunks.iter_mut().filter_map(|c| c.next()).collect())
            .collect();

        position
            .par_chunks_mut(chunk_size)
            .zip(velocity.par_chunks_mut(chunk_size))
            .zip(static_force.par_chunks(chunk_size))
            .zip(integration_factor.par_chunks(chunk_size))
            .zip(forces_per_chunk.par_iter_mut())
            .for_each(
                |((((position, velocity), static_force), integration_factor), forces)| {
                    integrate::integrate_slices(
                        variant,
                        IntegrationBuffers {
                            position,
                            velocity,
                            static_force,
                            integration_factor,
                        },
                        forces.as_mut_slice(),
                        0,
                        dt,
                        velocity_factor,
                    );
                },
            );
    }

    /// Recomputes the springs' cached lengths and directions from the current positions.
    pub fn update_spring_geometry(&mut self) {
        let chunk_size = self.spring_chunk_size();
        let variant = self.variant;
        let positions = self.points.positions();
        let (endpoints, lengths, directions) = self.springs.geometry_buffers_mut();

        endpoints
            .par_chunks(chunk_size)
            .zip(lengths.par_chunks_mut(chunk_size))
            .zip(directions.par_chunks_mut(chunk_size))
            .for_each(|((endpoints, lengths), directions)| {
                spring_vectors::calculate_spring_vectors_with(
                    variant,
                    0,
                    endpoints.len(),
                    positions,
                    endpoints,
                    lengths,
                    directions,
                );
            });
    }

    /// `Σ |length - rest_length|` over the cached spring geometry.
    pub fn spring_strain_error(&self) -> f32 {
        self.springs
            .lengths()
            .iter()
            .zip(self.springs.rest_lengths())
            .map(|(length, rest)| (length - rest).abs())
            .sum()
    }

    /// Lights every point with the lamps, `out_light[i]` receiving point `i`.
    pub fn diffuse_light(&self, lamps: &Lamps, out_light: &mut [f32]) -> Result<()> {
        if out_light.len() != self.points.len() {
            return Err(TrussworkError::LengthMismatch {
                what: "light buffer",
                expected: self.points.len(),
                actual: out_light.len(),
            });
        }

        let chunk_size = self.point_chunk_size();
        let (positions, planes) = (self.points.positions(), self.points.plane_ids());

        out_light
            .par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(c, out)| {
                let start = c * chunk_size;
                diffuse_light::diffuse_light_with(
                    self.variant,
                    start,
                    start + out.len(),
                    positions,
                    planes,
                    lamps,
                    out,
                );
            });

        Ok(())
    }

    fn point_chunk_size(&self) -> usize {
        chunk_size(self.points.len(), self.params.partitions)
    }

    fn spring_chunk_size(&self) -> usize {
        chunk_size(self.springs.len(), self.params.partitions)
    }
}

/// Even split of `len` elements into `parts`, rounded up to whole vectors.
fn chunk_size(len: usize, parts: usize) -> usize {
    make_aligned_float_element_count((len + parts - 1) / parts).max(VECTORIZATION_FLOAT_COUNT)
}

/// Splits the springs into `partitions` contiguous ranges; boundaries inside the
/// perfect-square prefix are moved down to a square boundary.
fn partition_springs(springs: &Springs, partitions: usize) -> Vec<Range<usize>> {
    let len = springs.len();
    let square_end = springs.perfect_square_count() * 4;
    let per_partition = (len + partitions - 1) / partitions;

    let mut ranges = Vec::with_capacity(partitions);
    let mut start = 0;
    for p in 0..partitions {
        let mut end = if p + 1 == partitions {
            len
        } else {
            (start + per_partition).min(len)
        };
        if end < square_end {
            end -= end % 4;
        }
        let end = end.max(start);

        ranges.push(start..end);
        start = end;
    }

    debug_assert_eq!(start, len);
    ranges
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::{Spring, SpringEndpoints};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Two stacked unit squares; the lower one is a perfect square.
    fn tower() -> (Points, Springs) {
        let positions = [
            Vec2::new(0.0, 1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(1.0, 2.0),
        ];
        let mut endpoints = SpringEndpoints::square(0, 1, 2, 3).to_vec();
        endpoints.extend([
            SpringEndpoints::new(1, 2),
            SpringEndpoints::new(0, 3),
            SpringEndpoints::new(4, 5),
            SpringEndpoints::new(0, 4),
            SpringEndpoints::new(3, 5),
            SpringEndpoints::new(0, 5),
        ]);
        let springs: Vec<_> = endpoints
            .into_iter()
            .map(|e| Spring::at_rest(e, &positions, 800.0, 0.5))
            .collect();

        let params = SimulationParams::default();
        (
            Points::from_positions(&positions, params.dt_iteration()),
            Springs::new(&springs, 1, positions.len()).unwrap(),
        )
    }

    #[test]
    fn test_params_validation() {
        assert!(SimulationParams::default().validate().is_ok());

        for params in [
            SimulationParams { dt: 0.0, ..Default::default() },
            SimulationParams { dt: f32::NAN, ..Default::default() },
            SimulationParams { iterations: 0, ..Default::default() },
            SimulationParams { global_damping: 1.0, ..Default::default() },
            SimulationParams { global_damping: -0.1, ..Default::default() },
            SimulationParams { partitions: 0, ..Default::default() },
        ] {
            assert!(
                matches!(params.validate(), Err(TrussworkError::InvalidConfig(_))),
                "{params:?}"
            );
        }
    }

    #[test]
    fn test_velocity_factor() {
        let params = SimulationParams {
            dt: 0.1,
            iterations: 4,
            global_damping: 0.5,
            partitions: 1,
        };
        assert!((params.dt_iteration() - 0.025).abs() < 1e-7);
        assert!((params.velocity_factor() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_spring_ranges_respect_squares() {
        let positions: Vec<_> = (0..8).map(|i| Vec2::new(i as f32, 0.0)).collect();
        let mut endpoints = Vec::new();
        for s in 0..3 {
            let base = (s * 2) as u32;
            endpoints.extend(SpringEndpoints::square(base, base + 1, base + 2, base + 3));
        }
        endpoints.extend((0..7).map(|i| SpringEndpoints::new(i, i + 1)));
        let springs: Vec<_> = endpoints
            .into_iter()
            .map(|e| Spring::new(e, 1.0, 1.0, 0.0))
            .collect();
        let springs = Springs::new(&springs, 3, positions.len()).unwrap();

        for partitions in 1..=8 {
            let ranges = partition_springs(&springs, partitions);
            assert_eq!(ranges.len(), partitions);
            assert_eq!(ranges[0].start, 0);
            assert_eq!(ranges[partitions - 1].end, springs.len());
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
            for r in &ranges {
                assert!(r.start >= 12 || r.start % 4 == 0, "{ranges:?}");
                assert!(r.end >= 12 || r.end % 4 == 0, "{ranges:?}");
            }
        }
    }

    #[test]
    fn test_rejects_springs_beyond_points() {
        let (_, springs) = tower();
        let points = Points::new(4);
        assert!(matches!(
            CpuSimulation::new(points, springs, SimulationParams::default()),
            Err(TrussworkError::IndexOutOfBounds(_))
        ));
    }

    #[test]
    fn test_structure_at_rest_stays_at_rest() {
        init_logger();
        let (points, springs) = tower();
        let initial = points.positions().to_vec();
        let mut simulation = CpuSimulation::new(points, springs, SimulationParams::default()).unwrap();

        simulation.simulate();

        for (p, q) in simulation.points().positions().iter().zip(&initial) {
            assert!((*p - *q).length() < 1e-5);
        }
        assert!(simulation.spring_strain_error() < 1e-4);
        assert!(simulation.dynamic_forces().is_zero());
    }

    #[test]
    fn test_geometry_cache_follows_positions() {
        let (points, springs) = tower();
        let mut simulation = CpuSimulation::new(points, springs, SimulationParams::default()).unwrap();

        simulation.points_mut().positions_mut()[5] = Vec2::new(1.0, 3.0);
        simulation.update_spring_geometry();

        // springs 6 (4-5), 8 (3-5) and 9 (0-5) touch the moved point
        let springs = simulation.springs();
        assert!((springs.lengths()[6] - 2f32.sqrt()).abs() < 1e-3);
        assert!((springs.lengths()[8] - 2.0).abs() < 1e-3);
        assert!((springs.directions()[8] - Vec2::Y).length() < 1e-3);
        assert!(simulation.spring_strain_error() > 0.9);
    }

    #[test]
    fn test_diffuse_light_checks_buffer_length() {
        let (points, springs) = tower();
        let simulation = CpuSimulation::new(points, springs, SimulationParams::default()).unwrap();
        let lamps = Lamps::new(&[crate::Lamp::new(Vec2::ZERO, 0, 1.0, 10.0)]);

        let mut light = vec![0.0; 5];
        assert!(matches!(
            simulation.diffuse_light(&lamps, &mut light),
            Err(TrussworkError::LengthMismatch { expected: 6, actual: 5, .. })
        ));

        let mut light = vec![0.0; 6];
        simulation.diffuse_light(&lamps, &mut light).unwrap();
        assert!((light[1] - 10.0).abs() < 1e-5);
        assert!((light[5] - (10.0 - 5f32.sqrt())).abs() < 1e-5);
    }
}
