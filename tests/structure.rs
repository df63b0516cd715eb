use approx::assert_abs_diff_eq;
use glam::Vec2;
use trusswork::{
    cpu::{CpuSimulation, SimulationParams},
    kernels, DynamicForces, Lamp, Lamps, Points, Spring, SpringEndpoints, Springs,
};

const STIFFNESS: f32 = 1000.0;
const DAMPING: f32 = 1.0;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A strip of `cells` unit cells, two points high. Even cells are perfect
/// squares; odd cells only add their diagonals, their sides belonging to the
/// neighbouring squares. Top and bottom edges follow as plain springs.
fn strip(cells: u32, dt: f32) -> (Points, Vec<Spring>, usize) {
    assert!(cells % 2 == 1);
    let top = |x: u32| 2 * x;
    let bottom = |x: u32| 2 * x + 1;

    let positions: Vec<Vec2> = (0..=cells)
        .flat_map(|x| [Vec2::new(x as f32, 1.0), Vec2::new(x as f32, 0.0)])
        .collect();

    let mut endpoints = Vec::new();
    let mut squares = 0;
    for c in (0..cells).step_by(2) {
        endpoints.extend(SpringEndpoints::square(top(c), bottom(c), bottom(c + 1), top(c + 1)));
        squares += 1;
    }
    for c in (1..cells).step_by(2) {
        endpoints.push(SpringEndpoints::new(top(c), bottom(c + 1)));
        endpoints.push(SpringEndpoints::new(top(c + 1), bottom(c)));
    }
    for c in 0..cells {
        endpoints.push(SpringEndpoints::new(top(c), top(c + 1)));
        endpoints.push(SpringEndpoints::new(bottom(c), bottom(c + 1)));
    }

    let springs = endpoints
        .into_iter()
        .map(|e| Spring::at_rest(e, &positions, STIFFNESS, DAMPING))
        .collect();

    (Points::from_positions(&positions, dt), springs, squares)
}

fn simulation(cells: u32, params: SimulationParams) -> CpuSimulation {
    let (points, springs, squares) = strip(cells, params.dt_iteration());
    let springs = Springs::new(&springs, squares, points.len()).unwrap();
    CpuSimulation::new(points, springs, params).unwrap()
}

fn params(partitions: usize) -> SimulationParams {
    SimulationParams {
        dt: 0.02,
        iterations: 10,
        global_damping: 0.01,
        partitions,
    }
}

#[test]
fn test_stretched_strip_relaxes() {
    init_logger();
    let mut simulation = simulation(5, params(3));

    // Pull the right end out.
    for p in [10, 11] {
        simulation.points_mut().positions_mut()[p].x += 0.5;
    }
    simulation.update_spring_geometry();
    let initial_error = simulation.spring_strain_error();
    assert!(initial_error > 1.0);

    for _ in 0..100 {
        simulation.simulate();
        assert!(simulation.dynamic_forces().is_zero());
    }

    assert!(
        simulation.spring_strain_error() < initial_error * 0.05,
        "{} -> {}",
        initial_error,
        simulation.spring_strain_error()
    );
    for p in simulation.points().positions() {
        assert!(p.is_finite());
    }
}

#[test]
fn test_pinned_point_holds_under_load() {
    init_logger();
    let mut simulation = simulation(3, params(2));
    let points = simulation.points_mut();
    points.static_forces_mut().fill(Vec2::new(0.0, -9.8));
    points.pin(0);
    points.pin(1);
    let anchors = [points.positions()[0], points.positions()[1]];
    let free_end = points.positions()[7];

    for _ in 0..20 {
        simulation.simulate();
    }

    let positions = simulation.points().positions();
    assert_eq!(positions[0], anchors[0]);
    assert_eq!(positions[1], anchors[1]);
    assert!(positions[7].y < free_end.y - 1e-3);
}

#[test]
fn test_partition_count_does_not_change_motion() {
    init_logger();
    let mut single = simulation(7, params(1));
    let mut split = simulation(7, params(5));
    assert_eq!(split.spring_ranges().len(), 5);

    for simulation in [&mut single, &mut split] {
        simulation.points_mut().velocities_mut()[3] = Vec2::new(2.0, -1.0);
        simulation.points_mut().velocities_mut()[12] = Vec2::new(-1.0, 0.5);
    }
    for _ in 0..5 {
        single.simulate();
        split.simulate();
    }

    for (a, b) in single
        .points()
        .positions()
        .iter()
        .zip(split.points().positions())
    {
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-4);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-4);
    }
}

#[test]
fn test_kernel_step_by_hand() {
    let dt = 0.002;
    let (mut points, springs, squares) = strip(1, dt);
    let springs = Springs::new(&springs, squares, points.len()).unwrap();
    let mut forces = DynamicForces::new(2, points.len());

    points.positions_mut()[2].x += 0.1;

    kernels::apply_springs_forces(&points, &springs, 0, 4, forces.partition_mut(0));
    kernels::apply_springs_forces(&points, &springs, 4, springs.len(), forces.partition_mut(1));

    let net = (0..points.len()).fold(Vec2::ZERO, |net, p| net + forces.total(p));
    assert_abs_diff_eq!(net.x, 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(net.y, 0.0, epsilon = 1e-3);
    // The stretched corner is pulled back.
    assert!(forces.total(2).x < 0.0);

    let before = points.positions()[2];
    kernels::integrate_and_reset_dynamic_forces(
        &mut points,
        0,
        4,
        forces.partitions_mut(),
        dt,
        0.99 / dt,
    );

    assert!(forces.is_zero());
    assert!(points.positions()[2].x < before.x);
}

#[test]
fn test_simulation_lighting() {
    let simulation = simulation(3, params(2));
    let lamps = Lamps::new(&[
        Lamp::new(Vec2::new(0.0, 0.0), 0, 0.5, 4.0),
        Lamp::new(Vec2::new(3.0, 1.0), 0, 1.0, 1.5),
    ]);

    let mut light = vec![0.0; simulation.points().len()];
    simulation.diffuse_light(&lamps, &mut light).unwrap();

    // point 1 sits on the first lamp, point 6 on the second
    assert_abs_diff_eq!(light[1], 2.0, epsilon = 1e-5);
    assert_abs_diff_eq!(light[6], 1.5, epsilon = 1e-5);
    // point 4 is (2, 1): 0.5 * (4 - √5) against 1.0 * (1.5 - 1)
    assert_abs_diff_eq!(light[4], 0.5 * (4.0 - 5f32.sqrt()), epsilon = 1e-5);
}

#[test]
fn test_simulation_lighting_respects_planes() {
    let mut simulation = simulation(3, params(2));
    // (2, 1) and (3, 0) move to plane 1.
    for p in [4, 7] {
        simulation.points_mut().plane_ids_mut()[p] = 1;
    }
    let lamps = Lamps::new(&[
        Lamp::new(Vec2::new(0.0, 0.0), 0, 0.5, 4.0),
        Lamp::new(Vec2::new(3.0, 1.0), 0, 1.0, 1.5),
        Lamp::new(Vec2::new(3.0, 0.0), 1, 2.0, 1.2),
    ]);

    let mut light = vec![0.0; simulation.points().len()];
    simulation.diffuse_light(&lamps, &mut light).unwrap();

    // Point 4 is out of reach of the only lamp on its plane.
    assert_eq!(light[4], 0.0);
    assert_abs_diff_eq!(light[7], 2.4, epsilon = 1e-5);
    // Plane 0 ignores the plane 1 lamp.
    assert_abs_diff_eq!(light[5], 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(light[6], 1.5, epsilon = 1e-5);
}
