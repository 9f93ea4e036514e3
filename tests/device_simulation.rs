//! Device-side integration tests. Each test creates a headless wgpu device and drives the
//! simulation pipeline directly; when no adapter is available the tests skip themselves.

use cgmath::{MetricSpace, Point3};
use rand::prelude::*;
use splosh::scenario::Scenario;
use splosh::simulation::friends_list::{brute_force_neighbors, circle_index};
use splosh::simulation::uniform_grid::{cell_coord, cell_index, for_each_cell_entry};
use splosh::simulation::PbfFluid;
use splosh::wgpu_utils::pipelines::PipelineManager;
use splosh::wgpu_utils::shader::ShaderDirectory;
use std::path::Path;

struct TestContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    shader_dir: ShaderDirectory,
    pipeline_manager: PipelineManager,
}

fn create_test_context() -> Option<TestContext> {
    let instance = wgpu::Instance::new(wgpu::BackendBit::PRIMARY);
    let adapter = futures::executor::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
    }))?;
    let (device, queue) = futures::executor::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Test device"),
            features: wgpu::Features::PUSH_CONSTANTS,
            limits: wgpu::Limits {
                max_push_constant_size: 4,
                // the viscosity kernel binds five storage buffers at once
                max_storage_buffers_per_shader_stage: 8,
                ..Default::default()
            },
        },
        None,
    ))
    .ok()?;

    Some(TestContext {
        device,
        queue,
        shader_dir: ShaderDirectory::new(Path::new("shader")),
        pipeline_manager: PipelineManager::new(),
    })
}

macro_rules! test_context_or_skip {
    () => {
        match create_test_context() {
            Some(ctx) => ctx,
            None => {
                eprintln!("no gpu adapter available, skipping");
                return;
            }
        }
    };
}

fn scenario(overrides: &[(&str, &str)]) -> Scenario {
    let mut values = vec![
        ("resetSimOnChange", "0"),
        ("particleCount", "1000"),
        ("xMin", "0.0"),
        ("xMax", "1.0"),
        ("yMin", "0.0"),
        ("yMax", "1.0"),
        ("zMin", "0.0"),
        ("zMax", "1.0"),
        ("waveGenAmp", "0.1"),
        ("waveGenFreq", "1.0"),
        ("waveGenDuty", "0.5"),
        ("timeStep", "0.0083"),
        ("simIterations", "4"),
        ("subSteps", "1"),
        ("h", "0.05"),
        ("restDensity", "1000.0"),
        ("epsilon", "100.0"),
        ("gravity", "0.0"),
        ("vorticityFactor", "0.0"),
        ("viscosityFactor", "0.0"),
        ("surfaceTensionK", "0.000001"),
        ("surfaceTensionDist", "0.25"),
        ("friendsCircles", "4"),
        ("particlesPerCircle", "24"),
        ("setupSpacing", "0.95"),
        ("particleRenderSize", "0.01"),
    ];
    for (key, value) in overrides {
        match values.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = value,
            None => values.push((key, value)),
        }
    }
    let text = values.iter().map(|(key, value)| format!("{} = {}", key, value)).collect::<Vec<_>>().join("\n");
    Scenario::from_str(&text).unwrap()
}

fn build_fluid(ctx: &mut TestContext, scenario: &Scenario) -> PbfFluid {
    PbfFluid::new(&ctx.device, &ctx.queue, &ctx.shader_dir, &mut ctx.pipeline_manager, scenario).unwrap()
}

fn run_substeps(ctx: &TestContext, fluid: &mut PbfFluid, count: u32, paused: bool) {
    for _ in 0..count {
        fluid.acquire_shared_positions().unwrap();
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Encoder: Test substep"),
        });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("test substep"),
            });
            fluid.record_substep(&mut cpass, &ctx.pipeline_manager, paused, 0.0);
        }
        fluid.release_shared_positions().unwrap();
        ctx.queue.submit(Some(encoder.finish()));
    }
    ctx.device.poll(wgpu::Maintain::Wait);
}

fn random_cloud(count: usize, seed: u64) -> Vec<[f32; 4]> {
    let mut rng: rand::rngs::SmallRng = rand::SeedableRng::seed_from_u64(seed);
    (0..count)
        .map(|_| [rng.gen_range(0.05, 0.95), rng.gen_range(0.05, 0.95), rng.gen_range(0.05, 0.95), 0.0])
        .collect()
}

fn points_of(positions: &[[f32; 4]]) -> Vec<Point3<f32>> {
    positions.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect()
}

#[test]
fn grid_insert_partitions_every_particle_into_its_cell() {
    let mut ctx = test_context_or_skip!();
    let scenario = scenario(&[("particleCount", "300"), ("h", "0.1")]);
    let mut fluid = build_fluid(&mut ctx, &scenario);

    let positions = random_cloud(300, 7);
    fluid.write_positions(&ctx.queue, &positions).unwrap();
    // A paused substep builds the acceleration structures but commits nothing.
    run_substeps(&ctx, &mut fluid, 1, true);

    let (cell_heads, next_in_cell) = fluid.read_cell_lists(&ctx.device, &ctx.queue).unwrap();
    assert_eq!(cell_heads.len() as u32, fluid.params().grid_buffer_size);

    let points = points_of(&positions);
    let mut appearance_count = vec![0u32; positions.len()];
    for_each_cell_entry(&cell_heads, &next_in_cell, |cell, particle| {
        appearance_count[particle as usize] += 1;
        let expected_cell = cell_index(cell_coord(points[particle as usize], fluid.params()), fluid.params().grid_resolution);
        assert_eq!(cell, expected_cell, "particle {} filed under the wrong cell", particle);
    });
    assert!(appearance_count.iter().all(|&count| count == 1), "every particle must appear in exactly one cell list");
}

#[test]
fn friends_list_agrees_with_brute_force_search() {
    let mut ctx = test_context_or_skip!();
    // S5 geometry: 200 random particles in a unit box, h = 0.1, 4 circles of 20.
    let scenario = scenario(&[("particleCount", "200"), ("h", "0.1"), ("particlesPerCircle", "20")]);
    let mut fluid = build_fluid(&mut ctx, &scenario);

    let positions = random_cloud(200, 11);
    fluid.write_positions(&ctx.queue, &positions).unwrap();
    run_substeps(&ctx, &mut fluid, 1, true);

    let friends = fluid.read_friends_list(&ctx.device, &ctx.queue).unwrap();
    let points = points_of(&positions);
    let params = fluid.params();

    for i in 0..200u32 {
        // no circle counter beyond capacity
        for circle in 0..params.friends_circles {
            assert!(friends.circle_count(i, circle) <= params.particles_per_circle);
        }

        // no false neighbors, and each filed in the right circle
        let mut listed = Vec::new();
        for circle in 0..params.friends_circles {
            for slot in 0..friends.circle_count(i, circle) {
                let j = friends.neighbor(i, circle, slot);
                assert_ne!(j, i, "self index in friends list");
                let distance = points[i as usize].distance(points[j as usize]);
                assert!(distance < params.smoothing_length, "neighbor {} of {} is out of range", j, i);
                assert_eq!(circle, circle_index(distance, params.smoothing_length, params.friends_circles));
                listed.push(j);
            }
        }

        // missing neighbors only in overflowed circles
        for j in brute_force_neighbors(&points, i as usize, params.smoothing_length) {
            if !listed.contains(&j) {
                let distance = points[i as usize].distance(points[j as usize]);
                let circle = circle_index(distance, params.smoothing_length, params.friends_circles);
                assert_eq!(
                    friends.circle_count(i, circle),
                    params.particles_per_circle,
                    "particle {} misses neighbor {} although circle {} has room",
                    i,
                    j,
                    circle
                );
            }
        }
    }
}

#[test]
fn committed_positions_stay_inside_the_domain() {
    let mut ctx = test_context_or_skip!();
    // Overdense repulsive configuration under gravity, worst case for containment.
    let scenario = scenario(&[("particleCount", "1000"), ("gravity", "9.81"), ("subSteps", "2")]);
    let mut fluid = build_fluid(&mut ctx, &scenario);

    run_substeps(&ctx, &mut fluid, 60, false);

    let positions = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();
    let params = fluid.params();
    for (index, position) in positions.iter().enumerate() {
        assert!(
            position[0] >= params.x_min && position[0] <= params.x_max,
            "particle {} escaped in x: {}",
            index,
            position[0]
        );
        assert!(
            position[1] >= params.y_min && position[1] <= params.y_max,
            "particle {} escaped in y: {}",
            index,
            position[1]
        );
        assert!(
            position[2] >= params.z_min && position[2] <= params.z_max,
            "particle {} escaped in z: {}",
            index,
            position[2]
        );
    }
}

#[test]
fn quiescent_configuration_stays_at_rest() {
    let mut ctx = test_context_or_skip!();
    // Lattice spacing beyond the smoothing length, gravity off: no interactions, no motion.
    let scenario = scenario(&[("particleCount", "125"), ("setupSpacing", "1.2")]);
    let mut fluid = build_fluid(&mut ctx, &scenario);

    run_substeps(&ctx, &mut fluid, 10, false);

    let velocities = fluid.read_velocities(&ctx.device, &ctx.queue).unwrap();
    let kinetic_energy: f32 = velocities
        .iter()
        .map(|v| 0.5 * v[3] * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]))
        .sum();
    assert_eq!(kinetic_energy, 0.0);
}

#[test]
fn two_close_particles_repel() {
    let mut ctx = test_context_or_skip!();
    // S3: pair at 0.3 h, no gravity, 6 solver iterations.
    let scenario = scenario(&[("particleCount", "2"), ("simIterations", "6")]);
    let mut fluid = build_fluid(&mut ctx, &scenario);

    let h = fluid.params().smoothing_length;
    let start = [[0.5 - 0.15 * h, 0.5, 0.5, 0.0], [0.5 + 0.15 * h, 0.5, 0.5, 0.0]];
    fluid.write_positions(&ctx.queue, &start).unwrap();
    run_substeps(&ctx, &mut fluid, 1, false);

    let positions = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();
    let distance = Point3::from([positions[0][0], positions[0][1], positions[0][2]])
        .distance(Point3::from([positions[1][0], positions[1][1], positions[1][2]]));
    assert!(distance >= 0.3 * h + 0.1 * h, "pair only separated to {} (h = {})", distance, h);
}

#[test]
fn single_particle_falls_ballistically() {
    let mut ctx = test_context_or_skip!();
    // S2 with the floor moved out of the way so the fall stays unobstructed.
    let scenario = scenario(&[
        ("particleCount", "1"),
        ("gravity", "9.81"),
        ("timeStep", "0.01"),
        ("simIterations", "1"),
        ("yMin", "-2.0"),
        ("yMax", "2.0"),
    ]);
    let mut fluid = build_fluid(&mut ctx, &scenario);

    fluid.write_positions(&ctx.queue, &[[0.5, 0.9, 0.5, 0.0]]).unwrap();
    run_substeps(&ctx, &mut fluid, 50, false);

    let position = fluid.read_positions(&ctx.device, &ctx.queue).unwrap()[0];
    let velocity = fluid.read_velocities(&ctx.device, &ctx.queue).unwrap()[0];

    // Symplectic Euler lags the closed form by O(g dt t) over t = 0.5s.
    let expected_y = 0.9 - 0.5 * 9.81 * 0.5 * 0.5;
    assert!((position[1] - expected_y).abs() < 0.03, "y = {}, expected about {}", position[1], expected_y);
    assert!((velocity[1] - (-9.81 * 0.5)).abs() < 1e-2, "v_y = {}", velocity[1]);
    // x and z stay untouched
    assert_eq!(position[0], 0.5);
    assert_eq!(position[2], 0.5);
}

#[test]
fn wave_plunger_pushes_particles_off_the_inlet_face() {
    let mut ctx = test_context_or_skip!();
    let scenario_value = scenario(&[("particleCount", "1"), ("timeStep", "0.01")]);
    let mut fluid = build_fluid(&mut ctx, &scenario_value);

    fluid.write_positions(&ctx.queue, &[[0.01, 0.5, 0.5, 0.0]]).unwrap();

    // Drive the plunger through a quarter period, where its displacement peaks at
    // waveGenAmp * domain width = 0.1. The particle has to ride the face outward.
    let params = *fluid.params();
    let mut wave_time = 0.0f32;
    for _ in 0..25 {
        let wave_position = splosh::simulation_controller::SimulationController::wave_displacement(&params, wave_time);
        fluid.acquire_shared_positions().unwrap();
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Encoder: Wave substep"),
        });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("wave substep"),
            });
            fluid.record_substep(&mut cpass, &ctx.pipeline_manager, false, wave_position);
        }
        fluid.release_shared_positions().unwrap();
        ctx.queue.submit(Some(encoder.finish()));
        wave_time += params.time_step;
    }
    ctx.device.poll(wgpu::Maintain::Wait);

    let position = fluid.read_positions(&ctx.device, &ctx.queue).unwrap()[0];
    assert!(position[0] > 0.06, "particle was not pushed by the plunger, x = {}", position[0]);
}

#[test]
fn paused_frames_leave_state_bit_identical() {
    let mut ctx = test_context_or_skip!();
    let scenario = scenario(&[("particleCount", "500"), ("gravity", "9.81")]);
    let mut fluid = build_fluid(&mut ctx, &scenario);

    run_substeps(&ctx, &mut fluid, 5, false);
    let positions_before = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();
    let velocities_before = fluid.read_velocities(&ctx.device, &ctx.queue).unwrap();

    // Paused substeps still run the whole pipeline up to (but excluding) the commit.
    run_substeps(&ctx, &mut fluid, 5, true);

    // The intermediate buffers stay inspectable while paused.
    let predicted = fluid.read_predicted(&ctx.device, &ctx.queue).unwrap();
    let params = fluid.params();
    assert!(predicted
        .iter()
        .all(|p| p[1] >= params.y_min && p[1] <= params.y_max));

    let positions_after = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();
    let velocities_after = fluid.read_velocities(&ctx.device, &ctx.queue).unwrap();
    let bits = |data: &[[f32; 4]]| data.iter().flatten().map(|value| value.to_bits()).collect::<Vec<u32>>();
    assert_eq!(bits(&positions_before), bits(&positions_after));
    assert_eq!(bits(&velocities_before), bits(&velocities_after));
}

#[test]
fn reset_reproduces_the_initial_placement_exactly() {
    let mut ctx = test_context_or_skip!();
    let scenario_value = scenario(&[("particleCount", "512")]);
    let mut fluid = build_fluid(&mut ctx, &scenario_value);

    let initial = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();

    run_substeps(&ctx, &mut fluid, 20, false);
    fluid.reset(&ctx.device, &ctx.queue, &scenario_value).unwrap();

    let after_reset = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();
    let bits = |data: &[[f32; 4]]| data.iter().flatten().map(|value| value.to_bits()).collect::<Vec<u32>>();
    assert_eq!(bits(&initial), bits(&after_reset));
}

#[test]
fn repeated_runs_from_reset_follow_the_same_trajectory() {
    let mut ctx = test_context_or_skip!();
    let scenario_value = scenario(&[("particleCount", "512"), ("gravity", "9.81")]);
    let mut fluid = build_fluid(&mut ctx, &scenario_value);

    run_substeps(&ctx, &mut fluid, 20, false);
    let first_run = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();

    fluid.reset(&ctx.device, &ctx.queue, &scenario_value).unwrap();
    run_substeps(&ctx, &mut fluid, 20, false);
    let second_run = fluid.read_positions(&ctx.device, &ctx.queue).unwrap();

    // Cell list order is scheduler dependent, so per particle bits may differ across runs
    // on some drivers; aggregate statistics have to match tightly regardless.
    let mean = |data: &[[f32; 4]]| {
        let mut sum = [0.0f64; 3];
        for position in data {
            for axis in 0..3 {
                sum[axis] += position[axis] as f64;
            }
        }
        [sum[0] / data.len() as f64, sum[1] / data.len() as f64, sum[2] / data.len() as f64]
    };
    let first_mean = mean(&first_run);
    let second_mean = mean(&second_run);
    for axis in 0..3 {
        assert!(
            (first_mean[axis] - second_mean[axis]).abs() < 1e-3,
            "trajectory diverged: {:?} vs {:?}",
            first_mean,
            second_mean
        );
    }
}

#[test]
fn oversized_particle_count_is_an_alloc_error() {
    let mut ctx = test_context_or_skip!();
    let scenario = scenario(&[("particleCount", "4194305")]); // MAX_PARTICLE_COUNT + 1
    let result = PbfFluid::new(&ctx.device, &ctx.queue, &ctx.shader_dir, &mut ctx.pipeline_manager, &scenario);
    assert!(matches!(result, Err(splosh::error::SimError::Alloc { .. })));
}

#[test]
fn kernel_file_list_matches_the_assets_on_disk() {
    // No device needed: the enumeration exists for the resource watcher.
    for file in PbfFluid::kernel_file_list() {
        assert!(Path::new("shader").join(file).is_file(), "missing kernel asset {}", file);
    }
}
