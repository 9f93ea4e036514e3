use crate::error::{SimError, SimResult};
use crate::scenario::ScenarioFile;
use crate::simulation::diagnostics;
use crate::simulation::parameters::SimulationParametersContent;
use crate::simulation::PbfFluid;
use crate::wgpu_utils::pipelines::PipelineManager;
use crate::wgpu_utils::shader::ShaderDirectory;

/// Runtime switches injected from the outside (keyboard mapping in the binary).
pub struct SimulationControls {
    pub pause_simulation: bool,
    pub generate_waves: bool,
    pub friends_histogram: bool,
}

impl Default for SimulationControls {
    fn default() -> Self {
        SimulationControls {
            pause_simulation: false,
            generate_waves: false,
            friends_histogram: false,
        }
    }
}

/// Frame orchestration: reacts to resource changes, advances the wave generator and runs
/// the substep loop. Failed kernel builds and rejected scenarios latch stepping off until
/// the respective resource recovers; rendering stays alive throughout.
pub struct SimulationController {
    pub controls: SimulationControls,
    scheduled_reset: bool,
    kernels_valid: bool,
    scenario_valid: bool,
    previous_particle_count: u32,

    wave_time: f32,
    wave_position: f32,
    simulation_time: f32,
}

impl SimulationController {
    pub fn new(initial_particle_count: u32) -> Self {
        SimulationController {
            controls: SimulationControls::default(),
            scheduled_reset: false,
            kernels_valid: true,
            scenario_valid: true,
            previous_particle_count: initial_particle_count,

            wave_time: 0.0,
            wave_position: 0.0,
            simulation_time: 0.0,
        }
    }

    pub fn schedule_reset(&mut self) {
        self.scheduled_reset = true;
    }

    pub fn can_step(&self) -> bool {
        self.kernels_valid && self.scenario_valid
    }

    pub fn simulation_time(&self) -> f32 {
        self.simulation_time
    }

    pub fn wave_position(&self) -> f32 {
        self.wave_position
    }

    /// Plunger displacement from the x-min face for a given wave clock.
    pub fn wave_displacement(params: &SimulationParametersContent, wave_time: f32) -> f32 {
        let push_length = params.wave_gen_amplitude * (params.x_max - params.x_min);
        let t = params.wave_gen_frequency * wave_time;
        (1.0 - (2.0 * std::f32::consts::PI * t.fract().powf(params.wave_gen_duty)).cos()) * push_length / 2.0
    }

    fn advance_wave(&mut self, params: &SimulationParametersContent) {
        if self.controls.generate_waves {
            self.wave_position = Self::wave_displacement(params, self.wave_time);
            if !self.controls.pause_simulation {
                self.wave_time += params.time_step;
            }
        } else {
            self.wave_time = 0.0;
            self.wave_position = 0.0;
        }
    }

    /// Scenario edits, kernel edits and reset requests, applied between frames so no step
    /// is in flight during reallocation.
    pub fn handle_resource_changes(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        fluid: &mut PbfFluid,
        scenario_file: &ScenarioFile,
        shader_dir: &ShaderDirectory,
        pipeline_manager: &mut PipelineManager,
    ) {
        if scenario_file.detected_change() || self.scheduled_reset {
            match scenario_file.load() {
                Ok(scenario) => {
                    let needs_reset = scenario.particle_count != self.previous_particle_count || self.scheduled_reset || scenario.reset_sim_on_change;
                    let result = if needs_reset {
                        info!("resetting simulation ({} particles)", scenario.particle_count);
                        fluid.reset(device, queue, &scenario)
                    } else {
                        fluid.apply_scenario(queue, &scenario);
                        Ok(())
                    };

                    match result {
                        Ok(()) => {
                            self.previous_particle_count = scenario.particle_count;
                            self.scenario_valid = true;
                            if needs_reset {
                                self.wave_time = 0.0;
                                self.simulation_time = 0.0;
                            }
                        }
                        Err(err) => {
                            error!("{}", err);
                            self.scenario_valid = false;
                        }
                    }
                }
                Err(err) => {
                    error!("{}", err);
                    self.scenario_valid = false;
                }
            }
            self.scheduled_reset = false;
        }

        if shader_dir.detected_change() {
            match pipeline_manager.reload_all(device, shader_dir) {
                Ok(()) => {
                    info!("kernels reloaded");
                    self.kernels_valid = true;
                }
                Err(err) => {
                    error!("{}", err);
                    self.kernels_valid = false;
                }
            }
        }
    }

    /// The substep loop of one frame. Each substep acquires the shared position buffer,
    /// enqueues the fixed kernel sequence, releases the buffer and flushes the queue.
    pub fn frame_steps(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, fluid: &mut PbfFluid, pipeline_manager: &PipelineManager) -> SimResult<()> {
        if !self.can_step() {
            return Ok(());
        }

        self.advance_wave(fluid.params());

        let sub_steps = fluid.params().sub_steps;
        let time_step = fluid.params().time_step;
        for _ in 0..sub_steps {
            fluid.acquire_shared_positions()?;
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Encoder: Simulation substep"),
            });
            {
                let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("simulation substep"),
                });
                fluid.record_substep(&mut cpass, pipeline_manager, self.controls.pause_simulation, self.wave_position);
            }
            fluid.release_shared_positions()?;
            queue.submit(Some(encoder.finish()));

            if !self.controls.pause_simulation {
                self.simulation_time += time_step;
            }
        }

        if self.controls.friends_histogram {
            let friends = fluid.read_friends_list(device, queue)?;
            let histogram = diagnostics::friends_histogram(&friends, fluid.params());
            diagnostics::log_friends_histogram(&histogram, fluid.particle_count());
        }

        Ok(())
    }

    /// A per-frame device failure suppresses stepping until the next successful reload.
    pub fn latch_device_error(&mut self, err: &SimError) {
        error!("{}", err);
        self.kernels_valid = false;
    }
}
