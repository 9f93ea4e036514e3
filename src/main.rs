#[macro_use]
extern crate log;

use splosh::camera::Camera;
use splosh::per_frame_resources::{PerFrameResources, PerFrameUniformBufferContent};
use splosh::renderer::ParticleRenderer;
use splosh::scenario::{Scenario, ScenarioFile};
use splosh::screen::Screen;
use splosh::simulation::PbfFluid;
use splosh::simulation_controller::SimulationController;
use splosh::timer::Timer;
use splosh::wgpu_utils::pipelines::PipelineManager;
use splosh::wgpu_utils::shader::ShaderDirectory;

use std::path::Path;
use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::Window,
    window::WindowBuilder,
};

const SHADER_DIRECTORY: &str = "shader";
const SCENARIO_FILE: &str = "scenarios/dam_break.par";

pub struct Application {
    window: Window,
    window_surface: wgpu::Surface,
    screen: Screen,

    device: wgpu::Device,
    command_queue: wgpu::Queue,

    shader_dir: ShaderDirectory,
    scenario_file: ScenarioFile,
    pipeline_manager: PipelineManager,

    fluid: PbfFluid,
    controller: SimulationController,
    particle_renderer: ParticleRenderer,
    per_frame_resources: PerFrameResources,

    timer: Timer,
}

impl Application {
    fn new(event_loop: &EventLoop<()>) -> Application {
        let window = WindowBuilder::new()
            .with_title("Splosh")
            .with_resizable(true)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
            .build(&event_loop)
            .unwrap();

        let instance = wgpu::Instance::new(wgpu::BackendBit::PRIMARY);
        let window_surface = unsafe { instance.create_surface(&window) };
        let adapter = futures::executor::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&window_surface),
        }))
        .expect("no compatible gpu adapter found");

        let (device, command_queue) = futures::executor::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Device"),
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
        .expect("failed to create device");

        let screen = Screen::new(&device, &window_surface, window.inner_size());

        let shader_dir = ShaderDirectory::new(Path::new(SHADER_DIRECTORY));
        let scenario_file = ScenarioFile::new(Path::new(SCENARIO_FILE));
        let mut pipeline_manager = PipelineManager::new();

        // Startup is the one place where failures abort: without a scenario and a first
        // successful kernel build there is nothing to latch and keep alive.
        let scenario = Scenario::from_file(Path::new(SCENARIO_FILE)).unwrap_or_else(|err| panic!("{}", err));
        let fluid = PbfFluid::new(&device, &command_queue, &shader_dir, &mut pipeline_manager, &scenario).unwrap_or_else(|err| panic!("{}", err));

        let per_frame_resources = PerFrameResources::new(&device);
        let particle_renderer = ParticleRenderer::new(&device, &shader_dir, &mut pipeline_manager, per_frame_resources.bind_group_layout())
            .unwrap_or_else(|err| panic!("{}", err));

        let controller = SimulationController::new(scenario.particle_count);

        Application {
            window,
            window_surface,
            screen,

            device,
            command_queue,

            shader_dir,
            scenario_file,
            pipeline_manager,

            fluid,
            controller,
            particle_renderer,
            per_frame_resources,

            timer: Timer::new(),
        }
    }

    fn run(mut self, event_loop: EventLoop<()>) {
        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }
                    WindowEvent::Resized(size) => {
                        self.window_resize(size);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        self.window_resize(*new_inner_size);
                    }
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                virtual_keycode: Some(virtual_keycode),
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } => self.on_key_pressed(virtual_keycode, control_flow),
                    _ => {}
                },
                Event::MainEventsCleared => {
                    self.update();
                    self.window.request_redraw();
                }
                Event::RedrawRequested(_) => {
                    self.draw();
                }
                _ => (),
            }
        });
    }

    fn on_key_pressed(&mut self, virtual_keycode: VirtualKeyCode, control_flow: &mut ControlFlow) {
        let controls = &mut self.controller.controls;
        match virtual_keycode {
            VirtualKeyCode::Escape => *control_flow = ControlFlow::Exit,
            VirtualKeyCode::Space => {
                controls.pause_simulation = !controls.pause_simulation;
                info!("simulation {}", if controls.pause_simulation { "paused" } else { "running" });
            }
            VirtualKeyCode::R => {
                self.controller.schedule_reset();
            }
            VirtualKeyCode::W => {
                controls.generate_waves = !controls.generate_waves;
                info!("wave generator {}", if controls.generate_waves { "on" } else { "off" });
            }
            VirtualKeyCode::H => {
                controls.friends_histogram = !controls.friends_histogram;
            }
            _ => {}
        }
    }

    fn window_resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        // occasionally window size drops to zero which causes crashes along the way
        if self.screen.resolution() != size && size.width != 0 && size.height != 0 {
            self.screen = Screen::new(&self.device, &self.window_surface, size);
        }
    }

    fn update(&mut self) {
        self.controller.handle_resource_changes(
            &self.device,
            &self.command_queue,
            &mut self.fluid,
            &self.scenario_file,
            &self.shader_dir,
            &mut self.pipeline_manager,
        );

        if let Err(err) = self
            .controller
            .frame_steps(&self.device, &self.command_queue, &mut self.fluid, &self.pipeline_manager)
        {
            self.controller.latch_device_error(&err);
        }
    }

    fn draw(&mut self) {
        let frame = match self.screen.get_current_frame() {
            Ok(frame) => frame,
            Err(wgpu::SwapChainError::Outdated) | Err(wgpu::SwapChainError::Lost) => {
                self.screen = Screen::new(&self.device, &self.window_surface, self.window.inner_size());
                return;
            }
            Err(err) => {
                error!("failed to acquire next frame: {:?}", err);
                return;
            }
        };

        let params = self.fluid.params();
        self.per_frame_resources.update_gpu_data(
            &self.command_queue,
            PerFrameUniformBufferContent {
                camera: Camera::fill_uniform_buffer(
                    cgmath::Point3::new(params.x_min, params.y_min, params.z_min),
                    cgmath::Point3::new(params.x_max, params.y_max, params.z_max),
                    self.screen.aspect_ratio(),
                ),
                particle_radius: params.particle_render_size,
                total_passed_time: self.timer.total_passed().as_secs_f32(),
                padding: [0.0; 2],
            },
        );

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Encoder: Frame"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render pass: Particles"),
                color_attachments: &[wgpu::RenderPassColorAttachmentDescriptor {
                    attachment: &frame.output.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.2,
                            b: 0.3,
                            a: 1.0,
                        }),
                        store: true,
                    },
                }],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachmentDescriptor {
                    attachment: self.screen.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: true,
                    }),
                    stencil_ops: None,
                }),
            });

            rpass.set_bind_group(0, self.per_frame_resources.bind_group(), &[]);
            self.particle_renderer.draw(&mut rpass, &self.pipeline_manager, &self.fluid);
        }
        self.command_queue.submit(Some(encoder.finish()));

        std::mem::drop(frame);
        self.timer.on_frame_submitted();

        if self.timer.frame_count() % 600 == 0 {
            info!(
                "{:3.2}ms/frame, simulated time {:.1}s",
                self.timer.duration_last_frame().as_secs_f64() * 1000.0,
                self.controller.simulation_time()
            );
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new();
    let application = Application::new(&event_loop);
    application.run(event_loop);
}
