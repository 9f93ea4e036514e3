use super::diagnostics;
use super::friends_list::{FriendsList, FriendsListData};
use super::parameters::{SimulationParameters, SimulationParametersContent};
use super::particle_buffers::ParticleBuffers;
use super::shared_buffer::SharedBufferHolder;
use super::uniform_grid::UniformGrid;
use crate::error::SimResult;
use crate::scenario::Scenario;
use crate::wgpu_utils::{self, binding_builder::*, binding_glsl, pipelines::*, shader::ShaderDirectory};
use std::path::Path;
use std::rc::Rc;

/// The position based fluids pipeline: all device buffers, bind groups and compute
/// pipelines of one particle allocation, plus the fixed kernel sequence of a substep.
///
/// Per substep: predict -> grid reset -> grid insert -> friends build ->
/// (scaling -> delta -> update predicted) x N -> velocities -> viscosity -> vorticity
/// -> commit (skipped while paused). All dispatches go to one in-order queue; that
/// ordering is the only synchronization the kernels rely on.
pub struct PbfFluid {
    parameters: SimulationParameters,
    buffers: ParticleBuffers,
    grid: UniformGrid,
    friends: FriendsList,

    layouts: KernelLayouts,
    bind_groups: KernelBindGroups,

    pipeline_predict: ComputePipelineHandle,
    pipeline_grid_reset: ComputePipelineHandle,
    pipeline_grid_insert: ComputePipelineHandle,
    pipeline_friends: ComputePipelineHandle,
    pipeline_scaling: ComputePipelineHandle,
    pipeline_delta: ComputePipelineHandle,
    pipeline_update_predicted: ComputePipelineHandle,
    pipeline_velocities: ComputePipelineHandle,
    pipeline_viscosity: ComputePipelineHandle,
    pipeline_vorticity: ComputePipelineHandle,
    pipeline_commit: ComputePipelineHandle,

    shuffle_seed: u64,
}

struct KernelLayouts {
    parameters: BindGroupLayoutWithDesc,
    predict: BindGroupLayoutWithDesc,
    grid_reset: BindGroupLayoutWithDesc,
    grid_insert: BindGroupLayoutWithDesc,
    friends: BindGroupLayoutWithDesc,
    scaling: BindGroupLayoutWithDesc,
    delta: BindGroupLayoutWithDesc,
    update_predicted: BindGroupLayoutWithDesc,
    velocities: BindGroupLayoutWithDesc,
    viscosity: BindGroupLayoutWithDesc,
    vorticity: BindGroupLayoutWithDesc,
    commit: BindGroupLayoutWithDesc,
}

struct KernelBindGroups {
    parameters: wgpu::BindGroup,
    predict: wgpu::BindGroup,
    grid_reset: wgpu::BindGroup,
    grid_insert: wgpu::BindGroup,
    friends: wgpu::BindGroup,
    scaling: wgpu::BindGroup,
    delta: wgpu::BindGroup,
    update_predicted: wgpu::BindGroup,
    velocities: wgpu::BindGroup,
    viscosity: wgpu::BindGroup,
    vorticity: wgpu::BindGroup,
    commit: wgpu::BindGroup,
    renderer: wgpu::BindGroup,
}

fn storage_group_layout(device: &wgpu::Device, label: &str, read_only_flags: &[bool]) -> BindGroupLayoutWithDesc {
    let mut builder = BindGroupLayoutBuilder::new();
    for read_only in read_only_flags {
        builder = builder.next_binding_compute(binding_glsl::buffer(*read_only));
    }
    builder.create(device, label)
}

impl KernelLayouts {
    fn new(device: &wgpu::Device) -> Self {
        KernelLayouts {
            parameters: BindGroupLayoutBuilder::new()
                .next_binding_compute(binding_glsl::uniform())
                .create(device, "BindGroupLayout: Simulation parameters"),
            predict: storage_group_layout(device, "BindGroupLayout: Predict positions", &[true, true, false]),
            grid_reset: storage_group_layout(device, "BindGroupLayout: Grid reset", &[false, false]),
            grid_insert: storage_group_layout(device, "BindGroupLayout: Grid insert", &[true, false, false]),
            friends: storage_group_layout(device, "BindGroupLayout: Build friends list", &[true, true, true, false]),
            scaling: storage_group_layout(device, "BindGroupLayout: Compute scaling", &[true, false, true]),
            delta: storage_group_layout(device, "BindGroupLayout: Compute delta", &[true, true, true, false]),
            update_predicted: storage_group_layout(device, "BindGroupLayout: Update predicted", &[false, true]),
            velocities: storage_group_layout(device, "BindGroupLayout: Update velocities", &[true, true, false]),
            viscosity: storage_group_layout(device, "BindGroupLayout: Apply viscosity", &[true, true, false, false, true]),
            vorticity: storage_group_layout(device, "BindGroupLayout: Apply vorticity", &[true, false, true, true]),
            commit: storage_group_layout(device, "BindGroupLayout: Update positions", &[false, true, false, true]),
        }
    }
}

impl KernelBindGroups {
    // Re-armed as a whole whenever the particle allocation changes.
    fn new(
        device: &wgpu::Device,
        layouts: &KernelLayouts,
        parameters: &SimulationParameters,
        buffers: &ParticleBuffers,
        grid: &UniformGrid,
        friends: &FriendsList,
    ) -> Self {
        let positions = buffers.shared_positions.buffer();
        KernelBindGroups {
            parameters: BindGroupBuilder::new(&layouts.parameters)
                .resource(parameters.binding_resource())
                .create(device, "BindGroup: Simulation parameters"),
            predict: BindGroupBuilder::new(&layouts.predict)
                .resource(positions.as_entire_binding())
                .resource(buffers.velocities.as_entire_binding())
                .resource(buffers.predicted.as_entire_binding())
                .create(device, "BindGroup: Predict positions"),
            grid_reset: BindGroupBuilder::new(&layouts.grid_reset)
                .resource(grid.cell_heads().as_entire_binding())
                .resource(grid.next_in_cell().as_entire_binding())
                .create(device, "BindGroup: Grid reset"),
            grid_insert: BindGroupBuilder::new(&layouts.grid_insert)
                .resource(buffers.predicted.as_entire_binding())
                .resource(grid.cell_heads().as_entire_binding())
                .resource(grid.next_in_cell().as_entire_binding())
                .create(device, "BindGroup: Grid insert"),
            friends: BindGroupBuilder::new(&layouts.friends)
                .resource(buffers.predicted.as_entire_binding())
                .resource(grid.cell_heads().as_entire_binding())
                .resource(grid.next_in_cell().as_entire_binding())
                .resource(friends.buffer().as_entire_binding())
                .create(device, "BindGroup: Build friends list"),
            scaling: BindGroupBuilder::new(&layouts.scaling)
                .resource(buffers.predicted.as_entire_binding())
                .resource(buffers.scaling_factors.as_entire_binding())
                .resource(friends.buffer().as_entire_binding())
                .create(device, "BindGroup: Compute scaling"),
            delta: BindGroupBuilder::new(&layouts.delta)
                .resource(buffers.predicted.as_entire_binding())
                .resource(buffers.scaling_factors.as_entire_binding())
                .resource(friends.buffer().as_entire_binding())
                .resource(buffers.deltas.as_entire_binding())
                .create(device, "BindGroup: Compute delta"),
            update_predicted: BindGroupBuilder::new(&layouts.update_predicted)
                .resource(buffers.predicted.as_entire_binding())
                .resource(buffers.deltas.as_entire_binding())
                .create(device, "BindGroup: Update predicted"),
            velocities: BindGroupBuilder::new(&layouts.velocities)
                .resource(positions.as_entire_binding())
                .resource(buffers.predicted.as_entire_binding())
                .resource(buffers.velocities.as_entire_binding())
                .create(device, "BindGroup: Update velocities"),
            viscosity: BindGroupBuilder::new(&layouts.viscosity)
                .resource(buffers.predicted.as_entire_binding())
                .resource(buffers.velocities.as_entire_binding())
                .resource(buffers.delta_velocities.as_entire_binding())
                .resource(buffers.omegas.as_entire_binding())
                .resource(friends.buffer().as_entire_binding())
                .create(device, "BindGroup: Apply viscosity"),
            vorticity: BindGroupBuilder::new(&layouts.vorticity)
                .resource(buffers.predicted.as_entire_binding())
                .resource(buffers.delta_velocities.as_entire_binding())
                .resource(buffers.omegas.as_entire_binding())
                .resource(friends.buffer().as_entire_binding())
                .create(device, "BindGroup: Apply vorticity"),
            commit: BindGroupBuilder::new(&layouts.commit)
                .resource(positions.as_entire_binding())
                .resource(buffers.predicted.as_entire_binding())
                .resource(buffers.velocities.as_entire_binding())
                .resource(buffers.delta_velocities.as_entire_binding())
                .create(device, "BindGroup: Update positions"),
            renderer: BindGroupBuilder::new(PbfFluid::get_or_create_group_layout_renderer(device))
                .resource(positions.as_entire_binding())
                .create(device, "BindGroup: Fluid renderer"),
        }
    }
}

static mut GROUP_LAYOUT_RENDERER: Option<BindGroupLayoutWithDesc> = None;

impl PbfFluid {
    const COMPUTE_LOCAL_SIZE_PARTICLES: u32 = 64;
    const PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<f32>() as u32;
    const DEFAULT_SHUFFLE_SEED: u64 = 0x5b10b5;

    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shader_dir: &ShaderDirectory,
        pipeline_manager: &mut PipelineManager,
        scenario: &Scenario,
    ) -> SimResult<Self> {
        let parameters = SimulationParameters::new(device, scenario);
        let shuffle_seed = Self::DEFAULT_SHUFFLE_SEED;
        let buffers = ParticleBuffers::new(device, queue, parameters.content(), shuffle_seed)?;
        let grid = UniformGrid::new(device, parameters.content().grid_resolution, parameters.content().particle_count);
        let friends = FriendsList::new(device, parameters.content());

        let layouts = KernelLayouts::new(device);
        let bind_groups = KernelBindGroups::new(device, &layouts, &parameters, &buffers, &grid, &friends);

        // One shared push constant range keeps all compute pipeline layouts compatible,
        // so push constants survive pipeline switches within a pass.
        let push_constant_ranges = &[wgpu::PushConstantRange {
            stages: wgpu::ShaderStage::COMPUTE,
            range: 0..Self::PUSH_CONSTANT_SIZE,
        }];
        let kernel_layout = |kernel_group: &BindGroupLayoutWithDesc, label| {
            Rc::new(device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layouts.parameters.layout, &kernel_group.layout],
                push_constant_ranges,
            }))
        };

        let mut create = |layout: Rc<wgpu::PipelineLayout>, label: &'static str, path: &'static str| {
            pipeline_manager.create_compute_pipeline(device, shader_dir, ComputePipelineCreationDesc::new(label, layout, Path::new(path)))
        };

        let pipeline_predict = create(
            kernel_layout(&layouts.predict, "PipelineLayout: Predict positions"),
            "Fluid: Predict positions",
            "simulation/predict_positions.comp",
        )?;
        let pipeline_grid_reset = create(
            kernel_layout(&layouts.grid_reset, "PipelineLayout: Grid reset"),
            "Fluid: Grid reset",
            "simulation/grid_reset.comp",
        )?;
        let pipeline_grid_insert = create(
            kernel_layout(&layouts.grid_insert, "PipelineLayout: Grid insert"),
            "Fluid: Grid insert",
            "simulation/grid_insert.comp",
        )?;
        let pipeline_friends = create(
            kernel_layout(&layouts.friends, "PipelineLayout: Build friends list"),
            "Fluid: Build friends list",
            "simulation/build_friends_list.comp",
        )?;
        let pipeline_scaling = create(
            kernel_layout(&layouts.scaling, "PipelineLayout: Compute scaling"),
            "Fluid: Compute scaling",
            "simulation/compute_scaling.comp",
        )?;
        let pipeline_delta = create(
            kernel_layout(&layouts.delta, "PipelineLayout: Compute delta"),
            "Fluid: Compute delta",
            "simulation/compute_delta.comp",
        )?;
        let pipeline_update_predicted = create(
            kernel_layout(&layouts.update_predicted, "PipelineLayout: Update predicted"),
            "Fluid: Update predicted",
            "simulation/update_predicted.comp",
        )?;
        let pipeline_velocities = create(
            kernel_layout(&layouts.velocities, "PipelineLayout: Update velocities"),
            "Fluid: Update velocities",
            "simulation/update_velocities.comp",
        )?;
        let pipeline_viscosity = create(
            kernel_layout(&layouts.viscosity, "PipelineLayout: Apply viscosity"),
            "Fluid: Apply viscosity",
            "simulation/apply_viscosity.comp",
        )?;
        let pipeline_vorticity = create(
            kernel_layout(&layouts.vorticity, "PipelineLayout: Apply vorticity"),
            "Fluid: Apply vorticity",
            "simulation/apply_vorticity.comp",
        )?;
        let pipeline_commit = create(
            kernel_layout(&layouts.commit, "PipelineLayout: Update positions"),
            "Fluid: Update positions",
            "simulation/update_positions.comp",
        )?;

        let fluid = PbfFluid {
            pipeline_predict,
            pipeline_grid_reset,
            pipeline_grid_insert,
            pipeline_friends,
            pipeline_scaling,
            pipeline_delta,
            pipeline_update_predicted,
            pipeline_velocities,
            pipeline_viscosity,
            pipeline_vorticity,
            pipeline_commit,

            parameters,
            buffers,
            grid,
            friends,
            layouts,
            bind_groups,
            shuffle_seed,
        };

        fluid.parameters.upload(queue);
        Ok(fluid)
    }

    /// Files the resource watcher needs to track for kernel hot reload.
    pub fn kernel_file_list() -> &'static [&'static str] {
        &[
            "simulation/parameters.glsl",
            "simulation/sph_kernels.glsl",
            "simulation/grid.glsl",
            "simulation/friends.glsl",
            "simulation/predict_positions.comp",
            "simulation/grid_reset.comp",
            "simulation/grid_insert.comp",
            "simulation/build_friends_list.comp",
            "simulation/compute_scaling.comp",
            "simulation/compute_delta.comp",
            "simulation/update_predicted.comp",
            "simulation/update_velocities.comp",
            "simulation/apply_viscosity.comp",
            "simulation/apply_vorticity.comp",
            "simulation/update_positions.comp",
        ]
    }

    pub fn get_or_create_group_layout_renderer(device: &wgpu::Device) -> &'static BindGroupLayoutWithDesc {
        unsafe {
            GROUP_LAYOUT_RENDERER.get_or_insert_with(|| {
                BindGroupLayoutBuilder::new()
                    .next_binding_vertex(binding_glsl::buffer(true))
                    .create(device, "BindGroupLayout: ParticleRenderer")
            })
        }
    }

    /// Applies a new scenario. Reallocates every particle sized buffer and re-arms all
    /// bind groups; the caller guarantees no step is in flight.
    pub fn reset(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scenario: &Scenario) -> SimResult<()> {
        self.parameters.apply_scenario(scenario);

        self.buffers = ParticleBuffers::new(device, queue, self.parameters.content(), self.shuffle_seed)?;
        self.grid = UniformGrid::new(device, self.parameters.content().grid_resolution, self.parameters.content().particle_count);
        self.friends = FriendsList::new(device, self.parameters.content());
        self.bind_groups = KernelBindGroups::new(device, &self.layouts, &self.parameters, &self.buffers, &self.grid, &self.friends);

        self.parameters.upload(queue);
        Ok(())
    }

    /// Pushes edited parameters to the device without touching the particle state.
    pub fn apply_scenario(&mut self, queue: &wgpu::Queue, scenario: &Scenario) {
        self.parameters.apply_scenario(scenario);
        self.parameters.upload(queue);
    }

    pub fn acquire_shared_positions(&mut self) -> SimResult<()> {
        self.buffers.shared_positions.acquire_for_simulation()
    }

    pub fn release_shared_positions(&mut self) -> SimResult<()> {
        self.buffers.shared_positions.release_to_renderer()
    }

    /// Records one substep. The shared position buffer must be acquired and the
    /// parameter block uploaded before the first call of a frame.
    pub fn record_substep<'a>(&'a self, cpass: &mut wgpu::ComputePass<'a>, pipeline_manager: &'a PipelineManager, paused: bool, wave_position: f32) {
        assert_eq!(
            self.buffers.shared_positions.holder(),
            SharedBufferHolder::Simulation,
            "substep recorded without acquiring the shared position buffer"
        );

        let params = self.parameters.content();
        let particle_groups = wgpu_utils::compute_group_size_1d(params.particle_count, Self::COMPUTE_LOCAL_SIZE_PARTICLES);
        let grid_reset_groups = wgpu_utils::compute_group_size_1d(self.grid.reset_work_item_count(), Self::COMPUTE_LOCAL_SIZE_PARTICLES);

        cpass.set_bind_group(0, &self.bind_groups.parameters, &[]);

        cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_predict));
        cpass.set_bind_group(1, &self.bind_groups.predict, &[]);
        cpass.dispatch(particle_groups, 1, 1);

        cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_grid_reset));
        cpass.set_bind_group(1, &self.bind_groups.grid_reset, &[]);
        cpass.dispatch(grid_reset_groups, 1, 1);

        cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_grid_insert));
        cpass.set_bind_group(1, &self.bind_groups.grid_insert, &[]);
        cpass.dispatch(particle_groups, 1, 1);

        cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_friends));
        cpass.set_bind_group(1, &self.bind_groups.friends, &[]);
        cpass.dispatch(particle_groups, 1, 1);

        cpass.set_push_constants(0, bytemuck::bytes_of(&wave_position));
        for _ in 0..params.solver_iterations {
            cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_scaling));
            cpass.set_bind_group(1, &self.bind_groups.scaling, &[]);
            cpass.dispatch(particle_groups, 1, 1);

            cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_delta));
            cpass.set_bind_group(1, &self.bind_groups.delta, &[]);
            cpass.dispatch(particle_groups, 1, 1);

            cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_update_predicted));
            cpass.set_bind_group(1, &self.bind_groups.update_predicted, &[]);
            cpass.dispatch(particle_groups, 1, 1);
        }

        cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_velocities));
        cpass.set_bind_group(1, &self.bind_groups.velocities, &[]);
        cpass.dispatch(particle_groups, 1, 1);

        cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_viscosity));
        cpass.set_bind_group(1, &self.bind_groups.viscosity, &[]);
        cpass.dispatch(particle_groups, 1, 1);

        cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_vorticity));
        cpass.set_bind_group(1, &self.bind_groups.vorticity, &[]);
        cpass.dispatch(particle_groups, 1, 1);

        if !paused {
            cpass.set_pipeline(pipeline_manager.get_compute(&self.pipeline_commit));
            cpass.set_bind_group(1, &self.bind_groups.commit, &[]);
            cpass.dispatch(particle_groups, 1, 1);
        }
    }

    pub fn particle_count(&self) -> u32 {
        self.buffers.particle_count()
    }

    pub fn params(&self) -> &SimulationParametersContent {
        self.parameters.content()
    }

    pub fn bind_group_renderer(&self) -> &wgpu::BindGroup {
        &self.bind_groups.renderer
    }

    pub fn shared_positions_held_by(&self) -> SharedBufferHolder {
        self.buffers.shared_positions.holder()
    }

    /// Replaces every particle position, following the same acquire-upload-release path as
    /// the initial placement. Meant for diagnostics and tests that need a handcrafted
    /// configuration instead of the dam break lattice.
    pub fn write_positions(&mut self, queue: &wgpu::Queue, positions: &[[f32; 4]]) -> SimResult<()> {
        assert_eq!(positions.len() as u32, self.particle_count());
        self.buffers.shared_positions.acquire_for_simulation()?;
        queue.write_buffer(self.buffers.shared_positions.buffer(), 0, bytemuck::cast_slice(positions));
        self.buffers.shared_positions.release_to_renderer()
    }

    // Debug readbacks. These stall the queue, nothing calls them on the steady state path.

    pub fn read_positions(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> SimResult<Vec<[f32; 4]>> {
        diagnostics::read_buffer(device, queue, self.buffers.shared_positions.buffer(), self.particle_count())
    }

    pub fn read_predicted(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> SimResult<Vec<[f32; 4]>> {
        diagnostics::read_buffer(device, queue, &self.buffers.predicted, self.particle_count())
    }

    pub fn read_velocities(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> SimResult<Vec<[f32; 4]>> {
        diagnostics::read_buffer(device, queue, &self.buffers.velocities, self.particle_count())
    }

    pub fn read_cell_lists(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> SimResult<(Vec<i32>, Vec<i32>)> {
        let cell_heads = diagnostics::read_buffer(device, queue, self.grid.cell_heads(), self.grid.cell_count())?;
        let next_in_cell = diagnostics::read_buffer(device, queue, self.grid.next_in_cell(), self.particle_count())?;
        Ok((cell_heads, next_in_cell))
    }

    pub fn read_friends_list(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> SimResult<FriendsListData> {
        let entries = diagnostics::read_buffer(device, queue, self.friends.buffer(), self.friends.entry_count())?;
        Ok(FriendsListData {
            entries,
            friends_circles: self.params().friends_circles,
            particles_per_circle: self.params().particles_per_circle,
        })
    }
}
