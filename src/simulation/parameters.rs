use crate::scenario::Scenario;
use crate::wgpu_utils::uniformbuffer::UniformBuffer;

/// Device mirror of the scenario. Bound as a uniform by every simulation kernel,
/// no per kernel argument plumbing. Field order and types match
/// `shader/simulation/parameters.glsl` - all members are 4 byte scalars so the
/// std140 layout is identical to this #[repr(C)] struct.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SimulationParametersContent {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z_min: f32,
    pub z_max: f32,

    pub wave_gen_amplitude: f32,
    pub wave_gen_frequency: f32,
    pub wave_gen_duty: f32,

    pub time_step: f32,
    pub solver_iterations: u32,
    pub sub_steps: u32,
    pub smoothing_length: f32,
    pub rest_density: f32,
    pub cfm_epsilon: f32,
    pub gravity: f32,
    pub vorticity_factor: f32,
    pub viscosity_factor: f32,
    pub surface_tension_k: f32,
    pub surface_tension_dist: f32,

    pub particle_count: u32,
    pub friends_circles: u32,
    pub particles_per_circle: u32,
    pub grid_resolution: u32,
    pub grid_buffer_size: u32,

    pub setup_spacing: f32,
    pub particle_render_size: f32,
    pub segment_size: u32,
    pub sort_iterations: u32,

    pub smoothing_length_sq: f32,
    pub poly6_factor: f32,
    pub grad_spiky_factor: f32,
    pub cell_size_x: f32,
    pub cell_size_y: f32,
    pub cell_size_z: f32,
    padding0: f32,
}
unsafe impl bytemuck::Pod for SimulationParametersContent {}
unsafe impl bytemuck::Zeroable for SimulationParametersContent {}

impl SimulationParametersContent {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let h = scenario.smoothing_length;
        let extent_x = scenario.x_max - scenario.x_min;
        let extent_y = scenario.y_max - scenario.y_min;
        let extent_z = scenario.z_max - scenario.z_min;

        // Cell edges must not drop below the smoothing length on any axis, otherwise the
        // 3x3x3 cell walk of the friends builder misses neighbors.
        let min_extent = extent_x.min(extent_y).min(extent_z);
        let grid_resolution = ((min_extent / h) as u32).max(1).min(256);

        SimulationParametersContent {
            x_min: scenario.x_min,
            x_max: scenario.x_max,
            y_min: scenario.y_min,
            y_max: scenario.y_max,
            z_min: scenario.z_min,
            z_max: scenario.z_max,

            wave_gen_amplitude: scenario.wave_gen_amplitude,
            wave_gen_frequency: scenario.wave_gen_frequency,
            wave_gen_duty: scenario.wave_gen_duty,

            time_step: scenario.time_step,
            solver_iterations: scenario.solver_iterations,
            sub_steps: scenario.sub_steps,
            smoothing_length: h,
            rest_density: scenario.rest_density,
            cfm_epsilon: scenario.cfm_epsilon,
            gravity: scenario.gravity,
            vorticity_factor: scenario.vorticity_factor,
            viscosity_factor: scenario.viscosity_factor,
            surface_tension_k: scenario.surface_tension_k,
            surface_tension_dist: scenario.surface_tension_dist,

            particle_count: scenario.particle_count,
            friends_circles: scenario.friends_circles,
            particles_per_circle: scenario.particles_per_circle,
            grid_resolution,
            grid_buffer_size: grid_resolution * grid_resolution * grid_resolution,

            setup_spacing: scenario.setup_spacing,
            particle_render_size: scenario.particle_render_size,
            segment_size: scenario.segment_size,
            sort_iterations: scenario.sort_iterations,

            smoothing_length_sq: h * h,
            poly6_factor: 315.0 / (64.0 * std::f32::consts::PI * h.powi(9)),
            grad_spiky_factor: 45.0 / (std::f32::consts::PI * h.powi(6)),
            cell_size_x: extent_x / grid_resolution as f32,
            cell_size_y: extent_y / grid_resolution as f32,
            cell_size_z: extent_z / grid_resolution as f32,
            padding0: 0.0,
        }
    }

    pub fn friends_block_stride(&self) -> u32 {
        self.friends_circles + self.friends_circles * self.particles_per_circle
    }
}

/// Parameter block A of the pipeline: host record + device uniform buffer.
/// `upload` must be called after any edit and before the next step.
pub struct SimulationParameters {
    content: SimulationParametersContent,
    buffer: UniformBuffer<SimulationParametersContent>,
}

impl SimulationParameters {
    pub fn new(device: &wgpu::Device, scenario: &Scenario) -> Self {
        SimulationParameters {
            content: SimulationParametersContent::from_scenario(scenario),
            buffer: UniformBuffer::new(device),
        }
    }

    pub fn apply_scenario(&mut self, scenario: &Scenario) {
        self.content = SimulationParametersContent::from_scenario(scenario);
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        self.buffer.update_content(queue, self.content);
    }

    pub fn content(&self) -> &SimulationParametersContent {
        &self.content
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.binding_resource()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::test_scenario;

    #[test]
    fn uniform_content_is_tightly_packed() {
        // 36 four byte scalars, padded to a multiple of 16 for std140.
        assert_eq!(std::mem::size_of::<SimulationParametersContent>(), 144);
    }

    #[test]
    fn derived_fields_follow_the_smoothing_length() {
        let content = SimulationParametersContent::from_scenario(&test_scenario());
        let h: f32 = 0.05;

        assert_eq!(content.grid_resolution, 20);
        assert_eq!(content.grid_buffer_size, 8000);
        assert!((content.smoothing_length_sq - h * h).abs() < 1e-9);
        assert!((content.poly6_factor - 315.0 / (64.0 * std::f32::consts::PI * h.powi(9))).abs() / content.poly6_factor < 1e-6);
        assert!((content.grad_spiky_factor - 45.0 / (std::f32::consts::PI * h.powi(6))).abs() / content.grad_spiky_factor < 1e-6);
        assert!(content.cell_size_x >= h && content.cell_size_y >= h && content.cell_size_z >= h);
    }

    #[test]
    fn grid_cells_never_undercut_the_smoothing_length() {
        let mut scenario = test_scenario();
        scenario.x_max = 2.3;
        scenario.y_max = 0.9;
        scenario.z_max = 1.7;
        let content = SimulationParametersContent::from_scenario(&scenario);

        assert_eq!(content.grid_resolution, 18); // floor(0.9 / 0.05)
        for cell_size in [content.cell_size_x, content.cell_size_y, content.cell_size_z].iter() {
            assert_ge!(*cell_size, scenario.smoothing_length);
        }
    }

    #[test]
    fn friends_block_stride_matches_layout() {
        let content = SimulationParametersContent::from_scenario(&test_scenario());
        assert_eq!(content.friends_block_stride(), 4 + 4 * 24);
    }
}
