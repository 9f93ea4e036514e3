use super::parameters::SimulationParametersContent;
use super::shared_buffer::SharedPositionBuffer;
use crate::error::{SimError, SimResult};
use rand::prelude::*;

/// Refusing anything beyond this keeps the friends list allocation (the largest buffer,
/// ~100 u32 per particle with the usual shell geometry) well below device limits.
pub const MAX_PARTICLE_COUNT: u32 = 1 << 22;

/// All device arrays sized by the particle count. Their lifetime is one allocation:
/// any particle count change drops the whole set and every bind group armed on it.
pub struct ParticleBuffers {
    pub shared_positions: SharedPositionBuffer,
    pub predicted: wgpu::Buffer,
    pub velocities: wgpu::Buffer,
    pub deltas: wgpu::Buffer,
    pub delta_velocities: wgpu::Buffer,
    pub omegas: wgpu::Buffer,
    pub scaling_factors: wgpu::Buffer,

    particle_count: u32,
}

impl ParticleBuffers {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, params: &SimulationParametersContent, shuffle_seed: u64) -> SimResult<Self> {
        let particle_count = params.particle_count;
        if particle_count > MAX_PARTICLE_COUNT {
            return Err(SimError::Alloc {
                requested: particle_count,
                maximum: MAX_PARTICLE_COUNT,
            });
        }

        let vec4_buffer = |label: &'static str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: particle_count as u64 * 4 * std::mem::size_of::<f32>() as u64,
                usage: wgpu::BufferUsage::STORAGE | wgpu::BufferUsage::COPY_DST | wgpu::BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            })
        };

        let mut buffers = ParticleBuffers {
            shared_positions: SharedPositionBuffer::new(device, particle_count),
            predicted: vec4_buffer("Buffer: Predicted positions"),
            velocities: vec4_buffer("Buffer: Velocities"),
            deltas: vec4_buffer("Buffer: Position deltas"),
            delta_velocities: vec4_buffer("Buffer: Velocity deltas"),
            omegas: vec4_buffer("Buffer: Vorticity"),
            scaling_factors: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Buffer: Scaling factors"),
                size: particle_count as u64 * std::mem::size_of::<f32>() as u64,
                usage: wgpu::BufferUsage::STORAGE | wgpu::BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            }),
            particle_count,
        };

        info!("placing {} particles (seed {})", particle_count, shuffle_seed);
        let positions = initial_positions(params, shuffle_seed);
        // Mass rides in the velocity w component.
        let velocities = vec![[0.0f32, 0.0, 0.0, 1.0]; particle_count as usize];

        buffers.shared_positions.acquire_for_simulation()?;
        queue.write_buffer(buffers.shared_positions.buffer(), 0, bytemuck::cast_slice(&positions));
        buffers.shared_positions.release_to_renderer()?;
        queue.write_buffer(&buffers.velocities, 0, bytemuck::cast_slice(&velocities));

        Ok(buffers)
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }
}

/// Axis aligned cubic lattice of side ceil(P^(1/3)), spaced `h * setupSpacing`, centered
/// in X/Z and hanging at the dam break height in Y. The array is shuffled afterwards so
/// that spatially adjacent particles don't also end up memory adjacent, which would
/// serialize the atomic list inserts of the grid build.
pub fn initial_positions(params: &SimulationParametersContent, shuffle_seed: u64) -> Vec<[f32; 4]> {
    let particle_count = params.particle_count;
    let particles_per_axis = (particle_count as f32).powf(1.0 / 3.0).ceil() as u32;
    let spacing = params.smoothing_length * params.setup_spacing;

    let offset_x = params.x_min + ((params.x_max - params.x_min) - particles_per_axis as f32 * spacing) / 2.0;
    let offset_y = params.y_min + 0.3 * (params.y_max - params.y_min);
    let offset_z = params.z_min + ((params.z_max - params.z_min) - particles_per_axis as f32 * spacing) / 2.0;

    let mut positions = Vec::with_capacity(particle_count as usize);
    for i in 0..particle_count {
        let x = (i / particles_per_axis) % particles_per_axis;
        let y = i % particles_per_axis;
        let z = (i / (particles_per_axis * particles_per_axis)) % particles_per_axis;

        positions.push([
            offset_x + x as f32 * spacing,
            offset_y + y as f32 * spacing,
            offset_z + z as f32 * spacing,
            0.0,
        ]);
    }

    let mut rng: rand::rngs::SmallRng = rand::SeedableRng::seed_from_u64(shuffle_seed);
    positions.shuffle(&mut rng);
    positions
}
