use super::friends_list::FriendsListData;
use super::parameters::SimulationParametersContent;
use crate::error::{SimError, SimResult};

/// Blocking device-to-host copy of `element_count` elements of `buffer`.
///
/// Debug readback only: this stalls the queue and is never on the per-frame path
/// unless the friends histogram is switched on.
pub fn read_buffer<T: bytemuck::Pod>(device: &wgpu::Device, queue: &wgpu::Queue, buffer: &wgpu::Buffer, element_count: u32) -> SimResult<Vec<T>> {
    let size = element_count as u64 * std::mem::size_of::<T>() as u64;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Buffer: Diagnostics staging"),
        size,
        usage: wgpu::BufferUsage::MAP_READ | wgpu::BufferUsage::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Encoder: Diagnostics readback"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let mapping = slice.map_async(wgpu::MapMode::Read);
    device.poll(wgpu::Maintain::Wait);
    futures::executor::block_on(mapping).map_err(|err| SimError::Device(format!("readback mapping failed: {:?}", err)))?;

    let data = bytemuck::cast_slice(&slice.get_mapped_range()).to_vec();
    staging.unmap();
    Ok(data)
}

/// Occupancy statistics of the friends list, per circle.
pub struct FriendsHistogram {
    pub total_per_circle: Vec<u64>,
    pub overflowed_circles: u64,
}

pub fn friends_histogram(data: &FriendsListData, params: &SimulationParametersContent) -> FriendsHistogram {
    let mut total_per_circle = vec![0u64; params.friends_circles as usize];
    let mut overflowed_circles = 0;

    for particle in 0..data.particle_count() {
        for circle in 0..params.friends_circles {
            let count = data.circle_count(particle, circle);
            if count >= params.particles_per_circle {
                overflowed_circles += 1;
            }
            total_per_circle[circle as usize] += count.min(params.particles_per_circle) as u64;
        }
    }

    FriendsHistogram {
        total_per_circle,
        overflowed_circles,
    }
}

pub fn log_friends_histogram(histogram: &FriendsHistogram, particle_count: u32) {
    for (circle, total) in histogram.total_per_circle.iter().enumerate() {
        info!("friends circle {}: {:.2} neighbors/particle", circle, *total as f64 / particle_count as f64);
    }
    if histogram.overflowed_circles > 0 {
        info!("{} circles at capacity (far-field neighbors dropped)", histogram.overflowed_circles);
    }
}
