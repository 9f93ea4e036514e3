use super::parameters::SimulationParametersContent;

/// Sentinel terminating every cell list and every next-pointer chain.
/// Passed to the kernels as a compile time define of the same name.
pub const END_OF_CELL_LIST: i32 = -1;

/// Cell list acceleration structure: per cell head index plus per particle next index,
/// both rebuilt from scratch every substep by the reset/insert kernel pair.
pub struct UniformGrid {
    cell_heads: wgpu::Buffer,
    next_in_cell: wgpu::Buffer,
    grid_buffer_size: u32,
    particle_count: u32,
}

impl UniformGrid {
    pub fn new(device: &wgpu::Device, grid_resolution: u32, particle_count: u32) -> Self {
        let grid_buffer_size = grid_resolution * grid_resolution * grid_resolution;
        UniformGrid {
            cell_heads: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Buffer: Grid cell heads"),
                size: grid_buffer_size as u64 * std::mem::size_of::<i32>() as u64,
                usage: wgpu::BufferUsage::STORAGE | wgpu::BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            }),
            next_in_cell: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Buffer: Grid next-in-cell indices"),
                size: particle_count as u64 * std::mem::size_of::<i32>() as u64,
                usage: wgpu::BufferUsage::STORAGE | wgpu::BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            }),
            grid_buffer_size,
            particle_count,
        }
    }

    pub fn cell_heads(&self) -> &wgpu::Buffer {
        &self.cell_heads
    }

    pub fn next_in_cell(&self) -> &wgpu::Buffer {
        &self.next_in_cell
    }

    pub fn cell_count(&self) -> u32 {
        self.grid_buffer_size
    }

    // The reset kernel clears cell heads and next indices in a single dispatch.
    pub fn reset_work_item_count(&self) -> u32 {
        self.grid_buffer_size.max(self.particle_count)
    }
}

// Host mirror of the cell addressing in shader/simulation/grid.glsl,
// used by diagnostics and tests.

pub fn cell_coord(position: cgmath::Point3<f32>, params: &SimulationParametersContent) -> cgmath::Point3<u32> {
    let clamp_axis = |value: f32, min: f32, cell_size: f32| -> u32 {
        let cell = ((value - min) / cell_size) as i32;
        cell.max(0).min(params.grid_resolution as i32 - 1) as u32
    };
    cgmath::Point3::new(
        clamp_axis(position.x, params.x_min, params.cell_size_x),
        clamp_axis(position.y, params.y_min, params.cell_size_y),
        clamp_axis(position.z, params.z_min, params.cell_size_z),
    )
}

pub fn cell_index(coord: cgmath::Point3<u32>, grid_resolution: u32) -> u32 {
    coord.x + coord.y * grid_resolution + coord.z * grid_resolution * grid_resolution
}

/// Walks a host copy of the cell lists, calling `visitor` with (cell index, particle index).
/// Panics on a next-chain longer than the particle count, which a correct insert can't produce.
pub fn for_each_cell_entry<Visitor: FnMut(u32, u32)>(cell_heads: &[i32], next_in_cell: &[i32], mut visitor: Visitor) {
    for (cell, head) in cell_heads.iter().enumerate() {
        let mut current = *head;
        let mut chain_length = 0;
        while current != END_OF_CELL_LIST {
            visitor(cell as u32, current as u32);
            current = next_in_cell[current as usize];
            chain_length += 1;
            assert_le!(chain_length, next_in_cell.len());
        }
    }
}
