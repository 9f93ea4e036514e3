use super::parameters::SimulationParametersContent;

/// Per particle neighbor cache, bucketed into concentric distance shells ("circles").
/// Layout per particle: `friends_circles` counters followed by
/// `friends_circles * particles_per_circle` neighbor indices.
///
/// The physics kernels read exclusively from this list; the cell lists are only
/// touched while building it.
pub struct FriendsList {
    buffer: wgpu::Buffer,
    entry_count: u32,
}

impl FriendsList {
    pub fn new(device: &wgpu::Device, params: &SimulationParametersContent) -> Self {
        let entry_count = params.particle_count * params.friends_block_stride();
        FriendsList {
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Buffer: Friends list"),
                size: entry_count as u64 * std::mem::size_of::<u32>() as u64,
                usage: wgpu::BufferUsage::STORAGE | wgpu::BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            }),
            entry_count,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }
}

// Host mirror of the shell classification and block addressing in
// shader/simulation/friends.glsl.

pub fn circle_index(distance: f32, smoothing_length: f32, friends_circles: u32) -> u32 {
    ((distance / smoothing_length * friends_circles as f32) as u32).min(friends_circles - 1)
}

pub fn block_base(particle_index: u32, params: &SimulationParametersContent) -> u32 {
    particle_index * params.friends_block_stride()
}

pub fn counter_offset(block_base: u32, circle: u32) -> u32 {
    block_base + circle
}

pub fn index_offset(block_base: u32, circle: u32, slot: u32, params: &SimulationParametersContent) -> u32 {
    block_base + params.friends_circles + circle * params.particles_per_circle + slot
}

/// Host copy of the device friends list, for the histogram readback and the tests.
pub struct FriendsListData {
    pub entries: Vec<u32>,
    pub friends_circles: u32,
    pub particles_per_circle: u32,
}

impl FriendsListData {
    fn stride(&self) -> u32 {
        self.friends_circles + self.friends_circles * self.particles_per_circle
    }

    pub fn particle_count(&self) -> u32 {
        self.entries.len() as u32 / self.stride()
    }

    pub fn circle_count(&self, particle_index: u32, circle: u32) -> u32 {
        self.entries[(particle_index * self.stride() + circle) as usize]
    }

    pub fn neighbor(&self, particle_index: u32, circle: u32, slot: u32) -> u32 {
        let base = particle_index * self.stride();
        self.entries[(base + self.friends_circles + circle * self.particles_per_circle + slot) as usize]
    }

    pub fn neighbors_of(&self, particle_index: u32) -> Vec<u32> {
        let mut neighbors = Vec::new();
        for circle in 0..self.friends_circles {
            let count = self.circle_count(particle_index, circle).min(self.particles_per_circle);
            for slot in 0..count {
                neighbors.push(self.neighbor(particle_index, circle, slot));
            }
        }
        neighbors
    }
}

/// Reference neighborhood: every j != i with |p_j - p_i| < h. The device list must never
/// contain anything beyond this; it may miss entries only in overflowed circles.
pub fn brute_force_neighbors(positions: &[cgmath::Point3<f32>], particle_index: usize, smoothing_length: f32) -> Vec<u32> {
    use cgmath::MetricSpace;
    let own_position = positions[particle_index];
    positions
        .iter()
        .enumerate()
        .filter(|(index, position)| *index != particle_index && position.distance2(own_position) < smoothing_length * smoothing_length)
        .map(|(index, _)| index as u32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::test_scenario;
    use cgmath::Point3;

    fn test_params() -> SimulationParametersContent {
        SimulationParametersContent::from_scenario(&test_scenario())
    }

    #[test]
    fn circle_classification_matches_the_shell_formula() {
        let h = 0.05;
        // floor(d / h * C), capped at the outermost shell.
        assert_eq!(circle_index(0.0, h, 4), 0);
        assert_eq!(circle_index(0.012, h, 4), 0);
        assert_eq!(circle_index(0.0125, h, 4), 1);
        assert_eq!(circle_index(0.03, h, 4), 2);
        assert_eq!(circle_index(0.049, h, 4), 3);
        // d >= h never happens in the builder, but the cap still holds.
        assert_eq!(circle_index(0.3, h, 4), 3);
    }

    #[test]
    fn block_offsets_follow_the_counters_then_indices_layout() {
        let params = test_params(); // C = 4, M = 24, stride 100
        let base = block_base(7, &params);
        assert_eq!(base, 700);
        assert_eq!(counter_offset(base, 0), 700);
        assert_eq!(counter_offset(base, 3), 703);
        assert_eq!(index_offset(base, 0, 0, &params), 704);
        assert_eq!(index_offset(base, 1, 0, &params), 728);
        assert_eq!(index_offset(base, 3, 23, &params), 799);
        assert_eq!(block_base(8, &params), 800);
    }

    #[test]
    fn data_view_reads_back_what_the_layout_wrote() {
        let params = test_params();
        let stride = params.friends_block_stride() as usize;
        let mut entries = vec![0u32; stride * 2];
        // particle 1: two neighbors in circle 0, one in circle 2.
        let base = block_base(1, &params);
        entries[counter_offset(base, 0) as usize] = 2;
        entries[counter_offset(base, 2) as usize] = 1;
        entries[index_offset(base, 0, 0, &params) as usize] = 11;
        entries[index_offset(base, 0, 1, &params) as usize] = 12;
        entries[index_offset(base, 2, 0, &params) as usize] = 13;

        let data = FriendsListData {
            entries,
            friends_circles: params.friends_circles,
            particles_per_circle: params.particles_per_circle,
        };
        assert_eq!(data.particle_count(), 2);
        assert_eq!(data.neighbors_of(0), Vec::<u32>::new());
        assert_eq!(data.neighbors_of(1), vec![11, 12, 13]);
    }

    #[test]
    fn brute_force_reference_excludes_self_and_far_particles() {
        let positions = vec![
            Point3::new(0.5, 0.5, 0.5),
            Point3::new(0.5, 0.53, 0.5),  // within h = 0.05
            Point3::new(0.5, 0.56, 0.5),  // outside
            Point3::new(0.49, 0.5, 0.51), // within
        ];
        let mut neighbors = brute_force_neighbors(&positions, 0, 0.05);
        neighbors.sort();
        assert_eq!(neighbors, vec![1, 3]);
    }
}
