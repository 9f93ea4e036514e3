pub mod diagnostics;
pub mod friends_list;
pub mod parameters;
pub mod particle_buffers;
pub mod pbf_fluid;
pub mod shared_buffer;
pub mod uniform_grid;

pub use pbf_fluid::PbfFluid;
pub use shared_buffer::SharedBufferHolder;
