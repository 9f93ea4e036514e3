use crate::error::{SimError, SimResult};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SharedBufferHolder {
    Simulation,
    Renderer,
}

/// Holder bookkeeping of the handoff protocol, separate from the device buffer
/// so the state machine stays testable without a GPU.
#[derive(Debug)]
struct Handoff {
    holder: SharedBufferHolder,
}

impl Handoff {
    fn acquire_for_simulation(&mut self) -> SimResult<()> {
        if self.holder == SharedBufferHolder::Simulation {
            return Err(SimError::Interop("position buffer acquired twice".to_string()));
        }
        self.holder = SharedBufferHolder::Simulation;
        Ok(())
    }

    fn release_to_renderer(&mut self) -> SimResult<()> {
        if self.holder == SharedBufferHolder::Renderer {
            return Err(SimError::Interop("position buffer released while not acquired".to_string()));
        }
        self.holder = SharedBufferHolder::Renderer;
        Ok(())
    }
}

/// The particle position buffer, shared between simulation and renderer.
///
/// Exactly one side holds it at any instant; the simulation acquires it around each
/// substep's kernel recording and releases it back for drawing. wgpu runs everything on
/// one in-order queue, so the handoff needs no device side synchronization - this type
/// exists to keep the protocol observable and violations loud (`SimError::Interop`).
pub struct SharedPositionBuffer {
    buffer: wgpu::Buffer,
    handoff: Handoff,
}

impl SharedPositionBuffer {
    /// 16 bytes per particle: xyz position plus one pad float.
    pub const BYTES_PER_PARTICLE: u64 = 4 * std::mem::size_of::<f32>() as u64;

    pub fn new(device: &wgpu::Device, particle_count: u32) -> Self {
        SharedPositionBuffer {
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Buffer: Particle positions (shared with renderer)"),
                size: particle_count as u64 * Self::BYTES_PER_PARTICLE,
                usage: wgpu::BufferUsage::STORAGE | wgpu::BufferUsage::COPY_DST | wgpu::BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            }),
            // Mirrors the buffer init: positions are uploaded under acquire, then handed over.
            handoff: Handoff {
                holder: SharedBufferHolder::Renderer,
            },
        }
    }

    pub fn acquire_for_simulation(&mut self) -> SimResult<()> {
        self.handoff.acquire_for_simulation()
    }

    pub fn release_to_renderer(&mut self) -> SimResult<()> {
        self.handoff.release_to_renderer()
    }

    pub fn holder(&self) -> SharedBufferHolder {
        self.handoff.holder
    }

    /// The raw buffer, for arming bind groups on either side. Holding a bind group does
    /// not grant access - recording commands against it does, and is gated by `holder`.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handoff_alternates_between_sides() {
        let mut handoff = Handoff {
            holder: SharedBufferHolder::Renderer,
        };
        handoff.acquire_for_simulation().unwrap();
        assert_eq!(handoff.holder, SharedBufferHolder::Simulation);
        handoff.release_to_renderer().unwrap();
        assert_eq!(handoff.holder, SharedBufferHolder::Renderer);
        handoff.acquire_for_simulation().unwrap();
        handoff.release_to_renderer().unwrap();
    }

    #[test]
    fn double_acquire_is_an_interop_error() {
        let mut handoff = Handoff {
            holder: SharedBufferHolder::Renderer,
        };
        handoff.acquire_for_simulation().unwrap();
        assert!(matches!(handoff.acquire_for_simulation(), Err(SimError::Interop(_))));
    }

    #[test]
    fn release_without_acquire_is_an_interop_error() {
        let mut handoff = Handoff {
            holder: SharedBufferHolder::Renderer,
        };
        assert!(matches!(handoff.release_to_renderer(), Err(SimError::Interop(_))));
    }
}
