pub mod particle_renderer;

pub use particle_renderer::ParticleRenderer;
