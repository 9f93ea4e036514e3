use crate::error::SimResult;
use crate::screen::Screen;
use crate::simulation::{PbfFluid, SharedBufferHolder};
use crate::wgpu_utils::pipelines::*;
use crate::wgpu_utils::shader::ShaderDirectory;
use std::{path::Path, rc::Rc};

/// Draws every particle as a camera facing sphere impostor, reading straight from the
/// shared position buffer. The renderer only ever consumes the buffer between the
/// simulation's release and next acquire.
pub struct ParticleRenderer {
    render_pipeline: RenderPipelineHandle,
}

impl ParticleRenderer {
    pub fn new(
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        pipeline_manager: &mut PipelineManager,
        per_frame_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> SimResult<ParticleRenderer> {
        let fluid_renderer_group_layout = &PbfFluid::get_or_create_group_layout_renderer(device).layout;
        let mut desc = RenderPipelineCreationDesc::new(
            "ParticleRenderer: Render particles",
            Rc::new(device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("ParticleRenderer Pipeline Layout"),
                bind_group_layouts: &[per_frame_bind_group_layout, fluid_renderer_group_layout],
                push_constant_ranges: &[],
            })),
            Path::new("fluid_particles.vert"),
            Path::new("sphere_particles.frag"),
            Screen::FORMAT_SWAPCHAIN,
            Some(Screen::FORMAT_DEPTH),
        );
        desc.primitive.topology = wgpu::PrimitiveTopology::TriangleStrip;

        let render_pipeline = pipeline_manager.create_render_pipeline(device, shader_dir, desc)?;
        Ok(ParticleRenderer { render_pipeline })
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, pipeline_manager: &'a PipelineManager, fluid: &'a PbfFluid) {
        assert_eq!(
            fluid.shared_positions_held_by(),
            SharedBufferHolder::Renderer,
            "drawing while the simulation holds the position buffer"
        );
        rpass.set_pipeline(pipeline_manager.get_render(&self.render_pipeline));
        rpass.set_bind_group(1, fluid.bind_group_renderer(), &[]);
        rpass.draw(0..4, 0..fluid.particle_count());
    }
}
