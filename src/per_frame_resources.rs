use crate::camera::CameraUniformBufferContent;
use crate::wgpu_utils::binding_builder::*;
use crate::wgpu_utils::uniformbuffer::UniformBuffer;
use crate::wgpu_utils::*;

/// Mirrors shader/per_frame.glsl.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PerFrameUniformBufferContent {
    pub camera: CameraUniformBufferContent,
    pub particle_radius: f32,
    pub total_passed_time: f32,
    pub padding: [f32; 2],
}
unsafe impl bytemuck::Pod for PerFrameUniformBufferContent {}
unsafe impl bytemuck::Zeroable for PerFrameUniformBufferContent {}

type PerFrameUniformBuffer = UniformBuffer<PerFrameUniformBufferContent>;

/// Bind group 0 of every render pipeline.
pub struct PerFrameResources {
    ubo: PerFrameUniformBuffer,
    bind_group_layout: BindGroupLayoutWithDesc,
    bind_group: wgpu::BindGroup,
}

impl PerFrameResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding(wgpu::ShaderStage::VERTEX | wgpu::ShaderStage::FRAGMENT, binding_glsl::uniform())
            .create(device, "BindGroupLayout: PerFrameResources");

        let ubo = PerFrameUniformBuffer::new(device);
        let bind_group = BindGroupBuilder::new(&bind_group_layout)
            .resource(ubo.binding_resource())
            .create(device, "BindGroup: PerFrameResources");

        PerFrameResources {
            ubo,
            bind_group_layout,
            bind_group,
        }
    }

    pub fn update_gpu_data(&self, queue: &wgpu::Queue, content: PerFrameUniformBufferContent) {
        self.ubo.update_content(queue, content);
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }
}
