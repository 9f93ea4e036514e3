use super::shader::{ShaderDirectory, SHADER_ENTRY_POINT_NAME};
use crate::error::SimError;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub struct ComputePipelineCreationDesc {
    pub label: &'static str,
    pub layout: Rc<wgpu::PipelineLayout>,
    pub compute_shader_relative_path: PathBuf,
}

impl ComputePipelineCreationDesc {
    pub fn new(label: &'static str, layout: Rc<wgpu::PipelineLayout>, compute_shader_relative_path: &Path) -> Self {
        ComputePipelineCreationDesc {
            label,
            layout,
            compute_shader_relative_path: compute_shader_relative_path.to_path_buf(),
        }
    }

    fn try_create_pipeline(&self, device: &wgpu::Device, shader_dir: &ShaderDirectory) -> Result<wgpu::ComputePipeline, SimError> {
        let module = shader_dir.load_shader_module(device, &self.compute_shader_relative_path)?;
        Ok(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(self.label),
            layout: Some(&self.layout),
            module: &module,
            entry_point: SHADER_ENTRY_POINT_NAME,
        }))
    }
}

pub struct RenderPipelineCreationDesc {
    pub label: &'static str,
    pub layout: Rc<wgpu::PipelineLayout>,
    pub vertex_shader_relative_path: PathBuf,
    pub fragment_shader_relative_path: PathBuf,
    pub primitive: wgpu::PrimitiveState,
    pub output_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
}

impl RenderPipelineCreationDesc {
    pub fn new(
        label: &'static str,
        layout: Rc<wgpu::PipelineLayout>,
        vertex_shader_relative_path: &Path,
        fragment_shader_relative_path: &Path,
        output_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        RenderPipelineCreationDesc {
            label,
            layout,
            vertex_shader_relative_path: vertex_shader_relative_path.to_path_buf(),
            fragment_shader_relative_path: fragment_shader_relative_path.to_path_buf(),
            primitive: wgpu::PrimitiveState::default(),
            output_format,
            depth_format,
        }
    }

    fn try_create_pipeline(&self, device: &wgpu::Device, shader_dir: &ShaderDirectory) -> Result<wgpu::RenderPipeline, SimError> {
        let vertex_module = shader_dir.load_shader_module(device, &self.vertex_shader_relative_path)?;
        let fragment_module = shader_dir.load_shader_module(device, &self.fragment_shader_relative_path)?;
        Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: SHADER_ENTRY_POINT_NAME,
                buffers: &[],
            },
            primitive: self.primitive.clone(),
            depth_stencil: self.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
                clamp_depth: false,
            }),
            multisample: Default::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: SHADER_ENTRY_POINT_NAME,
                targets: &[wgpu::ColorTargetState {
                    format: self.output_format,
                    alpha_blend: wgpu::BlendState::REPLACE,
                    color_blend: wgpu::BlendState::REPLACE,
                    write_mask: wgpu::ColorWrite::ALL,
                }],
            }),
        }))
    }
}

#[derive(Clone)]
pub struct ComputePipelineHandle(usize);
#[derive(Clone)]
pub struct RenderPipelineHandle(usize);

// Keeps track of all pipelines and their creation descriptors so that they can be recreated
// whenever their shaders change on disk. Handles stay valid across reloads.
pub struct PipelineManager {
    compute_pipelines: Vec<(ComputePipelineCreationDesc, wgpu::ComputePipeline)>,
    render_pipelines: Vec<(RenderPipelineCreationDesc, wgpu::RenderPipeline)>,
}

impl PipelineManager {
    pub fn new() -> Self {
        PipelineManager {
            compute_pipelines: Vec::new(),
            render_pipelines: Vec::new(),
        }
    }

    pub fn create_compute_pipeline(
        &mut self,
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        desc: ComputePipelineCreationDesc,
    ) -> Result<ComputePipelineHandle, SimError> {
        let pipeline = desc.try_create_pipeline(device, shader_dir)?;
        self.compute_pipelines.push((desc, pipeline));
        Ok(ComputePipelineHandle(self.compute_pipelines.len() - 1))
    }

    pub fn create_render_pipeline(
        &mut self,
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        desc: RenderPipelineCreationDesc,
    ) -> Result<RenderPipelineHandle, SimError> {
        let pipeline = desc.try_create_pipeline(device, shader_dir)?;
        self.render_pipelines.push((desc, pipeline));
        Ok(RenderPipelineHandle(self.render_pipelines.len() - 1))
    }

    // Recompiles every pipeline from its sources. On the first failure the error is returned and
    // all pipelines compiled so far keep their new modules, the rest their previous ones.
    pub fn reload_all(&mut self, device: &wgpu::Device, shader_dir: &ShaderDirectory) -> Result<(), SimError> {
        for (desc, pipeline) in self.compute_pipelines.iter_mut() {
            *pipeline = desc.try_create_pipeline(device, shader_dir)?;
        }
        for (desc, pipeline) in self.render_pipelines.iter_mut() {
            *pipeline = desc.try_create_pipeline(device, shader_dir)?;
        }
        Ok(())
    }

    pub fn get_compute(&self, handle: &ComputePipelineHandle) -> &wgpu::ComputePipeline {
        &self.compute_pipelines[handle.0].1
    }

    pub fn get_render(&self, handle: &RenderPipelineHandle) -> &wgpu::RenderPipeline {
        &self.render_pipelines[handle.0].1
    }
}
