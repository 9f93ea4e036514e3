use cgmath::prelude::*;

#[cfg_attr(rustfmt, rustfmt_skip)]
const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CameraUniformBufferContent {
    pub view_projection: cgmath::Matrix4<f32>,
    pub right: cgmath::Vector4<f32>,
    pub up: cgmath::Vector4<f32>,
}
unsafe impl bytemuck::Pod for CameraUniformBufferContent {}
unsafe impl bytemuck::Zeroable for CameraUniformBufferContent {}

/// Fixed camera framing the simulation domain from the front right.
pub struct Camera;

impl Camera {
    pub fn fill_uniform_buffer(domain_min: cgmath::Point3<f32>, domain_max: cgmath::Point3<f32>, aspect_ratio: f32) -> CameraUniformBufferContent {
        let center = domain_min + (domain_max - domain_min) * 0.5;
        let diagonal = (domain_max - domain_min).magnitude();
        let eye = center + cgmath::vec3(0.55, 0.35, 1.3) * diagonal;

        let projection = cgmath::perspective(cgmath::Deg(45f32), aspect_ratio, 0.01 * diagonal, 10.0 * diagonal);
        let view = cgmath::Matrix4::look_at_rh(eye, center, cgmath::Vector3::unit_y());

        let forward = (center - eye).normalize();
        let right = forward.cross(cgmath::Vector3::unit_y()).normalize();
        let up = right.cross(forward);

        CameraUniformBufferContent {
            view_projection: OPENGL_TO_WGPU_MATRIX * projection * view,
            right: right.extend(0.0),
            up: up.extend(0.0),
        }
    }
}
