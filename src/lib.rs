#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate more_asserts;

pub mod camera;
pub mod error;
pub mod per_frame_resources;
pub mod renderer;
pub mod scenario;
pub mod screen;
pub mod simulation;
pub mod simulation_controller;
pub mod timer;
pub mod wgpu_utils;
