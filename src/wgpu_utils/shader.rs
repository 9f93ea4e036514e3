use crate::error::SimError;
use notify::Watcher;
use regex::Regex;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

// All entry points need to have this name.
// (could make customizable, but forcing this has perks as well)
pub const SHADER_ENTRY_POINT_NAME: &str = "main";

fn compile_glsl(glsl_code: &str, identifier: &str, stage: ShaderStage) -> Result<Vec<u32>, SimError> {
    let kind = match stage {
        ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
        ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
        ShaderStage::Compute => shaderc::ShaderKind::Compute,
    };

    let mut compiler = shaderc::Compiler::new().ok_or_else(|| SimError::Compile {
        file: identifier.to_string(),
        log: "failed to acquire shaderc compiler".to_string(),
    })?;
    let mut options = shaderc::CompileOptions::new().ok_or_else(|| SimError::Compile {
        file: identifier.to_string(),
        log: "failed to create shaderc compile options".to_string(),
    })?;
    options.set_warnings_as_errors();
    // Values that are genuinely compile time constant. Everything runtime-tunable lives in the parameter uniform block.
    options.add_macro_definition("END_OF_CELL_LIST", Some("-1"));

    match compiler.compile_into_spirv(glsl_code, kind, identifier, SHADER_ENTRY_POINT_NAME, Some(&options)) {
        Ok(compile_result) => {
            if compile_result.get_num_warnings() > 0 {
                warn!("warnings when compiling {}:\n{}", identifier, compile_result.get_warning_messages());
            }
            Ok(compile_result.as_binary().to_vec())
        }
        Err(compile_error) => Err(SimError::Compile {
            file: identifier.to_string(),
            log: compile_error.to_string(),
        }),
    }
}

fn load_glsl_and_resolve_includes(path: &Path) -> Result<String, SimError> {
    let glsl_code = std::fs::read_to_string(&path).map_err(|err| SimError::Compile {
        file: format!("{:?}", path),
        log: format!("failed to read shader file: {}", err),
    })?;

    lazy_static! {
        static ref INCLUDE_REGEX: Regex = Regex::new(r#"^\s*#\s*include\s+[<"](?P<file>.*)[>"]"#).unwrap();
    }

    let mut expanded_code = Vec::new();
    for (line_number, line) in glsl_code.lines().enumerate() {
        match INCLUDE_REGEX.captures(line) {
            Some(captures) => {
                let included_file = captures.name("file").unwrap().as_str();
                expanded_code.push(format!("#line {}", 1));
                expanded_code.push(load_glsl_and_resolve_includes(&path.parent().unwrap().join(included_file))?);
                expanded_code.push(format!("#line {}", line_number + 2));
            }
            None => {
                expanded_code.push(line.to_string());
            }
        }
    }

    Ok(expanded_code.join("\n"))
}

pub struct ShaderDirectory {
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
    detected_change: Arc<AtomicBool>,
    directory: PathBuf,
}

impl ShaderDirectory {
    pub fn new(path: &Path) -> ShaderDirectory {
        let detected_change = Arc::new(AtomicBool::new(false));
        let detected_change_evt_ref = detected_change.clone();
        let mut watcher: notify::RecommendedWatcher = notify::Watcher::new_immediate(move |res| match res {
            Ok(_) => detected_change_evt_ref.store(true, Ordering::Relaxed),
            Err(e) => error!("failed to watch shader directory: {:?}", e),
        })
        .unwrap();
        watcher.watch(path, notify::RecursiveMode::Recursive).unwrap();

        ShaderDirectory {
            watcher,
            detected_change,
            directory: PathBuf::from(path),
        }
    }

    // Checks if any change was detected in the shader directory.
    // Right now notifies any changes in the directory, if too slow consider filtering & distinguishing shaders.
    pub fn detected_change(&self) -> bool {
        self.detected_change.swap(false, Ordering::Relaxed)
    }

    pub fn load_shader_module(&self, device: &wgpu::Device, relative_filename: &Path) -> Result<wgpu::ShaderModule, SimError> {
        let path = self.directory.join(relative_filename);

        let shader_stage = match path.extension().and_then(OsStr::to_str) {
            Some("frag") => ShaderStage::Fragment,
            Some("vert") => ShaderStage::Vertex,
            Some("comp") => ShaderStage::Compute,
            _ => {
                return Err(SimError::Compile {
                    file: format!("{:?}", path),
                    log: "unrecognized shader file extension".to_string(),
                })
            }
        };

        let glsl_code = load_glsl_and_resolve_includes(&path)?;
        let spirv = compile_glsl(&glsl_code, relative_filename.to_str().unwrap(), shader_stage)?;

        Ok(device.create_shader_module(&wgpu::ShaderModuleDescriptor {
            label: relative_filename.to_str(),
            source: wgpu::ShaderSource::SpirV(Cow::Owned(spirv)),
            flags: wgpu::ShaderFlags::empty(),
        }))
    }
}
