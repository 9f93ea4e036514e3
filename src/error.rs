use thiserror::Error;

/// Everything that can go wrong between loading a scenario and completing a simulation frame.
///
/// Compile and allocation failures are latched by the controller (`kernels_valid`), per-frame
/// device failures suppress stepping for that frame only.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("scenario parameter error: {0}")]
    Config(String),

    #[error("kernel compilation of {file} failed:\n{log}")]
    Compile { file: String, log: String },

    #[error("device allocation refused: requested {requested} particles, maximum is {maximum}")]
    Alloc { requested: u32, maximum: u32 },

    #[error("device failure: {0}")]
    Device(String),

    #[error("shared buffer handoff violated: {0}")]
    Interop(String),
}

pub type SimResult<T> = Result<T, SimError>;
