use std::fmt;
use std::path::PathBuf;

/// Upper bound, in bytes, on driver diagnostics kept from an info log.
pub const INFO_LOG_LIMIT: usize = 512;

/// Diagnostic used when the driver reports failure but leaves the log empty.
const EMPTY_LOG_FALLBACK: &str = "driver reported failure without an info log";

/// Programmable pipeline stage compiled independently before linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failures surfaced by the renderer library.
///
/// Every variant is logged where it occurs; callers decide whether the
/// failure is fatal for the process or only for the resource involved.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("shader program failed to link: {log}")]
    ProgramLink { log: String },
    #[error("failed to load texture {}: {source}", path.display())]
    TextureLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("graphics driver error: {0}")]
    Driver(String),
}

impl RenderError {
    /// Stage that failed, when the error came from stage compilation.
    pub fn stage(&self) -> Option<ShaderStage> {
        match self {
            RenderError::ShaderCompile { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Driver diagnostic text for compile and link failures.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RenderError::ShaderCompile { log, .. } | RenderError::ProgramLink { log } => {
                Some(log.as_str())
            }
            _ => None,
        }
    }
}

/// Trims a driver info log to [`INFO_LOG_LIMIT`] bytes without splitting a
/// UTF-8 sequence, substituting a fixed message for empty logs.
pub(crate) fn bounded_info_log(log: &str) -> String {
    let trimmed = log.trim_end_matches(['\0', '\n', '\r', ' ']);
    if trimmed.is_empty() {
        return EMPTY_LOG_FALLBACK.to_string();
    }
    if trimmed.len() <= INFO_LOG_LIMIT {
        return trimmed.to_string();
    }
    let mut end = INFO_LOG_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
