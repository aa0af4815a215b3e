//! Template engine error types

use std::path::PathBuf;
use thiserror::Error;

/// Template-loading and rendering errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Configured override directory does not exist
    #[error("Template directory not found: {0}")]
    OverrideDirNotFound(PathBuf),

    /// Template rendering error
    #[error("Template error: {0}")]
    TemplateError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
