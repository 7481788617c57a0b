use std::fmt;
use touchify_sync::SyncError;

#[derive(Debug)]
pub enum TouchifyError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParseError(String),

    // Sync client errors
    SyncError(SyncError),

    // IO errors
    IoError(std::io::Error),

    // Serialization errors
    YamlError(serde_yml::Error),
}

impl fmt::Display for TouchifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TouchifyError::ConfigNotFound(path) => {
                write!(f, "Config not found: {}", path)
            }
            TouchifyError::ConfigParseError(msg) => {
                write!(f, "Config parse error: {}", msg)
            }
            TouchifyError::SyncError(err) => {
                write!(f, "Sync error: {}", err)
            }
            TouchifyError::IoError(err) => {
                write!(f, "IO error: {}", err)
            }
            TouchifyError::YamlError(err) => {
                write!(f, "YAML error: {}", err)
            }
        }
    }
}

impl std::error::Error for TouchifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TouchifyError::SyncError(e) => Some(e),
            TouchifyError::IoError(e) => Some(e),
            TouchifyError::YamlError(e) => Some(e),
            TouchifyError::ConfigNotFound(_) | TouchifyError::ConfigParseError(_) => None,
        }
    }
}

impl From<SyncError> for TouchifyError {
    fn from(err: SyncError) -> Self {
        TouchifyError::SyncError(err)
    }
}

impl From<std::io::Error> for TouchifyError {
    fn from(err: std::io::Error) -> Self {
        TouchifyError::IoError(err)
    }
}

impl From<serde_yml::Error> for TouchifyError {
    fn from(err: serde_yml::Error) -> Self {
        TouchifyError::YamlError(err)
    }
}
