use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Roster snapshot could not be fetched or decoded.
    #[error("transport error [{url}]: {reason}")]
    Transport { url: String, reason: String },
    /// Stream connection failed to open or broke mid-stream.
    #[error("connection error [{url}]: {reason}")]
    Connection { url: String, reason: String },
    /// A stream frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// An event referenced an id that is not in the store.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    /// Configuration failed validation.
    #[error("invalid config: {0}")]
    Config(String),
    /// The client task has already been torn down.
    #[error("sync client stopped")]
    Stopped,
}

impl SyncError {
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn connection(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
