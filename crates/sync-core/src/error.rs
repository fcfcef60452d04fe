use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] source_client::Error),
    #[error(transparent)]
    Sink(#[from] sink_client::Error),
    #[error(transparent)]
    Store(#[from] db::Error),
    #[error("malformed payload: {0}")]
    Contract(String),
    /// Conflicting state such as two pages sharing a task-id property.
    /// Logged as a warning by the caller; the first match wins and the
    /// job proceeds rather than failing.
    #[error("integrity conflict: {0}")]
    Integrity(String),
}
