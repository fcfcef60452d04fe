use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sync(#[from] sync_core::Error),
    #[error(transparent)]
    Source(#[from] source_client::Error),
    #[error(transparent)]
    Sink(#[from] sink_client::Error),
    #[error(transparent)]
    Store(#[from] db::Error),
    #[error("malformed job snapshot: {0}")]
    Contract(String),
}

impl Error {
    /// Whether the queue should redeliver the job carrying this error.
    /// A malformed snapshot can never succeed on retry; everything else
    /// (network blips, transient upstream errors) might.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Contract(_))
    }
}
