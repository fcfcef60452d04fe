use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Worker(#[from] worker::Error),
    #[error(transparent)]
    Sync(#[from] sync_core::Error),
    #[error(transparent)]
    Source(#[from] source_client::Error),
    #[error(transparent)]
    Sink(#[from] sink_client::Error),
    #[error(transparent)]
    Store(#[from] db::Error),
}
