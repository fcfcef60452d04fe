use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    /// A queue message that cannot even be parsed -- rejected permanently,
    /// never redelivered.
    #[error("malformed queue message: {0}")]
    Malformed(String),
}
