use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("source API request failed after retries: {0}")]
    Transient(String),
    #[error("source API rejected the request: {0}")]
    Permanent(String),
    #[error("source resource not found")]
    NotFound,
    #[error("malformed source payload: {0}")]
    Contract(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}
