use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("sink API request failed after retries: {0}")]
    Transient(String),
    #[error("sink API rejected the request: {0}")]
    Permanent(String),
    #[error("sink page not found")]
    NotFound,
    #[error("malformed sink payload: {0}")]
    Contract(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}
