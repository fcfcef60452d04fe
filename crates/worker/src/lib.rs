pub mod error;
pub mod worker;

pub use error::Error;
pub use worker::{UpsertOutcome, Worker};
