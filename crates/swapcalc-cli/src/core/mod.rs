use thiserror::Error;

pub mod context;

mod tracing;
pub use tracing::Fmt;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error {0}")]
    Configuration(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("validation error: {0}")]
    Validation(String),
}
