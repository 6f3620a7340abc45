pub mod cache;
pub mod concurrency;
pub mod query;

mod macros;

pub use tracing;
