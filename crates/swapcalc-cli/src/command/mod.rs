pub mod quote;
pub mod tokens;
pub mod watch;
