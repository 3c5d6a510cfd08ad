pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod launcher;
pub mod prompt;
pub mod session;
pub mod ssh;

pub use error::{Error, Result};

/// Version of ssh-hand
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
