// Core infrastructure shared by elements, the pool and the runner

pub mod errors;
pub mod config;

// Re-export commonly used types
pub use errors::{ElementError, Result, Status};
pub use config::{ElementConfig, OnFailure, PoolConfig, RunnerConfig};
