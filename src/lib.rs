pub mod types;
pub mod error;
pub mod data;
pub mod pipeline;
pub mod config;
pub mod utils;

pub use types::*;
pub use error::{KlineError, Result};
pub use pipeline::{Pipeline, PipelineReport};
