pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod normalize;
pub mod types;
pub mod whitelist;

pub use error::{BlogPipeError, Result};
pub use ids::*;
