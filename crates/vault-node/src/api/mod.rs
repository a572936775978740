//! HTTP handlers.

pub mod error;
pub mod health;
pub mod orders;
pub mod status;
pub mod vault;

pub use error::{ApiError, ApiResult};
