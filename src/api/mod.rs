//! HTTP API for feedback management

pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{router, ApiServer, ApiServerConfig};
