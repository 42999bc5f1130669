//! CLI command handlers

pub mod batch;
pub mod helpers;
pub mod serve;
