//! CLI command implementations.

pub mod common;
pub mod extract_db;
pub mod index;
pub mod mirror;
pub mod status;
pub mod upgrade;
