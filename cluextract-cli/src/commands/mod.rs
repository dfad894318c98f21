//! CLI command implementations.

pub mod common;
pub mod config;
pub mod count;
pub mod extract;
pub mod init;
