//! # Calliope Common Library
//!
//! Shared code for the Calliope catalogue service:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - SQLite schema bootstrap
//! - Password hashing and bearer token signing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
