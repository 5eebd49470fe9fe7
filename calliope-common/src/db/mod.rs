//! Database bootstrap and settings storage

pub mod init;
pub mod settings;

pub use init::*;
