//! Command implementations.

pub mod export;
pub mod import;
pub mod version;
