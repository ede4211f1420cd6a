//! # cadintake-core
//!
//! Core crate for the CAD intake pipeline. Contains the artifact cache
//! trait, configuration schemas, and the unified error system.
//!
//! This crate has **no** internal dependencies on other cadintake crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
