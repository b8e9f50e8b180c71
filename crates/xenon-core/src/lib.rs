//! # xenon-core
//!
//! Core crate for the Xenon plugin host. Contains the configuration
//! schemas, the unified error system and the result alias shared by every
//! other Xenon crate.
//!
//! This crate has **no** internal dependencies on other Xenon crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
