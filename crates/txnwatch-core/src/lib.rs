//! # txnwatch-core
//!
//! Core crate for txnwatch. Contains the configuration schemas, typed
//! identifiers, and the unified error system shared by every other crate in the workspace.
//!
//! This crate has **no** internal dependencies on other txnwatch crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
