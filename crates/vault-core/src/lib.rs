//! Shared types and primitives for the encrypted file vault.
//!
//! This crate has no I/O of its own. It defines the error taxonomy, domain
//! enums, id/time helpers, and field-validation rules that every other crate
//! in the workspace builds on.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod domain;
pub mod error;
pub mod ids;
pub mod validation;

pub use domain::{AccessAction, Category, Role};
pub use error::VaultError;
