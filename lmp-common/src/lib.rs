//! Shared library for the Linkmart platform services.
//!
//! Holds the pieces every service needs: the common error type, TOML/ENV
//! configuration loading, domain normalization, and credential helpers.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;

pub use error::{Error, Result};
