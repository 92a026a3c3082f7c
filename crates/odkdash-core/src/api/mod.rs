//! REST API client module for ODK Central.
//!
//! This module provides the `OdkClient` for creating sessions and
//! downloading form submission exports, plus the crate-wide `OdkError`.

pub mod client;
pub mod error;

pub use client::{ExportResponse, OdkClient};
pub use error::OdkError;
