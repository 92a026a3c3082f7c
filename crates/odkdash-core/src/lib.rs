//! Core library for the ODK Central submissions dashboard.
//!
//! Authentication and token persistence live in [`auth`], the HTTP surface
//! in [`api`], and the download orchestration in [`fetch`]. [`cache`] keeps
//! the parsed [`models::Table`] fresh for interactive use and [`scheduler`]
//! drives unattended fetches.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod fetch;
pub mod models;
pub mod scheduler;
pub mod service;

pub use api::{OdkClient, OdkError};
pub use cache::{DataLoader, LoadOutcome};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use fetch::Fetcher;
pub use models::Table;
pub use scheduler::Scheduler;
pub use service::Services;
