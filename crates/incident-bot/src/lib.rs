//! Slack-facing HTTP service for the incident engine.
//!
//! Verifies Slack requests, parses `/incident` commands and button clicks, and
//! hands the work to [`incident::IncidentCoordinator`].

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;
pub mod form;
pub mod interactions;
pub mod server;
pub mod webhooks;

pub use config::Args;
pub use server::{build_router, AppState};
