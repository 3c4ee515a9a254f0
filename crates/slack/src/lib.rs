//! Slack Web API client for the incident engine.
//!
//! [`SlackClient`] implements [`incident::Messenger`] over the bot-token Web
//! API.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
mod models;

pub use client::SlackClient;
