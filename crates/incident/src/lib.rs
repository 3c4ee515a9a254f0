//! Incident lifecycle and coordination engine.
//!
//! Incidents are records backed by a dedicated chat channel. This crate owns
//! the parts with real invariants:
//!
//! - [`SequenceAllocator`] hands out unique, strictly increasing numbers
//! - [`StatusLedger`] runs the triage/handling/monitoring/closed state machine
//!   and its append-only history
//! - [`InvitationResolver`] turns user, bot, name and group references into an
//!   invitation batch that tolerates partial failure
//! - [`IncidentCoordinator`] runs the creation pipeline and later mutations
//! - [`AsyncDispatcher`] detaches long-running work from interactive callbacks
//!
//! Storage and the messaging platform are collaborators behind
//! [`IncidentStore`] and [`Messenger`].
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use incident::{Config, IncidentCoordinator, MemoryStore, Messenger, NewIncident};
//!
//! # async fn run(messenger: Arc<dyn Messenger>) -> incident::Result<()> {
//! let coordinator = IncidentCoordinator::new(
//!     Config::from_env()?,
//!     Arc::new(MemoryStore::new()),
//!     messenger,
//! );
//!
//! let incident = coordinator
//!     .create_incident(NewIncident {
//!         title: "database outage".to_string(),
//!         creator_id: "U024BE7LH".to_string(),
//!         origin_channel_id: "C0123456".to_string(),
//!         initial_triage: true,
//!         ..Default::default()
//!     })
//!     .await?;
//! assert_eq!(incident.channel_name, "inc-1-database-outage");
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocator;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod invite;
pub mod ledger;
pub mod messages;
pub mod messaging;
pub mod model;
pub mod naming;
pub mod requests;
pub mod store;

pub use allocator::SequenceAllocator;
pub use config::{Catalog, Category, Config, SeverityLevel};
pub use content::{ContentGenerator, GeneratedContent};
pub use coordinator::{IncidentCoordinator, IncidentUpdate, NewIncident};
pub use dispatch::AsyncDispatcher;
pub use error::{CreateStep, Error, MessagingError, Result, StoreError};
pub use invite::{InvitationResolver, BOT_NOT_FOUND, USER_NOT_FOUND};
pub use ledger::StatusLedger;
pub use messaging::{
    ChannelInfo, DirectoryUser, Identity, MemberPage, Messenger, OutgoingMessage, UserGroup,
};
pub use model::{
    DetailChanges, Incident, IncidentId, IncidentRequest, IncidentStatus, InvitationResult,
    InviteDetail, InviteStatus, StatusHistory, StatusHistoryWithUser, User,
};
pub use requests::RequestDraft;
pub use store::{IncidentStore, MemoryStore};
