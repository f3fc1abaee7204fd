//! checkin-core - Core library for checkin
//!
//! This crate contains the models, the local libSQL store, the remote
//! gateway contract and the sync/query machinery shared by every checkin
//! front-end.

pub mod checkin;
pub mod db;
pub mod error;
pub mod models;
pub mod onboarding;
pub mod query;
pub mod remote;
pub mod routes;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    Event, EventId, Participant, ParticipantId, ParticipantRecord, Regform, RegformId,
};
pub use services::LocalStore;
