//! Registration form model

use serde::{Deserialize, Serialize};

use super::{local_id, Event, EventId};

local_id!(
    /// Local identifier of a cached registration form
    RegformId
);

/// A registration form under an event.
///
/// `registration_count` and `checked_in_count` are snapshots taken from the
/// remote server on each sync and are never derived from local participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regform {
    /// Local primary key
    pub id: RegformId,
    /// Owning event
    pub event_id: EventId,
    /// Registration form id on the remote server
    pub indico_id: i64,
    pub title: String,
    /// Whether the form is currently accepting registrations
    pub is_open: bool,
    pub registration_count: i64,
    pub checked_in_count: i64,
}

impl Regform {
    /// Registration management page for this form on the remote server
    #[must_use]
    pub fn management_url(&self, event: &Event) -> String {
        format!(
            "{}/event/{}/manage/registration/{}",
            event.base_url, event.indico_id, self.indico_id
        )
    }

    /// Human label for the open/closed status
    #[must_use]
    pub const fn status_label(&self) -> &'static str {
        if self.is_open {
            "open"
        } else {
            "closed"
        }
    }
}

/// A registration form that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegform {
    pub event_id: EventId,
    pub indico_id: i64,
    pub title: String,
}
