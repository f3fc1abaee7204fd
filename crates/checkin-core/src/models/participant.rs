//! Participant model

use serde::{Deserialize, Serialize};

use super::{local_id, RegformId};

local_id!(
    /// Local identifier of a cached participant
    ParticipantId
);

/// A registrant under a registration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Local primary key
    pub id: ParticipantId,
    /// Owning registration form
    pub regform_id: RegformId,
    /// Registration id on the remote server
    pub indico_id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub checked_in: bool,
    /// Check-in time (Unix ms), when reported by the server
    pub checked_in_at: Option<i64>,
}

impl Participant {
    /// The remote-facing part of this participant
    #[must_use]
    pub fn record(&self) -> ParticipantRecord {
        ParticipantRecord {
            indico_id: self.indico_id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            checked_in: self.checked_in,
            checked_in_at: self.checked_in_at,
        }
    }
}

/// A participant as reported by the remote server.
///
/// Identity within a registration form is `indico_id`; the local id is
/// assigned when the record is first stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub indico_id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub checked_in: bool,
    pub checked_in_at: Option<i64>,
}
