//! Navigation targets derived from local identities.

use std::fmt;

use crate::models::{EventId, ParticipantId, RegformId};

/// A page a front-end can navigate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Events,
    Event(EventId),
    Regform(EventId, RegformId),
    Participant(EventId, RegformId, ParticipantId),
}

impl Route {
    /// Where "back" leads from this page
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Events => None,
            Self::Event(_) => Some(Self::Events),
            Self::Regform(event, _) => Some(Self::Event(event)),
            Self::Participant(event, regform, _) => Some(Self::Regform(event, regform)),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Events => write!(f, "/"),
            Self::Event(event) => write!(f, "/event/{event}"),
            Self::Regform(event, regform) => write!(f, "/event/{event}/{regform}"),
            Self::Participant(event, regform, participant) => {
                write!(f, "/event/{event}/{regform}/{participant}")
            }
        }
    }
}
