//! Event model

use serde::{Deserialize, Serialize};

use super::local_id;

local_id!(
    /// Local identifier of a cached event
    EventId
);

/// A conference/meeting cached from the remote server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Local primary key
    pub id: EventId,
    /// Event id on the remote server
    pub indico_id: i64,
    /// Root URL of the remote server (no trailing slash)
    pub base_url: String,
    /// Display title
    pub title: String,
}

impl Event {
    /// Deep link to the event on the remote server
    #[must_use]
    pub fn remote_url(&self) -> String {
        format!("{}/event/{}", self.base_url, self.indico_id)
    }
}

/// An event that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub indico_id: i64,
    pub base_url: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_parse_and_display() {
        let id: EventId = " 42 ".parse().unwrap();
        assert_eq!(id, EventId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<EventId>().is_err());
    }

    #[test]
    fn remote_url_joins_base_and_indico_id() {
        let event = Event {
            id: EventId::new(1),
            indico_id: 1337,
            base_url: "https://indico.example.org".to_string(),
            title: "Conference".to_string(),
        };
        assert_eq!(event.remote_url(), "https://indico.example.org/event/1337");
    }

    #[test]
    fn event_id_serializes_transparently() {
        let json = serde_json::to_string(&EventId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
