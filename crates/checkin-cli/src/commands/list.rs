use std::path::Path;

use checkin_core::EventId;

use crate::commands::common::{
    event_to_list_item, format_event_lines, format_regform_lines, open_store,
    regform_to_list_item, EventListItem, RegformListItem,
};
use crate::error::CliError;

pub async fn run_events(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let events = store.list_events().await?;

    if as_json {
        let json_items = events
            .iter()
            .map(event_to_list_item)
            .collect::<Vec<EventListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if events.is_empty() {
        println!("No events yet. Add one with `checkin add`.");
    } else {
        for line in format_event_lines(&events) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_regforms(
    event_id: EventId,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    if store.get_event(event_id).await?.is_none() {
        return Err(CliError::EventNotFound(event_id));
    }
    let regforms = store.list_regforms(event_id).await?;

    if as_json {
        let json_items = regforms
            .iter()
            .map(regform_to_list_item)
            .collect::<Vec<RegformListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_regform_lines(&regforms) {
            println!("{line}");
        }
    }

    Ok(())
}
