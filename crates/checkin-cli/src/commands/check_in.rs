use std::path::Path;

use checkin_core::checkin::CheckinService;
use checkin_core::{EventId, ParticipantId, RegformId};
use tokio_util::sync::CancellationToken;

use crate::commands::common::{
    build_gateway, format_timestamp, load_config, open_store, resolve_regform,
};
use crate::error::CliError;

pub async fn run_check_in(
    event_id: EventId,
    regform_id: RegformId,
    participant_id: ParticipantId,
    undo: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_config()?;
    let store = open_store(db_path).await?;
    let (event, _) = resolve_regform(&store, event_id, regform_id).await?;
    let gateway = build_gateway(&event.base_url, &config)?;

    let service = CheckinService::new(store, gateway);
    let participant = service
        .set_checked_in(
            event_id,
            regform_id,
            participant_id,
            !undo,
            &CancellationToken::new(),
        )
        .await?;

    match (participant.checked_in, participant.checked_in_at) {
        (true, Some(at)) => println!(
            "{} checked in at {}",
            participant.full_name,
            format_timestamp(at)
        ),
        (true, None) => println!("{} checked in", participant.full_name),
        (false, _) => println!("{} is no longer checked in", participant.full_name),
    }
    Ok(())
}
