//! Terminal notifier for user-facing failures.

use checkin_core::sync::Notifier;

/// Title used when removing a registration form fails
pub const REMOVE_FAILED_TITLE: &str = "Something went wrong when deleting a registration form";

/// Prints notifications to stderr so stdout stays machine readable
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, title: &str, detail: &str) {
        tracing::debug!("Notifying user: {title}");
        eprintln!("{title}\n  {detail}");
    }
}
