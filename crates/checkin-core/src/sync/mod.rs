//! Sync coordinator: refreshes one event/regform pair from the remote server.
//!
//! An activation runs three stages strictly in order (event, regform,
//! participants), each one fetching with identifiers refreshed by the
//! previous stage and committing before the next starts. The first failure
//! stops the pipeline and raises exactly one notification; there is no
//! retry. A newer activation cancels the previous one, and a cancelled
//! activation never commits another write.
//!
//! Writes only refresh rows that are still cached: if the user removes the
//! event or regform while an activation is in flight, the activation ends
//! as skipped instead of restoring it. The participants stage replaces the
//! cached set with the server's, dropping registrations that disappeared
//! remotely.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::models::{Event, EventId, Regform, RegformId};
use crate::remote::{RemoteError, RemoteGateway, RemoteResult};
use crate::services::{GuardedWrite, LocalStore};

/// Title of the notification raised when an activation fails
pub const SYNC_FAILED_TITLE: &str = "Something went wrong when fetching updates";

/// User-facing message sink
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, detail: &str);
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, detail: &str) {
        tracing::warn!("{title}: {detail}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Reading the cached event and regform
    Lookup,
    Event,
    Regform,
    Participants,
}

/// Which cached entity was missing when an activation was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Event,
    Regform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// All three stages committed
    Completed { participants: usize },
    /// Nothing cached to refresh, or it was removed locally mid-activation
    Skipped(Missing),
    /// Cancelled before `stage` could commit
    Cancelled { stage: SyncStage },
    /// `stage` failed; later stages were skipped
    Failed { stage: SyncStage, message: String },
}

/// Runs sync activations against an explicit store, gateway and notifier
pub struct SyncCoordinator<G, N> {
    store: LocalStore,
    gateway: G,
    notifier: N,
    root: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
    in_flight: AtomicUsize,
    syncing: watch::Sender<bool>,
}

impl<G: RemoteGateway, N: Notifier> SyncCoordinator<G, N> {
    pub fn new(store: LocalStore, gateway: G, notifier: N) -> Self {
        let (syncing, _) = watch::channel(false);
        Self {
            store,
            gateway,
            notifier,
            root: CancellationToken::new(),
            current: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            syncing,
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Whether any activation is between its first lookup and settling
    pub fn is_syncing(&self) -> bool {
        *self.syncing.borrow()
    }

    /// Observe the in-progress flag
    pub fn syncing(&self) -> watch::Receiver<bool> {
        self.syncing.subscribe()
    }

    /// Start a new activation, superseding (cancelling) the previous one.
    ///
    /// The activation does nothing until [`Activation::run`] is awaited.
    pub fn activate(&self, event_id: EventId, regform_id: RegformId) -> Activation<'_, G, N> {
        let token = self.root.child_token();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());

        if let Some(previous) = previous {
            if !previous.is_cancelled() {
                tracing::debug!("Superseding previous sync activation");
                previous.cancel();
            }
        }

        Activation {
            coordinator: self,
            event_id,
            regform_id,
            token,
        }
    }

    /// Activate and run to completion
    pub async fn sync_regform(&self, event_id: EventId, regform_id: RegformId) -> SyncOutcome {
        self.activate(event_id, regform_id).run().await
    }

    /// Cancel the current and every future activation
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    fn begin(&self) -> BusyGuard<'_, G, N> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.syncing.send_replace(true);
        }
        BusyGuard { coordinator: self }
    }

    fn end(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.syncing.send_replace(false);
        }
    }
}

/// Clears the syncing flag even if the activation future is dropped
struct BusyGuard<'a, G: RemoteGateway, N: Notifier> {
    coordinator: &'a SyncCoordinator<G, N>,
}

impl<G: RemoteGateway, N: Notifier> Drop for BusyGuard<'_, G, N> {
    fn drop(&mut self) {
        self.coordinator.end();
    }
}

/// One run of the sync pipeline for an event/regform pair
pub struct Activation<'a, G, N> {
    coordinator: &'a SyncCoordinator<G, N>,
    event_id: EventId,
    regform_id: RegformId,
    token: CancellationToken,
}

impl<G: RemoteGateway, N: Notifier> Activation<'_, G, N> {
    /// Token cancelled on supersession or shutdown; cancel it on teardown
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn run(self) -> SyncOutcome {
        let _busy = self.coordinator.begin();
        let outcome = self.pipeline().await;

        match &outcome {
            SyncOutcome::Completed { participants } => tracing::info!(
                "Synced event {} / regform {} ({participants} participants)",
                self.event_id,
                self.regform_id
            ),
            SyncOutcome::Skipped(missing) => tracing::debug!(
                "Skipped sync of event {} / regform {}: {missing:?} not cached",
                self.event_id,
                self.regform_id
            ),
            SyncOutcome::Cancelled { stage } => {
                tracing::debug!("Sync activation cancelled at {stage:?} stage");
            }
            SyncOutcome::Failed { stage, message } => {
                tracing::warn!("Sync failed at {stage:?} stage: {message}");
                self.coordinator.notifier.notify(SYNC_FAILED_TITLE, message);
            }
        }
        outcome
    }

    async fn pipeline(&self) -> SyncOutcome {
        let (cached_event, cached_regform) = match self.lookup().await {
            Ok(Ok(cached)) => cached,
            Ok(Err(missing)) => return SyncOutcome::Skipped(missing),
            Err(outcome) => return outcome,
        };

        let store = &self.coordinator.store;
        let gateway = &self.coordinator.gateway;

        let event = match self
            .fetch(SyncStage::Event, gateway.fetch_event(&cached_event, &self.token))
            .await
        {
            Ok(event) => event,
            Err(outcome) => return outcome,
        };
        if let Err(outcome) = self
            .commit(
                SyncStage::Event,
                store.update_event_unless_cancelled(&event, &self.token),
            )
            .await
        {
            return outcome;
        }

        let regform = match self
            .fetch(
                SyncStage::Regform,
                gateway.fetch_regform(&event, &cached_regform, &self.token),
            )
            .await
        {
            Ok(regform) => regform,
            Err(outcome) => return outcome,
        };
        if let Err(outcome) = self
            .commit(
                SyncStage::Regform,
                store.update_regform_unless_cancelled(&regform, &self.token),
            )
            .await
        {
            return outcome;
        }

        let records = match self
            .fetch(
                SyncStage::Participants,
                gateway.fetch_participants(&event, &regform, &self.token),
            )
            .await
        {
            Ok(records) => records,
            Err(outcome) => return outcome,
        };
        if let Err(outcome) = self
            .commit(
                SyncStage::Participants,
                store.replace_participants_unless_cancelled(regform.id, &records, &self.token),
            )
            .await
        {
            return outcome;
        }

        SyncOutcome::Completed {
            participants: records.len(),
        }
    }

    async fn lookup(&self) -> Result<Result<(Event, Regform), Missing>, SyncOutcome> {
        let store = &self.coordinator.store;
        let failed = |error: crate::Error| SyncOutcome::Failed {
            stage: SyncStage::Lookup,
            message: error.to_string(),
        };

        let Some(event) = store.get_event(self.event_id).await.map_err(failed)? else {
            return Ok(Err(Missing::Event));
        };
        let Some(regform) = store
            .get_regform_in_event(self.regform_id, self.event_id)
            .await
            .map_err(failed)?
        else {
            return Ok(Err(Missing::Regform));
        };
        Ok(Ok((event, regform)))
    }

    async fn fetch<T>(
        &self,
        stage: SyncStage,
        request: impl Future<Output = RemoteResult<T>>,
    ) -> Result<T, SyncOutcome> {
        if self.token.is_cancelled() {
            return Err(SyncOutcome::Cancelled { stage });
        }
        tracing::debug!("Sync stage {stage:?} started");

        let result = tokio::select! {
            biased;
            () = self.token.cancelled() => Err(RemoteError::Cancelled),
            result = request => result,
        };

        match result {
            Ok(value) => Ok(value),
            Err(RemoteError::Cancelled) => Err(SyncOutcome::Cancelled { stage }),
            Err(error) => Err(SyncOutcome::Failed {
                stage,
                message: error.to_string(),
            }),
        }
    }

    async fn commit(
        &self,
        stage: SyncStage,
        write: impl Future<Output = crate::Result<GuardedWrite>>,
    ) -> Result<(), SyncOutcome> {
        match write.await {
            Ok(GuardedWrite::Committed) => Ok(()),
            Ok(GuardedWrite::Cancelled) => Err(SyncOutcome::Cancelled { stage }),
            Ok(GuardedWrite::Gone) => Err(SyncOutcome::Skipped(if stage == SyncStage::Event {
                Missing::Event
            } else {
                Missing::Regform
            })),
            Err(error) => Err(SyncOutcome::Failed {
                stage,
                message: error.to_string(),
            }),
        }
    }
}
