//! View-state binder between a presentation front-end and the dinner store.
//!
//! The planner republishes the store's live queries and turns discrete user
//! intents into background store writes. Mutating intents are fire-and-forget:
//! the only completion signal is the eventual live-query update.

use crate::dinner_store::{Dinner, DinnerStore, FamilyMember, Topic};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A queued unit of user-initiated mutation.
#[derive(Debug)]
enum PlannerIntent {
    ScheduleDinner {
        date: String,
        time: String,
        attendees: String,
    },
    AddFamilyMember {
        name: String,
        role: String,
    },
    RemoveFamilyMember {
        member: FamilyMember,
    },
    SetMemberStatus {
        id: i64,
        online: bool,
    },
}

/// Binds the dinner store to a presentation layer.
///
/// Construction spawns a worker task that drains queued intents and applies
/// each one on the blocking thread pool; the constructor must therefore be
/// called within a tokio runtime context. Tearing the planner down drops
/// intents that have not started yet, while a write already handed to the
/// pool runs to completion.
pub struct DinnerPlanner {
    store: Arc<dyn DinnerStore>,
    intent_tx: mpsc::UnboundedSender<PlannerIntent>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
    dinners: watch::Receiver<Vec<Dinner>>,
    family_members: watch::Receiver<Vec<FamilyMember>>,
}

impl DinnerPlanner {
    pub fn new(store: Arc<dyn DinnerStore>) -> Self {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let dinners = store.watch_dinners();
        let family_members = store.watch_family_members();
        let worker = tokio::spawn(run_worker(
            store.clone(),
            intent_rx,
            shutdown.child_token(),
        ));

        Self {
            store,
            intent_tx,
            shutdown,
            worker: Some(worker),
            dinners,
            family_members,
        }
    }

    /// Current dinners, newest first. The receiver holds the latest committed
    /// snapshot from the moment of the call.
    pub fn dinners(&self) -> watch::Receiver<Vec<Dinner>> {
        self.dinners.clone()
    }

    /// Current family members, in insertion order.
    pub fn family_members(&self) -> watch::Receiver<Vec<FamilyMember>> {
        self.family_members.clone()
    }

    /// Schedules a dinner for the given attendees.
    ///
    /// The names are joined into a single display string at this point; the
    /// dinner keeps that string even if members are later renamed or removed.
    /// Date and time are taken verbatim; blank-input gating is the
    /// presentation layer's job.
    pub fn schedule_dinner(&self, date: &str, time: &str, attendee_names: &[String]) {
        self.submit(PlannerIntent::ScheduleDinner {
            date: date.to_string(),
            time: time.to_string(),
            attendees: attendee_names.join(", "),
        });
    }

    pub fn add_family_member(&self, name: &str, role: &str) {
        self.submit(PlannerIntent::AddFamilyMember {
            name: name.to_string(),
            role: role.to_string(),
        });
    }

    pub fn remove_family_member(&self, member: FamilyMember) {
        self.submit(PlannerIntent::RemoveFamilyMember { member });
    }

    /// Flips the online status relative to the caller's snapshot of `member`.
    pub fn toggle_online_status(&self, member: &FamilyMember) {
        self.submit(PlannerIntent::SetMemberStatus {
            id: member.id,
            online: !member.is_online,
        });
    }

    /// Fetches one random conversation topic.
    ///
    /// Resolves exactly once with `None` when no topics are stored. Runs on
    /// the blocking pool so the caller is never blocked.
    pub async fn random_topic(&self) -> Result<Option<Topic>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.random_topic()).await?
    }

    /// Cancels the worker and waits for it to wind down.
    ///
    /// Intents still sitting in the queue are discarded; an intent already
    /// running on the blocking pool completes its store write first.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!("Planner worker ended abnormally: {:?}", e);
            }
        }
    }

    fn submit(&self, intent: PlannerIntent) {
        if self.intent_tx.send(intent).is_err() {
            warn!("Planner is shut down, dropping intent");
        }
    }
}

impl Drop for DinnerPlanner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_worker(
    store: Arc<dyn DinnerStore>,
    mut intent_rx: mpsc::UnboundedReceiver<PlannerIntent>,
    shutdown: CancellationToken,
) {
    loop {
        let intent = tokio::select! {
            _ = shutdown.cancelled() => break,
            intent = intent_rx.recv() => match intent {
                Some(intent) => intent,
                None => break,
            },
        };

        debug!("Applying planner intent: {:?}", intent);
        let store = store.clone();
        let result = tokio::task::spawn_blocking(move || apply_intent(&*store, intent)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to apply planner intent: {:?}", e),
            Err(e) => error!("Planner intent task panicked: {:?}", e),
        }
    }
    debug!("Planner worker stopped");
}

fn apply_intent(store: &dyn DinnerStore, intent: PlannerIntent) -> Result<()> {
    match intent {
        PlannerIntent::ScheduleDinner {
            date,
            time,
            attendees,
        } => store.insert_dinner(&date, &time, &attendees),
        PlannerIntent::AddFamilyMember { name, role } => {
            store.insert_family_member(&name, &role)
        }
        PlannerIntent::RemoveFamilyMember { member } => store.delete_family_member(&member),
        PlannerIntent::SetMemberStatus { id, online } => store.update_member_status(id, online),
    }
}
