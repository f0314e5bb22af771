//! Artifact reservation system for preventing duplicate origin fetches
//!
//! The first request for a missing artifact reserves it and becomes the
//! leader. Later requests for the same `(project, filename)` get a waiter
//! that resolves once the leader completes or fails. A leader that goes away
//! without reporting (client disconnect, panic) is recorded as failed, so
//! waiters never hang.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Key of one in-flight fetch
pub type FlightKey = (String, String);

/// State of an artifact reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationState {
    /// The leader is still downloading
    Downloading,
    /// The artifact was committed to storage
    Completed,
    /// The fetch failed; the artifact is not stored
    Failed { error: String },
}

/// Outcome of a reservation attempt
#[derive(Debug)]
pub enum ReservationStatus {
    /// Reservation successful, the caller must fetch the artifact
    Reserved(Reservation),
    /// Another request is already fetching the artifact
    ReservedByOther(Waiter),
}

/// Table of in-flight fetches
///
/// The lock is only held for map lookups and is never held across an await.
#[derive(Debug, Clone, Default)]
pub struct ReservationTable {
    inner: Arc<Mutex<HashMap<FlightKey, watch::Receiver<ReservationState>>>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an artifact, or join the fetch already running for it
    pub fn try_reserve(&self, project: &str, filename: &str) -> ReservationStatus {
        let key = (project.to_string(), filename.to_string());
        let mut flights = self.inner.lock();

        if let Some(receiver) = flights.get(&key) {
            debug!("Joining in-flight fetch of {}/{}", project, filename);
            return ReservationStatus::ReservedByOther(Waiter {
                receiver: receiver.clone(),
            });
        }

        let (sender, receiver) = watch::channel(ReservationState::Downloading);
        flights.insert(key.clone(), receiver);
        debug!("Reserved {}/{} for fetching", project, filename);

        ReservationStatus::Reserved(Reservation {
            table: self.clone(),
            key,
            sender,
            finished: false,
        })
    }

    /// Number of fetches currently in flight
    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }

    fn release(&self, key: &FlightKey) {
        self.inner.lock().remove(key);
    }
}

/// Exclusive right to fetch one artifact
///
/// Dropping an unfinished reservation marks it failed.
#[derive(Debug)]
pub struct Reservation {
    table: ReservationTable,
    key: FlightKey,
    sender: watch::Sender<ReservationState>,
    finished: bool,
}

impl Reservation {
    /// Report that the artifact is stored
    pub fn complete(mut self) {
        self.finish(ReservationState::Completed);
    }

    /// Report that the fetch failed
    pub fn fail(mut self, error: impl Into<String>) {
        self.finish(ReservationState::Failed {
            error: error.into(),
        });
    }

    fn finish(&mut self, state: ReservationState) {
        // Unregister first so that woken waiters can take over immediately
        self.table.release(&self.key);
        self.sender.send_replace(state);
        self.finished = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                "Reservation for {}/{} abandoned",
                self.key.0, self.key.1
            );
            self.finish(ReservationState::Failed {
                error: "fetch abandoned".to_string(),
            });
        }
    }
}

/// Handle for waiting on another request's fetch
#[derive(Debug)]
pub struct Waiter {
    receiver: watch::Receiver<ReservationState>,
}

impl Waiter {
    /// Wait until the leader completes or fails
    pub async fn wait(mut self) -> ReservationState {
        match self
            .receiver
            .wait_for(|state| *state != ReservationState::Downloading)
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => ReservationState::Failed {
                error: "fetch abandoned".to_string(),
            },
        }
    }
}
