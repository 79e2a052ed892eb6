//! Requester-side status polling.
//!
//! A watcher polls one request at a fixed interval and publishes what it sees
//! on a [`tokio::sync::watch`] channel. If the request is still pending once
//! the auto-approve delay has elapsed since creation, the watcher publishes a
//! local approval and stops. That approval is never written back: the stored
//! request stays pending and [`EmergencyWorkflow::disclose`] keeps refusing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::EmergencyWorkflow;
use crate::config::Config;
use crate::error::Result;
use crate::model::{EmergencyRequest, RequestStatus};

/// Where an observed status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    /// Read from the workflow.
    Store,
    /// Synthesized by the auto-approve fallback; the workflow still says pending.
    LocalFallback,
}

/// A status as seen by the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Observed status.
    pub status: RequestStatus,
    /// Origin of the observation.
    pub source: ObservationSource,
}

impl Observation {
    fn store(status: RequestStatus) -> Self {
        Self {
            status,
            source: ObservationSource::Store,
        }
    }

    fn local_approval() -> Self {
        Self {
            status: RequestStatus::Approved,
            source: ObservationSource::LocalFallback,
        }
    }

    /// Whether the watcher stops after publishing this observation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Polling behavior for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Time between status reads.
    pub poll_interval: Duration,
    /// Delay after creation before a pending request is shown as approved.
    /// `None` disables the fallback.
    pub auto_approve_after: Option<Duration>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            auto_approve_after: Some(Duration::from_secs(5)),
        }
    }
}

impl From<&Config> for WatchConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            auto_approve_after: config.auto_approve_delay(),
        }
    }
}

/// Handle to a running watcher. Dropping it stops the watcher.
#[derive(Debug)]
pub struct WatchHandle {
    request_id: String,
    rx: watch::Receiver<Option<Observation>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Start watching `request_id`.
    ///
    /// The first read happens immediately.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(workflow: Arc<EmergencyWorkflow>, request_id: impl Into<String>, config: WatchConfig) -> Self {
        let request_id = request_id.into();
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(run(workflow, request_id.clone(), config, tx));
        debug!(request = %request_id, ?config, "Status watcher started");

        Self {
            request_id,
            rx,
            task,
        }
    }

    /// The request being watched.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The most recent observation, if any read has succeeded.
    #[must_use]
    pub fn latest(&self) -> Option<Observation> {
        *self.rx.borrow()
    }

    /// Wait for the next distinct observation.
    ///
    /// Returns `None` once the watcher has stopped and nothing new is pending.
    pub async fn changed(&mut self) -> Option<Observation> {
        self.rx.changed().await.ok()?;
        *self.rx.borrow_and_update()
    }

    /// Wait until a terminal observation is published.
    ///
    /// If the watcher stops first, returns the last observation instead.
    pub async fn wait_terminal(&mut self) -> Option<Observation> {
        loop {
            let current = *self.rx.borrow_and_update();
            if current.is_some_and(|o| o.is_terminal()) {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return *self.rx.borrow();
            }
        }
    }

    /// Stop polling and cancel any pending fallback.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            debug!(request = %self.request_id, "Status watcher stopped");
        }
        self.task.abort();
    }

    /// Whether the watcher is still polling.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn publish(tx: &watch::Sender<Option<Observation>>, observation: Observation) {
    tx.send_if_modified(|current| {
        if *current == Some(observation) {
            false
        } else {
            *current = Some(observation);
            true
        }
    });
}

fn read(workflow: &EmergencyWorkflow, request_id: &str) -> Result<Option<EmergencyRequest>> {
    workflow.refresh()?;
    workflow.get_by_id(request_id)
}

/// Deadline for the fallback, measured from the request's creation time.
fn fallback_deadline(workflow: &EmergencyWorkflow, request_id: &str, delay: Duration) -> Instant {
    let elapsed = match workflow.get_by_id(request_id) {
        Ok(Some(request)) => (Utc::now() - request.timestamp).to_std().unwrap_or_default(),
        _ => Duration::ZERO,
    };
    Instant::now() + delay.saturating_sub(elapsed)
}

async fn run(
    workflow: Arc<EmergencyWorkflow>,
    request_id: String,
    config: WatchConfig,
    tx: watch::Sender<Option<Observation>>,
) {
    let mut ticker = time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let deadline = config
        .auto_approve_after
        .map(|delay| fallback_deadline(&workflow, &request_id, delay));
    let mut fallback_armed = deadline.is_some();
    let fallback = time::sleep_until(deadline.unwrap_or_else(Instant::now));
    tokio::pin!(fallback);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match read(&workflow, &request_id) {
                    Ok(Some(request)) => {
                        publish(&tx, Observation::store(request.status));
                        if request.status.is_terminal() {
                            debug!(request = %request_id, status = %request.status, "Request resolved");
                            break;
                        }
                    }
                    Ok(None) => trace!(request = %request_id, "Request not found yet"),
                    Err(e) => warn!(request = %request_id, error = %e, "Failed to read request status"),
                }
            }
            () = &mut fallback, if fallback_armed => {
                fallback_armed = false;
                if let Ok(Some(request)) = read(&workflow, &request_id) {
                    if request.status == RequestStatus::Pending {
                        info!(request = %request_id, "Showing request as approved locally; stored status is still pending");
                        publish(&tx, Observation::local_approval());
                        break;
                    }
                }
            }
        }

        if tx.is_closed() {
            trace!(request = %request_id, "No observers left");
            break;
        }
    }
}
