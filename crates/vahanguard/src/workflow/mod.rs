//! Emergency request workflow.
//!
//! Anonymous requesters raise a request against a vehicle; the request stays
//! pending until it is approved or rejected, and only an approved request
//! discloses the owner's contact details.
//!
//! ```text
//!            approve
//!   pending ---------> approved
//!      |
//!      |     reject
//!      +-------------> rejected
//! ```
//!
//! Approved and rejected are terminal. Repeating the transition a request
//! already took is a no-op; any other move out of a terminal state is an
//! [`Error::InvalidTransition`].
//!
//! Requesters have no push channel, so they observe status through a
//! [`watch::WatchHandle`] that polls this workflow.

pub mod watch;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{new_id, EmergencyRequest, NewEmergencyRequest, OwnerDetails, RequestStatus};
use crate::registry::VehicleLookup;
use crate::storage::{self, CollectionStore, EMERGENCY_REQUESTS};

pub use watch::{Observation, ObservationSource, WatchConfig, WatchHandle};

/// What the workflow will reveal about a request's vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disclosure {
    /// Still awaiting a decision; nothing is revealed.
    Pending,
    /// Declined; nothing is revealed.
    Rejected,
    /// Approved; the owner's details.
    Approved(OwnerDetails),
    /// Approved, but the vehicle no longer resolves.
    VehicleMissing,
}

impl Disclosure {
    /// The disclosed details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&OwnerDetails> {
        match self {
            Self::Approved(details) => Some(details),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct State {
    requests: Vec<EmergencyRequest>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Owns the emergency request collection and its state machine.
#[derive(Debug)]
pub struct EmergencyWorkflow {
    store: Arc<dyn CollectionStore>,
    vehicles: Arc<dyn VehicleLookup>,
    state: Mutex<State>,
}

impl EmergencyWorkflow {
    /// Load the request collection from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn open(store: Arc<dyn CollectionStore>, vehicles: Arc<dyn VehicleLookup>) -> Result<Self> {
        let requests: Vec<EmergencyRequest> =
            storage::load_collection(store.as_ref(), EMERGENCY_REQUESTS)?;
        let last_timestamp = requests.iter().map(|r| r.timestamp).max();
        debug!(count = requests.len(), "Loaded emergency requests");

        Ok(Self {
            store,
            vehicles,
            state: Mutex::new(State {
                requests,
                last_timestamp,
            }),
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::internal("request list lock poisoned"))
    }

    /// Reload the collection from the store, picking up writes made by other
    /// handles on the same store.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn refresh(&self) -> Result<()> {
        // Held across the load so a concurrent write cannot be replaced by a stale read
        let mut state = self.state()?;
        let requests: Vec<EmergencyRequest> =
            storage::load_collection(self.store.as_ref(), EMERGENCY_REQUESTS)?;
        let newest = requests.iter().map(|r| r.timestamp).max();

        state.last_timestamp = state.last_timestamp.max(newest);
        state.requests = requests;
        Ok(())
    }

    /// Record a new pending request and return its identifier.
    ///
    /// The vehicle id is not checked against the registry.
    ///
    /// # Errors
    ///
    /// Returns a validation error, before anything is allocated, if the vehicle
    /// id or image reference is blank; otherwise a storage error.
    pub fn create(&self, input: NewEmergencyRequest) -> Result<String> {
        input.validate()?;

        let mut state = self.state()?;

        let mut id = new_id();
        while state.requests.iter().any(|r| r.id == id) {
            id = new_id();
        }

        // Persisted with millisecond precision; never earlier than the last one issued
        let now = Utc::now().trunc_subsecs(3);
        let timestamp = state.last_timestamp.map_or(now, |last| last.max(now));

        state.requests.push(EmergencyRequest {
            id: id.clone(),
            vehicle_id: input.vehicle_id,
            request_type: input.category,
            image_url: input.image_ref,
            timestamp,
            status: RequestStatus::Pending,
            description: input.description,
        });

        if let Err(e) = storage::save_collection(self.store.as_ref(), EMERGENCY_REQUESTS, &state.requests) {
            state.requests.pop();
            return Err(e);
        }
        state.last_timestamp = Some(timestamp);

        info!(request = %id, "Emergency request created");
        Ok(id)
    }

    /// Look up a request by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the request list lock is poisoned.
    pub fn get_by_id(&self, id: &str) -> Result<Option<EmergencyRequest>> {
        Ok(self.state()?.requests.iter().find(|r| r.id == id).cloned())
    }

    /// Requests raised against a vehicle, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request list lock is poisoned.
    pub fn requests_for_vehicle(&self, vehicle_id: &str) -> Result<Vec<EmergencyRequest>> {
        Ok(self
            .state()?
            .requests
            .iter()
            .filter(|r| r.vehicle_id == vehicle_id)
            .cloned()
            .collect())
    }

    /// Approve a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and
    /// [`Error::InvalidTransition`] if the request was rejected.
    pub fn approve(&self, id: &str) -> Result<EmergencyRequest> {
        self.transition(id, RequestStatus::Approved)
    }

    /// Reject a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and
    /// [`Error::InvalidTransition`] if the request was approved.
    pub fn reject(&self, id: &str) -> Result<EmergencyRequest> {
        self.transition(id, RequestStatus::Rejected)
    }

    fn transition(&self, id: &str, to: RequestStatus) -> Result<EmergencyRequest> {
        let mut state = self.state()?;
        let index = state
            .requests
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::not_found("emergency request", id))?;

        let from = state.requests[index].status;
        if from == to {
            debug!(request = %id, status = %to, "Request already in target state");
            return Ok(state.requests[index].clone());
        }
        if from.is_terminal() {
            warn!(request = %id, %from, %to, "Refusing to leave terminal state");
            return Err(Error::InvalidTransition {
                id: id.to_string(),
                from,
                to,
            });
        }

        state.requests[index].status = to;
        if let Err(e) = storage::save_collection(self.store.as_ref(), EMERGENCY_REQUESTS, &state.requests) {
            state.requests[index].status = from;
            return Err(e);
        }

        info!(request = %id, %from, %to, "Emergency request resolved");
        Ok(state.requests[index].clone())
    }

    /// Whether the request exists and is approved.
    ///
    /// # Errors
    ///
    /// Returns an error if the request list lock is poisoned.
    pub fn is_approved(&self, id: &str) -> Result<bool> {
        Ok(self
            .get_by_id(id)?
            .is_some_and(|r| r.status == RequestStatus::Approved))
    }

    /// Reveal the vehicle owner's details if, and only if, the request is approved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown request id, or a lookup error.
    pub fn disclose(&self, id: &str) -> Result<Disclosure> {
        let request = self
            .get_by_id(id)?
            .ok_or_else(|| Error::not_found("emergency request", id))?;

        match request.status {
            RequestStatus::Pending => Ok(Disclosure::Pending),
            RequestStatus::Rejected => Ok(Disclosure::Rejected),
            RequestStatus::Approved => Ok(self
                .vehicles
                .vehicle_by_id(&request.vehicle_id)?
                .map_or(Disclosure::VehicleMissing, |v| {
                    Disclosure::Approved(v.owner_details())
                })),
        }
    }
}
