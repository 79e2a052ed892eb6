//! Emergency access page.
//!
//! Reached from a vehicle's deep link. The page resolves the vehicle, takes a
//! request form from an anonymous requester, submits it to the workflow and
//! follows the request through a [`WatchHandle`] until it is resolved.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{NewEmergencyRequest, OwnerDetails, RequestCategory, RequestStatus, Vehicle};
use crate::registry::VehicleLookup;
use crate::workflow::{
    Disclosure, EmergencyWorkflow, Observation, ObservationSource, WatchConfig, WatchHandle,
};

/// What the requester fills in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessForm {
    /// Why the request is raised.
    pub category: RequestCategory,
    /// Reference to the evidence image. Required.
    pub image_ref: String,
    /// Free-text description.
    pub description: String,
}

/// What the page currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AccessView {
    /// The request form; nothing submitted yet.
    Form,
    /// Waiting for the owner.
    Pending {
        /// Submitted request.
        request_id: String,
    },
    /// The owner's details.
    Approved {
        /// Submitted request.
        request_id: String,
        /// Details shown to the requester.
        details: OwnerDetails,
        /// Whether the approval came from the store or the local fallback.
        #[serde(skip)]
        source: ObservationSource,
    },
    /// The owner declined.
    Rejected {
        /// Submitted request.
        request_id: String,
    },
}

#[derive(Debug)]
struct Submission {
    request_id: String,
    watcher: WatchHandle,
}

/// Controller for one emergency access page.
#[derive(Debug)]
pub struct EmergencyAccess {
    workflow: Arc<EmergencyWorkflow>,
    vehicle: Vehicle,
    watch: WatchConfig,
    submission: Option<Submission>,
}

impl EmergencyAccess {
    /// Resolve `vehicle_id` and show the form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the vehicle does not exist.
    pub fn open(
        vehicles: &dyn VehicleLookup,
        workflow: Arc<EmergencyWorkflow>,
        vehicle_id: &str,
        watch: WatchConfig,
    ) -> Result<Self> {
        let vehicle = vehicles
            .vehicle_by_id(vehicle_id)?
            .ok_or_else(|| Error::not_found("vehicle", vehicle_id))?;
        debug!(vehicle = %vehicle.id, "Emergency access opened");

        Ok(Self {
            workflow,
            vehicle,
            watch,
            submission: None,
        })
    }

    /// The vehicle this page was opened for.
    #[must_use]
    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    /// The submitted request, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.submission.as_ref().map(|s| s.request_id.as_str())
    }

    /// Submit the form and start following the request.
    ///
    /// Any earlier submission on this page stops being followed.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no image was supplied, or a workflow error.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn submit(&mut self, form: AccessForm) -> Result<String> {
        if form.image_ref.trim().is_empty() {
            return Err(Error::validation(
                "image",
                "please upload an image of the current situation",
            ));
        }

        let request_id = self.workflow.create(NewEmergencyRequest::new(
            self.vehicle.id.clone(),
            form.category,
            form.image_ref,
            form.description,
        ))?;
        let watcher = WatchHandle::spawn(Arc::clone(&self.workflow), request_id.clone(), self.watch);
        info!(request = %request_id, vehicle = %self.vehicle.id, "Emergency request submitted");

        self.submission = Some(Submission {
            request_id: request_id.clone(),
            watcher,
        });
        Ok(request_id)
    }

    /// Wait for the next status change. Returns `None` once nothing more will change.
    pub async fn next_observation(&mut self) -> Option<Observation> {
        match self.submission.as_mut() {
            Some(submission) => submission.watcher.changed().await,
            None => None,
        }
    }

    /// Wait until the request is resolved, then render.
    ///
    /// # Errors
    ///
    /// Returns an error if the final view cannot be rendered.
    pub async fn wait_resolved(&mut self) -> Result<AccessView> {
        if let Some(submission) = self.submission.as_mut() {
            submission.watcher.wait_terminal().await;
        }
        self.view()
    }

    /// Render the page from the latest observation.
    ///
    /// # Errors
    ///
    /// Returns an error if a store-approved request cannot be disclosed.
    pub fn view(&self) -> Result<AccessView> {
        let Some(submission) = &self.submission else {
            return Ok(AccessView::Form);
        };
        let request_id = submission.request_id.clone();

        let Some(observation) = submission.watcher.latest() else {
            return Ok(AccessView::Pending { request_id });
        };

        match (observation.status, observation.source) {
            (RequestStatus::Pending, _) => Ok(AccessView::Pending { request_id }),
            (RequestStatus::Rejected, _) => Ok(AccessView::Rejected { request_id }),
            (RequestStatus::Approved, ObservationSource::Store) => {
                match self.workflow.disclose(&request_id)? {
                    Disclosure::Approved(details) => Ok(AccessView::Approved {
                        request_id,
                        details,
                        source: ObservationSource::Store,
                    }),
                    Disclosure::VehicleMissing => Err(Error::not_found("vehicle", &self.vehicle.id)),
                    Disclosure::Pending | Disclosure::Rejected => {
                        Err(Error::internal("observed approval not reflected in the store"))
                    }
                }
            }
            // The fallback never reaches the store, so the page shows what it loaded on open
            (RequestStatus::Approved, ObservationSource::LocalFallback) => Ok(AccessView::Approved {
                request_id,
                details: self.vehicle.owner_details(),
                source: ObservationSource::LocalFallback,
            }),
        }
    }

    /// Stop following the request and show the form again.
    pub fn reset(&mut self) {
        if let Some(submission) = self.submission.take() {
            submission.watcher.stop();
            debug!(request = %submission.request_id, "Emergency access reset");
        }
    }
}
