//! Core record types for vahanguard.
//!
//! This module defines the accounts, vehicles and emergency requests that the
//! stores persist. Field names serialize in the camelCase layout used by the
//! browser build, so persisted collections stay interchangeable with it.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Allocate a fresh random identifier.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address, unique within the identity store.
    pub email: String,
    /// Stored credential, in the form produced by the configured secret scheme.
    #[serde(rename = "password")]
    pub secret: String,
}

/// A registered vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Unique identifier, embedded in the deep link.
    pub id: String,
    /// Identifier of the owning account.
    pub user_id: String,
    /// Registration (plate) number.
    pub registration_number: String,
    /// Make and model.
    pub model: String,
    /// Body color.
    #[serde(default)]
    pub color: String,
    /// Owner's name.
    pub owner_name: String,
    /// Owner's contact number.
    pub owner_contact: String,
    /// Owner's postal address.
    #[serde(default)]
    pub owner_address: String,
    /// Secondary contact for emergencies.
    #[serde(default)]
    pub emergency_contact: String,
}

impl Vehicle {
    /// The fields revealed to an approved emergency requester.
    #[must_use]
    pub fn owner_details(&self) -> OwnerDetails {
        OwnerDetails {
            registration_number: self.registration_number.clone(),
            model: self.model.clone(),
            color: self.color.clone(),
            owner_name: self.owner_name.clone(),
            owner_contact: self.owner_contact.clone(),
            owner_address: non_empty(&self.owner_address),
            emergency_contact: non_empty(&self.emergency_contact),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Input for registering a vehicle; the registry assigns `id` and `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    /// Registration (plate) number. Required.
    pub registration_number: String,
    /// Make and model. Required.
    pub model: String,
    /// Body color.
    pub color: String,
    /// Owner's name. Required.
    pub owner_name: String,
    /// Owner's contact number. Required.
    pub owner_contact: String,
    /// Owner's postal address.
    pub owner_address: String,
    /// Secondary contact for emergencies.
    pub emergency_contact: String,
}

impl NewVehicle {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first missing field.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("registration_number", &self.registration_number),
            ("model", &self.model),
            ("owner_name", &self.owner_name),
            ("owner_contact", &self.owner_contact),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::validation(field, "this field is required"));
            }
        }
        Ok(())
    }
}

/// Vehicle owner details disclosed once a request is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDetails {
    /// Registration (plate) number.
    pub registration_number: String,
    /// Make and model.
    pub model: String,
    /// Body color.
    pub color: String,
    /// Owner's name.
    pub owner_name: String,
    /// Owner's contact number.
    pub owner_contact: String,
    /// Owner's address, when one was registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    /// Emergency contact, when one was registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
}

/// Why an emergency request was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    /// A collision involving the vehicle.
    #[default]
    Accident,
    /// The vehicle is blocking or badly parked.
    Parking,
    /// A payment matter with the owner.
    Payment,
    /// Anything else.
    Other,
}

impl RequestCategory {
    /// All categories, in display order.
    pub const ALL: [Self; 4] = [Self::Accident, Self::Parking, Self::Payment, Self::Other];

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Accident => "Accident",
            Self::Parking => "Parking Issue",
            Self::Payment => "Payment",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accident => write!(f, "accident"),
            Self::Parking => write!(f, "parking"),
            Self::Payment => write!(f, "payment"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl FromStr for RequestCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accident" => Ok(Self::Accident),
            "parking" => Ok(Self::Parking),
            "payment" => Ok(Self::Payment),
            "other" => Ok(Self::Other),
            "" => Err(Error::validation("category", "a category is required")),
            other => Err(Error::validation(
                "category",
                format!("unknown category '{other}'"),
            )),
        }
    }
}

/// Lifecycle status of an emergency request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting a decision.
    Pending,
    /// The owner agreed to share contact details.
    Approved,
    /// The owner declined.
    Rejected,
}

impl RequestStatus {
    /// Whether no further transition is allowed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// An anonymous request to see a vehicle owner's contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    /// Unique identifier.
    pub id: String,
    /// Target vehicle. Not guaranteed to resolve.
    pub vehicle_id: String,
    /// Why the request was raised.
    pub request_type: RequestCategory,
    /// Reference to the uploaded evidence image (URL, data URL or path).
    pub image_url: String,
    /// When the workflow accepted the request.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Free-text description of the situation.
    #[serde(default)]
    pub description: String,
}

/// Caller-supplied part of an emergency request.
///
/// The workflow assigns the identifier, timestamp and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmergencyRequest {
    /// Target vehicle.
    pub vehicle_id: String,
    /// Why the request is raised.
    pub category: RequestCategory,
    /// Reference to the evidence image.
    pub image_ref: String,
    /// Free-text description.
    pub description: String,
}

impl NewEmergencyRequest {
    /// Build a request from its parts.
    #[must_use]
    pub fn new(
        vehicle_id: impl Into<String>,
        category: RequestCategory,
        image_ref: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            category,
            image_ref: image_ref.into(),
            description: description.into(),
        }
    }

    /// Check the fields the workflow requires.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the vehicle id or image reference is blank.
    pub fn validate(&self) -> Result<(), Error> {
        if self.vehicle_id.trim().is_empty() {
            return Err(Error::validation("vehicle_id", "a vehicle id is required"));
        }
        if self.image_ref.trim().is_empty() {
            return Err(Error::validation(
                "image",
                "please upload an image of the current situation",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vehicle() -> Vehicle {
        Vehicle {
            id: "v1".to_string(),
            user_id: "u1".to_string(),
            registration_number: "KA-01-AB-1234".to_string(),
            model: "Hatchback".to_string(),
            color: "Red".to_string(),
            owner_name: "Asha".to_string(),
            owner_contact: "+91 98450 00000".to_string(),
            owner_address: String::new(),
            emergency_contact: "+91 98450 11111".to_string(),
        }
    }

    #[test]
    fn test_category_display_and_parse() {
        for category in RequestCategory::ALL {
            let parsed: RequestCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert_eq!(
            "  Parking ".parse::<RequestCategory>().unwrap(),
            RequestCategory::Parking
        );
    }

    #[test]
    fn test_category_rejects_unknown_values() {
        let err = "towing".parse::<RequestCategory>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("towing"));

        let err = "".parse::<RequestCategory>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(RequestCategory::Parking.label(), "Parking Issue");
        assert_eq!(RequestCategory::default(), RequestCategory::Accident);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_request_serializes_in_browser_layout() {
        let request = EmergencyRequest {
            id: "r1".to_string(),
            vehicle_id: "v1".to_string(),
            request_type: RequestCategory::Accident,
            image_url: "data:image/png;base64,AAAA".to_string(),
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            status: RequestStatus::Pending,
            description: "fender bender".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["vehicleId"], "v1");
        assert_eq!(json["requestType"], "accident");
        assert_eq!(json["imageUrl"], "data:image/png;base64,AAAA");
        assert_eq!(json["timestamp"], 1_700_000_000_123_i64);
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_request_reads_browser_dump() {
        let json = r#"{"id":"r9","vehicleId":"v2","requestType":"payment",
            "imageUrl":"data:x","timestamp":1700000000000,"status":"approved",
            "description":"toll"}"#;
        let request: EmergencyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.request_type, RequestCategory::Payment);
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_account_secret_uses_password_key() {
        let account = Account {
            id: "u1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            secret: "hunter2".to_string(),
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["password"], "hunter2");
    }

    #[test]
    fn test_new_vehicle_requires_fields() {
        let mut input = NewVehicle {
            registration_number: "KA-01".to_string(),
            model: "Sedan".to_string(),
            owner_name: "Asha".to_string(),
            owner_contact: "123".to_string(),
            ..NewVehicle::default()
        };
        assert!(input.validate().is_ok());

        input.owner_contact = "  ".to_string();
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("owner_contact"));
    }

    #[test]
    fn test_new_request_validation() {
        let ok = NewEmergencyRequest::new("v1", RequestCategory::Accident, "data:x", "");
        assert!(ok.validate().is_ok());

        let no_image = NewEmergencyRequest::new("v1", RequestCategory::Accident, "", "");
        let err = no_image.validate().unwrap_err();
        assert!(err.to_string().contains("image"));

        let no_vehicle = NewEmergencyRequest::new(" ", RequestCategory::Other, "data:x", "");
        assert!(no_vehicle.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_owner_details_drop_empty_optionals() {
        let details = sample_vehicle().owner_details();
        assert_eq!(details.owner_address, None);
        assert_eq!(details.emergency_contact.as_deref(), Some("+91 98450 11111"));
        assert_eq!(details.owner_contact, "+91 98450 00000");
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }
}
