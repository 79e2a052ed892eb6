//! Vehicle registry.
//!
//! Vehicles are created by a signed-in account and are read-only afterwards.
//! The registry is the emergency workflow's only source of vehicle detail,
//! reached through [`VehicleLookup`].

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{new_id, Account, NewVehicle, Vehicle};
use crate::storage::{self, CollectionStore, VEHICLES};

/// Read-only vehicle lookup consumed by the emergency workflow.
pub trait VehicleLookup: Send + Sync + std::fmt::Debug {
    /// Find a vehicle by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error only if the lookup itself fails; a missing vehicle is `Ok(None)`.
    fn vehicle_by_id(&self, id: &str) -> Result<Option<Vehicle>>;
}

/// Holds every registered vehicle.
#[derive(Debug)]
pub struct VehicleRegistry {
    store: Arc<dyn CollectionStore>,
    vehicles: Mutex<Vec<Vehicle>>,
}

impl VehicleRegistry {
    /// Load the vehicle collection from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn open(store: Arc<dyn CollectionStore>) -> Result<Self> {
        let vehicles: Vec<Vehicle> = storage::load_collection(store.as_ref(), VEHICLES)?;
        debug!(count = vehicles.len(), "Loaded vehicles");
        Ok(Self {
            store,
            vehicles: Mutex::new(vehicles),
        })
    }

    fn vehicles(&self) -> Result<MutexGuard<'_, Vec<Vehicle>>> {
        self.vehicles
            .lock()
            .map_err(|_| Error::internal("vehicle list lock poisoned"))
    }

    /// Register a vehicle owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is blank, or a storage error.
    pub fn add_vehicle(&self, owner: &Account, input: NewVehicle) -> Result<Vehicle> {
        input.validate()?;

        let vehicle = Vehicle {
            id: new_id(),
            user_id: owner.id.clone(),
            registration_number: input.registration_number.trim().to_string(),
            model: input.model.trim().to_string(),
            color: input.color.trim().to_string(),
            owner_name: input.owner_name.trim().to_string(),
            owner_contact: input.owner_contact.trim().to_string(),
            owner_address: input.owner_address.trim().to_string(),
            emergency_contact: input.emergency_contact.trim().to_string(),
        };

        let mut vehicles = self.vehicles()?;
        vehicles.push(vehicle.clone());
        if let Err(e) = storage::save_collection(self.store.as_ref(), VEHICLES, &vehicles) {
            vehicles.pop();
            return Err(e);
        }

        info!(vehicle = %vehicle.id, owner = %owner.id, "Vehicle registered");
        Ok(vehicle)
    }

    /// Find a vehicle by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle list lock is poisoned.
    pub fn get_vehicle_by_id(&self, id: &str) -> Result<Option<Vehicle>> {
        Ok(self.vehicles()?.iter().find(|v| v.id == id).cloned())
    }

    /// Find a vehicle by identifier, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no vehicle has this identifier.
    pub fn require_vehicle(&self, id: &str) -> Result<Vehicle> {
        self.get_vehicle_by_id(id)?
            .ok_or_else(|| Error::not_found("vehicle", id))
    }

    /// Vehicles owned by the given account, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle list lock is poisoned.
    pub fn vehicles_for(&self, owner_id: &str) -> Result<Vec<Vehicle>> {
        Ok(self
            .vehicles()?
            .iter()
            .filter(|v| v.user_id == owner_id)
            .cloned()
            .collect())
    }

    /// Number of registered vehicles.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle list lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.vehicles()?.len())
    }

    /// Whether no vehicle has been registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle list lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl VehicleLookup for VehicleRegistry {
    fn vehicle_by_id(&self, id: &str) -> Result<Option<Vehicle>> {
        self.get_vehicle_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::storage::{FaultyStore, MemoryStore};

    fn owner(id: &str) -> Account {
        Account {
            id: id.to_string(),
            name: "Owner".to_string(),
            email: format!("{id}@example.com"),
            secret: "pw".to_string(),
        }
    }

    fn input(registration: &str) -> NewVehicle {
        NewVehicle {
            registration_number: registration.to_string(),
            model: "Sedan".to_string(),
            color: "Blue".to_string(),
            owner_name: "Ravi".to_string(),
            owner_contact: "555-0100".to_string(),
            owner_address: String::new(),
            emergency_contact: String::new(),
        }
    }

    fn registry() -> (Arc<dyn CollectionStore>, VehicleRegistry) {
        let store: Arc<dyn CollectionStore> = Arc::new(MemoryStore::new());
        let registry = VehicleRegistry::open(Arc::clone(&store)).unwrap();
        (store, registry)
    }

    #[test]
    fn test_add_and_get_vehicle() {
        let (_, registry) = registry();
        let vehicle = registry
            .add_vehicle(&owner("u1"), input(" KA-01-1234 "))
            .unwrap();

        assert_eq!(vehicle.user_id, "u1");
        assert_eq!(vehicle.registration_number, "KA-01-1234");
        assert_eq!(
            registry.get_vehicle_by_id(&vehicle.id).unwrap(),
            Some(vehicle.clone())
        );
        assert_eq!(registry.vehicle_by_id(&vehicle.id).unwrap(), Some(vehicle));
    }

    #[test]
    fn test_add_vehicle_validation() {
        let (_, registry) = registry();
        let mut bad = input("KA-01");
        bad.model = String::new();

        let err = registry.add_vehicle(&owner("u1"), bad).unwrap_err();
        assert!(err.is_validation());
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_missing_vehicle() {
        let (_, registry) = registry();
        assert!(registry.get_vehicle_by_id("nope").unwrap().is_none());

        let err = registry.require_vehicle("nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_vehicles_scoped_by_owner() {
        let (_, registry) = registry();
        let a = owner("a");
        let b = owner("b");
        registry.add_vehicle(&a, input("A-1")).unwrap();
        registry.add_vehicle(&b, input("B-1")).unwrap();
        registry.add_vehicle(&a, input("A-2")).unwrap();

        let mine: Vec<String> = registry
            .vehicles_for("a")
            .unwrap()
            .into_iter()
            .map(|v| v.registration_number)
            .collect();
        assert_eq!(mine, vec!["A-1", "A-2"]);
        assert!(registry.vehicles_for("c").unwrap().is_empty());
        assert_eq!(registry.len().unwrap(), 3);
    }

    #[test]
    fn test_vehicles_persist_across_reopen() {
        let (store, registry) = registry();
        let vehicle = registry.add_vehicle(&owner("u1"), input("P-1")).unwrap();
        drop(registry);

        let reopened = VehicleRegistry::open(store).unwrap();
        assert_eq!(reopened.require_vehicle(&vehicle.id).unwrap(), vehicle);
    }

    #[test]
    fn test_failed_save_leaves_registry_unchanged() {
        let store = Arc::new(FaultyStore::default());
        let registry = VehicleRegistry::open(store.clone()).unwrap();

        store.fail_next_save.store(true, Ordering::SeqCst);
        assert!(registry.add_vehicle(&owner("u1"), input("F-1")).is_err());
        assert!(registry.is_empty().unwrap());

        // The failed vehicle must not ride along with the next successful save
        let kept = registry.add_vehicle(&owner("u1"), input("F-2")).unwrap();
        let reopened = VehicleRegistry::open(store).unwrap();
        assert_eq!(reopened.vehicles_for("u1").unwrap(), vec![kept]);
    }
}
