use std::sync::Arc;

use uuid::Uuid;

use crate::billing::{BillingError, BillingResult};
use crate::models::{Building, BuildingRates, NewBuilding, NewRoom, RentalStatus, Room};
use crate::repository::BillingStore;

/// Which buildings a caller may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildingScope {
    All,
    Owned(String),
}

/// Buildings, rooms and who owns which building.
#[derive(Clone)]
pub struct PropertyService {
    store: Arc<dyn BillingStore>,
}

impl PropertyService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    pub async fn get_building(&self, building_id: Uuid) -> BillingResult<Building> {
        self.store
            .get_building(building_id)
            .await?
            .ok_or_else(|| building_not_found(building_id))
    }

    pub async fn list_buildings(&self) -> BillingResult<Vec<Building>> {
        self.store.list_buildings().await
    }

    /// Creates a building owned by its creator.
    pub async fn create_building(
        &self,
        building: NewBuilding,
        owner_id: &str,
    ) -> BillingResult<Building> {
        let building = self.store.insert_building(building).await?;
        self.store.assign_building_owner(building.id, owner_id).await?;
        tracing::info!(building_id = %building.id, owner_id, "Building created");
        Ok(building)
    }

    pub async fn update_building_rates(
        &self,
        building_id: Uuid,
        rates: BuildingRates,
        scope: &BuildingScope,
    ) -> BillingResult<Building> {
        self.ensure_scope(building_id, scope).await?;
        let building = self
            .store
            .update_building_rates(building_id, rates)
            .await?
            .ok_or_else(|| building_not_found(building_id))?;
        tracing::info!(building_id = %building.id, "Building rates updated");
        Ok(building)
    }

    pub async fn owned_buildings(&self, user_id: &str) -> BillingResult<Vec<Building>> {
        self.store.list_owned_buildings(user_id).await
    }

    pub async fn assign_owner(&self, building_id: Uuid, user_id: &str) -> BillingResult<()> {
        self.get_building(building_id).await?;
        if !self.store.assign_building_owner(building_id, user_id).await? {
            return Err(BillingError::Conflict(format!(
                "User {user_id} already owns building {building_id}."
            )));
        }
        tracing::info!(building_id = %building_id, user_id, "Building owner assigned");
        Ok(())
    }

    pub async fn remove_owner(&self, building_id: Uuid, user_id: &str) -> BillingResult<()> {
        if !self.store.remove_building_owner(building_id, user_id).await? {
            return Err(BillingError::NotFound(format!(
                "User {user_id} does not own building {building_id}."
            )));
        }
        tracing::info!(building_id = %building_id, user_id, "Building owner removed");
        Ok(())
    }

    pub async fn get_room(&self, room_id: Uuid) -> BillingResult<Room> {
        self.store
            .get_room(room_id)
            .await?
            .ok_or_else(|| room_not_found(room_id))
    }

    pub async fn list_rooms(&self, building_id: Option<Uuid>) -> BillingResult<Vec<Room>> {
        self.store.list_rooms(building_id).await
    }

    pub async fn create_room(&self, room: NewRoom, scope: &BuildingScope) -> BillingResult<Room> {
        self.get_building(room.building_id).await?;
        self.ensure_scope(room.building_id, scope).await?;
        let room = self.store.insert_room(room).await?;
        tracing::info!(room_id = %room.id, building_id = %room.building_id, "Room created");
        Ok(room)
    }

    pub async fn set_rental_status(
        &self,
        room_id: Uuid,
        status: RentalStatus,
        scope: &BuildingScope,
    ) -> BillingResult<Room> {
        let room = self.get_room(room_id).await?;
        self.ensure_scope(room.building_id, scope).await?;
        let room = self
            .store
            .set_room_rental_status(room_id, status)
            .await?
            .ok_or_else(|| room_not_found(room_id))?;
        tracing::info!(
            room_id = %room.id,
            rental_status = room.rental_status.as_str(),
            "Room rental status updated"
        );
        Ok(room)
    }

    async fn ensure_scope(&self, building_id: Uuid, scope: &BuildingScope) -> BillingResult<()> {
        let BuildingScope::Owned(user_id) = scope else {
            return Ok(());
        };
        if self.store.is_building_owner(building_id, user_id).await? {
            return Ok(());
        }
        Err(BillingError::Forbidden(format!(
            "You do not manage building {building_id}."
        )))
    }
}

fn building_not_found(building_id: Uuid) -> BillingError {
    BillingError::NotFound(format!("Building {building_id} not found."))
}

fn room_not_found(room_id: Uuid) -> BillingError {
    BillingError::NotFound(format!("Room {room_id} not found."))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::{BuildingScope, PropertyService};
    use crate::billing::BillingError;
    use crate::models::{BuildingRates, NewBuilding, NewRoom, RentalStatus};
    use crate::repository::MemoryStore;

    fn new_building(name: &str) -> NewBuilding {
        NewBuilding {
            name: name.to_string(),
            landlord_name: None,
            electricity_unit_price: Some(dec!(1.20)),
            water_unit_price: Some(dec!(3.50)),
            hot_water_unit_price: None,
            created_by: None,
        }
    }

    fn new_room(building_id: Uuid, number: &str) -> NewRoom {
        NewRoom {
            building_id,
            room_number: number.to_string(),
            rent: dec!(2000),
            default_deposit: None,
            electricity_unit_price: None,
            water_unit_price: None,
            hot_water_unit_price: None,
            rental_status: RentalStatus::Vacant,
            created_by: None,
        }
    }

    fn owned(user: &str) -> BuildingScope {
        BuildingScope::Owned(user.to_string())
    }

    #[tokio::test]
    async fn creator_owns_new_building() {
        let service = PropertyService::new(Arc::new(MemoryStore::new()));
        let building = service
            .create_building(new_building("B1"), "landlord-1")
            .await
            .expect("building");

        let owned_by_creator = service.owned_buildings("landlord-1").await.expect("owned");
        assert_eq!(owned_by_creator.len(), 1);
        assert_eq!(owned_by_creator[0].id, building.id);
        assert!(service.owned_buildings("landlord-2").await.expect("owned").is_empty());

        let room = service
            .create_room(new_room(building.id, "R101"), &owned("landlord-1"))
            .await
            .expect("room");
        assert_eq!(room.building_id, building.id);
    }

    #[tokio::test]
    async fn non_owner_cannot_change_building_or_rooms() {
        let service = PropertyService::new(Arc::new(MemoryStore::new()));
        let building = service
            .create_building(new_building("B1"), "landlord-1")
            .await
            .expect("building");
        let room = service
            .create_room(new_room(building.id, "R101"), &BuildingScope::All)
            .await
            .expect("room");

        let stranger = owned("landlord-2");
        assert!(matches!(
            service.create_room(new_room(building.id, "R102"), &stranger).await,
            Err(BillingError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .set_rental_status(room.id, RentalStatus::Rented, &stranger)
                .await,
            Err(BillingError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .update_building_rates(building.id, BuildingRates::default(), &stranger)
                .await,
            Err(BillingError::Forbidden(_))
        ));

        service
            .assign_owner(building.id, "landlord-2")
            .await
            .expect("assign");
        let rented = service
            .set_rental_status(room.id, RentalStatus::Rented, &stranger)
            .await
            .expect("now allowed");
        assert_eq!(rented.rental_status, RentalStatus::Rented);
    }

    #[tokio::test]
    async fn assignment_conflicts_and_removal_reports_missing() {
        let service = PropertyService::new(Arc::new(MemoryStore::new()));
        let building = service
            .create_building(new_building("B1"), "landlord-1")
            .await
            .expect("building");

        assert!(matches!(
            service.assign_owner(building.id, "landlord-1").await,
            Err(BillingError::Conflict(_))
        ));
        assert!(matches!(
            service.assign_owner(Uuid::new_v4(), "landlord-1").await,
            Err(BillingError::NotFound(_))
        ));

        service
            .remove_owner(building.id, "landlord-1")
            .await
            .expect("remove");
        assert!(matches!(
            service.remove_owner(building.id, "landlord-1").await,
            Err(BillingError::NotFound(_))
        ));
        assert!(matches!(
            service
                .create_room(new_room(building.id, "R101"), &owned("landlord-1"))
                .await,
            Err(BillingError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn room_in_missing_building_is_not_found() {
        let service = PropertyService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service
                .create_room(new_room(Uuid::new_v4(), "R101"), &BuildingScope::All)
                .await,
            Err(BillingError::NotFound(_))
        ));
    }
}
