//! In-process store used when no database is configured, and by tests.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::BillingStore;
use crate::billing::{BillingError, BillingResult};
use crate::models::{
    Bill, BillDraft, BillFilter, BillKind, BillMonth, Building, BuildingRates, MeterReading,
    NewBuilding, NewMeterReading, NewRoom, ReadingStatus, RentalStatus, Room,
};

#[derive(Default)]
struct Tables {
    buildings: HashMap<Uuid, Building>,
    rooms: HashMap<Uuid, Room>,
    readings: HashMap<Uuid, MeterReading>,
    bills: HashMap<Uuid, Bill>,
    owners: Vec<(Uuid, String)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    reading_range_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_readings_in_range` calls served so far.
    #[cfg(test)]
    pub fn reading_range_queries(&self) -> usize {
        self.reading_range_queries.load(Ordering::SeqCst)
    }
}

fn sort_rooms(rooms: &mut [Room]) {
    rooms.sort_by(|a, b| {
        a.building_id
            .cmp(&b.building_id)
            .then_with(|| a.room_number.cmp(&b.room_number))
    });
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn get_building(&self, building_id: Uuid) -> BillingResult<Option<Building>> {
        Ok(self.tables.read().await.buildings.get(&building_id).cloned())
    }

    async fn list_buildings(&self) -> BillingResult<Vec<Building>> {
        let mut buildings = self
            .tables
            .read()
            .await
            .buildings
            .values()
            .cloned()
            .collect::<Vec<_>>();
        buildings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buildings)
    }

    async fn insert_building(&self, building: NewBuilding) -> BillingResult<Building> {
        let now = Utc::now();
        let created = Building {
            id: Uuid::new_v4(),
            name: building.name,
            landlord_name: building.landlord_name,
            electricity_unit_price: building.electricity_unit_price,
            water_unit_price: building.water_unit_price,
            hot_water_unit_price: building.hot_water_unit_price,
            created_by: building.created_by,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .buildings
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_building_rates(
        &self,
        building_id: Uuid,
        rates: BuildingRates,
    ) -> BillingResult<Option<Building>> {
        let mut tables = self.tables.write().await;
        let Some(building) = tables.buildings.get_mut(&building_id) else {
            return Ok(None);
        };
        building.electricity_unit_price = rates.electricity_unit_price;
        building.water_unit_price = rates.water_unit_price;
        building.hot_water_unit_price = rates.hot_water_unit_price;
        building.updated_at = Utc::now();
        Ok(Some(building.clone()))
    }

    async fn get_room(&self, room_id: Uuid) -> BillingResult<Option<Room>> {
        Ok(self.tables.read().await.rooms.get(&room_id).cloned())
    }

    async fn list_rooms(&self, building_id: Option<Uuid>) -> BillingResult<Vec<Room>> {
        let mut rooms = self
            .tables
            .read()
            .await
            .rooms
            .values()
            .filter(|room| building_id.is_none_or(|id| room.building_id == id))
            .cloned()
            .collect::<Vec<_>>();
        sort_rooms(&mut rooms);
        Ok(rooms)
    }

    async fn list_rooms_by_status(&self, status: RentalStatus) -> BillingResult<Vec<Room>> {
        let mut rooms = self
            .tables
            .read()
            .await
            .rooms
            .values()
            .filter(|room| room.rental_status == status)
            .cloned()
            .collect::<Vec<_>>();
        sort_rooms(&mut rooms);
        Ok(rooms)
    }

    async fn insert_room(&self, room: NewRoom) -> BillingResult<Room> {
        let mut tables = self.tables.write().await;
        if !tables.buildings.contains_key(&room.building_id) {
            return Err(BillingError::NotFound(format!(
                "Building {} not found.",
                room.building_id
            )));
        }
        if tables
            .rooms
            .values()
            .any(|existing| {
                existing.building_id == room.building_id && existing.room_number == room.room_number
            })
        {
            return Err(BillingError::Conflict(format!(
                "Room {} already exists in this building.",
                room.room_number
            )));
        }

        let now = Utc::now();
        let created = Room {
            id: Uuid::new_v4(),
            building_id: room.building_id,
            room_number: room.room_number,
            rent: room.rent,
            default_deposit: room.default_deposit,
            electricity_unit_price: room.electricity_unit_price,
            water_unit_price: room.water_unit_price,
            hot_water_unit_price: room.hot_water_unit_price,
            rental_status: room.rental_status,
            created_by: room.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.rooms.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_room_rental_status(
        &self,
        room_id: Uuid,
        status: RentalStatus,
    ) -> BillingResult<Option<Room>> {
        let mut tables = self.tables.write().await;
        let Some(room) = tables.rooms.get_mut(&room_id) else {
            return Ok(None);
        };
        room.rental_status = status;
        room.updated_at = Utc::now();
        Ok(Some(room.clone()))
    }

    async fn assign_building_owner(
        &self,
        building_id: Uuid,
        user_id: &str,
    ) -> BillingResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.buildings.contains_key(&building_id) {
            return Err(BillingError::NotFound(format!("Building {building_id} not found.")));
        }
        if tables
            .owners
            .iter()
            .any(|(building, user)| *building == building_id && user == user_id)
        {
            return Ok(false);
        }
        tables.owners.push((building_id, user_id.to_string()));
        Ok(true)
    }

    async fn remove_building_owner(
        &self,
        building_id: Uuid,
        user_id: &str,
    ) -> BillingResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.owners.len();
        tables
            .owners
            .retain(|(building, user)| !(*building == building_id && user == user_id));
        Ok(tables.owners.len() < before)
    }

    async fn is_building_owner(&self, building_id: Uuid, user_id: &str) -> BillingResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .owners
            .iter()
            .any(|(building, user)| *building == building_id && user == user_id))
    }

    async fn list_owned_buildings(&self, user_id: &str) -> BillingResult<Vec<Building>> {
        let tables = self.tables.read().await;
        let mut buildings = tables
            .owners
            .iter()
            .filter(|(_, user)| user == user_id)
            .filter_map(|(building, _)| tables.buildings.get(building).cloned())
            .collect::<Vec<_>>();
        buildings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buildings)
    }

    async fn insert_reading(&self, reading: NewMeterReading) -> BillingResult<MeterReading> {
        let mut tables = self.tables.write().await;
        if tables.readings.values().any(|existing| {
            existing.room_id == reading.room_id && existing.reading_date == reading.reading_date
        }) {
            return Err(BillingError::Conflict(format!(
                "Room already has a meter reading on {}.",
                reading.reading_date
            )));
        }

        let created = MeterReading {
            id: Uuid::new_v4(),
            room_id: reading.room_id,
            reading_date: reading.reading_date,
            reading_time: reading.reading_time,
            electricity_reading: reading.electricity_reading,
            water_reading: reading.water_reading,
            hot_water_reading: reading.hot_water_reading,
            meter_reader: reading.meter_reader,
            reading_type: reading.reading_type,
            status: reading.status,
            notes: reading.notes,
            created_by: reading.created_by,
            created_at: Utc::now(),
        };
        tables.readings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_reading(&self, reading_id: Uuid) -> BillingResult<Option<MeterReading>> {
        Ok(self.tables.read().await.readings.get(&reading_id).cloned())
    }

    async fn find_readings_in_range(
        &self,
        room_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BillingResult<Vec<MeterReading>> {
        #[cfg(test)]
        self.reading_range_queries.fetch_add(1, Ordering::SeqCst);
        let mut readings = self
            .tables
            .read()
            .await
            .readings
            .values()
            .filter(|reading| {
                reading.room_id == room_id
                    && reading.reading_date >= start
                    && reading.reading_date <= end
            })
            .cloned()
            .collect::<Vec<_>>();
        readings.sort_by(|a, b| {
            b.reading_date
                .cmp(&a.reading_date)
                .then_with(|| b.reading_time.cmp(&a.reading_time))
        });
        Ok(readings)
    }

    async fn set_reading_status(
        &self,
        reading_id: Uuid,
        status: ReadingStatus,
    ) -> BillingResult<Option<MeterReading>> {
        let mut tables = self.tables.write().await;
        let Some(reading) = tables.readings.get_mut(&reading_id) else {
            return Ok(None);
        };
        reading.status = status;
        Ok(Some(reading.clone()))
    }

    async fn update_reading(&self, reading: &MeterReading) -> BillingResult<Option<MeterReading>> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.readings.get_mut(&reading.id) else {
            return Ok(None);
        };
        stored.electricity_reading = reading.electricity_reading;
        stored.water_reading = reading.water_reading;
        stored.hot_water_reading = reading.hot_water_reading;
        stored.meter_reader = reading.meter_reader.clone();
        stored.reading_type = reading.reading_type;
        stored.notes = reading.notes.clone();
        Ok(Some(stored.clone()))
    }

    async fn count_readings_by_status(&self, status: ReadingStatus) -> BillingResult<i64> {
        let count = self
            .tables
            .read()
            .await
            .readings
            .values()
            .filter(|reading| reading.status == status)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn delete_reading(&self, reading_id: Uuid) -> BillingResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .readings
            .remove(&reading_id)
            .is_some())
    }

    async fn get_bill(&self, bill_id: Uuid) -> BillingResult<Option<Bill>> {
        Ok(self.tables.read().await.bills.get(&bill_id).cloned())
    }

    async fn exists_bill(
        &self,
        room_id: Uuid,
        bill_month: BillMonth,
        kind: BillKind,
    ) -> BillingResult<bool> {
        Ok(self.tables.read().await.bills.values().any(|bill| {
            bill.room_id == room_id && bill.bill_month == bill_month && bill.kind == kind
        }))
    }

    async fn count_bills_for_room(&self, room_id: Uuid, kind: BillKind) -> BillingResult<i64> {
        let count = self
            .tables
            .read()
            .await
            .bills
            .values()
            .filter(|bill| bill.room_id == room_id && bill.kind == kind)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn find_actual_for_estimated(
        &self,
        estimated_bill_id: Uuid,
    ) -> BillingResult<Option<Bill>> {
        Ok(self
            .tables
            .read()
            .await
            .bills
            .values()
            .find(|bill| bill.estimated_bill_id == Some(estimated_bill_id))
            .cloned())
    }

    async fn insert_bill_if_absent(&self, draft: BillDraft) -> BillingResult<Option<Bill>> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.bills.values().any(|bill| {
            (bill.room_id == draft.room_id
                && bill.bill_month == draft.bill_month
                && bill.kind == draft.kind)
                || (draft.estimated_bill_id.is_some()
                    && bill.estimated_bill_id == draft.estimated_bill_id)
        });
        if duplicate {
            return Ok(None);
        }

        let now = Utc::now();
        let bill = Bill {
            id: Uuid::new_v4(),
            kind: draft.kind,
            estimated_bill_id: draft.estimated_bill_id,
            room_id: draft.room_id,
            bill_month: draft.bill_month,
            bill_date: draft.bill_date,
            charges: draft.charges,
            status: draft.status,
            payment_status: draft.payment_status,
            payment_date: draft.payment_date,
            payment_method: draft.payment_method,
            notes: draft.notes,
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.bills.insert(bill.id, bill.clone());
        Ok(Some(bill))
    }

    async fn update_bill(&self, bill: &Bill) -> BillingResult<Option<Bill>> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.bills.get_mut(&bill.id) else {
            return Ok(None);
        };
        stored.bill_date = bill.bill_date;
        stored.charges = bill.charges.clone();
        stored.status = bill.status;
        stored.payment_status = bill.payment_status;
        stored.payment_date = bill.payment_date;
        stored.payment_method = bill.payment_method.clone();
        stored.notes = bill.notes.clone();
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn list_bills(&self, filter: &BillFilter) -> BillingResult<Vec<Bill>> {
        let tables = self.tables.read().await;
        let mut bills = tables
            .bills
            .values()
            .filter(|bill| filter.kind.is_none_or(|kind| bill.kind == kind))
            .filter(|bill| filter.room_id.is_none_or(|id| bill.room_id == id))
            .filter(|bill| filter.bill_month.is_none_or(|month| bill.bill_month == month))
            .filter(|bill| filter.status.is_none_or(|status| bill.status == status))
            .filter(|bill| {
                filter
                    .payment_status
                    .is_none_or(|status| bill.payment_status == Some(status))
            })
            .cloned()
            .collect::<Vec<_>>();
        bills.sort_by(|a, b| {
            b.bill_month
                .cmp(&a.bill_month)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });

        let offset = usize::try_from(filter.offset.max(0)).unwrap_or(0);
        let limit = usize::try_from(filter.limit.clamp(1, 1000)).unwrap_or(1000);
        Ok(bills.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete_bill(&self, bill_id: Uuid) -> BillingResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.bills.remove(&bill_id).is_none() {
            return Ok(false);
        }
        for bill in tables.bills.values_mut() {
            if bill.estimated_bill_id == Some(bill_id) {
                bill.estimated_bill_id = None;
            }
        }
        Ok(true)
    }
}
