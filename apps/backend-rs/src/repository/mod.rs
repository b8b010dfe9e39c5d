//! Persistence collaborators of the billing calculator.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::billing::BillingResult;
use crate::models::{
    Bill, BillDraft, BillFilter, BillKind, BillMonth, Building, BuildingRates, MeterReading,
    NewBuilding, NewMeterReading, NewRoom, ReadingStatus, RentalStatus, Room,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage operations needed by bill generation, meter readings and the
/// property records they hang off.
///
/// Lookups return `Ok(None)` for a missing row; `Err` is reserved for storage
/// failures and uniqueness conflicts.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn get_building(&self, building_id: Uuid) -> BillingResult<Option<Building>>;
    async fn list_buildings(&self) -> BillingResult<Vec<Building>>;
    async fn insert_building(&self, building: NewBuilding) -> BillingResult<Building>;
    async fn update_building_rates(
        &self,
        building_id: Uuid,
        rates: BuildingRates,
    ) -> BillingResult<Option<Building>>;

    async fn get_room(&self, room_id: Uuid) -> BillingResult<Option<Room>>;
    async fn list_rooms(&self, building_id: Option<Uuid>) -> BillingResult<Vec<Room>>;
    async fn list_rooms_by_status(&self, status: RentalStatus) -> BillingResult<Vec<Room>>;
    async fn insert_room(&self, room: NewRoom) -> BillingResult<Room>;
    async fn set_room_rental_status(
        &self,
        room_id: Uuid,
        status: RentalStatus,
    ) -> BillingResult<Option<Room>>;

    /// Returns `false` when the user already owns the building.
    async fn assign_building_owner(&self, building_id: Uuid, user_id: &str)
        -> BillingResult<bool>;
    async fn remove_building_owner(&self, building_id: Uuid, user_id: &str)
        -> BillingResult<bool>;
    async fn is_building_owner(&self, building_id: Uuid, user_id: &str) -> BillingResult<bool>;
    async fn list_owned_buildings(&self, user_id: &str) -> BillingResult<Vec<Building>>;

    /// Fails with `Conflict` when the room already has a reading on that date.
    async fn insert_reading(&self, reading: NewMeterReading) -> BillingResult<MeterReading>;
    async fn get_reading(&self, reading_id: Uuid) -> BillingResult<Option<MeterReading>>;
    /// Readings dated within `[start, end]`, newest date first, then newest time first.
    async fn find_readings_in_range(
        &self,
        room_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BillingResult<Vec<MeterReading>>;
    async fn set_reading_status(
        &self,
        reading_id: Uuid,
        status: ReadingStatus,
    ) -> BillingResult<Option<MeterReading>>;
    /// Persists the meter values, reader, type and notes of `reading`.
    async fn update_reading(&self, reading: &MeterReading) -> BillingResult<Option<MeterReading>>;
    async fn count_readings_by_status(&self, status: ReadingStatus) -> BillingResult<i64>;
    async fn delete_reading(&self, reading_id: Uuid) -> BillingResult<bool>;

    async fn get_bill(&self, bill_id: Uuid) -> BillingResult<Option<Bill>>;
    async fn exists_bill(
        &self,
        room_id: Uuid,
        bill_month: BillMonth,
        kind: BillKind,
    ) -> BillingResult<bool>;
    async fn count_bills_for_room(&self, room_id: Uuid, kind: BillKind) -> BillingResult<i64>;
    async fn find_actual_for_estimated(&self, estimated_bill_id: Uuid)
        -> BillingResult<Option<Bill>>;
    /// Atomically inserts the draft unless a bill of the same kind already
    /// exists for its room and month (or, for actual bills, for its estimated
    /// source). Returns `None` when the insert was refused.
    async fn insert_bill_if_absent(&self, draft: BillDraft) -> BillingResult<Option<Bill>>;
    /// Persists every mutable field of `bill`; `None` when it no longer exists.
    async fn update_bill(&self, bill: &Bill) -> BillingResult<Option<Bill>>;
    async fn list_bills(&self, filter: &BillFilter) -> BillingResult<Vec<Bill>>;
    async fn delete_bill(&self, bill_id: Uuid) -> BillingResult<bool>;
}
