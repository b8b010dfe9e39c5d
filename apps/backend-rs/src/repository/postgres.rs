use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::BillingStore;
use crate::billing::{BillingError, BillingResult};
use crate::models::{
    Bill, BillDraft, BillFilter, BillKind, BillMonth, Building, BuildingRates, MeterReading,
    NewBuilding, NewMeterReading, NewRoom, ReadingStatus, RentalStatus, Room,
};

const BUILDING_COLUMNS: &str = "id, name, landlord_name, electricity_unit_price, \
    water_unit_price, hot_water_unit_price, created_by, created_at, updated_at";

const ROOM_COLUMNS: &str = "id, building_id, room_number, rent, default_deposit, \
    electricity_unit_price, water_unit_price, hot_water_unit_price, rental_status, \
    created_by, created_at, updated_at";

const READING_COLUMNS: &str = "id, room_id, reading_date, reading_time, electricity_reading, \
    water_reading, hot_water_reading, meter_reader, reading_type, status, notes, created_by, \
    created_at";

const BILL_COLUMNS: &str = "id, kind, estimated_bill_id, room_id, bill_month, bill_date, rent, \
    deposit, electricity_unit_price, electricity_usage, electricity_amount, water_unit_price, \
    water_usage, water_amount, hot_water_unit_price, hot_water_usage, hot_water_amount, \
    other_fees, other_fees_description, total_amount, status, payment_status, payment_date, \
    payment_method, notes, created_by, created_at, updated_at";

/// Postgres-backed store. Building lookups are cached because every bill
/// generation resolves its room's building rates.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    buildings: Cache<Uuid, Building>,
}

impl PgStore {
    pub fn new(pool: PgPool, cache_ttl: Duration, cache_max_entries: u64) -> Self {
        Self {
            pool,
            buildings: Cache::builder()
                .max_capacity(cache_max_entries)
                .time_to_live(cache_ttl)
                .build(),
        }
    }
}

fn map_db_error(error: sqlx::Error) -> BillingError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.code().as_deref() == Some("23505") {
            tracing::warn!(db_error = %db_error, "Unique constraint rejected write");
            return BillingError::Conflict(
                "Duplicate value violates a unique constraint.".to_string(),
            );
        }
        if db_error.code().as_deref() == Some("23503") {
            return BillingError::NotFound("Referenced record not found.".to_string());
        }
        if db_error.code().as_deref() == Some("22003") {
            return BillingError::Validation(
                "Amount exceeds the stored numeric range.".to_string(),
            );
        }
    }
    tracing::error!(db_error = %error, "Database query failed");
    BillingError::Storage("Database operation failed.".to_string())
}

#[async_trait]
impl BillingStore for PgStore {
    async fn get_building(&self, building_id: Uuid) -> BillingResult<Option<Building>> {
        if let Some(cached) = self.buildings.get(&building_id).await {
            return Ok(Some(cached));
        }
        let building = sqlx::query_as::<_, Building>(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings WHERE id = $1"
        ))
        .bind(building_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        if let Some(found) = &building {
            self.buildings.insert(building_id, found.clone()).await;
        }
        Ok(building)
    }

    async fn list_buildings(&self) -> BillingResult<Vec<Building>> {
        sqlx::query_as::<_, Building>(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings ORDER BY name LIMIT 1000"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn insert_building(&self, building: NewBuilding) -> BillingResult<Building> {
        sqlx::query_as::<_, Building>(&format!(
            "INSERT INTO buildings (name, landlord_name, electricity_unit_price, water_unit_price,
                 hot_water_unit_price, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {BUILDING_COLUMNS}"
        ))
        .bind(&building.name)
        .bind(&building.landlord_name)
        .bind(building.electricity_unit_price)
        .bind(building.water_unit_price)
        .bind(building.hot_water_unit_price)
        .bind(&building.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update_building_rates(
        &self,
        building_id: Uuid,
        rates: BuildingRates,
    ) -> BillingResult<Option<Building>> {
        let updated = sqlx::query_as::<_, Building>(&format!(
            "UPDATE buildings
             SET electricity_unit_price = $2, water_unit_price = $3, hot_water_unit_price = $4,
                 updated_at = now()
             WHERE id = $1
             RETURNING {BUILDING_COLUMNS}"
        ))
        .bind(building_id)
        .bind(rates.electricity_unit_price)
        .bind(rates.water_unit_price)
        .bind(rates.hot_water_unit_price)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.buildings.invalidate(&building_id).await;
        Ok(updated)
    }

    async fn get_room(&self, room_id: Uuid) -> BillingResult<Option<Room>> {
        sqlx::query_as::<_, Room>(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_rooms(&self, building_id: Option<Uuid>) -> BillingResult<Vec<Room>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {ROOM_COLUMNS} FROM rooms"));
        if let Some(building_id) = building_id {
            query.push(" WHERE building_id = ").push_bind(building_id);
        }
        query.push(" ORDER BY building_id, room_number LIMIT 1000");
        query
            .build_query_as::<Room>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_rooms_by_status(&self, status: RentalStatus) -> BillingResult<Vec<Room>> {
        sqlx::query_as::<_, Room>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE rental_status = $1
             ORDER BY building_id, room_number"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn insert_room(&self, room: NewRoom) -> BillingResult<Room> {
        sqlx::query_as::<_, Room>(&format!(
            "INSERT INTO rooms (building_id, room_number, rent, default_deposit,
                 electricity_unit_price, water_unit_price, hot_water_unit_price, rental_status,
                 created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ROOM_COLUMNS}"
        ))
        .bind(room.building_id)
        .bind(&room.room_number)
        .bind(room.rent)
        .bind(room.default_deposit)
        .bind(room.electricity_unit_price)
        .bind(room.water_unit_price)
        .bind(room.hot_water_unit_price)
        .bind(room.rental_status)
        .bind(&room.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn set_room_rental_status(
        &self,
        room_id: Uuid,
        status: RentalStatus,
    ) -> BillingResult<Option<Room>> {
        sqlx::query_as::<_, Room>(&format!(
            "UPDATE rooms SET rental_status = $2, updated_at = now()
             WHERE id = $1
             RETURNING {ROOM_COLUMNS}"
        ))
        .bind(room_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn assign_building_owner(
        &self,
        building_id: Uuid,
        user_id: &str,
    ) -> BillingResult<bool> {
        let result = sqlx::query(
            "INSERT INTO building_owners (building_id, user_id) VALUES ($1, $2)
             ON CONFLICT (building_id, user_id) DO NOTHING",
        )
        .bind(building_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_building_owner(
        &self,
        building_id: Uuid,
        user_id: &str,
    ) -> BillingResult<bool> {
        let result =
            sqlx::query("DELETE FROM building_owners WHERE building_id = $1 AND user_id = $2")
                .bind(building_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_building_owner(&self, building_id: Uuid, user_id: &str) -> BillingResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM building_owners WHERE building_id = $1 AND user_id = $2
             )",
        )
        .bind(building_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn list_owned_buildings(&self, user_id: &str) -> BillingResult<Vec<Building>> {
        sqlx::query_as::<_, Building>(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings
             WHERE id IN (SELECT building_id FROM building_owners WHERE user_id = $1)
             ORDER BY name"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn insert_reading(&self, reading: NewMeterReading) -> BillingResult<MeterReading> {
        sqlx::query_as::<_, MeterReading>(&format!(
            "INSERT INTO meter_readings (room_id, reading_date, reading_time, electricity_reading,
                 water_reading, hot_water_reading, meter_reader, reading_type, status, notes,
                 created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {READING_COLUMNS}"
        ))
        .bind(reading.room_id)
        .bind(reading.reading_date)
        .bind(reading.reading_time)
        .bind(reading.electricity_reading)
        .bind(reading.water_reading)
        .bind(reading.hot_water_reading)
        .bind(&reading.meter_reader)
        .bind(reading.reading_type)
        .bind(reading.status)
        .bind(&reading.notes)
        .bind(&reading.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| match map_db_error(error) {
            BillingError::Conflict(_) => BillingError::Conflict(format!(
                "Room already has a meter reading on {}.",
                reading.reading_date
            )),
            other => other,
        })
    }

    async fn get_reading(&self, reading_id: Uuid) -> BillingResult<Option<MeterReading>> {
        sqlx::query_as::<_, MeterReading>(&format!(
            "SELECT {READING_COLUMNS} FROM meter_readings WHERE id = $1"
        ))
        .bind(reading_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_readings_in_range(
        &self,
        room_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BillingResult<Vec<MeterReading>> {
        sqlx::query_as::<_, MeterReading>(&format!(
            "SELECT {READING_COLUMNS} FROM meter_readings
             WHERE room_id = $1 AND reading_date BETWEEN $2 AND $3
             ORDER BY reading_date DESC, reading_time DESC"
        ))
        .bind(room_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn set_reading_status(
        &self,
        reading_id: Uuid,
        status: ReadingStatus,
    ) -> BillingResult<Option<MeterReading>> {
        sqlx::query_as::<_, MeterReading>(&format!(
            "UPDATE meter_readings SET status = $2 WHERE id = $1 RETURNING {READING_COLUMNS}"
        ))
        .bind(reading_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update_reading(&self, reading: &MeterReading) -> BillingResult<Option<MeterReading>> {
        sqlx::query_as::<_, MeterReading>(&format!(
            "UPDATE meter_readings
             SET electricity_reading = $2, water_reading = $3, hot_water_reading = $4,
                 meter_reader = $5, reading_type = $6, notes = $7
             WHERE id = $1
             RETURNING {READING_COLUMNS}"
        ))
        .bind(reading.id)
        .bind(reading.electricity_reading)
        .bind(reading.water_reading)
        .bind(reading.hot_water_reading)
        .bind(&reading.meter_reader)
        .bind(reading.reading_type)
        .bind(&reading.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn count_readings_by_status(&self, status: ReadingStatus) -> BillingResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*)::bigint FROM meter_readings WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn delete_reading(&self, reading_id: Uuid) -> BillingResult<bool> {
        let result = sqlx::query("DELETE FROM meter_readings WHERE id = $1")
            .bind(reading_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_bill(&self, bill_id: Uuid) -> BillingResult<Option<Bill>> {
        sqlx::query_as::<_, Bill>(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"))
            .bind(bill_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn exists_bill(
        &self,
        room_id: Uuid,
        bill_month: BillMonth,
        kind: BillKind,
    ) -> BillingResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM bills WHERE room_id = $1 AND bill_month = $2 AND kind = $3
             )",
        )
        .bind(room_id)
        .bind(bill_month.to_string())
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn count_bills_for_room(&self, room_id: Uuid, kind: BillKind) -> BillingResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::bigint FROM bills WHERE room_id = $1 AND kind = $2",
        )
        .bind(room_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_actual_for_estimated(
        &self,
        estimated_bill_id: Uuid,
    ) -> BillingResult<Option<Bill>> {
        sqlx::query_as::<_, Bill>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE estimated_bill_id = $1 LIMIT 1"
        ))
        .bind(estimated_bill_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn insert_bill_if_absent(&self, draft: BillDraft) -> BillingResult<Option<Bill>> {
        let charges = &draft.charges;
        sqlx::query_as::<_, Bill>(&format!(
            "INSERT INTO bills (kind, estimated_bill_id, room_id, bill_month, bill_date, rent,
                 deposit, electricity_unit_price, electricity_usage, electricity_amount,
                 water_unit_price, water_usage, water_amount, hot_water_unit_price,
                 hot_water_usage, hot_water_amount, other_fees, other_fees_description,
                 total_amount, status, payment_status, payment_date, payment_method, notes,
                 created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                 $18, $19, $20, $21, $22, $23, $24, $25)
             ON CONFLICT DO NOTHING
             RETURNING {BILL_COLUMNS}"
        ))
        .bind(draft.kind)
        .bind(draft.estimated_bill_id)
        .bind(draft.room_id)
        .bind(draft.bill_month.to_string())
        .bind(draft.bill_date)
        .bind(charges.rent)
        .bind(charges.deposit)
        .bind(charges.electricity_unit_price)
        .bind(charges.electricity_usage)
        .bind(charges.electricity_amount)
        .bind(charges.water_unit_price)
        .bind(charges.water_usage)
        .bind(charges.water_amount)
        .bind(charges.hot_water_unit_price)
        .bind(charges.hot_water_usage)
        .bind(charges.hot_water_amount)
        .bind(charges.other_fees)
        .bind(&charges.other_fees_description)
        .bind(charges.total_amount)
        .bind(draft.status)
        .bind(draft.payment_status)
        .bind(draft.payment_date)
        .bind(&draft.payment_method)
        .bind(&draft.notes)
        .bind(&draft.created_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update_bill(&self, bill: &Bill) -> BillingResult<Option<Bill>> {
        let charges = &bill.charges;
        sqlx::query_as::<_, Bill>(&format!(
            "UPDATE bills SET
                 bill_date = $2, rent = $3, deposit = $4, electricity_unit_price = $5,
                 electricity_usage = $6, electricity_amount = $7, water_unit_price = $8,
                 water_usage = $9, water_amount = $10, hot_water_unit_price = $11,
                 hot_water_usage = $12, hot_water_amount = $13, other_fees = $14,
                 other_fees_description = $15, total_amount = $16, status = $17,
                 payment_status = $18, payment_date = $19, payment_method = $20, notes = $21,
                 updated_at = now()
             WHERE id = $1
             RETURNING {BILL_COLUMNS}"
        ))
        .bind(bill.id)
        .bind(bill.bill_date)
        .bind(charges.rent)
        .bind(charges.deposit)
        .bind(charges.electricity_unit_price)
        .bind(charges.electricity_usage)
        .bind(charges.electricity_amount)
        .bind(charges.water_unit_price)
        .bind(charges.water_usage)
        .bind(charges.water_amount)
        .bind(charges.hot_water_unit_price)
        .bind(charges.hot_water_usage)
        .bind(charges.hot_water_amount)
        .bind(charges.other_fees)
        .bind(&charges.other_fees_description)
        .bind(charges.total_amount)
        .bind(bill.status)
        .bind(bill.payment_status)
        .bind(bill.payment_date)
        .bind(&bill.payment_method)
        .bind(&bill.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn list_bills(&self, filter: &BillFilter) -> BillingResult<Vec<Bill>> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {BILL_COLUMNS} FROM bills WHERE 1=1"));
        if let Some(kind) = filter.kind {
            query.push(" AND kind = ").push_bind(kind);
        }
        if let Some(room_id) = filter.room_id {
            query.push(" AND room_id = ").push_bind(room_id);
        }
        if let Some(bill_month) = filter.bill_month {
            query.push(" AND bill_month = ").push_bind(bill_month.to_string());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(payment_status) = filter.payment_status {
            query.push(" AND payment_status = ").push_bind(payment_status);
        }
        query
            .push(" ORDER BY bill_month DESC, room_id ASC LIMIT ")
            .push_bind(filter.limit.clamp(1, 1000))
            .push(" OFFSET ")
            .push_bind(filter.offset.max(0));

        query
            .build_query_as::<Bill>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn delete_bill(&self, bill_id: Uuid) -> BillingResult<bool> {
        let result = sqlx::query("DELETE FROM bills WHERE id = $1")
            .bind(bill_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
