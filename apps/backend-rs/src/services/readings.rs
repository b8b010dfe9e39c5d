use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::billing::usage::{clamped_delta, UtilityUsage};
use crate::billing::{BillingError, BillingResult};
use crate::models::{MeterReading, NewMeterReading, ReadingStatus, ReadingType, Room};
use crate::repository::BillingStore;

/// A reading as submitted; unset fields take their defaults on creation.
#[derive(Debug, Clone)]
pub struct RecordReading {
    pub room_id: Uuid,
    pub reading_date: NaiveDate,
    pub reading_time: Option<NaiveDateTime>,
    pub electricity_reading: Decimal,
    pub water_reading: Decimal,
    pub hot_water_reading: Option<Decimal>,
    pub meter_reader: String,
    pub reading_type: Option<ReadingType>,
    pub status: Option<ReadingStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStatistics {
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub confirmed_readings: usize,
    pub electricity_usage: Decimal,
    pub water_usage: Decimal,
    pub hot_water_usage: Decimal,
}

/// Fields of a reading that may be corrected after it was recorded. `None`
/// leaves the stored value alone; a blank meter reader is ignored.
#[derive(Debug, Clone, Default)]
pub struct ReadingCorrection {
    pub electricity_reading: Option<Decimal>,
    pub water_reading: Option<Decimal>,
    pub hot_water_reading: Option<Decimal>,
    pub meter_reader: Option<String>,
    pub reading_type: Option<ReadingType>,
    pub notes: Option<String>,
}

/// A reading with its raw (unclamped) change from the previous reading of
/// the same room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingDelta {
    #[serde(flatten)]
    pub reading: MeterReading,
    pub electricity_usage: Decimal,
    pub water_usage: Decimal,
    pub hot_water_usage: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingUsageStatistics {
    pub building_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Rooms with at least one confirmed reading in the range.
    pub room_count: usize,
    pub confirmed_readings: usize,
    pub electricity_usage: Decimal,
    pub water_usage: Decimal,
    pub hot_water_usage: Decimal,
}

#[derive(Clone)]
pub struct ReadingService {
    store: Arc<dyn BillingStore>,
}

impl ReadingService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    async fn load_room(&self, room_id: Uuid) -> BillingResult<Room> {
        self.store
            .get_room(room_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("Room {room_id} not found.")))
    }

    pub async fn create_reading(
        &self,
        input: RecordReading,
        created_by: Option<String>,
    ) -> BillingResult<MeterReading> {
        ensure_non_negative([
            Some(input.electricity_reading),
            Some(input.water_reading),
            input.hot_water_reading,
        ])?;
        self.load_room(input.room_id).await?;

        let reading = self
            .store
            .insert_reading(NewMeterReading {
                room_id: input.room_id,
                reading_date: input.reading_date,
                reading_time: input
                    .reading_time
                    .unwrap_or_else(|| Utc::now().naive_utc()),
                electricity_reading: input.electricity_reading,
                water_reading: input.water_reading,
                hot_water_reading: input.hot_water_reading,
                meter_reader: input.meter_reader,
                reading_type: input.reading_type.unwrap_or(ReadingType::Manual),
                status: input.status.unwrap_or(ReadingStatus::Confirmed),
                notes: input.notes,
                created_by,
            })
            .await?;
        tracing::info!(
            room_id = %reading.room_id,
            reading_id = %reading.id,
            reading_date = %reading.reading_date,
            "Meter reading recorded"
        );
        Ok(reading)
    }

    pub async fn get_reading(&self, reading_id: Uuid) -> BillingResult<MeterReading> {
        self.store
            .get_reading(reading_id)
            .await?
            .ok_or_else(|| not_found(reading_id))
    }

    /// Readings for a room, newest first. An open bound covers all history on
    /// that side.
    pub async fn list_room_readings(
        &self,
        room_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> BillingResult<Vec<MeterReading>> {
        self.load_room(room_id).await?;
        let start = start_date.unwrap_or_else(open_start);
        let end = end_date.unwrap_or_else(open_end);
        if start > end {
            return Err(BillingError::Validation(
                "start_date must not be after end_date.".to_string(),
            ));
        }
        self.store.find_readings_in_range(room_id, start, end).await
    }

    pub async fn latest_room_reading(&self, room_id: Uuid) -> BillingResult<MeterReading> {
        self.list_room_readings(room_id, None, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                BillingError::NotFound(format!("Room {room_id} has no meter readings."))
            })
    }

    pub async fn confirm_reading(&self, reading_id: Uuid) -> BillingResult<MeterReading> {
        self.set_status(reading_id, ReadingStatus::Confirmed).await
    }

    pub async fn dispute_reading(&self, reading_id: Uuid) -> BillingResult<MeterReading> {
        self.set_status(reading_id, ReadingStatus::Disputed).await
    }

    async fn set_status(
        &self,
        reading_id: Uuid,
        status: ReadingStatus,
    ) -> BillingResult<MeterReading> {
        let reading = self
            .store
            .set_reading_status(reading_id, status)
            .await?
            .ok_or_else(|| not_found(reading_id))?;
        tracing::info!(reading_id = %reading_id, status = ?status, "Meter reading status changed");
        Ok(reading)
    }

    pub async fn update_reading(
        &self,
        reading_id: Uuid,
        correction: ReadingCorrection,
    ) -> BillingResult<MeterReading> {
        ensure_non_negative([
            correction.electricity_reading,
            correction.water_reading,
            correction.hot_water_reading,
        ])?;
        let mut reading = self.get_reading(reading_id).await?;
        if let Some(value) = correction.electricity_reading {
            reading.electricity_reading = value;
        }
        if let Some(value) = correction.water_reading {
            reading.water_reading = value;
        }
        if let Some(value) = correction.hot_water_reading {
            reading.hot_water_reading = Some(value);
        }
        if let Some(reader) = correction.meter_reader {
            if !reader.trim().is_empty() {
                reading.meter_reader = reader.trim().to_string();
            }
        }
        if let Some(reading_type) = correction.reading_type {
            reading.reading_type = reading_type;
        }
        if let Some(notes) = correction.notes {
            reading.notes = Some(notes);
        }

        let reading = self
            .store
            .update_reading(&reading)
            .await?
            .ok_or_else(|| not_found(reading_id))?;
        tracing::info!(reading_id = %reading_id, "Meter reading updated");
        Ok(reading)
    }

    pub async fn pending_readings_count(&self) -> BillingResult<i64> {
        self.store
            .count_readings_by_status(ReadingStatus::Pending)
            .await
    }

    /// Readings whose change from the room's previous reading exceeds a
    /// threshold or runs backwards, newest first. The first reading of a
    /// room has nothing to compare with and is never abnormal.
    pub async fn abnormal_readings(
        &self,
        room_id: Uuid,
        electricity_threshold: Decimal,
        water_threshold: Decimal,
    ) -> BillingResult<Vec<ReadingDelta>> {
        let mut readings = self.list_room_readings(room_id, None, None).await?;
        readings.reverse();

        let mut abnormal: Vec<ReadingDelta> = readings
            .windows(2)
            .map(|pair| reading_delta(&pair[0], &pair[1]))
            .filter(|delta| {
                delta.electricity_usage > electricity_threshold
                    || delta.water_usage > water_threshold
                    || delta.electricity_usage < Decimal::ZERO
                    || delta.water_usage < Decimal::ZERO
                    || delta.hot_water_usage.is_some_and(|usage| usage < Decimal::ZERO)
            })
            .collect();
        abnormal.reverse();

        if !abnormal.is_empty() {
            tracing::debug!(
                room_id = %room_id,
                abnormal = abnormal.len(),
                "Abnormal meter readings found"
            );
        }
        Ok(abnormal)
    }

    /// Confirmed consumption of every room in a building, summed per room
    /// the same way as [`ReadingService::usage_statistics`].
    pub async fn building_usage_statistics(
        &self,
        building_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> BillingResult<BuildingUsageStatistics> {
        if self.store.get_building(building_id).await?.is_none() {
            return Err(BillingError::NotFound(format!(
                "Building {building_id} not found."
            )));
        }

        let mut totals = BuildingUsageStatistics {
            building_id,
            start_date,
            end_date,
            room_count: 0,
            confirmed_readings: 0,
            electricity_usage: Decimal::ZERO,
            water_usage: Decimal::ZERO,
            hot_water_usage: Decimal::ZERO,
        };
        for room in self.store.list_rooms(Some(building_id)).await? {
            let stats = self.usage_statistics(room.id, start_date, end_date).await?;
            if stats.confirmed_readings == 0 {
                continue;
            }
            totals.room_count += 1;
            totals.confirmed_readings += stats.confirmed_readings;
            totals.electricity_usage += stats.electricity_usage;
            totals.water_usage += stats.water_usage;
            totals.hot_water_usage += stats.hot_water_usage;
        }
        Ok(totals)
    }

    pub async fn delete_reading(&self, reading_id: Uuid) -> BillingResult<()> {
        if !self.store.delete_reading(reading_id).await? {
            return Err(not_found(reading_id));
        }
        tracing::info!(reading_id = %reading_id, "Meter reading deleted");
        Ok(())
    }

    /// Consumption over a date range, summed between consecutive confirmed
    /// readings. Pending and disputed readings are left out here even though
    /// bill generation uses them.
    pub async fn usage_statistics(
        &self,
        room_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> BillingResult<UsageStatistics> {
        let mut readings: Vec<MeterReading> = self
            .list_room_readings(room_id, Some(start_date), Some(end_date))
            .await?
            .into_iter()
            .filter(|reading| reading.status == ReadingStatus::Confirmed)
            .collect();
        readings.reverse();

        let mut total = UtilityUsage::ZERO;
        for pair in readings.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            total.electricity +=
                clamped_delta(current.electricity_reading, previous.electricity_reading);
            total.water += clamped_delta(current.water_reading, previous.water_reading);
            if let (Some(now), Some(before)) =
                (current.hot_water_reading, previous.hot_water_reading)
            {
                total.hot_water += clamped_delta(now, before);
            }
        }

        Ok(UsageStatistics {
            room_id,
            start_date,
            end_date,
            confirmed_readings: readings.len(),
            electricity_usage: total.electricity,
            water_usage: total.water,
            hot_water_usage: total.hot_water,
        })
    }
}

fn reading_delta(previous: &MeterReading, current: &MeterReading) -> ReadingDelta {
    ReadingDelta {
        electricity_usage: current.electricity_reading - previous.electricity_reading,
        water_usage: current.water_reading - previous.water_reading,
        hot_water_usage: current
            .hot_water_reading
            .zip(previous.hot_water_reading)
            .map(|(now, before)| now - before),
        reading: current.clone(),
    }
}

fn ensure_non_negative<const N: usize>(values: [Option<Decimal>; N]) -> BillingResult<()> {
    if values.iter().flatten().any(|value| *value < Decimal::ZERO) {
        return Err(BillingError::Validation(
            "Meter readings cannot be negative.".to_string(),
        ));
    }
    Ok(())
}

fn open_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn open_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn not_found(reading_id: Uuid) -> BillingError {
    BillingError::NotFound(format!("Meter reading {reading_id} not found."))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::{ReadingCorrection, ReadingService, RecordReading};
    use crate::billing::BillingError;
    use crate::models::{ReadingStatus, ReadingType, RentalStatus, Room};
    use crate::repository::MemoryStore;
    use crate::services::billing::fixtures::{seed_building, seed_room};

    async fn setup() -> (ReadingService, Room) {
        let store = Arc::new(MemoryStore::new());
        let building = seed_building(&store).await;
        let room = seed_room(&store, &building, "R101", RentalStatus::Rented).await;
        (ReadingService::new(store), room)
    }

    fn record(room_id: Uuid, date: &str, electricity: Decimal, water: Decimal) -> RecordReading {
        RecordReading {
            room_id,
            reading_date: date.parse().expect("date"),
            reading_time: None,
            electricity_reading: electricity,
            water_reading: water,
            hot_water_reading: None,
            meter_reader: "Li".to_string(),
            reading_type: None,
            status: None,
            notes: None,
        }
    }

    fn date(raw: &str) -> NaiveDate {
        raw.parse().expect("date")
    }

    #[tokio::test]
    async fn creates_reading_with_defaults() {
        let (service, room) = setup().await;
        let reading = service
            .create_reading(record(room.id, "2024-05-31", dec!(210), dec!(35)), None)
            .await
            .expect("reading");
        assert_eq!(reading.status, ReadingStatus::Confirmed);
        assert_eq!(reading.reading_type, ReadingType::Manual);
        assert_eq!(reading.hot_water_reading, None);
    }

    #[tokio::test]
    async fn rejects_duplicate_date_negative_values_and_unknown_room() {
        let (service, room) = setup().await;
        service
            .create_reading(record(room.id, "2024-05-31", dec!(210), dec!(35)), None)
            .await
            .expect("first");

        let duplicate = service
            .create_reading(record(room.id, "2024-05-31", dec!(211), dec!(36)), None)
            .await;
        assert!(matches!(duplicate, Err(BillingError::Conflict(_))));

        let negative = service
            .create_reading(record(room.id, "2024-06-30", dec!(-1), dec!(36)), None)
            .await;
        assert!(matches!(negative, Err(BillingError::Validation(_))));

        let orphan = service
            .create_reading(record(Uuid::new_v4(), "2024-06-30", dec!(1), dec!(1)), None)
            .await;
        assert!(matches!(orphan, Err(BillingError::NotFound(_))));
    }

    #[tokio::test]
    async fn lists_newest_first_and_finds_latest() {
        let (service, room) = setup().await;
        for (day, value) in [("2024-03-31", 100), ("2024-05-31", 300), ("2024-04-30", 200)] {
            service
                .create_reading(record(room.id, day, Decimal::from(value), dec!(1)), None)
                .await
                .expect("reading");
        }

        let all = service
            .list_room_readings(room.id, None, None)
            .await
            .expect("list");
        let dates: Vec<NaiveDate> = all.iter().map(|reading| reading.reading_date).collect();
        assert_eq!(
            dates,
            vec![date("2024-05-31"), date("2024-04-30"), date("2024-03-31")]
        );

        let april_on = service
            .list_room_readings(room.id, Some(date("2024-04-01")), None)
            .await
            .expect("ranged");
        assert_eq!(april_on.len(), 2);

        let latest = service.latest_room_reading(room.id).await.expect("latest");
        assert_eq!(latest.electricity_reading, dec!(300));
    }

    #[tokio::test]
    async fn statistics_sum_confirmed_deltas_only() {
        let (service, room) = setup().await;
        service
            .create_reading(record(room.id, "2024-03-31", dec!(100), dec!(10)), None)
            .await
            .expect("march");
        let disputed = service
            .create_reading(record(room.id, "2024-04-30", dec!(900), dec!(90)), None)
            .await
            .expect("april");
        service
            .create_reading(record(room.id, "2024-05-31", dec!(160), dec!(18)), None)
            .await
            .expect("may");
        service
            .create_reading(record(room.id, "2024-06-30", dec!(150), dec!(20)), None)
            .await
            .expect("june");
        service
            .dispute_reading(disputed.id)
            .await
            .expect("dispute");

        let stats = service
            .usage_statistics(room.id, date("2024-01-01"), date("2024-12-31"))
            .await
            .expect("stats");
        assert_eq!(stats.confirmed_readings, 3);
        assert_eq!(stats.electricity_usage, dec!(60));
        assert_eq!(stats.water_usage, dec!(10));
        assert_eq!(stats.hot_water_usage, Decimal::ZERO);
    }

    #[tokio::test]
    async fn status_changes_and_deletion_report_missing_readings() {
        let (service, room) = setup().await;
        let reading = service
            .create_reading(record(room.id, "2024-05-31", dec!(210), dec!(35)), None)
            .await
            .expect("reading");

        let disputed = service.dispute_reading(reading.id).await.expect("dispute");
        assert_eq!(disputed.status, ReadingStatus::Disputed);
        let confirmed = service.confirm_reading(reading.id).await.expect("confirm");
        assert_eq!(confirmed.status, ReadingStatus::Confirmed);

        service.delete_reading(reading.id).await.expect("delete");
        assert!(matches!(
            service.get_reading(reading.id).await,
            Err(BillingError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_reading(reading.id).await,
            Err(BillingError::NotFound(_))
        ));
        assert!(matches!(
            service.confirm_reading(reading.id).await,
            Err(BillingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn correction_changes_only_given_fields() {
        let (service, room) = setup().await;
        let reading = service
            .create_reading(record(room.id, "2024-05-31", dec!(210), dec!(35)), None)
            .await
            .expect("reading");

        let corrected = service
            .update_reading(
                reading.id,
                ReadingCorrection {
                    electricity_reading: Some(dec!(215)),
                    hot_water_reading: Some(dec!(4)),
                    meter_reader: Some("   ".to_string()),
                    reading_type: Some(ReadingType::Auto),
                    ..ReadingCorrection::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(corrected.electricity_reading, dec!(215));
        assert_eq!(corrected.water_reading, dec!(35));
        assert_eq!(corrected.hot_water_reading, Some(dec!(4)));
        assert_eq!(corrected.meter_reader, "Li");
        assert_eq!(corrected.reading_type, ReadingType::Auto);
        assert_eq!(corrected.reading_date, reading.reading_date);

        let negative = service
            .update_reading(
                reading.id,
                ReadingCorrection {
                    water_reading: Some(dec!(-2)),
                    ..ReadingCorrection::default()
                },
            )
            .await;
        assert!(matches!(negative, Err(BillingError::Validation(_))));
        assert!(matches!(
            service
                .update_reading(Uuid::new_v4(), ReadingCorrection::default())
                .await,
            Err(BillingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn counts_pending_readings() {
        let (service, room) = setup().await;
        for (day, status) in [
            ("2024-03-31", ReadingStatus::Pending),
            ("2024-04-30", ReadingStatus::Confirmed),
            ("2024-05-31", ReadingStatus::Pending),
        ] {
            let mut input = record(room.id, day, dec!(1), dec!(1));
            input.status = Some(status);
            service.create_reading(input, None).await.expect("reading");
        }
        assert_eq!(service.pending_readings_count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn abnormal_readings_flag_spikes_and_backwards_meters() {
        let (service, room) = setup().await;
        for (day, electricity, water) in [
            ("2024-02-29", dec!(100), dec!(10)),
            ("2024-03-31", dec!(200), dec!(20)),
            ("2024-04-30", dec!(1300), dec!(30)),
            ("2024-05-31", dec!(1350), dec!(100)),
            ("2024-06-30", dec!(1340), dec!(110)),
        ] {
            service
                .create_reading(record(room.id, day, electricity, water), None)
                .await
                .expect("reading");
        }

        let abnormal = service
            .abnormal_readings(room.id, dec!(1000), dec!(50))
            .await
            .expect("abnormal");
        let dates: Vec<NaiveDate> = abnormal
            .iter()
            .map(|delta| delta.reading.reading_date)
            .collect();
        assert_eq!(
            dates,
            vec![date("2024-06-30"), date("2024-05-31"), date("2024-04-30")]
        );
        assert_eq!(abnormal[0].electricity_usage, dec!(-10));
        assert_eq!(abnormal[1].water_usage, dec!(70));
        assert_eq!(abnormal[2].electricity_usage, dec!(1100));

        let relaxed = service
            .abnormal_readings(room.id, dec!(2000), dec!(100))
            .await
            .expect("relaxed");
        assert_eq!(relaxed.len(), 1);
    }

    #[tokio::test]
    async fn building_statistics_sum_rooms_with_confirmed_readings() {
        let store = Arc::new(MemoryStore::new());
        let building = seed_building(&store).await;
        let first = seed_room(&store, &building, "R101", RentalStatus::Rented).await;
        let second = seed_room(&store, &building, "R102", RentalStatus::Rented).await;
        seed_room(&store, &building, "R103", RentalStatus::Vacant).await;
        let service = ReadingService::new(store);

        for (room_id, day, electricity, water) in [
            (first.id, "2024-04-30", dec!(100), dec!(10)),
            (first.id, "2024-05-31", dec!(150), dec!(14)),
            (second.id, "2024-04-30", dec!(500), dec!(40)),
            (second.id, "2024-05-31", dec!(530), dec!(41)),
        ] {
            service
                .create_reading(record(room_id, day, electricity, water), None)
                .await
                .expect("reading");
        }

        let stats = service
            .building_usage_statistics(building.id, date("2024-01-01"), date("2024-12-31"))
            .await
            .expect("stats");
        assert_eq!(stats.room_count, 2);
        assert_eq!(stats.confirmed_readings, 4);
        assert_eq!(stats.electricity_usage, dec!(80));
        assert_eq!(stats.water_usage, dec!(5));
        assert_eq!(stats.hot_water_usage, Decimal::ZERO);

        assert!(matches!(
            service
                .building_usage_statistics(Uuid::new_v4(), date("2024-01-01"), date("2024-12-31"))
                .await,
            Err(BillingError::NotFound(_))
        ));
    }
}
