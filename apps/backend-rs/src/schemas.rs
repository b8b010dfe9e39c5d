use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::models::{
    BillFilter, BillKind, BillMonth, BillStatus, BuildingRates, PaymentStatus, ReadingStatus,
    ReadingType, RentalStatus,
};
use crate::services::billing::{BillPatch, ManualActualBill};
use crate::services::readings::{ReadingCorrection, RecordReading};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

pub fn parse_bill_month(raw: &str) -> Result<BillMonth, AppError> {
    raw.trim().parse::<BillMonth>().map_err(AppError::from)
}

pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 1000)
}

/// Largest value a price, reading, usage or fee may carry: the `numeric(10, 2)`
/// ceiling of the rate and reading columns.
pub fn max_input_value() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("non_negative"));
    }
    if *value > max_input_value() {
        return Err(ValidationError::new("too_large"));
    }
    Ok(())
}

fn default_limit_100() -> i64 {
    100
}
fn default_rental_status() -> RentalStatus {
    RentalStatus::Vacant
}
fn default_electricity_threshold() -> Decimal {
    Decimal::from(1000)
}
fn default_water_threshold() -> Decimal {
    Decimal::from(50)
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBuildingInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub landlord_name: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub electricity_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateBuildingRatesInput {
    #[validate(custom(function = "non_negative"))]
    pub electricity_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_unit_price: Option<Decimal>,
}

impl From<UpdateBuildingRatesInput> for BuildingRates {
    fn from(input: UpdateBuildingRatesInput) -> Self {
        Self {
            electricity_unit_price: input.electricity_unit_price,
            water_unit_price: input.water_unit_price,
            hot_water_unit_price: input.hot_water_unit_price,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingPath {
    pub building_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoomInput {
    pub building_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub room_number: String,
    #[validate(custom(function = "non_negative"))]
    pub rent: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub default_deposit: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub electricity_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_unit_price: Option<Decimal>,
    #[serde(default = "default_rental_status")]
    pub rental_status: RentalStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRentalStatusInput {
    pub rental_status: RentalStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomPath {
    pub room_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomsQuery {
    pub building_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMeterReadingInput {
    pub room_id: Uuid,
    pub reading_date: NaiveDate,
    pub reading_time: Option<NaiveDateTime>,
    #[validate(custom(function = "non_negative"))]
    pub electricity_reading: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub water_reading: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_reading: Option<Decimal>,
    #[validate(length(min = 1, max = 100))]
    pub meter_reader: String,
    pub reading_type: Option<ReadingType>,
    pub status: Option<ReadingStatus>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CreateMeterReadingInput> for RecordReading {
    fn from(input: CreateMeterReadingInput) -> Self {
        Self {
            room_id: input.room_id,
            reading_date: input.reading_date,
            reading_time: input.reading_time,
            electricity_reading: input.electricity_reading,
            water_reading: input.water_reading,
            hot_water_reading: input.hot_water_reading,
            meter_reader: input.meter_reader,
            reading_type: input.reading_type,
            status: input.status,
            notes: input.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMeterReadingInput {
    #[validate(custom(function = "non_negative"))]
    pub electricity_reading: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_reading: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_reading: Option<Decimal>,
    #[validate(length(max = 100))]
    pub meter_reader: Option<String>,
    pub reading_type: Option<ReadingType>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<UpdateMeterReadingInput> for ReadingCorrection {
    fn from(input: UpdateMeterReadingInput) -> Self {
        Self {
            electricity_reading: input.electricity_reading,
            water_reading: input.water_reading,
            hot_water_reading: input.hot_water_reading,
            meter_reader: input.meter_reader,
            reading_type: input.reading_type,
            notes: input.notes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadingPath {
    pub reading_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadingRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageStatisticsQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AbnormalReadingsQuery {
    #[serde(default = "default_electricity_threshold")]
    #[validate(custom(function = "non_negative"))]
    pub electricity_threshold: Decimal,
    #[serde(default = "default_water_threshold")]
    #[validate(custom(function = "non_negative"))]
    pub water_threshold: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BuildingOwnerInput {
    #[validate(length(min = 1, max = 255))]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingOwnerPath {
    pub building_id: Uuid,
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateEstimatedBillInput {
    pub room_id: Uuid,
    pub bill_month: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateAllInput {
    pub bill_month: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillPath {
    pub bill_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatedBillPath {
    pub estimated_bill_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillsQuery {
    pub room_id: Option<Uuid>,
    pub bill_month: Option<String>,
    pub status: Option<BillStatus>,
    pub payment_status: Option<PaymentStatus>,
    #[serde(default = "default_limit_100")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl BillsQuery {
    pub fn into_filter(self, kind: BillKind) -> Result<BillFilter, AppError> {
        let bill_month = match self.bill_month.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_bill_month(raw)?),
            _ => None,
        };
        Ok(BillFilter {
            kind: Some(kind),
            room_id: self.room_id,
            bill_month,
            status: self.status,
            payment_status: self.payment_status,
            limit: clamp_limit(self.limit),
            offset: self.offset.max(0),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBillInput {
    #[validate(custom(function = "non_negative"))]
    pub rent: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub deposit: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub electricity_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub electricity_usage: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_usage: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_usage: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub other_fees: Option<Decimal>,
    #[validate(length(max = 500))]
    pub other_fees_description: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<UpdateBillInput> for BillPatch {
    fn from(input: UpdateBillInput) -> Self {
        Self {
            rent: input.rent,
            deposit: input.deposit,
            electricity_unit_price: input.electricity_unit_price,
            electricity_usage: input.electricity_usage,
            water_unit_price: input.water_unit_price,
            water_usage: input.water_usage,
            hot_water_unit_price: input.hot_water_unit_price,
            hot_water_usage: input.hot_water_usage,
            other_fees: input.other_fees,
            other_fees_description: input.other_fees_description,
            notes: input.notes,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateActualBillInput {
    pub room_id: Uuid,
    pub bill_month: String,
    #[validate(custom(function = "non_negative"))]
    pub rent: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub deposit: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub electricity_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub electricity_usage: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub water_usage: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub hot_water_usage: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub other_fees: Option<Decimal>,
    #[validate(length(max = 500))]
    pub other_fees_description: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl CreateActualBillInput {
    pub fn into_manual_bill(self) -> Result<ManualActualBill, AppError> {
        Ok(ManualActualBill {
            room_id: self.room_id,
            bill_month: parse_bill_month(&self.bill_month)?,
            patch: BillPatch {
                rent: self.rent,
                deposit: self.deposit,
                electricity_unit_price: self.electricity_unit_price,
                electricity_usage: self.electricity_usage,
                water_unit_price: self.water_unit_price,
                water_usage: self.water_usage,
                hot_water_unit_price: self.hot_water_unit_price,
                hot_water_usage: self.hot_water_usage,
                other_fees: self.other_fees,
                other_fees_description: self.other_fees_description,
                notes: self.notes,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBillStatusInput {
    pub status: BillStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePaymentInput {
    pub payment_status: PaymentStatus,
    pub payment_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
}
