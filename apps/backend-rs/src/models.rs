use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::billing::BillingError;

/// A calendar month in `YYYY-MM` form, the unit bills are issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillMonth {
    first_day: NaiveDate,
}

impl BillMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, BillingError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| BillingError::Validation(format!("Invalid bill month {year}-{month:02}.")))
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day.pred_opt().unwrap_or(self.first_day)
    }

    pub fn previous(&self) -> Self {
        Self {
            first_day: self
                .first_day
                .checked_sub_months(Months::new(1))
                .unwrap_or(self.first_day),
        }
    }

    fn next(&self) -> Self {
        Self {
            first_day: self
                .first_day
                .checked_add_months(Months::new(1))
                .unwrap_or(self.first_day),
        }
    }
}

impl fmt::Display for BillMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.first_day.year(), self.first_day.month())
    }
}

impl FromStr for BillMonth {
    type Err = BillingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || BillingError::Validation(format!("Bill month '{raw}' must use YYYY-MM."));
        let value = raw.trim();
        let (year, month) = value.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.chars().chain(month.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for BillMonth {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillMonth> for String {
    fn from(value: BillMonth) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rental_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Vacant,
    Rented,
    Maintenance,
    Reserved,
}

impl RentalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vacant => "vacant",
            Self::Rented => "rented",
            Self::Maintenance => "maintenance",
            Self::Reserved => "reserved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reading_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    Pending,
    Confirmed,
    Disputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reading_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReadingType {
    Manual,
    Auto,
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bill_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillKind {
    Estimated,
    Actual,
}

impl BillKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Estimated => "estimated",
            Self::Actual => "actual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bill_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Generated,
    Confirmed,
    Sent,
    Paid,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Confirmed => "confirmed",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Building {
    pub id: Uuid,
    pub name: String,
    pub landlord_name: Option<String>,
    pub electricity_unit_price: Option<Decimal>,
    pub water_unit_price: Option<Decimal>,
    pub hot_water_unit_price: Option<Decimal>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub building_id: Uuid,
    pub room_number: String,
    pub rent: Decimal,
    pub default_deposit: Option<Decimal>,
    pub electricity_unit_price: Option<Decimal>,
    pub water_unit_price: Option<Decimal>,
    pub hot_water_unit_price: Option<Decimal>,
    pub rental_status: RentalStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MeterReading {
    pub id: Uuid,
    pub room_id: Uuid,
    pub reading_date: NaiveDate,
    pub reading_time: NaiveDateTime,
    pub electricity_reading: Decimal,
    pub water_reading: Decimal,
    pub hot_water_reading: Option<Decimal>,
    pub meter_reader: String,
    pub reading_type: ReadingType,
    pub status: ReadingStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Every monetary line of a bill. `total_amount` is always the sum of
/// rent, deposit, the three utility amounts and other fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BillCharges {
    pub rent: Decimal,
    pub deposit: Decimal,
    pub electricity_unit_price: Option<Decimal>,
    pub electricity_usage: Decimal,
    pub electricity_amount: Decimal,
    pub water_unit_price: Option<Decimal>,
    pub water_usage: Decimal,
    pub water_amount: Decimal,
    pub hot_water_unit_price: Option<Decimal>,
    pub hot_water_usage: Decimal,
    pub hot_water_amount: Decimal,
    pub other_fees: Decimal,
    pub other_fees_description: String,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub kind: BillKind,
    pub estimated_bill_id: Option<Uuid>,
    pub room_id: Uuid,
    #[sqlx(try_from = "String")]
    pub bill_month: BillMonth,
    pub bill_date: NaiveDate,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub charges: BillCharges,
    pub status: BillStatus,
    pub payment_status: Option<PaymentStatus>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bill ready to be persisted; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct BillDraft {
    pub kind: BillKind,
    pub estimated_bill_id: Option<Uuid>,
    pub room_id: Uuid,
    pub bill_month: BillMonth,
    pub bill_date: NaiveDate,
    pub charges: BillCharges,
    pub status: BillStatus,
    pub payment_status: Option<PaymentStatus>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBuilding {
    pub name: String,
    pub landlord_name: Option<String>,
    pub electricity_unit_price: Option<Decimal>,
    pub water_unit_price: Option<Decimal>,
    pub hot_water_unit_price: Option<Decimal>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BuildingRates {
    pub electricity_unit_price: Option<Decimal>,
    pub water_unit_price: Option<Decimal>,
    pub hot_water_unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRoom {
    pub building_id: Uuid,
    pub room_number: String,
    pub rent: Decimal,
    pub default_deposit: Option<Decimal>,
    pub electricity_unit_price: Option<Decimal>,
    pub water_unit_price: Option<Decimal>,
    pub hot_water_unit_price: Option<Decimal>,
    pub rental_status: RentalStatus,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeterReading {
    pub room_id: Uuid,
    pub reading_date: NaiveDate,
    pub reading_time: NaiveDateTime,
    pub electricity_reading: Decimal,
    pub water_reading: Decimal,
    pub hot_water_reading: Option<Decimal>,
    pub meter_reader: String,
    pub reading_type: ReadingType,
    pub status: ReadingStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillFilter {
    pub kind: Option<BillKind>,
    pub room_id: Option<Uuid>,
    pub bill_month: Option<BillMonth>,
    pub status: Option<BillStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub limit: i64,
    pub offset: i64,
}
