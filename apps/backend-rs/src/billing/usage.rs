use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::BillingResult;
use crate::models::{BillMonth, MeterReading};
use crate::repository::BillingStore;

/// Consumption for one bill period, never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UtilityUsage {
    pub electricity: Decimal,
    pub water: Decimal,
    pub hot_water: Decimal,
}

impl UtilityUsage {
    pub const ZERO: Self = Self {
        electricity: Decimal::ZERO,
        water: Decimal::ZERO,
        hot_water: Decimal::ZERO,
    };
}

/// Delta between two cumulative meter values, floored at zero so a meter reset
/// or a mistyped reading never produces a credit.
pub fn clamped_delta(current: Decimal, previous: Decimal) -> Decimal {
    (current - previous).max(Decimal::ZERO)
}

/// Usage between the latest reading of the bill month and the latest reading
/// of the month before. Either side missing means nothing can be billed.
pub fn usage_between(
    current: Option<&MeterReading>,
    previous: Option<&MeterReading>,
) -> UtilityUsage {
    let (Some(current), Some(previous)) = (current, previous) else {
        return UtilityUsage::ZERO;
    };

    let hot_water = match (current.hot_water_reading, previous.hot_water_reading) {
        (Some(now), Some(before)) => clamped_delta(now, before),
        _ => Decimal::ZERO,
    };

    UtilityUsage {
        electricity: clamped_delta(current.electricity_reading, previous.electricity_reading),
        water: clamped_delta(current.water_reading, previous.water_reading),
        hot_water,
    }
}

/// Unclamped hot-water delta; `None` unless both readings carry a value.
fn raw_hot_water_delta(current: &MeterReading, previous: &MeterReading) -> Option<Decimal> {
    match (current.hot_water_reading, previous.hot_water_reading) {
        (Some(now), Some(before)) => Some(now - before),
        _ => None,
    }
}

fn has_negative_delta(electricity: Decimal, water: Decimal, hot_water: Option<Decimal>) -> bool {
    electricity < Decimal::ZERO
        || water < Decimal::ZERO
        || hot_water.is_some_and(|delta| delta < Decimal::ZERO)
}

/// Looks up the latest reading of `bill_month` and of the preceding month and
/// derives the usage between them. Reading status is not consulted.
pub async fn compute_usage(
    store: &dyn BillingStore,
    room_id: Uuid,
    bill_month: BillMonth,
) -> BillingResult<UtilityUsage> {
    let current = store
        .find_readings_in_range(room_id, bill_month.first_day(), bill_month.last_day())
        .await?
        .into_iter()
        .next();
    let Some(current) = current else {
        tracing::info!(
            %room_id,
            %bill_month,
            reason = "no_current_reading",
            "Utility usage defaulted to zero"
        );
        return Ok(UtilityUsage::ZERO);
    };

    let previous_month = bill_month.previous();
    let previous = store
        .find_readings_in_range(
            room_id,
            previous_month.first_day(),
            previous_month.last_day(),
        )
        .await?
        .into_iter()
        .next();
    let Some(previous) = previous else {
        tracing::info!(
            %room_id,
            %bill_month,
            reason = "no_previous_reading",
            "Utility usage defaulted to zero"
        );
        return Ok(UtilityUsage::ZERO);
    };

    let usage = usage_between(Some(&current), Some(&previous));
    let raw_electricity = current.electricity_reading - previous.electricity_reading;
    let raw_water = current.water_reading - previous.water_reading;
    let raw_hot_water = raw_hot_water_delta(&current, &previous);
    if has_negative_delta(raw_electricity, raw_water, raw_hot_water) {
        tracing::warn!(
            %room_id,
            %bill_month,
            %raw_electricity,
            %raw_water,
            raw_hot_water = ?raw_hot_water,
            "Negative meter delta clamped to zero"
        );
    }
    tracing::info!(
        %room_id,
        %bill_month,
        electricity = %usage.electricity,
        water = %usage.water,
        hot_water = %usage.hot_water,
        "Utility usage computed"
    );
    Ok(usage)
}
