use rust_decimal::{Decimal, RoundingStrategy};

use super::{BillingError, BillingResult};

/// Monetary values carry two decimal places.
pub const MONEY_SCALE: u32 = 2;

/// Round half-up to cents. Billing values are never negative, so away-from-zero
/// on the midpoint is half-up.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `usage * unit_price` rounded to cents; an unpriced utility costs nothing.
/// A product outside the decimal range is a validation failure, never a panic.
pub fn compute_amount(usage: Decimal, unit_price: Option<Decimal>) -> BillingResult<Decimal> {
    let Some(price) = unit_price else {
        return Ok(Decimal::ZERO);
    };
    usage
        .checked_mul(price)
        .map(round_money)
        .ok_or_else(|| out_of_range(usage, price))
}

fn out_of_range(usage: Decimal, price: Decimal) -> BillingError {
    BillingError::Validation(format!(
        "Amount for usage {usage} at unit price {price} is too large."
    ))
}
