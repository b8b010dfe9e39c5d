use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::amounts::{compute_amount, round_money};
use super::rates::RateConfig;
use super::usage::UtilityUsage;
use super::{BillingError, BillingResult};
use crate::models::{
    Bill, BillCharges, BillDraft, BillKind, BillMonth, BillStatus, PaymentStatus, RentalStatus,
    Room,
};

/// Everything the assembler needs to price one room for one month.
#[derive(Debug, Clone)]
pub struct BillContext<'a> {
    pub kind: BillKind,
    pub room: &'a Room,
    pub bill_month: BillMonth,
    pub bill_date: NaiveDate,
    pub rates: RateConfig,
    pub usage: UtilityUsage,
    pub deposit: Decimal,
    pub other_fees: Decimal,
    pub created_by: Option<String>,
}

/// Only tenanted rooms can be billed.
pub fn ensure_billable(room: &Room) -> BillingResult<()> {
    if room.rental_status == RentalStatus::Rented {
        return Ok(());
    }
    Err(BillingError::InvalidState(format!(
        "Room {} is {} and cannot be billed; only rented rooms receive bills.",
        room.room_number,
        room.rental_status.as_str()
    )))
}

/// Sum of every charge line, rounded to cents.
pub fn total_of(charges: &BillCharges) -> BillingResult<Decimal> {
    [
        charges.deposit,
        charges.electricity_amount,
        charges.water_amount,
        charges.hot_water_amount,
        charges.other_fees,
    ]
    .into_iter()
    .try_fold(charges.rent, |sum, line| sum.checked_add(line))
    .map(round_money)
    .ok_or_else(|| BillingError::Validation("Bill total is too large.".to_string()))
}

/// Re-derives the three utility amounts from usage and unit price, then the
/// total. Run after any manual edit so the total always matches its lines.
pub fn recompute_amounts(charges: &mut BillCharges) -> BillingResult<()> {
    charges.rent = round_money(charges.rent);
    charges.deposit = round_money(charges.deposit);
    charges.other_fees = round_money(charges.other_fees);
    charges.electricity_amount =
        compute_amount(charges.electricity_usage, charges.electricity_unit_price)?;
    charges.water_amount = compute_amount(charges.water_usage, charges.water_unit_price)?;
    charges.hot_water_amount =
        compute_amount(charges.hot_water_usage, charges.hot_water_unit_price)?;
    charges.total_amount = total_of(charges)?;
    Ok(())
}

/// Builds fully priced charges from resolved rates and usage.
pub fn price_charges(
    rent: Decimal,
    deposit: Decimal,
    rates: RateConfig,
    usage: UtilityUsage,
    other_fees: Decimal,
) -> BillingResult<BillCharges> {
    let mut charges = BillCharges {
        rent,
        deposit,
        electricity_unit_price: rates.electricity_unit_price,
        electricity_usage: usage.electricity,
        electricity_amount: Decimal::ZERO,
        water_unit_price: rates.water_unit_price,
        water_usage: usage.water,
        water_amount: Decimal::ZERO,
        hot_water_unit_price: rates.hot_water_unit_price,
        hot_water_usage: usage.hot_water,
        hot_water_amount: Decimal::ZERO,
        other_fees,
        other_fees_description: String::new(),
        total_amount: Decimal::ZERO,
    };
    recompute_amounts(&mut charges)?;
    Ok(charges)
}

/// Produces a freshly generated bill: rent copied from the room with no
/// proration, amounts priced, total summed.
pub fn assemble(context: BillContext<'_>) -> BillingResult<BillDraft> {
    let charges = price_charges(
        context.room.rent,
        context.deposit,
        context.rates,
        context.usage,
        context.other_fees,
    )?;
    let payment_status = match context.kind {
        BillKind::Estimated => None,
        BillKind::Actual => Some(PaymentStatus::Unpaid),
    };

    Ok(BillDraft {
        kind: context.kind,
        estimated_bill_id: None,
        room_id: context.room.id,
        bill_month: context.bill_month,
        bill_date: context.bill_date,
        charges,
        status: BillStatus::Generated,
        payment_status,
        payment_date: None,
        payment_method: None,
        notes: None,
        created_by: context.created_by,
    })
}

/// An actual bill mirroring an estimated one. Charges, deposit included, are
/// copied as they are; nothing is re-priced.
pub fn actual_from_estimated(
    estimated: &Bill,
    bill_date: NaiveDate,
    created_by: Option<String>,
) -> BillDraft {
    BillDraft {
        kind: BillKind::Actual,
        estimated_bill_id: Some(estimated.id),
        room_id: estimated.room_id,
        bill_month: estimated.bill_month,
        bill_date,
        charges: estimated.charges.clone(),
        status: BillStatus::Generated,
        payment_status: Some(PaymentStatus::Unpaid),
        payment_date: None,
        payment_method: None,
        notes: estimated.notes.clone(),
        created_by,
    }
}
