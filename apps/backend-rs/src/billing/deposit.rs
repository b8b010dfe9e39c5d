use rust_decimal::Decimal;

use super::BillingResult;
use crate::models::{BillKind, Room};
use crate::repository::BillingStore;

/// Deposit owed on a room's first bill: the configured default, or nothing
/// when no positive default is set.
pub fn first_bill_deposit(room: &Room) -> Decimal {
    room.default_deposit
        .filter(|amount| *amount > Decimal::ZERO)
        .unwrap_or(Decimal::ZERO)
}

/// Deposit for a new estimated bill. Charged only while the room has no
/// estimated bill on record, whatever month is being generated.
///
/// Counting and inserting are separate steps, so two first bills generated
/// concurrently for different months can both carry the deposit.
pub async fn compute_deposit(store: &dyn BillingStore, room: &Room) -> BillingResult<Decimal> {
    let existing = store
        .count_bills_for_room(room.id, BillKind::Estimated)
        .await?;
    if existing > 0 {
        tracing::info!(room_id = %room.id, existing, "No deposit charged");
        return Ok(Decimal::ZERO);
    }

    let deposit = first_bill_deposit(room);
    tracing::info!(room_id = %room.id, %deposit, "First bill for room, deposit applies");
    Ok(deposit)
}
