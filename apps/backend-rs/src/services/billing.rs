use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::billing::assembler::{
    actual_from_estimated, assemble, ensure_billable, price_charges, recompute_amounts,
    BillContext,
};
use crate::billing::deposit::compute_deposit;
use crate::billing::rates::{resolve, RateConfig};
use crate::billing::transitions::check_transition;
use crate::billing::usage::{compute_usage, UtilityUsage};
use crate::billing::{BillingError, BillingResult};
use crate::models::{
    Bill, BillDraft, BillFilter, BillKind, BillMonth, BillStatus, Building, PaymentStatus,
    RentalStatus, Room,
};
use crate::repository::BillingStore;

/// Manual corrections to a bill. `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct BillPatch {
    pub rent: Option<Decimal>,
    pub deposit: Option<Decimal>,
    pub electricity_unit_price: Option<Decimal>,
    pub electricity_usage: Option<Decimal>,
    pub water_unit_price: Option<Decimal>,
    pub water_usage: Option<Decimal>,
    pub hot_water_unit_price: Option<Decimal>,
    pub hot_water_usage: Option<Decimal>,
    pub other_fees: Option<Decimal>,
    pub other_fees_description: Option<String>,
    pub notes: Option<String>,
}

impl BillPatch {
    fn apply(self, bill: &mut Bill) {
        let charges = &mut bill.charges;
        if let Some(rent) = self.rent {
            charges.rent = rent;
        }
        if let Some(deposit) = self.deposit {
            charges.deposit = deposit;
        }
        if let Some(price) = self.electricity_unit_price {
            charges.electricity_unit_price = Some(price);
        }
        if let Some(usage) = self.electricity_usage {
            charges.electricity_usage = usage;
        }
        if let Some(price) = self.water_unit_price {
            charges.water_unit_price = Some(price);
        }
        if let Some(usage) = self.water_usage {
            charges.water_usage = usage;
        }
        if let Some(price) = self.hot_water_unit_price {
            charges.hot_water_unit_price = Some(price);
        }
        if let Some(usage) = self.hot_water_usage {
            charges.hot_water_usage = usage;
        }
        if let Some(fees) = self.other_fees {
            charges.other_fees = fees;
        }
        if let Some(description) = self.other_fees_description {
            charges.other_fees_description = description;
        }
        if let Some(notes) = self.notes {
            bill.notes = Some(notes);
        }
    }
}

/// A hand-entered actual bill. Unset prices fall back to the room's
/// resolved rates, unset rent to the room's rent, everything else to zero.
#[derive(Debug, Clone)]
pub struct ManualActualBill {
    pub room_id: Uuid,
    pub bill_month: BillMonth,
    pub patch: BillPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub bill_month: BillMonth,
    pub generated: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn BillingStore>,
    tz: Tz,
}

impl BillingService {
    pub fn new(store: Arc<dyn BillingStore>, tz: Tz) -> Self {
        Self { store, tz }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    pub fn current_month(&self) -> BillMonth {
        BillMonth::containing(self.today())
    }

    async fn load_room(&self, room_id: Uuid) -> BillingResult<Room> {
        self.store
            .get_room(room_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("Room {room_id} not found.")))
    }

    async fn load_building(&self, room: &Room) -> BillingResult<Building> {
        self.store
            .get_building(room.building_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!(
                    "Building {} for room {} not found.",
                    room.building_id, room.room_number
                ))
            })
    }

    async fn load_bill(&self, bill_id: Uuid, kind: BillKind) -> BillingResult<Bill> {
        match self.store.get_bill(bill_id).await? {
            Some(bill) if bill.kind == kind => Ok(bill),
            _ => Err(BillingError::NotFound(format!(
                "{} bill {bill_id} not found.",
                capitalized(kind)
            ))),
        }
    }

    async fn save(&self, bill: &Bill) -> BillingResult<Bill> {
        self.store
            .update_bill(bill)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("Bill {} not found.", bill.id)))
    }

    async fn insert_new(&self, draft: BillDraft) -> BillingResult<Bill> {
        let room_id = draft.room_id;
        let bill_month = draft.bill_month;
        let kind = draft.kind;
        self.store
            .insert_bill_if_absent(draft)
            .await?
            .ok_or_else(|| duplicate_bill(kind, room_id, bill_month))
    }

    pub async fn generate_estimated_bill(
        &self,
        room_id: Uuid,
        bill_month: BillMonth,
        created_by: Option<String>,
    ) -> BillingResult<Bill> {
        let room = self.load_room(room_id).await?;
        ensure_billable(&room)?;
        if self
            .store
            .exists_bill(room_id, bill_month, BillKind::Estimated)
            .await?
        {
            return Err(duplicate_bill(BillKind::Estimated, room_id, bill_month));
        }
        let building = self.load_building(&room).await?;

        let rates = resolve(&room, &building);
        let usage = compute_usage(self.store.as_ref(), room_id, bill_month).await?;
        let deposit = compute_deposit(self.store.as_ref(), &room).await?;
        let draft = assemble(BillContext {
            kind: BillKind::Estimated,
            room: &room,
            bill_month,
            bill_date: self.today(),
            rates,
            usage,
            deposit,
            other_fees: Decimal::ZERO,
            created_by,
        })?;

        let bill = self.insert_new(draft).await?;
        tracing::info!(
            room_id = %room_id,
            bill_month = %bill_month,
            bill_id = %bill.id,
            kind = bill.kind.as_str(),
            total_amount = %bill.charges.total_amount,
            "Bill generated"
        );
        Ok(bill)
    }

    pub async fn generate_actual_bill_from_estimated(
        &self,
        estimated_bill_id: Uuid,
        created_by: Option<String>,
    ) -> BillingResult<Bill> {
        let estimated = self
            .load_bill(estimated_bill_id, BillKind::Estimated)
            .await?;
        if let Some(existing) = self
            .store
            .find_actual_for_estimated(estimated_bill_id)
            .await?
        {
            return Err(BillingError::Conflict(format!(
                "Estimated bill {estimated_bill_id} already has actual bill {}.",
                existing.id
            )));
        }

        let draft = actual_from_estimated(&estimated, self.today(), created_by);
        let bill = self.insert_new(draft).await?;
        tracing::info!(
            room_id = %bill.room_id,
            bill_month = %bill.bill_month,
            bill_id = %bill.id,
            estimated_bill_id = %estimated_bill_id,
            kind = bill.kind.as_str(),
            "Actual bill created"
        );
        Ok(bill)
    }

    pub async fn create_actual_bill(
        &self,
        input: ManualActualBill,
        created_by: Option<String>,
    ) -> BillingResult<Bill> {
        let room = self.load_room(input.room_id).await?;
        let building = self.load_building(&room).await?;
        let resolved = resolve(&room, &building);
        let patch = input.patch;

        let rates = RateConfig {
            electricity_unit_price: patch
                .electricity_unit_price
                .or(resolved.electricity_unit_price),
            water_unit_price: patch.water_unit_price.or(resolved.water_unit_price),
            hot_water_unit_price: patch.hot_water_unit_price.or(resolved.hot_water_unit_price),
        };
        let usage = UtilityUsage {
            electricity: patch.electricity_usage.unwrap_or(Decimal::ZERO),
            water: patch.water_usage.unwrap_or(Decimal::ZERO),
            hot_water: patch.hot_water_usage.unwrap_or(Decimal::ZERO),
        };
        let mut charges = price_charges(
            patch.rent.unwrap_or(room.rent),
            patch.deposit.unwrap_or(Decimal::ZERO),
            rates,
            usage,
            patch.other_fees.unwrap_or(Decimal::ZERO),
        )?;
        charges.other_fees_description = patch.other_fees_description.unwrap_or_default();

        let draft = BillDraft {
            kind: BillKind::Actual,
            estimated_bill_id: None,
            room_id: room.id,
            bill_month: input.bill_month,
            bill_date: self.today(),
            charges,
            status: BillStatus::Generated,
            payment_status: Some(PaymentStatus::Unpaid),
            payment_date: None,
            payment_method: None,
            notes: patch.notes,
            created_by,
        };
        let bill = self.insert_new(draft).await?;
        tracing::info!(
            room_id = %bill.room_id,
            bill_month = %bill.bill_month,
            bill_id = %bill.id,
            kind = bill.kind.as_str(),
            "Actual bill created"
        );
        Ok(bill)
    }

    /// Re-derives every amount and the total from the bill's usages, prices
    /// and fixed charges.
    pub fn recompute_amounts(mut bill: Bill) -> BillingResult<Bill> {
        recompute_amounts(&mut bill.charges)?;
        Ok(bill)
    }

    pub async fn update_bill(
        &self,
        bill_id: Uuid,
        kind: BillKind,
        patch: BillPatch,
    ) -> BillingResult<Bill> {
        let mut bill = self.load_bill(bill_id, kind).await?;
        patch.apply(&mut bill);
        let bill = Self::recompute_amounts(bill)?;
        self.save(&bill).await
    }

    pub async fn update_status(
        &self,
        bill_id: Uuid,
        kind: BillKind,
        next: BillStatus,
    ) -> BillingResult<Bill> {
        let mut bill = self.load_bill(bill_id, kind).await?;
        check_transition(bill.status, next)?;
        if bill.status == next {
            return Ok(bill);
        }

        let previous = bill.status;
        bill.status = next;
        let bill = self.save(&bill).await?;
        tracing::info!(
            bill_id = %bill.id,
            kind = bill.kind.as_str(),
            from = previous.as_str(),
            to = next.as_str(),
            "Bill status changed"
        );
        Ok(bill)
    }

    /// Records payment on an actual bill. Marking it paid also moves the bill
    /// to `Paid`, which the transition table must allow.
    pub async fn update_payment(
        &self,
        bill_id: Uuid,
        payment_status: PaymentStatus,
        payment_date: Option<NaiveDate>,
        payment_method: Option<String>,
    ) -> BillingResult<Bill> {
        let mut bill = self.load_bill(bill_id, BillKind::Actual).await?;
        if payment_status == PaymentStatus::Paid {
            check_transition(bill.status, BillStatus::Paid)?;
            bill.status = BillStatus::Paid;
        }

        bill.payment_status = Some(payment_status);
        bill.payment_date = match payment_status {
            PaymentStatus::Unpaid => None,
            _ => payment_date.or(bill.payment_date).or(Some(self.today())),
        };
        if payment_method.is_some() {
            bill.payment_method = payment_method;
        }

        let bill = self.save(&bill).await?;
        tracing::info!(
            bill_id = %bill.id,
            payment_status = ?payment_status,
            status = bill.status.as_str(),
            "Bill payment recorded"
        );
        Ok(bill)
    }

    pub async fn get_bill(&self, bill_id: Uuid, kind: BillKind) -> BillingResult<Bill> {
        self.load_bill(bill_id, kind).await
    }

    pub async fn list_bills(&self, filter: &BillFilter) -> BillingResult<Vec<Bill>> {
        self.store.list_bills(filter).await
    }

    pub async fn delete_bill(&self, bill_id: Uuid, kind: BillKind) -> BillingResult<()> {
        self.load_bill(bill_id, kind).await?;
        if !self.store.delete_bill(bill_id).await? {
            return Err(BillingError::NotFound(format!("Bill {bill_id} not found.")));
        }
        tracing::info!(bill_id = %bill_id, kind = kind.as_str(), "Bill deleted");
        Ok(())
    }

    /// Generates the month's estimated bill for every rented room, one room at
    /// a time. A failing room is logged and counted; the batch carries on.
    pub async fn generate_monthly_estimated_bills(
        &self,
        bill_month: BillMonth,
    ) -> BillingResult<BatchSummary> {
        let rooms = self.store.list_rooms_by_status(RentalStatus::Rented).await?;
        tracing::info!(
            bill_month = %bill_month,
            rooms = rooms.len(),
            "Monthly estimated bill run started"
        );
        let summary = self.generate_for_rooms(&rooms, bill_month).await;
        tracing::info!(
            bill_month = %bill_month,
            generated = summary.generated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Monthly estimated bill run finished"
        );
        Ok(summary)
    }

    async fn generate_for_rooms(&self, rooms: &[Room], bill_month: BillMonth) -> BatchSummary {
        let mut summary = BatchSummary {
            bill_month,
            generated: 0,
            skipped: 0,
            failed: 0,
        };

        for room in rooms {
            match self
                .store
                .exists_bill(room.id, bill_month, BillKind::Estimated)
                .await
            {
                Ok(true) => {
                    summary.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(room_id = %room.id, bill_month = %bill_month, error = %error, "Bill check failed");
                    summary.failed += 1;
                    continue;
                }
            }

            match self.generate_estimated_bill(room.id, bill_month, None).await {
                Ok(_) => summary.generated += 1,
                Err(BillingError::Conflict(_)) => summary.skipped += 1,
                Err(error) => {
                    tracing::warn!(
                        room_id = %room.id,
                        room_number = %room.room_number,
                        bill_month = %bill_month,
                        error = %error,
                        "Bill generation failed, continuing with next room"
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

fn capitalized(kind: BillKind) -> &'static str {
    match kind {
        BillKind::Estimated => "Estimated",
        BillKind::Actual => "Actual",
    }
}

fn duplicate_bill(kind: BillKind, room_id: Uuid, bill_month: BillMonth) -> BillingError {
    BillingError::Conflict(format!(
        "An {} bill already exists for room {room_id} in {bill_month}.",
        kind.as_str()
    ))
}
