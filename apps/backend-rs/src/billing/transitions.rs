use super::{BillingError, BillingResult};
use crate::models::BillStatus;

/// States reachable in one step from `from`.
pub fn allowed_next(from: BillStatus) -> &'static [BillStatus] {
    match from {
        BillStatus::Generated => &[BillStatus::Confirmed, BillStatus::Cancelled],
        BillStatus::Confirmed => &[BillStatus::Sent, BillStatus::Paid, BillStatus::Cancelled],
        BillStatus::Sent => &[BillStatus::Paid, BillStatus::Cancelled],
        BillStatus::Paid | BillStatus::Cancelled => &[],
    }
}

/// Validates a status write. Re-writing the current status is accepted as a
/// no-op.
pub fn check_transition(from: BillStatus, to: BillStatus) -> BillingResult<()> {
    if from == to || allowed_next(from).contains(&to) {
        return Ok(());
    }
    Err(BillingError::InvalidState(format!(
        "Bill status cannot change from {} to {}.",
        from.as_str(),
        to.as_str()
    )))
}

#[cfg(test)]
mod tests {
    use super::{allowed_next, check_transition};
    use crate::billing::BillingError;
    use crate::models::BillStatus;

    fn is_terminal(status: BillStatus) -> bool {
        allowed_next(status).is_empty()
    }

    const ALL: [BillStatus; 5] = [
        BillStatus::Generated,
        BillStatus::Confirmed,
        BillStatus::Sent,
        BillStatus::Paid,
        BillStatus::Cancelled,
    ];

    #[test]
    fn happy_path_is_allowed() {
        assert!(check_transition(BillStatus::Generated, BillStatus::Confirmed).is_ok());
        assert!(check_transition(BillStatus::Confirmed, BillStatus::Sent).is_ok());
        assert!(check_transition(BillStatus::Sent, BillStatus::Paid).is_ok());
    }

    #[test]
    fn cancel_reachable_from_every_non_terminal_state() {
        for from in ALL.into_iter().filter(|status| !is_terminal(*status)) {
            assert!(
                check_transition(from, BillStatus::Cancelled).is_ok(),
                "{from:?} should be cancellable"
            );
        }
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(is_terminal(BillStatus::Paid));
        assert!(is_terminal(BillStatus::Cancelled));
        for to in ALL {
            if to != BillStatus::Paid {
                assert!(check_transition(BillStatus::Paid, to).is_err());
            }
            if to != BillStatus::Cancelled {
                assert!(check_transition(BillStatus::Cancelled, to).is_err());
            }
        }
    }

    #[test]
    fn skipping_and_going_back_are_rejected() {
        assert!(matches!(
            check_transition(BillStatus::Generated, BillStatus::Paid),
            Err(BillingError::InvalidState(_))
        ));
        assert!(check_transition(BillStatus::Generated, BillStatus::Sent).is_err());
        assert!(check_transition(BillStatus::Sent, BillStatus::Confirmed).is_err());
        assert!(check_transition(BillStatus::Confirmed, BillStatus::Generated).is_err());
    }

    #[test]
    fn rewriting_same_status_is_a_no_op() {
        for status in ALL {
            assert!(check_transition(status, status).is_ok());
        }
        assert!(!allowed_next(BillStatus::Generated).contains(&BillStatus::Generated));
    }
}
