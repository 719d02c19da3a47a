//! Patron limit checks for checkout, request and extend.
//!
//! Limits are overridable with `override_blocking`. Patron blocks, the policy
//! flags and the extend denials that protect other patrons are not.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{CirculationError, CirculationResult, DenialReason},
    models::{
        enums::LoanState,
        loan::Loan,
        patron::{Patron, PatronLimits},
        policy::CirculationPolicy,
    },
};

/// Counters a patron's limits are checked against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatronActivity {
    /// Items currently on loan
    pub checkouts: usize,
    /// Items on loan that were checked out at the transaction library
    pub library_checkouts: usize,
    pub overdue: usize,
    pub unpaid_fees: Decimal,
}

impl PatronActivity {
    /// Compute the counters from the patron's loans
    pub fn from_loans(
        loans: &[Loan],
        library_id: i32,
        at: DateTime<Utc>,
        unpaid_fees: Decimal,
    ) -> Self {
        let on_loan: Vec<&Loan> = loans
            .iter()
            .filter(|l| l.state == LoanState::ItemOnLoan)
            .collect();
        Self {
            checkouts: on_loan.len(),
            library_checkouts: on_loan
                .iter()
                .filter(|l| l.checkout_library_id == Some(library_id))
                .count(),
            overdue: on_loan.iter().filter(|l| l.is_overdue(at)).count(),
            unpaid_fees,
        }
    }
}

/// Everything the extend check needs to know about the loan
#[derive(Debug, Clone, Copy)]
pub struct ExtendCandidate<'a> {
    pub loan: &'a Loan,
    pub has_requests: bool,
    pub new_end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LimitEnforcer {
    override_blocking: bool,
}

impl LimitEnforcer {
    pub fn new(override_blocking: bool) -> Self {
        Self { override_blocking }
    }

    /// Blocked patrons are rejected whatever the override says
    pub fn ensure_not_blocked(patron: &Patron) -> CirculationResult<()> {
        if patron.blocked {
            return Err(CirculationError::PatronBlocked {
                patron_id: patron.id,
                note: patron.blocked_note.clone(),
            });
        }
        Ok(())
    }

    pub fn check_checkout(
        &self,
        limits: &PatronLimits,
        activity: &PatronActivity,
        library_id: i32,
        policy: &CirculationPolicy,
    ) -> CirculationResult<()> {
        let reasons = [
            (!policy.allow_checkout).then_some(DenialReason::CheckoutNotAllowedByPolicy),
            checkout_count(limits, activity, library_id),
            standing(limits, activity),
        ];
        self.enforce(reasons, CirculationError::CheckoutDenied)
    }

    pub fn check_request(
        &self,
        limits: &PatronLimits,
        activity: &PatronActivity,
        library_id: i32,
    ) -> CirculationResult<()> {
        let reasons = [
            checkout_count(limits, activity, library_id),
            standing(limits, activity),
        ];
        self.enforce(reasons, CirculationError::RequestDenied)
    }

    pub fn check_extend(
        &self,
        limits: &PatronLimits,
        activity: &PatronActivity,
        policy: &CirculationPolicy,
        candidate: ExtendCandidate<'_>,
    ) -> CirculationResult<()> {
        let gains = candidate
            .loan
            .end_date
            .map(|current| candidate.new_end_date > current)
            .unwrap_or(true);
        let reasons = [
            candidate.has_requests.then_some(DenialReason::ItemRequested),
            (!gains).then_some(DenialReason::NoExtensionGain),
            (!policy.allows_renewals()).then_some(DenialReason::RenewalNotAllowedByPolicy),
            (candidate.loan.extension_count >= policy.number_renewals)
                .then_some(DenialReason::MaxRenewalsReached),
            standing(limits, activity),
        ];
        self.enforce(reasons, CirculationError::ExtendDenied)
    }

    /// First denial that still holds; the override lifts only limit denials
    fn enforce<const N: usize>(
        &self,
        reasons: [Option<DenialReason>; N],
        denied: fn(DenialReason) -> CirculationError,
    ) -> CirculationResult<()> {
        let mut holding = reasons.into_iter().flatten().filter(|reason| {
            if self.override_blocking && reason.is_overridable() {
                tracing::debug!("Limit {:?} overridden", reason);
                false
            } else {
                true
            }
        });
        holding.next().map_or(Ok(()), |reason| Err(denied(reason)))
    }
}

fn checkout_count(
    limits: &PatronLimits,
    activity: &PatronActivity,
    library_id: i32,
) -> Option<DenialReason> {
    let checkout_limits = limits.checkout_limits.as_ref()?;
    if let Some(global) = checkout_limits.global_limit {
        if activity.checkouts >= global as usize {
            return Some(DenialReason::CheckoutLimitReached);
        }
    }
    if let Some(library) = checkout_limits.limit_for_library(library_id) {
        if activity.library_checkouts >= library as usize {
            return Some(DenialReason::LibraryCheckoutLimitReached);
        }
    }
    None
}

/// Overdue items and unpaid fees
fn standing(limits: &PatronLimits, activity: &PatronActivity) -> Option<DenialReason> {
    if let Some(max_overdue) = limits.overdue_items_limits {
        if activity.overdue >= max_overdue as usize {
            return Some(DenialReason::OverdueItemsLimitReached);
        }
    }
    if let Some(max_fees) = limits.fee_amount_limits {
        if activity.unpaid_fees >= max_fees {
            return Some(DenialReason::FeeAmountLimitReached);
        }
    }
    None
}
