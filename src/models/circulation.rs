//! Orchestrator inputs and outputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    enums::{LoanAction, NotificationKind},
    item::Item,
    loan::Loan,
};

/// Who performs an action, where, and when
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    pub organisation_id: i32,
    pub transaction_location_id: i32,
    /// Staff member (or system user) performing the action
    pub transaction_user_id: i32,
    pub transaction_date: DateTime<Utc>,
    /// Skip limit checks. Never bypasses blocks or the state machine.
    #[serde(default)]
    pub override_blocking: bool,
    /// Reject the call if the stored item version differs
    #[serde(default)]
    pub expected_item_version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestParams {
    pub item_id: i32,
    pub patron_id: i32,
    pub pickup_location_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutParams {
    pub item_id: i32,
    pub patron_id: i32,
    #[serde(default)]
    pub loan_id: Option<i64>,
    /// Recorded on loans created by the checkout itself
    #[serde(default)]
    pub pickup_location_id: Option<i32>,
}

/// Parameters of actions that only need the item and, optionally, the loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanParams {
    pub item_id: i32,
    #[serde(default)]
    pub loan_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub item_id: i32,
    pub loan_id: i64,
    /// Set when the patron cancels their own request
    #[serde(default)]
    pub patron_id: Option<i32>,
}

/// Intent produced by a transition, dispatched by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    Notify { kind: NotificationKind, loan_id: i64 },
    CreateFee { loan_id: i64, overdue_days: i64 },
}

/// Why an action legitimately did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoActionReason {
    /// Item is on the shelf of its owning library with nobody waiting
    ItemOnShelf,
    /// Item already waits at the desk for its requester
    ItemAtDesk,
    NoPendingRequest,
    NoActiveLoan,
    ItemNotInTransit,
    /// Receive performed somewhere other than the transit destination
    NotAtDestination,
}

/// Everything an applied action changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CirculationReport {
    pub action: LoanAction,
    pub item: Item,
    /// Loan the action was performed on, if any
    pub loan: Option<Loan>,
    /// Queue head activated by the action
    pub cascaded: Option<Loan>,
    pub side_effects: Vec<SideEffect>,
}

impl CirculationReport {
    /// Records to persist as one unit
    pub fn changeset(&self) -> Changeset {
        Changeset {
            item: self.item.clone(),
            loans: self.loan.iter().chain(self.cascaded.iter()).cloned().collect(),
        }
    }
}

/// Result of an orchestrator call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied(CirculationReport),
    NoAction { reason: NoActionReason },
}

impl ActionOutcome {
    pub fn report(&self) -> Option<&CirculationReport> {
        match self {
            ActionOutcome::Applied(report) => Some(report),
            ActionOutcome::NoAction { .. } => None,
        }
    }

    pub fn no_action_reason(&self) -> Option<NoActionReason> {
        match self {
            ActionOutcome::Applied(_) => None,
            ActionOutcome::NoAction { reason } => Some(*reason),
        }
    }
}

/// Item and loans to write atomically. Versions are the new versions.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub item: Item,
    pub loans: Vec<Loan>,
}
