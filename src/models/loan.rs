//! Loan model and related types

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::enums::LoanState;

/// A circulation transaction for one (item, patron) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Time-ordered snowflake id
    pub id: i64,
    pub item_id: i32,
    pub patron_id: i32,
    pub organisation_id: i32,
    pub state: LoanState,
    pub pickup_location_id: Option<i32>,
    pub pickup_library_id: Option<i32>,
    pub transaction_location_id: i32,
    pub transaction_library_id: i32,
    pub transaction_user_id: i32,
    pub transaction_date: DateTime<Utc>,
    /// Where the current loan period began
    pub checkout_location_id: Option<i32>,
    pub checkout_library_id: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    /// Due date while on loan, actual return date once returned
    pub end_date: Option<DateTime<Utc>>,
    /// Longest due date ever granted
    pub last_end_date: Option<DateTime<Utc>>,
    pub request_creation_date: Option<DateTime<Utc>>,
    pub request_expire_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub extension_count: u32,
    #[serde(default)]
    pub version: u64,
}

/// Attributes of a loan before it enters the state machine
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub id: i64,
    pub item_id: i32,
    pub patron_id: i32,
    pub organisation_id: i32,
    pub pickup_location_id: i32,
    pub pickup_library_id: i32,
}

impl Loan {
    /// Build a loan in `CREATED`, stamped with the creating transaction
    pub fn created(
        new: NewLoan,
        transaction_location_id: i32,
        transaction_library_id: i32,
        transaction_user_id: i32,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new.id,
            item_id: new.item_id,
            patron_id: new.patron_id,
            organisation_id: new.organisation_id,
            state: LoanState::Created,
            pickup_location_id: Some(new.pickup_location_id),
            pickup_library_id: Some(new.pickup_library_id),
            transaction_location_id,
            transaction_library_id,
            transaction_user_id,
            transaction_date,
            checkout_location_id: None,
            checkout_library_id: None,
            start_date: None,
            end_date: None,
            last_end_date: None,
            request_creation_date: None,
            request_expire_date: None,
            extension_count: 0,
            version: 0,
        }
    }

    pub fn is_overdue(&self, at: DateTime<Utc>) -> bool {
        self.state == LoanState::ItemOnLoan && self.end_date.map(|d| d < at).unwrap_or(false)
    }

    /// Whole days past the due date, at least one when overdue
    pub fn overdue_days(&self, at: DateTime<Utc>) -> i64 {
        match self.end_date {
            Some(end) if end < at => (at - end).num_days().max(1),
            _ => 0,
        }
    }

    /// Record `end` as the due date, keeping `last_end_date` monotonic
    pub fn set_end_date(&mut self, end: DateTime<Utc>) {
        self.end_date = Some(end);
        self.last_end_date = Some(match self.last_end_date {
            Some(last) if last > end => last,
            _ => end,
        });
    }

    /// Key ordering pending requests: creation date, then id
    pub fn queue_key(&self) -> (DateTime<Utc>, i64) {
        (
            self.request_creation_date.unwrap_or(self.transaction_date),
            self.id,
        )
    }
}
