//! Circulation policy model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// (patron type, item type) pair a policy applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicySetting {
    pub patron_type_id: i32,
    pub item_type_id: i32,
}

/// One row of the overdue fee table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInterval {
    pub from: u32,
    pub to: Option<u32>,
    pub fee_amount: Decimal,
}

/// Overdue fee settings. Their presence means an overdue checkin owes an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueFees {
    #[serde(default)]
    pub intervals: Vec<FeeInterval>,
    pub maximum_total_amount: Option<Decimal>,
}

/// Circulation policy (cipo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CirculationPolicy {
    pub id: i32,
    #[validate(length(min = 1, message = "Policy name must not be empty"))]
    pub name: String,
    pub organisation_id: i32,
    /// Fallback policy of the organisation
    #[serde(default)]
    pub is_default: bool,
    /// Restricted to `libraries` when set
    #[serde(default)]
    pub policy_library_level: bool,
    #[serde(default)]
    pub libraries: Vec<i32>,
    #[serde(default)]
    pub settings: Vec<PolicySetting>,
    #[serde(default = "default_true")]
    pub allow_checkout: bool,
    #[serde(default = "default_true")]
    pub allow_requests: bool,
    /// Loan duration in days; `0` means less than one day
    #[validate(range(min = 0, max = 3650, message = "Checkout duration out of range"))]
    pub checkout_duration: i64,
    #[serde(default)]
    pub number_renewals: u32,
    #[serde(default)]
    #[validate(range(min = 0, max = 3650, message = "Renewal duration out of range"))]
    pub renewal_duration: i64,
    #[serde(default)]
    pub overdue_fees: Option<OverdueFees>,
}

fn default_true() -> bool {
    true
}

impl CirculationPolicy {
    pub fn applies_to(&self, patron_type_id: i32, item_type_id: i32) -> bool {
        self.settings
            .iter()
            .any(|s| s.patron_type_id == patron_type_id && s.item_type_id == item_type_id)
    }

    pub fn covers_library(&self, library_id: i32) -> bool {
        self.policy_library_level && self.libraries.contains(&library_id)
    }

    pub fn allows_renewals(&self) -> bool {
        self.number_renewals > 0 && self.renewal_duration > 0
    }
}
