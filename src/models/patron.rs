//! Patron and patron type models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A library patron
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patron {
    pub id: i32,
    pub organisation_id: i32,
    pub patron_type_id: i32,
    /// Blocked patrons can neither request nor borrow, override or not
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub blocked_note: Option<String>,
}

/// Per-library exception to the library checkout limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryLimitException {
    pub library_id: i32,
    pub value: u32,
}

/// Checkout count caps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLimits {
    pub global_limit: Option<u32>,
    pub library_limit: Option<u32>,
    #[serde(default)]
    pub library_exceptions: Vec<LibraryLimitException>,
}

impl CheckoutLimits {
    /// Limit applying at `library_id`: an exception wins over the default
    pub fn limit_for_library(&self, library_id: i32) -> Option<u32> {
        self.library_exceptions
            .iter()
            .find(|e| e.library_id == library_id)
            .map(|e| e.value)
            .or(self.library_limit)
    }
}

/// All limits carried by a patron type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatronLimits {
    #[serde(default)]
    pub checkout_limits: Option<CheckoutLimits>,
    /// Maximum number of overdue items before the patron is denied
    #[serde(default)]
    pub overdue_items_limits: Option<u32>,
    /// Maximum unpaid fee total before the patron is denied
    #[serde(default)]
    pub fee_amount_limits: Option<Decimal>,
}

/// Patron type (category), used for policy resolution and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatronType {
    pub id: i32,
    pub organisation_id: i32,
    pub name: String,
    #[serde(default)]
    pub limits: PatronLimits,
}
