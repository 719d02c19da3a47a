//! Item (physical unit) model and related types.
//!
//! Only the attributes circulation needs are carried here; cataloguing data
//! lives elsewhere and is never touched by the circulation core.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::ItemStatus;

/// Temporary location override with an optional expiry date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryLocation {
    pub location_id: i32,
    /// Last day (inclusive) the override applies
    pub end_date: Option<NaiveDate>,
}

/// Temporary item type override with an optional expiry date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryItemType {
    pub item_type_id: i32,
    /// Last day (inclusive) the override applies
    pub end_date: Option<NaiveDate>,
}

/// Item as seen by circulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i32,
    pub organisation_id: i32,
    /// Owning library
    pub library_id: i32,
    /// Owning location
    pub location_id: i32,
    pub item_type_id: i32,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub temporary_location: Option<TemporaryLocation>,
    #[serde(default)]
    pub temporary_item_type: Option<TemporaryItemType>,
    /// Optimistic concurrency counter, bumped on every applied action
    #[serde(default)]
    pub version: u64,
}

fn override_applies(end_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    end_date.map(|end| today <= end).unwrap_or(true)
}

impl Item {
    /// Location used for request rules, honouring a non-expired override
    pub fn effective_location_id(&self, today: NaiveDate) -> i32 {
        match &self.temporary_location {
            Some(tmp) if override_applies(tmp.end_date, today) => tmp.location_id,
            _ => self.location_id,
        }
    }

    /// Item type used for policy resolution, honouring a non-expired override
    pub fn effective_item_type_id(&self, today: NaiveDate) -> i32 {
        match &self.temporary_item_type {
            Some(tmp) if override_applies(tmp.end_date, today) => tmp.item_type_id,
            _ => self.item_type_id,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ItemStatus::OnShelf
    }
}
