//! Shared circulation enums

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LoanState
// ---------------------------------------------------------------------------

/// Lifecycle state of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanState {
    Created,
    Pending,
    ItemAtDesk,
    ItemOnLoan,
    ItemInTransitForPickup,
    ItemInTransitToHouse,
    ItemReturned,
    Cancelled,
}

impl LoanState {
    /// States that occupy the item; at most one loan per item may hold one
    pub const ACTIVE: [LoanState; 4] = [
        LoanState::ItemAtDesk,
        LoanState::ItemOnLoan,
        LoanState::ItemInTransitForPickup,
        LoanState::ItemInTransitToHouse,
    ];

    /// Every state a loan can still leave
    pub const NON_TERMINAL: [LoanState; 6] = [
        LoanState::Created,
        LoanState::Pending,
        LoanState::ItemAtDesk,
        LoanState::ItemOnLoan,
        LoanState::ItemInTransitForPickup,
        LoanState::ItemInTransitToHouse,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanState::ItemReturned | LoanState::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Created => "CREATED",
            LoanState::Pending => "PENDING",
            LoanState::ItemAtDesk => "ITEM_AT_DESK",
            LoanState::ItemOnLoan => "ITEM_ON_LOAN",
            LoanState::ItemInTransitForPickup => "ITEM_IN_TRANSIT_FOR_PICKUP",
            LoanState::ItemInTransitToHouse => "ITEM_IN_TRANSIT_TO_HOUSE",
            LoanState::ItemReturned => "ITEM_RETURNED",
            LoanState::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for LoanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ItemStatus
// ---------------------------------------------------------------------------

/// Circulation status of a physical item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    OnShelf,
    AtDesk,
    OnLoan,
    InTransit,
    Missing,
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::OnShelf
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ItemStatus::OnShelf => "on_shelf",
            ItemStatus::AtDesk => "at_desk",
            ItemStatus::OnLoan => "on_loan",
            ItemStatus::InTransit => "in_transit",
            ItemStatus::Missing => "missing",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// LoanAction
// ---------------------------------------------------------------------------

/// Circulation actions exposed by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanAction {
    Request,
    Validate,
    Checkout,
    Checkin,
    Extend,
    Cancel,
    Receive,
}

impl std::fmt::Display for LoanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoanAction::Request => "request",
            LoanAction::Validate => "validate",
            LoanAction::Checkout => "checkout",
            LoanAction::Checkin => "checkin",
            LoanAction::Extend => "extend",
            LoanAction::Cancel => "cancel",
            LoanAction::Receive => "receive",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// NotificationKind
// ---------------------------------------------------------------------------

/// Notification intents emitted by transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Staff must fetch an available item for a new request
    Request,
    /// The current borrower is asked to bring the item back
    Recall,
    /// The requester can pick the item up
    Availability,
    /// The item leaves for another library
    TransitNotice,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NotificationKind::Request => "request",
            NotificationKind::Recall => "recall",
            NotificationKind::Availability => "availability",
            NotificationKind::TransitNotice => "transit_notice",
        };
        write!(f, "{}", label)
    }
}
