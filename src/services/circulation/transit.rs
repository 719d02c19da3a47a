//! Transit routing: where an item goes after validate, checkin, cancel and receive

use crate::models::{enums::ItemStatus, loan::Loan};

/// Where a validated request sends the item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The item is already at the pickup library
    Desk,
    TransitForPickup,
}

/// Where an item goes once its current loan (if any) releases it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinRoute {
    Shelf,
    /// Back to the owning library
    TransitToHouse,
    /// Handed over to the queue head
    NextRequest(Destination),
}

impl CheckinRoute {
    /// Item status when no loan is left holding the item
    pub fn resting_status(&self) -> Option<ItemStatus> {
        match self {
            CheckinRoute::Shelf => Some(ItemStatus::OnShelf),
            CheckinRoute::TransitToHouse => Some(ItemStatus::InTransit),
            CheckinRoute::NextRequest(_) => None,
        }
    }
}

/// Destination of a request picked up at `pickup_library_id` when the item sits at `at_library_id`
pub fn on_validate(pickup_library_id: Option<i32>, at_library_id: i32) -> Destination {
    match pickup_library_id {
        Some(pickup) if pickup != at_library_id => Destination::TransitForPickup,
        _ => Destination::Desk,
    }
}

/// Route at checkin of an on-loan item.
///
/// The queue head is routed against the owning library; without a queue the
/// item stays if checked in at home and travels back otherwise.
pub fn on_checkin(
    owning_library_id: i32,
    transaction_library_id: i32,
    head: Option<&Loan>,
) -> CheckinRoute {
    match head {
        Some(head) => {
            CheckinRoute::NextRequest(on_validate(head.pickup_library_id, owning_library_id))
        }
        None => settle(owning_library_id, transaction_library_id),
    }
}

/// Route after cancelling a loan whose item waited at `desk_library_id`
pub fn on_cancel_at_desk(
    owning_library_id: i32,
    desk_library_id: i32,
    head: Option<&Loan>,
) -> CheckinRoute {
    match head {
        Some(head) => CheckinRoute::NextRequest(on_validate(head.pickup_library_id, desk_library_id)),
        None => settle(owning_library_id, desk_library_id),
    }
}

/// Route after cancelling an in-transit loan
pub fn on_cancel_in_transit(
    owning_library_id: i32,
    transaction_library_id: i32,
    head: Option<&Loan>,
) -> CheckinRoute {
    on_checkin(owning_library_id, transaction_library_id, head)
}

/// Whether a transit ends at the transaction library
pub fn on_receive(destination_library_id: Option<i32>, transaction_library_id: i32) -> bool {
    destination_library_id == Some(transaction_library_id)
}

fn settle(owning_library_id: i32, at_library_id: i32) -> CheckinRoute {
    if owning_library_id == at_library_id {
        CheckinRoute::Shelf
    } else {
        CheckinRoute::TransitToHouse
    }
}
