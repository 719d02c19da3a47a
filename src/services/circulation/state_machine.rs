//! Loan state machine.
//!
//! A pure function of (current state, event). Events carry the facts the
//! orchestrator already established (queue position, router decision), so the
//! machine itself never reads anything and never fails for reasons other than
//! the transition table.

use crate::{
    error::{CirculationError, CirculationResult, ForbiddenReason},
    models::{
        circulation::NoActionReason,
        enums::{ItemStatus, LoanAction, LoanState},
    },
};

use super::transit::{CheckinRoute, Destination};

/// An action with the facts its legality depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanEvent {
    Request,
    Validate {
        is_queue_head: bool,
        destination: Destination,
    },
    Checkout {
        is_requester: bool,
    },
    Checkin {
        route: CheckinRoute,
    },
    Extend,
    Cancel,
    Receive {
        /// The transaction happens at the transit destination
        arrived: bool,
    },
}

impl LoanEvent {
    pub fn action(&self) -> LoanAction {
        match self {
            LoanEvent::Request => LoanAction::Request,
            LoanEvent::Validate { .. } => LoanAction::Validate,
            LoanEvent::Checkout { .. } => LoanAction::Checkout,
            LoanEvent::Checkin { .. } => LoanAction::Checkin,
            LoanEvent::Extend => LoanAction::Extend,
            LoanEvent::Cancel => LoanAction::Cancel,
            LoanEvent::Receive { .. } => LoanAction::Receive,
        }
    }
}

/// Outcome of a legal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LoanState,
    pub to: LoanState,
    /// New item status; `None` leaves it to the caller (unchanged or routed)
    pub item_status: Option<ItemStatus>,
}

/// What the machine decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved(Transition),
    Stay(NoActionReason),
}

fn moved(from: LoanState, to: LoanState, item_status: Option<ItemStatus>) -> Step {
    Step::Moved(Transition {
        from,
        to,
        item_status,
    })
}

/// Apply `event` to a loan in state `from`
pub fn transition(from: LoanState, event: LoanEvent) -> CirculationResult<Step> {
    use LoanState::*;

    let step = match (from, event) {
        (Created, LoanEvent::Request) => moved(from, Pending, None),

        (
            Pending,
            LoanEvent::Validate {
                is_queue_head: true,
                destination,
            },
        ) => match destination {
            Destination::Desk => moved(from, ItemAtDesk, Some(ItemStatus::AtDesk)),
            Destination::TransitForPickup => {
                moved(from, ItemInTransitForPickup, Some(ItemStatus::InTransit))
            }
        },

        (Created | Pending | ItemAtDesk | ItemInTransitForPickup, LoanEvent::Checkout { is_requester }) => {
            if !is_requester {
                return Err(CirculationError::Forbidden(ForbiddenReason::NotRequester));
            }
            moved(from, ItemOnLoan, Some(ItemStatus::OnLoan))
        }

        (ItemOnLoan, LoanEvent::Checkin { route }) => match route {
            CheckinRoute::Shelf => moved(from, ItemReturned, Some(ItemStatus::OnShelf)),
            CheckinRoute::TransitToHouse => {
                moved(from, ItemInTransitToHouse, Some(ItemStatus::InTransit))
            }
            CheckinRoute::NextRequest(_) => moved(from, ItemReturned, None),
        },

        (ItemOnLoan, LoanEvent::Extend) => moved(from, ItemOnLoan, None),

        (Pending | ItemAtDesk | ItemInTransitForPickup | ItemInTransitToHouse, LoanEvent::Cancel) => {
            moved(from, Cancelled, None)
        }

        (ItemInTransitForPickup, LoanEvent::Receive { arrived: true }) => {
            moved(from, ItemAtDesk, Some(ItemStatus::AtDesk))
        }
        (ItemInTransitToHouse, LoanEvent::Receive { arrived: true }) => {
            moved(from, ItemReturned, Some(ItemStatus::OnShelf))
        }
        (ItemInTransitForPickup | ItemInTransitToHouse, LoanEvent::Receive { arrived: false }) => {
            Step::Stay(NoActionReason::NotAtDestination)
        }

        (ItemAtDesk, LoanEvent::Checkin { .. }) => Step::Stay(NoActionReason::ItemAtDesk),

        (state, event) => {
            return Err(CirculationError::InvalidTransition {
                action: event.action(),
                state: Some(state),
            })
        }
    };
    Ok(step)
}
