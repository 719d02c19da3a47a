//! Error types for the circulation core

use thiserror::Error;

use crate::models::enums::{LoanAction, LoanState};

/// Stable error codes, one per taxonomy member.
///
/// Hosts map these to their own transport (HTTP status, CLI exit code...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    InvalidTransition = 1,
    Forbidden = 2,
    PatronBlocked = 3,
    CheckoutDenied = 4,
    RequestDenied = 5,
    ExtendDenied = 6,
    DuplicateRequest = 7,
    RequestNotAllowed = 8,
    ConcurrentModification = 9,
    NotFound = 10,
    Validation = 11,
    Configuration = 12,
    Storage = 13,
    Internal = 14,
}

/// Why a caller is not allowed to act on a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    /// The patron is not the requester of the loan being served
    NotRequester,
    /// The patron has a request on the item, but it is not the queue head
    NotQueueHead,
    /// Another patron's request must be served first
    ItemRequestedByOther,
    /// Patron-initiated action on somebody else's loan
    NotLoanOwner,
    /// Item, patron and transaction belong to different organisations
    OrganisationMismatch,
}

/// Reason tag attached to checkout/request/extend denials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    CheckoutLimitReached,
    LibraryCheckoutLimitReached,
    OverdueItemsLimitReached,
    FeeAmountLimitReached,
    CheckoutNotAllowedByPolicy,
    RenewalNotAllowedByPolicy,
    MaxRenewalsReached,
    /// Pending requests on the item prevent an extension
    ItemRequested,
    /// The new due date would not be later than the current one
    NoExtensionGain,
}

impl DenialReason {
    /// Whether `override_blocking` lifts this denial.
    ///
    /// Only limit checks are overridable. Policy flags and the queue and
    /// due-date guards are not.
    pub fn is_overridable(&self) -> bool {
        !matches!(
            self,
            DenialReason::CheckoutNotAllowedByPolicy
                | DenialReason::RenewalNotAllowedByPolicy
                | DenialReason::ItemRequested
                | DenialReason::NoExtensionGain
        )
    }
}

/// Location/item configuration that forbids a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRestriction {
    LocationDisallowsRequests,
    PolicyDisallowsRequests,
    NotAPickupLocation,
    ItemMissing,
}

/// Main error type of the circulation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CirculationError {
    #[error("Invalid transition: cannot {action} a loan in state {state:?}")]
    InvalidTransition {
        action: LoanAction,
        state: Option<LoanState>,
    },

    #[error("Forbidden: {0:?}")]
    Forbidden(ForbiddenReason),

    #[error("Patron {patron_id} is blocked")]
    PatronBlocked {
        patron_id: i32,
        note: Option<String>,
    },

    #[error("Checkout denied: {0:?}")]
    CheckoutDenied(DenialReason),

    #[error("Request denied: {0:?}")]
    RequestDenied(DenialReason),

    #[error("Extend denied: {0:?}")]
    ExtendDenied(DenialReason),

    #[error("Patron {patron_id} already has a request on item {item_id}")]
    DuplicateRequest { item_id: i32, patron_id: i32 },

    #[error("Request not allowed: {0:?}")]
    RequestNotAllowed(RequestRestriction),

    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: &'static str, id: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CirculationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CirculationError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CirculationError::Forbidden(_) => ErrorKind::Forbidden,
            CirculationError::PatronBlocked { .. } => ErrorKind::PatronBlocked,
            CirculationError::CheckoutDenied(_) => ErrorKind::CheckoutDenied,
            CirculationError::RequestDenied(_) => ErrorKind::RequestDenied,
            CirculationError::ExtendDenied(_) => ErrorKind::ExtendDenied,
            CirculationError::DuplicateRequest { .. } => ErrorKind::DuplicateRequest,
            CirculationError::RequestNotAllowed(_) => ErrorKind::RequestNotAllowed,
            CirculationError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            CirculationError::NotFound(_) => ErrorKind::NotFound,
            CirculationError::Validation(_) => ErrorKind::Validation,
            CirculationError::Configuration(_) => ErrorKind::Configuration,
            CirculationError::Storage(_) => ErrorKind::Storage,
            CirculationError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Numeric code of the error kind
    pub fn code(&self) -> u32 {
        self.kind() as u32
    }

    /// Business-rule rejection, as opposed to an infrastructure failure
    pub fn is_business_rule(&self) -> bool {
        !matches!(
            self,
            CirculationError::Storage(_)
                | CirculationError::Internal(_)
                | CirculationError::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for CirculationError {
    fn from(e: serde_json::Error) -> Self {
        CirculationError::Storage(format!("snapshot serialization failed: {}", e))
    }
}

impl From<std::io::Error> for CirculationError {
    fn from(e: std::io::Error) -> Self {
        CirculationError::Storage(e.to_string())
    }
}

/// Result type alias for circulation operations
pub type CirculationResult<T> = Result<T, CirculationError>;
