//! Data models for circulation

pub mod circulation;
pub mod enums;
pub mod item;
pub mod loan;
pub mod location;
pub mod patron;
pub mod policy;
pub mod schedule;

// Re-export commonly used types
pub use circulation::{
    ActionContext, ActionOutcome, CancelParams, Changeset, CheckoutParams, CirculationReport,
    LoanParams, NoActionReason, RequestParams, SideEffect,
};
pub use enums::{ItemStatus, LoanAction, LoanState, NotificationKind};
pub use item::Item;
pub use loan::Loan;
pub use location::Location;
pub use patron::{Patron, PatronLimits, PatronType};
pub use policy::CirculationPolicy;
pub use schedule::LibrarySchedule;
