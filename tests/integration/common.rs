//! Shared fixture: one organisation, a main library (10) and a branch (20)

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use ils_circulation::{
    config::CirculationConfig,
    models::{
        circulation::{ActionContext, ActionOutcome, CirculationReport},
        enums::ItemStatus,
        item::Item,
        loan::Loan,
        location::Location,
        patron::{CheckoutLimits, Patron, PatronLimits, PatronType},
        policy::{CirculationPolicy, FeeInterval, OverdueFees},
        schedule::LibrarySchedule,
    },
    repository::{ItemRepository, LoanRepository, MemoryRepository, Repository},
    services::{
        calendar::ScheduleCalendar, circulation::CirculationService,
        notifications::RecordingSink, Services,
    },
};

pub const ORG: i32 = 1;
pub const MAIN_LIBRARY: i32 = 10;
pub const BRANCH_LIBRARY: i32 = 20;
/// Main library desk, requestable and a pickup point
pub const MAIN_DESK: i32 = 100;
/// Main library reserve: no requests, no pickup
pub const MAIN_RESERVE: i32 = 101;
pub const BRANCH_DESK: i32 = 200;
pub const STAFF_USER: i32 = 99;

/// Patron type without limits
pub const ADULT: i32 = 1;
/// Patron type allowed two checkouts
pub const LIMITED: i32 = 2;

pub const LIMITED_PATRON: i32 = 6;
pub const BLOCKED_PATRON: i32 = 7;

/// Item stored in the reserve location
pub const RESERVE_ITEM: i32 = 5;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap()
}

pub fn ctx(location_id: i32, at: DateTime<Utc>) -> ActionContext {
    ActionContext {
        organisation_id: ORG,
        transaction_location_id: location_id,
        transaction_user_id: STAFF_USER,
        transaction_date: at,
        override_blocking: false,
        expected_item_version: None,
    }
}

pub fn later(minutes: i64) -> DateTime<Utc> {
    now() + Duration::minutes(minutes)
}

pub fn applied(outcome: ActionOutcome) -> CirculationReport {
    match outcome {
        ActionOutcome::Applied(report) => report,
        ActionOutcome::NoAction { reason } => panic!("expected an applied action, got {:?}", reason),
    }
}

pub struct Fixture {
    pub memory: Arc<MemoryRepository>,
    pub sink: Arc<RecordingSink>,
    pub services: Services,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_schedules(Vec::new()).await
    }

    pub async fn with_schedules(schedules: Vec<LibrarySchedule>) -> Self {
        let memory = Arc::new(MemoryRepository::new());
        seed(&memory).await;

        let sink = Arc::new(RecordingSink::new());
        let services = Services::new(
            Repository::in_memory(memory.clone()),
            Arc::new(ScheduleCalendar::new(schedules)),
            sink.clone(),
            &CirculationConfig::default(),
        );
        Self {
            memory,
            sink,
            services,
        }
    }

    pub fn service(&self) -> &CirculationService {
        &self.services.circulation
    }

    pub async fn item(&self, id: i32) -> Item {
        self.memory.get_item(id).await.expect("item exists")
    }

    pub async fn loan(&self, id: i64) -> Loan {
        self.memory.get_loan(id).await.expect("loan exists")
    }

    pub async fn pending(&self, item_id: i32) -> Vec<Loan> {
        self.memory
            .find_pending_by_item(item_id)
            .await
            .expect("pending loans")
    }

    /// At most one loan of the item may occupy it
    pub async fn assert_single_active(&self, item_id: i32) {
        let active = self
            .memory
            .loans_of_item(item_id)
            .await
            .into_iter()
            .filter(|l| l.state.is_active())
            .count();
        assert!(active <= 1, "item {} has {} active loans", item_id, active);
    }
}

fn location(id: i32, library_id: i32, requestable: bool) -> Location {
    Location {
        id,
        library_id,
        name: format!("location {}", id),
        allow_request: requestable,
        is_pickup: requestable,
    }
}

fn patron(id: i32, patron_type_id: i32) -> Patron {
    Patron {
        id,
        organisation_id: ORG,
        patron_type_id,
        blocked: false,
        blocked_note: None,
    }
}

pub fn default_policy() -> CirculationPolicy {
    CirculationPolicy {
        id: 1,
        name: "Default".to_string(),
        organisation_id: ORG,
        is_default: true,
        policy_library_level: false,
        libraries: Vec::new(),
        settings: Vec::new(),
        allow_checkout: true,
        allow_requests: true,
        checkout_duration: 21,
        number_renewals: 2,
        renewal_duration: 14,
        overdue_fees: Some(OverdueFees {
            intervals: vec![FeeInterval {
                from: 1,
                to: None,
                fee_amount: Decimal::new(50, 2),
            }],
            maximum_total_amount: None,
        }),
    }
}

async fn seed(memory: &MemoryRepository) {
    for location in [
        location(MAIN_DESK, MAIN_LIBRARY, true),
        location(MAIN_RESERVE, MAIN_LIBRARY, false),
        location(BRANCH_DESK, BRANCH_LIBRARY, true),
    ] {
        memory.insert_location(location).await;
    }

    memory
        .insert_patron_type(PatronType {
            id: ADULT,
            organisation_id: ORG,
            name: "Adult".to_string(),
            limits: PatronLimits::default(),
        })
        .await;
    memory
        .insert_patron_type(PatronType {
            id: LIMITED,
            organisation_id: ORG,
            name: "Limited".to_string(),
            limits: PatronLimits {
                checkout_limits: Some(CheckoutLimits {
                    global_limit: Some(2),
                    library_limit: None,
                    library_exceptions: Vec::new(),
                }),
                overdue_items_limits: None,
                fee_amount_limits: None,
            },
        })
        .await;

    for id in 1..=5 {
        memory.insert_patron(patron(id, ADULT)).await;
    }
    memory.insert_patron(patron(LIMITED_PATRON, LIMITED)).await;
    memory
        .insert_patron(Patron {
            blocked: true,
            blocked_note: Some("Lost membership card".to_string()),
            ..patron(BLOCKED_PATRON, ADULT)
        })
        .await;

    memory.insert_policy(default_policy()).await;

    for id in 1..=5 {
        let location_id = if id == RESERVE_ITEM { MAIN_RESERVE } else { MAIN_DESK };
        memory
            .save_item(&Item {
                id,
                organisation_id: ORG,
                library_id: MAIN_LIBRARY,
                location_id,
                item_type_id: 1,
                status: ItemStatus::OnShelf,
                temporary_location: None,
                temporary_item_type: None,
                version: 0,
            })
            .await
            .expect("seed item");
    }
}
