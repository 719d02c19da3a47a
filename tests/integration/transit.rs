//! Flows where the item travels between the main library and the branch

use chrono::{NaiveTime, TimeZone, Utc};

use ils_circulation::{
    models::{
        circulation::{CancelParams, CheckoutParams, LoanParams, NoActionReason, RequestParams, SideEffect},
        enums::{ItemStatus, LoanState, NotificationKind},
        schedule::{LibrarySchedule, ScheduleSlot},
    },
    repository::ItemRepository,
    services::calendar::Calendar,
};

use crate::common::*;

fn item_only(item_id: i32) -> LoanParams {
    LoanParams {
        item_id,
        loan_id: None,
    }
}

fn request(item_id: i32, patron_id: i32, pickup_location_id: i32) -> RequestParams {
    RequestParams {
        item_id,
        patron_id,
        pickup_location_id,
    }
}

fn checkout(item_id: i32, patron_id: i32) -> CheckoutParams {
    CheckoutParams {
        item_id,
        patron_id,
        loan_id: None,
        pickup_location_id: None,
    }
}

#[tokio::test]
async fn test_request_picked_up_at_branch_and_returned_home() {
    let fx = Fixture::new().await;
    let service = fx.service();

    let loan = applied(
        service
            .request(&ctx(MAIN_DESK, now()), request(1, 1, BRANCH_DESK))
            .await
            .expect("request"),
    )
    .loan
    .expect("loan");

    let report = applied(
        service
            .validate(&ctx(MAIN_DESK, later(5)), item_only(1))
            .await
            .expect("validate"),
    );
    assert_eq!(
        report.loan.as_ref().map(|l| l.state),
        Some(LoanState::ItemInTransitForPickup)
    );
    assert_eq!(report.item.status, ItemStatus::InTransit);
    assert_eq!(
        report.side_effects,
        vec![SideEffect::Notify {
            kind: NotificationKind::TransitNotice,
            loan_id: loan.id
        }]
    );

    let outcome = service
        .receive(&ctx(MAIN_DESK, later(10)), item_only(1))
        .await
        .expect("receive at origin");
    assert_eq!(outcome.no_action_reason(), Some(NoActionReason::NotAtDestination));

    let report = applied(
        service
            .receive(&ctx(BRANCH_DESK, later(60)), item_only(1))
            .await
            .expect("receive at branch"),
    );
    let at_desk = report.loan.expect("loan");
    assert_eq!(at_desk.state, LoanState::ItemAtDesk);
    assert!(at_desk.request_expire_date.is_some());
    assert_eq!(report.item.status, ItemStatus::AtDesk);

    let report = applied(
        service
            .checkout(&ctx(BRANCH_DESK, later(90)), checkout(1, 1))
            .await
            .expect("checkout at branch"),
    );
    assert_eq!(
        report.loan.as_ref().and_then(|l| l.checkout_library_id),
        Some(BRANCH_LIBRARY)
    );

    let report = applied(
        service
            .checkin(&ctx(BRANCH_DESK, later(120)), item_only(1))
            .await
            .expect("checkin at branch"),
    );
    assert_eq!(
        report.loan.as_ref().map(|l| l.state),
        Some(LoanState::ItemInTransitToHouse)
    );
    assert_eq!(report.item.status, ItemStatus::InTransit);
    assert!(report.side_effects.contains(&SideEffect::Notify {
        kind: NotificationKind::TransitNotice,
        loan_id: loan.id
    }));

    let report = applied(
        service
            .receive(&ctx(MAIN_DESK, later(180)), item_only(1))
            .await
            .expect("receive home"),
    );
    assert_eq!(report.loan.map(|l| l.state), Some(LoanState::ItemReturned));
    assert_eq!(fx.item(1).await.status, ItemStatus::OnShelf);
    fx.assert_single_active(1).await;
}

#[tokio::test]
async fn test_checkin_sends_item_to_a_branch_request() {
    let fx = Fixture::new().await;
    let service = fx.service();
    service
        .checkout(&ctx(MAIN_DESK, now()), checkout(1, 1))
        .await
        .expect("checkout");
    let queued = applied(
        service
            .request(&ctx(MAIN_DESK, later(1)), request(1, 2, BRANCH_DESK))
            .await
            .expect("request"),
    )
    .loan
    .expect("loan");

    let report = applied(
        service
            .checkin(&ctx(MAIN_DESK, later(10)), item_only(1))
            .await
            .expect("checkin"),
    );
    let cascaded = report.cascaded.expect("queue head activated");
    assert_eq!(cascaded.id, queued.id);
    assert_eq!(cascaded.state, LoanState::ItemInTransitForPickup);
    assert_eq!(report.item.status, ItemStatus::InTransit);
}

#[tokio::test]
async fn test_cancel_at_desk_forwards_item_to_next_request() {
    let fx = Fixture::new().await;
    let service = fx.service();
    let first = applied(
        service
            .request(&ctx(MAIN_DESK, now()), request(1, 1, MAIN_DESK))
            .await
            .expect("request p1"),
    )
    .loan
    .expect("loan");
    service
        .validate(&ctx(MAIN_DESK, later(1)), item_only(1))
        .await
        .expect("validate");
    let second = applied(
        service
            .request(&ctx(MAIN_DESK, later(2)), request(1, 2, BRANCH_DESK))
            .await
            .expect("request p2"),
    )
    .loan
    .expect("loan");

    let report = applied(
        service
            .cancel(
                &ctx(MAIN_DESK, later(3)),
                CancelParams {
                    item_id: 1,
                    loan_id: first.id,
                    patron_id: Some(1),
                },
            )
            .await
            .expect("cancel"),
    );
    assert_eq!(report.loan.map(|l| l.state), Some(LoanState::Cancelled));
    assert_eq!(
        report.cascaded.map(|l| (l.id, l.state)),
        Some((second.id, LoanState::ItemInTransitForPickup))
    );
    assert_eq!(fx.item(1).await.status, ItemStatus::InTransit);
    fx.assert_single_active(1).await;
}

/// Request of patron 1 for pickup at the branch, sent on its way from the main library
async fn request_in_transit_to_branch(fx: &Fixture) -> i64 {
    let loan = applied(
        fx.service()
            .request(&ctx(MAIN_DESK, now()), request(1, 1, BRANCH_DESK))
            .await
            .expect("request"),
    )
    .loan
    .expect("loan");
    fx.service()
        .validate(&ctx(MAIN_DESK, later(1)), item_only(1))
        .await
        .expect("validate");
    assert_eq!(fx.loan(loan.id).await.state, LoanState::ItemInTransitForPickup);
    loan.id
}

fn cancel(item_id: i32, loan_id: i64) -> CancelParams {
    CancelParams {
        item_id,
        loan_id,
        patron_id: None,
    }
}

#[tokio::test]
async fn test_cancel_in_transit_away_from_home_sends_item_back() {
    let fx = Fixture::new().await;
    let loan_id = request_in_transit_to_branch(&fx).await;

    let report = applied(
        fx.service()
            .cancel(&ctx(BRANCH_DESK, later(30)), cancel(1, loan_id))
            .await
            .expect("cancel at branch"),
    );
    assert_eq!(report.loan.map(|l| l.state), Some(LoanState::Cancelled));
    assert!(report.cascaded.is_none());
    assert_eq!(fx.item(1).await.status, ItemStatus::InTransit);
    fx.assert_single_active(1).await;
}

#[tokio::test]
async fn test_cancel_in_transit_at_home_shelves_item() {
    let fx = Fixture::new().await;
    let loan_id = request_in_transit_to_branch(&fx).await;

    let report = applied(
        fx.service()
            .cancel(&ctx(MAIN_DESK, later(5)), cancel(1, loan_id))
            .await
            .expect("cancel at main"),
    );
    assert_eq!(report.loan.map(|l| l.state), Some(LoanState::Cancelled));
    assert_eq!(fx.item(1).await.status, ItemStatus::OnShelf);
}

#[tokio::test]
async fn test_cancel_in_transit_activates_next_request() {
    let fx = Fixture::new().await;
    let loan_id = request_in_transit_to_branch(&fx).await;
    let next = applied(
        fx.service()
            .request(&ctx(MAIN_DESK, later(2)), request(1, 2, MAIN_DESK))
            .await
            .expect("request p2"),
    )
    .loan
    .expect("loan");

    // Checked at the branch, but the head is routed against the owning library
    let report = applied(
        fx.service()
            .cancel(&ctx(BRANCH_DESK, later(30)), cancel(1, loan_id))
            .await
            .expect("cancel"),
    );
    assert_eq!(report.loan.map(|l| l.state), Some(LoanState::Cancelled));
    assert_eq!(
        report.cascaded.map(|l| (l.id, l.state)),
        Some((next.id, LoanState::ItemAtDesk))
    );
    assert_eq!(fx.item(1).await.status, ItemStatus::AtDesk);
    assert!(fx.pending(1).await.is_empty());
    fx.assert_single_active(1).await;
}

#[tokio::test]
async fn test_on_loan_item_cannot_be_cancelled() {
    let fx = Fixture::new().await;
    let loan = applied(
        fx.service()
            .checkout(&ctx(MAIN_DESK, now()), checkout(1, 1))
            .await
            .expect("checkout"),
    )
    .loan
    .expect("loan");

    let err = fx
        .service()
        .cancel(
            &ctx(MAIN_DESK, later(1)),
            CancelParams {
                item_id: 1,
                loan_id: loan.id,
                patron_id: None,
            },
        )
        .await
        .expect_err("on loan");
    assert!(matches!(
        err,
        ils_circulation::CirculationError::InvalidTransition {
            state: Some(LoanState::ItemOnLoan),
            ..
        }
    ));
}

#[tokio::test]
async fn test_shelved_item_checked_in_elsewhere_travels_home() {
    let fx = Fixture::new().await;
    let service = fx.service();

    let report = applied(
        service
            .checkin(&ctx(BRANCH_DESK, now()), item_only(2))
            .await
            .expect("checkin at branch"),
    );
    assert!(report.loan.is_none());
    assert_eq!(report.item.status, ItemStatus::InTransit);

    let outcome = service
        .receive(&ctx(BRANCH_DESK, later(1)), item_only(2))
        .await
        .expect("receive at branch");
    assert_eq!(outcome.no_action_reason(), Some(NoActionReason::NotAtDestination));

    applied(
        service
            .checkin(&ctx(MAIN_DESK, later(60)), item_only(2))
            .await
            .expect("checkin home"),
    );
    assert_eq!(fx.item(2).await.status, ItemStatus::OnShelf);
}

#[tokio::test]
async fn test_missing_item_found_at_home() {
    let fx = Fixture::new().await;
    let mut item = fx.item(3).await;
    item.status = ItemStatus::Missing;
    fx.memory.save_item(&item).await.expect("save");

    let report = applied(
        fx.service()
            .checkin(&ctx(MAIN_DESK, now()), item_only(3))
            .await
            .expect("checkin"),
    );
    assert_eq!(report.item.status, ItemStatus::OnShelf);
    assert!(report.loan.is_none());
}

#[tokio::test]
async fn test_due_date_follows_opening_hours() {
    // Main library open Monday to Friday 09:00-17:00 UTC
    let slots = (0..5)
        .map(|day| ScheduleSlot {
            day_of_week: day,
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        })
        .collect();
    let schedule = LibrarySchedule {
        library_id: MAIN_LIBRARY,
        utc_offset_minutes: 0,
        slots,
        closures: Vec::new(),
    };
    let fx = Fixture::with_schedules(vec![schedule]).await;

    // Wednesday; 21 days later is a Wednesday too
    let report = applied(
        fx.service()
            .checkout(&ctx(MAIN_DESK, now()), checkout(1, 1))
            .await
            .expect("checkout"),
    );
    let due = report.loan.and_then(|l| l.end_date).expect("due date");
    assert_eq!(due, Utc.with_ymd_and_hms(2024, 6, 5, 17, 0, 0).unwrap());
    assert!(fx.services.calendar.closing_time(MAIN_LIBRARY, due.date_naive()).is_some());
}
