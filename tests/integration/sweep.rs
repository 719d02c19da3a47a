//! Expired request sweep

use chrono::Duration;

use ils_circulation::models::{
    circulation::{LoanParams, RequestParams},
    enums::{ItemStatus, LoanState},
};

use crate::common::*;

fn item_only(item_id: i32) -> LoanParams {
    LoanParams {
        item_id,
        loan_id: None,
    }
}

fn request(item_id: i32, patron_id: i32) -> RequestParams {
    RequestParams {
        item_id,
        patron_id,
        pickup_location_id: MAIN_DESK,
    }
}

#[tokio::test]
async fn test_sweep_cancels_expired_requests_once() {
    let fx = Fixture::new().await;
    let service = fx.service();
    let loan = applied(
        service
            .request(&ctx(MAIN_DESK, now()), request(1, 1))
            .await
            .expect("request"),
    )
    .loan
    .expect("loan");
    service
        .validate(&ctx(MAIN_DESK, later(1)), item_only(1))
        .await
        .expect("validate");

    let cancelled = service
        .cancel_expired_request_task(now() + Duration::days(5))
        .await
        .expect("early sweep");
    assert_eq!(cancelled, 0);

    let after_expiry = now() + Duration::days(11);
    let cancelled = service
        .cancel_expired_request_task(after_expiry)
        .await
        .expect("sweep");
    assert_eq!(cancelled, 1);

    let cancelled_loan = fx.loan(loan.id).await;
    assert_eq!(cancelled_loan.state, LoanState::Cancelled);
    assert_eq!(cancelled_loan.transaction_user_id, 0);
    assert_eq!(fx.item(1).await.status, ItemStatus::OnShelf);

    let again = service
        .cancel_expired_request_task(after_expiry)
        .await
        .expect("second sweep");
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_sweep_hands_item_to_next_request() {
    let fx = Fixture::new().await;
    let service = fx.service();
    service
        .request(&ctx(MAIN_DESK, now()), request(1, 1))
        .await
        .expect("request p1");
    service
        .validate(&ctx(MAIN_DESK, later(1)), item_only(1))
        .await
        .expect("validate");
    let next = applied(
        service
            .request(&ctx(MAIN_DESK, later(2)), request(1, 2))
            .await
            .expect("request p2"),
    )
    .loan
    .expect("loan");

    let after_expiry = now() + Duration::days(11);
    assert_eq!(
        service
            .cancel_expired_request_task(after_expiry)
            .await
            .expect("sweep"),
        1
    );

    let promoted = fx.loan(next.id).await;
    assert_eq!(promoted.state, LoanState::ItemAtDesk);
    assert!(promoted.request_expire_date.expect("new expiry") > after_expiry);
    assert_eq!(fx.item(1).await.status, ItemStatus::AtDesk);
    assert!(fx.pending(1).await.is_empty());

    assert_eq!(
        service
            .cancel_expired_request_task(after_expiry)
            .await
            .expect("second sweep"),
        0
    );
}
