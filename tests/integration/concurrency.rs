//! Races on one item

use ils_circulation::{
    error::CirculationError,
    models::{circulation::CheckoutParams, enums::ItemStatus},
    repository::{CirculationStore, ItemRepository},
};

use crate::common::*;

fn checkout(item_id: i32, patron_id: i32) -> CheckoutParams {
    CheckoutParams {
        item_id,
        patron_id,
        loan_id: None,
        pickup_location_id: None,
    }
}

#[tokio::test]
async fn test_concurrent_checkouts_only_one_wins() {
    let fx = Fixture::new().await;
    let service = fx.service();
    let first_ctx = ctx(MAIN_DESK, now());
    let second_ctx = ctx(MAIN_DESK, now());

    let (first, second) = tokio::join!(
        service.checkout(&first_ctx, checkout(1, 1)),
        service.checkout(&second_ctx, checkout(1, 2)),
    );

    let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(
        loser,
        Err(CirculationError::InvalidTransition { .. })
    ));

    assert_eq!(fx.item(1).await.status, ItemStatus::OnLoan);
    assert!(fx.memory.get_active_loan(1).await.expect("single active loan").is_some());
    fx.assert_single_active(1).await;
}

#[tokio::test]
async fn test_changeset_built_on_stale_state_is_rejected() {
    let fx = Fixture::new().await;
    let orchestrator = fx.service().orchestrator();

    // Both actions read the item at version 0
    let first = applied(
        orchestrator
            .checkout(&ctx(MAIN_DESK, now()), &checkout(1, 1))
            .await
            .expect("first checkout"),
    );
    let second = applied(
        orchestrator
            .checkout(&ctx(MAIN_DESK, now()), &checkout(1, 2))
            .await
            .expect("second checkout"),
    );

    fx.memory
        .commit(&first.changeset())
        .await
        .expect("first commit");
    let err = fx
        .memory
        .commit(&second.changeset())
        .await
        .expect_err("second commit");
    assert!(matches!(
        err,
        CirculationError::ConcurrentModification { entity: "item", .. }
    ));

    let active = fx.memory.get_active_loan(1).await.expect("active loan");
    assert_eq!(active.map(|l| l.patron_id), Some(1));
}
