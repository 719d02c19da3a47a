//! Circulation: loan state machine, request queue, limits, transit routing
//! and the service that commits their results.

pub mod due_date;
pub mod limits;
pub mod orchestrator;
pub mod queue;
pub mod state_machine;
pub mod sweep;
pub mod transit;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::CirculationResult,
    models::circulation::{
        ActionContext, ActionOutcome, CancelParams, CheckoutParams, LoanParams, RequestParams,
    },
    repository::{CirculationStore, LoanRepository},
    services::notifications::NotificationSink,
};

pub use orchestrator::CirculationOrchestrator;
pub use queue::RequestQueue;

/// One async lock per item id
#[derive(Default)]
struct ItemLocks {
    locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl ItemLocks {
    async fn acquire(&self, item_id: i32) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Forget locks nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(item_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Runs orchestrator actions one at a time per item, commits their changes
/// and dispatches their side effects
pub struct CirculationService {
    orchestrator: Arc<CirculationOrchestrator>,
    store: Arc<dyn CirculationStore>,
    loans: Arc<dyn LoanRepository>,
    notifications: Arc<dyn NotificationSink>,
    locks: ItemLocks,
    system_user_id: i32,
}

impl CirculationService {
    pub fn new(
        orchestrator: Arc<CirculationOrchestrator>,
        store: Arc<dyn CirculationStore>,
        loans: Arc<dyn LoanRepository>,
        notifications: Arc<dyn NotificationSink>,
        system_user_id: i32,
    ) -> Self {
        Self {
            orchestrator,
            store,
            loans,
            notifications,
            locks: ItemLocks::default(),
            system_user_id,
        }
    }

    pub fn orchestrator(&self) -> &CirculationOrchestrator {
        &self.orchestrator
    }

    /// Create a pending request
    pub async fn request(
        &self,
        ctx: &ActionContext,
        params: RequestParams,
    ) -> CirculationResult<ActionOutcome> {
        let _guard = self.locks.acquire(params.item_id).await;
        let outcome = self.orchestrator.request(ctx, &params).await;
        self.finish(outcome).await
    }

    /// Validate the queue head
    pub async fn validate(
        &self,
        ctx: &ActionContext,
        params: LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let _guard = self.locks.acquire(params.item_id).await;
        let outcome = self.orchestrator.validate(ctx, &params).await;
        self.finish(outcome).await
    }

    pub async fn checkout(
        &self,
        ctx: &ActionContext,
        params: CheckoutParams,
    ) -> CirculationResult<ActionOutcome> {
        let _guard = self.locks.acquire(params.item_id).await;
        let outcome = self.orchestrator.checkout(ctx, &params).await;
        self.finish(outcome).await
    }

    pub async fn checkin(
        &self,
        ctx: &ActionContext,
        params: LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let _guard = self.locks.acquire(params.item_id).await;
        let outcome = self.orchestrator.checkin(ctx, &params).await;
        self.finish(outcome).await
    }

    /// Renew an on-loan item
    pub async fn extend(
        &self,
        ctx: &ActionContext,
        params: LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let _guard = self.locks.acquire(params.item_id).await;
        let outcome = self.orchestrator.extend(ctx, &params).await;
        self.finish(outcome).await
    }

    pub async fn cancel(
        &self,
        ctx: &ActionContext,
        params: CancelParams,
    ) -> CirculationResult<ActionOutcome> {
        let _guard = self.locks.acquire(params.item_id).await;
        let outcome = self.orchestrator.cancel(ctx, &params).await;
        self.finish(outcome).await
    }

    /// Register the arrival of an item in transit
    pub async fn receive(
        &self,
        ctx: &ActionContext,
        params: LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let _guard = self.locks.acquire(params.item_id).await;
        let outcome = self.orchestrator.receive(ctx, &params).await;
        self.finish(outcome).await
    }

    async fn finish(
        &self,
        outcome: CirculationResult<ActionOutcome>,
    ) -> CirculationResult<ActionOutcome> {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_business_rule() {
                    tracing::debug!("Circulation action rejected: {}", e);
                } else {
                    tracing::error!("Circulation action failed: {}", e);
                }
                return Err(e);
            }
        };

        let Some(report) = outcome.report() else {
            return Ok(outcome);
        };
        self.store.commit(&report.changeset()).await?;

        for effect in &report.side_effects {
            if let Err(e) = self.notifications.dispatch(effect).await {
                tracing::warn!("Failed to dispatch {:?}: {}", effect, e);
            }
        }
        Ok(outcome)
    }
}
