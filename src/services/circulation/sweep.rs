//! Scheduled cancellation of requests nobody picked up

use chrono::{DateTime, Utc};

use crate::{
    error::CirculationResult,
    models::circulation::{ActionContext, ActionOutcome, CancelParams},
};

use super::CirculationService;

impl CirculationService {
    /// Cancel every at-desk or in-transit-for-pickup request whose expiry
    /// date passed before `now`. Returns the number of cancelled loans.
    ///
    /// Each loan goes through the ordinary cancel action, so the item is
    /// handed to the next request or sent back. Failures are logged and
    /// skipped.
    pub async fn cancel_expired_request_task(&self, now: DateTime<Utc>) -> CirculationResult<usize> {
        let expired = self.loans.find_expired_requests(now).await?;
        if expired.is_empty() {
            tracing::debug!("No expired requests");
            return Ok(0);
        }
        tracing::info!("Cancelling {} expired request(s)", expired.len());

        let mut cancelled = 0;
        for loan in expired {
            let ctx = ActionContext {
                organisation_id: loan.organisation_id,
                transaction_location_id: loan.transaction_location_id,
                transaction_user_id: self.system_user_id,
                transaction_date: now,
                override_blocking: false,
                expected_item_version: None,
            };
            let params = CancelParams {
                item_id: loan.item_id,
                loan_id: loan.id,
                patron_id: None,
            };
            match self.cancel(&ctx, params).await {
                Ok(ActionOutcome::Applied(_)) => cancelled += 1,
                Ok(ActionOutcome::NoAction { reason }) => {
                    tracing::debug!("Expired loan {} left as is: {:?}", loan.id, reason);
                }
                Err(e) => {
                    tracing::error!("Failed to cancel expired loan {}: {}", loan.id, e);
                }
            }
        }
        Ok(cancelled)
    }
}
