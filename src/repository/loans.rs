//! Loan repository contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::CirculationResult,
    models::{enums::LoanState, loan::Loan},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// Get loan by ID
    async fn get_loan(&self, id: i64) -> CirculationResult<Loan>;

    /// Insert or replace a loan
    async fn save_loan(&self, loan: &Loan) -> CirculationResult<()>;

    /// Pending loans of an item, oldest request first
    async fn find_pending_by_item(&self, item_id: i32) -> CirculationResult<Vec<Loan>>;

    /// A loan of `patron_id` on `item_id` in one of `states`
    async fn find_by_patron_and_item(
        &self,
        patron_id: i32,
        item_id: i32,
        states: &[LoanState],
    ) -> CirculationResult<Option<Loan>>;

    /// Loans of a patron in one of `states`
    async fn find_by_patron(
        &self,
        patron_id: i32,
        states: &[LoanState],
    ) -> CirculationResult<Vec<Loan>>;

    /// At-desk and in-transit-for-pickup loans whose request expired before `now`
    async fn find_expired_requests(&self, now: DateTime<Utc>) -> CirculationResult<Vec<Loan>>;
}
