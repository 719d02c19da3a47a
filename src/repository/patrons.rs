//! Patron repository contract

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    error::CirculationResult,
    models::patron::{Patron, PatronType},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PatronRepository: Send + Sync {
    async fn get_patron(&self, id: i32) -> CirculationResult<Patron>;

    async fn get_patron_type(&self, id: i32) -> CirculationResult<PatronType>;

    /// Sum of the patron's unpaid fees
    async fn unpaid_fee_total(&self, patron_id: i32) -> CirculationResult<Decimal>;
}
