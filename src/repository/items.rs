//! Item repository contract

use async_trait::async_trait;

use crate::{
    error::CirculationResult,
    models::{item::Item, loan::Loan},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Get item by ID
    async fn get_item(&self, id: i32) -> CirculationResult<Item>;

    /// Insert or replace an item
    async fn save_item(&self, item: &Item) -> CirculationResult<()>;

    /// The loan currently occupying the item, if any
    async fn get_active_loan(&self, item_id: i32) -> CirculationResult<Option<Loan>>;
}
