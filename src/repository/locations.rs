//! Location repository contract

use async_trait::async_trait;

use crate::{error::CirculationResult, models::location::Location};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn get_location(&self, id: i32) -> CirculationResult<Location>;
}
