//! Circulation policy source contract

use async_trait::async_trait;

use crate::{error::CirculationResult, models::policy::CirculationPolicy};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Every circulation policy defined by an organisation
    async fn policies_for_organisation(
        &self,
        organisation_id: i32,
    ) -> CirculationResult<Vec<CirculationPolicy>>;
}
