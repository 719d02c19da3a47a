//! Atomic write seam

use async_trait::async_trait;

use crate::{error::CirculationResult, models::circulation::Changeset};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CirculationStore: Send + Sync {
    /// Persist every record of the changeset or none of them.
    ///
    /// Each record carries its new version; the stored version must be
    /// exactly one less (zero for records that do not exist yet), otherwise
    /// the commit fails with `ConcurrentModification`.
    async fn commit(&self, changes: &Changeset) -> CirculationResult<()>;
}
