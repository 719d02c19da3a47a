//! Delivery seam for side-effect intents

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{error::CirculationResult, models::circulation::SideEffect};

/// Receives the intents of committed actions. Hosts plug their mailer or fee
/// ledger here; the core never waits on delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, effect: &SideEffect) -> CirculationResult<()>;
}

/// Sink that only logs intents
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn dispatch(&self, effect: &SideEffect) -> CirculationResult<()> {
        match effect {
            SideEffect::Notify { kind, loan_id } => {
                tracing::info!(kind = %kind, loan_id, "Notification intent");
            }
            SideEffect::CreateFee {
                loan_id,
                overdue_days,
            } => {
                tracing::info!(loan_id, overdue_days, "Fee intent");
            }
        }
        Ok(())
    }
}

/// Sink keeping every intent in memory, in dispatch order
#[derive(Debug, Default)]
pub struct RecordingSink {
    effects: Mutex<Vec<SideEffect>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn effects(&self) -> Vec<SideEffect> {
        self.effects.lock().await.clone()
    }

    /// Return and forget the recorded intents
    pub async fn drain(&self) -> Vec<SideEffect> {
        std::mem::take(&mut *self.effects.lock().await)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn dispatch(&self, effect: &SideEffect) -> CirculationResult<()> {
        self.effects.lock().await.push(effect.clone());
        Ok(())
    }
}
