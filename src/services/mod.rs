//! Business logic services

pub mod calendar;
pub mod circulation;
pub mod notifications;
pub mod policy;

use std::sync::Arc;

use crate::{config::CirculationConfig, repository::Repository};

use calendar::Calendar;
use circulation::{CirculationOrchestrator, CirculationService};
use notifications::NotificationSink;
use policy::PolicyResolver;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub policies: Arc<PolicyResolver>,
    pub calendar: Arc<dyn Calendar>,
    pub circulation: Arc<CirculationService>,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        calendar: Arc<dyn Calendar>,
        notifications: Arc<dyn NotificationSink>,
        config: &CirculationConfig,
    ) -> Self {
        let policies = Arc::new(PolicyResolver::new(repository.policies.clone()));
        let orchestrator = Arc::new(CirculationOrchestrator::new(
            repository.clone(),
            policies.clone(),
            calendar.clone(),
            config,
        ));
        let circulation = Arc::new(CirculationService::new(
            orchestrator,
            repository.store.clone(),
            repository.loans.clone(),
            notifications,
            config.system_user_id,
        ));

        Self {
            policies,
            calendar,
            circulation,
        }
    }
}
