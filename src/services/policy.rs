//! Circulation policy resolution with a read-through cache.
//!
//! Resolution order for (organisation, library, patron type, item type):
//! 1. a library-level policy listing the library and the (patron type, item type) pair,
//! 2. an organisation-level policy listing the pair,
//! 3. the organisation default policy.
//!
//! The cache is private to the resolver. Hosts call [`PolicyResolver::invalidate`]
//! or [`PolicyResolver::invalidate_organisation`] after editing policies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use validator::Validate;

use crate::{
    error::{CirculationError, CirculationResult},
    models::policy::CirculationPolicy,
    repository::PolicySource,
};

/// Lookup key of a resolved policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyKey {
    pub organisation_id: i32,
    pub library_id: i32,
    pub patron_type_id: i32,
    pub item_type_id: i32,
}

pub struct PolicyResolver {
    source: Arc<dyn PolicySource>,
    cache: RwLock<HashMap<PolicyKey, Arc<CirculationPolicy>>>,
}

impl PolicyResolver {
    pub fn new(source: Arc<dyn PolicySource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the policy applying to `key`
    pub async fn resolve(&self, key: PolicyKey) -> CirculationResult<Arc<CirculationPolicy>> {
        if let Some(policy) = self.cache.read().await.get(&key) {
            return Ok(policy.clone());
        }

        let policies = self.source.policies_for_organisation(key.organisation_id).await?;
        let valid: Vec<CirculationPolicy> = policies
            .into_iter()
            .filter(|p| match p.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Ignoring invalid circulation policy {}: {}", p.id, e);
                    false
                }
            })
            .collect();

        let policy = select_policy(&valid, &key).cloned().ok_or_else(|| {
            CirculationError::Configuration(format!(
                "No circulation policy for organisation {}",
                key.organisation_id
            ))
        })?;
        tracing::debug!("Resolved policy {} for {:?}", policy.id, key);

        let policy = Arc::new(policy);
        self.cache.write().await.insert(key, policy.clone());
        Ok(policy)
    }

    /// Drop every cached resolution
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }

    /// Drop cached resolutions of one organisation
    pub async fn invalidate_organisation(&self, organisation_id: i32) {
        self.cache
            .write()
            .await
            .retain(|key, _| key.organisation_id != organisation_id);
    }
}

/// Pick the most specific policy matching `key`
pub fn select_policy<'a>(
    policies: &'a [CirculationPolicy],
    key: &PolicyKey,
) -> Option<&'a CirculationPolicy> {
    let in_org = move || {
        policies
            .iter()
            .filter(move |p| p.organisation_id == key.organisation_id)
    };

    in_org()
        .find(|p| {
            p.covers_library(key.library_id) && p.applies_to(key.patron_type_id, key.item_type_id)
        })
        .or_else(|| {
            in_org().find(|p| {
                !p.policy_library_level && p.applies_to(key.patron_type_id, key.item_type_id)
            })
        })
        .or_else(|| in_org().find(|p| p.is_default))
}
