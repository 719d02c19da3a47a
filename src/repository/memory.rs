//! In-memory implementation of every repository contract.
//!
//! Backs the sweep daemon (through JSON snapshots) and the integration tests.
//! All state sits behind a single lock, so `commit` is trivially atomic.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{
    CirculationStore, ItemRepository, LoanRepository, LocationRepository, PatronRepository,
    PolicySource,
};
use crate::{
    error::{CirculationError, CirculationResult},
    models::{
        circulation::Changeset,
        enums::LoanState,
        item::Item,
        loan::Loan,
        location::Location,
        patron::{Patron, PatronType},
        policy::CirculationPolicy,
        schedule::LibrarySchedule,
    },
};

/// An amount owed by a patron
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub patron_id: i32,
    pub loan_id: Option<i64>,
    pub amount: Decimal,
    #[serde(default)]
    pub paid: bool,
}

/// Serializable content of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub patrons: Vec<Patron>,
    #[serde(default)]
    pub patron_types: Vec<PatronType>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub policies: Vec<CirculationPolicy>,
    #[serde(default)]
    pub fees: Vec<Fee>,
    #[serde(default)]
    pub schedules: Vec<LibrarySchedule>,
}

impl MemorySnapshot {
    /// Read a snapshot from a JSON file; a missing file is an empty snapshot
    pub fn load(path: impl AsRef<Path>) -> CirculationResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("Snapshot {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the snapshot as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> CirculationResult<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    items: IndexMap<i32, Item>,
    loans: IndexMap<i64, Loan>,
    patrons: IndexMap<i32, Patron>,
    patron_types: IndexMap<i32, PatronType>,
    locations: IndexMap<i32, Location>,
    policies: IndexMap<i32, CirculationPolicy>,
    fees: Vec<Fee>,
    schedules: Vec<LibrarySchedule>,
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

fn check_version(entity: &'static str, id: i64, stored: u64, new: u64) -> CirculationResult<()> {
    if new.checked_sub(1) == Some(stored) {
        Ok(())
    } else {
        Err(CirculationError::ConcurrentModification { entity, id })
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        let state = MemoryState {
            items: snapshot.items.into_iter().map(|i| (i.id, i)).collect(),
            loans: snapshot.loans.into_iter().map(|l| (l.id, l)).collect(),
            patrons: snapshot.patrons.into_iter().map(|p| (p.id, p)).collect(),
            patron_types: snapshot.patron_types.into_iter().map(|t| (t.id, t)).collect(),
            locations: snapshot.locations.into_iter().map(|l| (l.id, l)).collect(),
            policies: snapshot.policies.into_iter().map(|p| (p.id, p)).collect(),
            fees: snapshot.fees,
            schedules: snapshot.schedules,
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        let state = self.state.read().await;
        MemorySnapshot {
            items: state.items.values().cloned().collect(),
            loans: state.loans.values().cloned().collect(),
            patrons: state.patrons.values().cloned().collect(),
            patron_types: state.patron_types.values().cloned().collect(),
            locations: state.locations.values().cloned().collect(),
            policies: state.policies.values().cloned().collect(),
            fees: state.fees.clone(),
            schedules: state.schedules.clone(),
        }
    }

    pub async fn insert_patron(&self, patron: Patron) {
        self.state.write().await.patrons.insert(patron.id, patron);
    }

    pub async fn insert_patron_type(&self, patron_type: PatronType) {
        self.state
            .write()
            .await
            .patron_types
            .insert(patron_type.id, patron_type);
    }

    pub async fn insert_location(&self, location: Location) {
        self.state.write().await.locations.insert(location.id, location);
    }

    pub async fn insert_policy(&self, policy: CirculationPolicy) {
        self.state.write().await.policies.insert(policy.id, policy);
    }

    pub async fn add_fee(&self, fee: Fee) {
        self.state.write().await.fees.push(fee);
    }

    /// Every loan ever stored for an item
    pub async fn loans_of_item(&self, item_id: i32) -> Vec<Loan> {
        self.state
            .read()
            .await
            .loans
            .values()
            .filter(|l| l.item_id == item_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ItemRepository for MemoryRepository {
    async fn get_item(&self, id: i32) -> CirculationResult<Item> {
        self.state
            .read()
            .await
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| CirculationError::NotFound(format!("Item with id {} not found", id)))
    }

    async fn save_item(&self, item: &Item) -> CirculationResult<()> {
        self.state.write().await.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_active_loan(&self, item_id: i32) -> CirculationResult<Option<Loan>> {
        let state = self.state.read().await;
        let mut active = state
            .loans
            .values()
            .filter(|l| l.item_id == item_id && l.state.is_active());

        let first = active.next().cloned();
        if active.next().is_some() {
            return Err(CirculationError::Internal(format!(
                "Item {} has more than one active loan",
                item_id
            )));
        }
        Ok(first)
    }
}

#[async_trait]
impl LoanRepository for MemoryRepository {
    async fn get_loan(&self, id: i64) -> CirculationResult<Loan> {
        self.state
            .read()
            .await
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| CirculationError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn save_loan(&self, loan: &Loan) -> CirculationResult<()> {
        self.state.write().await.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    async fn find_pending_by_item(&self, item_id: i32) -> CirculationResult<Vec<Loan>> {
        let state = self.state.read().await;
        let mut pending: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.item_id == item_id && l.state == LoanState::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(Loan::queue_key);
        Ok(pending)
    }

    async fn find_by_patron_and_item(
        &self,
        patron_id: i32,
        item_id: i32,
        states: &[LoanState],
    ) -> CirculationResult<Option<Loan>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .values()
            .find(|l| l.patron_id == patron_id && l.item_id == item_id && states.contains(&l.state))
            .cloned())
    }

    async fn find_by_patron(
        &self,
        patron_id: i32,
        states: &[LoanState],
    ) -> CirculationResult<Vec<Loan>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .values()
            .filter(|l| l.patron_id == patron_id && states.contains(&l.state))
            .cloned()
            .collect())
    }

    async fn find_expired_requests(&self, now: DateTime<Utc>) -> CirculationResult<Vec<Loan>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .values()
            .filter(|l| {
                matches!(
                    l.state,
                    LoanState::ItemAtDesk | LoanState::ItemInTransitForPickup
                ) && l.request_expire_date.map(|d| d < now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PatronRepository for MemoryRepository {
    async fn get_patron(&self, id: i32) -> CirculationResult<Patron> {
        self.state
            .read()
            .await
            .patrons
            .get(&id)
            .cloned()
            .ok_or_else(|| CirculationError::NotFound(format!("Patron with id {} not found", id)))
    }

    async fn get_patron_type(&self, id: i32) -> CirculationResult<PatronType> {
        self.state
            .read()
            .await
            .patron_types
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                CirculationError::NotFound(format!("Patron type with id {} not found", id))
            })
    }

    async fn unpaid_fee_total(&self, patron_id: i32) -> CirculationResult<Decimal> {
        let state = self.state.read().await;
        Ok(state
            .fees
            .iter()
            .filter(|f| f.patron_id == patron_id && !f.paid)
            .map(|f| f.amount)
            .sum())
    }
}

#[async_trait]
impl LocationRepository for MemoryRepository {
    async fn get_location(&self, id: i32) -> CirculationResult<Location> {
        self.state
            .read()
            .await
            .locations
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                CirculationError::NotFound(format!("Location with id {} not found", id))
            })
    }
}

#[async_trait]
impl PolicySource for MemoryRepository {
    async fn policies_for_organisation(
        &self,
        organisation_id: i32,
    ) -> CirculationResult<Vec<CirculationPolicy>> {
        let state = self.state.read().await;
        Ok(state
            .policies
            .values()
            .filter(|p| p.organisation_id == organisation_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CirculationStore for MemoryRepository {
    async fn commit(&self, changes: &Changeset) -> CirculationResult<()> {
        let mut state = self.state.write().await;

        // Check every version before touching anything
        let stored_item = state.items.get(&changes.item.id).map(|i| i.version).unwrap_or(0);
        check_version("item", i64::from(changes.item.id), stored_item, changes.item.version)?;
        for loan in &changes.loans {
            let stored = state.loans.get(&loan.id).map(|l| l.version).unwrap_or(0);
            check_version("loan", loan.id, stored, loan.version)?;
        }

        state.items.insert(changes.item.id, changes.item.clone());
        for loan in &changes.loans {
            state.loans.insert(loan.id, loan.clone());
        }
        Ok(())
    }
}
