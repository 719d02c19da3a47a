//! Repository layer: the collaborators the circulation core reads from and writes to

pub mod items;
pub mod loans;
pub mod locations;
pub mod memory;
pub mod patrons;
pub mod policies;
pub mod store;

use std::sync::Arc;

pub use items::ItemRepository;
pub use loans::LoanRepository;
pub use locations::LocationRepository;
pub use memory::{MemoryRepository, MemorySnapshot};
pub use patrons::PatronRepository;
pub use policies::PolicySource;
pub use store::CirculationStore;

/// Main repository struct holding every collaborator
#[derive(Clone)]
pub struct Repository {
    pub items: Arc<dyn ItemRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub patrons: Arc<dyn PatronRepository>,
    pub locations: Arc<dyn LocationRepository>,
    pub policies: Arc<dyn PolicySource>,
    pub store: Arc<dyn CirculationStore>,
}

impl Repository {
    /// Create a repository where every collaborator is the same in-memory store
    pub fn in_memory(memory: Arc<MemoryRepository>) -> Self {
        Self {
            items: memory.clone(),
            loans: memory.clone(),
            patrons: memory.clone(),
            locations: memory.clone(),
            policies: memory.clone(),
            store: memory,
        }
    }
}
