//! Location model

use serde::{Deserialize, Serialize};

/// A shelving or pickup location inside a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i32,
    pub library_id: i32,
    pub name: String,
    /// Items shelved here may be requested
    #[serde(default = "default_true")]
    pub allow_request: bool,
    /// Patrons may pick requested items up here
    #[serde(default)]
    pub is_pickup: bool,
}

fn default_true() -> bool {
    true
}
