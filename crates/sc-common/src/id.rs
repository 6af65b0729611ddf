//! Client identity types.
//!
//! A client is identified by the integer id the enumerator assigns to it.
//! Ids are unique among live clients at any instant but may be reused once a
//! client disappears, so an id alone never proves two sightings are the same
//! process across a gap in observation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used by the human-facing composite display string.
pub const DISPLAY_SEPARATOR: &str = ", PID: ";

/// Client ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub i32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ClientId {
    fn from(id: i32) -> Self {
        ClientId(id)
    }
}

impl std::str::FromStr for ClientId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i32>().map(ClientId)
    }
}

/// One entry of an enumerator snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: String,
}

impl ClientRecord {
    pub fn new(id: impl Into<ClientId>, name: impl Into<String>) -> Self {
        ClientRecord {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Blank names (empty or whitespace-only) are never surfaced to the operator.
    pub fn has_blank_name(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// Composite `"{name}, PID: {id}"` label.
    ///
    /// Presentation only. Identity comparisons always go through [`ClientId`].
    pub fn display_label(&self) -> String {
        format!("{}{}{}", self.name, DISPLAY_SEPARATOR, self.id)
    }
}
