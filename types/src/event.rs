//! Protocol events as returned by the aggregation server.
//!
//! Events are carried as opaque, already-signed records: nothing in this
//! workspace verifies `id` or `sig`.

use serde::{Deserialize, Serialize};

use crate::{PublicKey, Timestamp};

/// A single event from the federated network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Hex event id.
    pub id: String,
    /// Author of the event.
    pub pubkey: PublicKey,
    pub created_at: Timestamp,
    pub kind: u32,
    /// Tags as sent on the wire: `[name, value, ...]`.
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl Event {
    /// Values (second element) of every tag named `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
            .filter_map(|t| t.get(1).map(String::as_str))
    }

    /// The `d` tag identifier of a parameterized replaceable event.
    pub fn identifier(&self) -> Option<&str> {
        self.tag_values("d").next()
    }
}
