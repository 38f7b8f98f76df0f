// Slot identifiers and the availability intersection used by the engine

use std::{cmp::Ordering, collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Opaque, totally ordered slot identifier.
///
/// The id is kept exactly as the service sent it, so it goes back out in the
/// same form on reserve and release. Numbers and all-digit strings order
/// numerically and sort before any other text, which orders lexically (ISO
/// timestamps therefore order chronologically).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotId {
    Number(u64),
    Text(String),
}

impl SlotId {
    // Numeric ids first by value; the raw text breaks ties ("7" vs "007")
    fn sort_key(&self) -> (bool, u64, &str) {
        match self {
            SlotId::Number(id) => (false, *id, ""),
            SlotId::Text(text) => match text.parse::<u64>() {
                Ok(id) if text.bytes().all(|b| b.is_ascii_digit()) => (false, id, text),
                _ => (true, 0, text),
            },
        }
    }
}

impl Ord for SlotId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for SlotId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::Number(id) => write!(f, "{id}"),
            SlotId::Text(text) => f.write_str(text),
        }
    }
}

impl From<u64> for SlotId {
    fn from(id: u64) -> Self {
        SlotId::Number(id)
    }
}

impl From<&str> for SlotId {
    fn from(id: &str) -> Self {
        SlotId::Text(id.to_string())
    }
}

impl From<String> for SlotId {
    fn from(id: String) -> Self {
        SlotId::Text(id)
    }
}

// A slot as listed by a service. Whether it is available or held depends on
// which listing it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
}

impl Slot {
    pub fn new(id: impl Into<SlotId>) -> Self {
        Self { id: id.into() }
    }
}

/// Ids present in both listings, ascending, at most `limit` of them.
pub fn common_slot_ids(first: &[Slot], second: &[Slot], limit: usize) -> Vec<SlotId> {
    let first_ids: BTreeSet<&SlotId> = first.iter().map(|slot| &slot.id).collect();

    second
        .iter()
        .map(|slot| &slot.id)
        .filter(|id| first_ids.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(limit)
        .cloned()
        .collect()
}
