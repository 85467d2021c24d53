//! Value types exchanged between the host page and the watchers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a node resolved by a query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub id: u64,
    /// Selector the node was resolved with, kept for diagnostics.
    pub selector: String,
}

impl ElementHandle {
    pub fn new(id: u64, selector: impl Into<String>) -> Self {
        Self {
            id,
            selector: selector.into(),
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.id, self.selector)
    }
}

/// Synthetic events dispatched so the host's own listeners react to edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomEvent {
    Input,
    Change,
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
        }
    }
}

/// A single observed DOM mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationRecord {
    ChildList {
        target: u64,
    },
    Attribute {
        target: u64,
        name: String,
        value: Option<String>,
    },
}

/// Mutations delivered together, as a MutationObserver callback receives them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// New values of `attribute` on `target`, in record order.
    pub fn attribute_values<'a>(
        &'a self,
        target: u64,
        attribute: &'a str,
    ) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.records.iter().filter_map(move |record| match record {
            MutationRecord::Attribute {
                target: t,
                name,
                value,
            } if *t == target && name == attribute => Some(value.as_deref()),
            _ => None,
        })
    }
}

/// Page lifecycle transitions. A full navigation is `Unloading` followed by
/// `Loaded`; a fragment-only change keeps the document and fires `HashChanged`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PageLifecycle {
    Loaded { url: String },
    HashChanged { url: String },
    Unloading { url: String },
}
