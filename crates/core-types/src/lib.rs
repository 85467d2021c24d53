use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the kernel crates that only need to carry a message.
#[derive(Debug, Error, Clone)]
pub enum GhostError {
    #[error("{message}")]
    Message { message: String },
}

impl GhostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Identifies one page load. A full navigation always produces a new id.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageLoadId(pub String);

impl PageLoadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PageLoadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageLoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a single change-watcher subscription.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct WatchId(pub Uuid);

impl WatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
