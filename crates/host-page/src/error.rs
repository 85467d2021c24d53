//! Error type surfaced by host page implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::ElementHandle;

/// High-level error categories surfaced by a host page.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageErrorKind {
    #[error("invalid selector")]
    InvalidSelector,
    #[error("element is no longer attached")]
    StaleHandle,
    #[error("page script failed")]
    Script,
    #[error("browser transport failure")]
    Transport,
    #[error("page closed")]
    Closed,
}

/// Enriched error metadata passed back to callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageError {
    pub kind: PageErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for PageError {}

impl PageError {
    pub fn new(kind: PageErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn invalid_selector(selector: &str, reason: impl fmt::Display) -> Self {
        Self::new(PageErrorKind::InvalidSelector).with_hint(format!("{selector:?}: {reason}"))
    }

    /// The node behind `handle` went away; a fresh query may find its replacement.
    pub fn stale(handle: &ElementHandle) -> Self {
        Self::new(PageErrorKind::StaleHandle)
            .with_hint(handle.to_string())
            .retriable(true)
    }

    pub fn script(hint: impl Into<String>) -> Self {
        Self::new(PageErrorKind::Script).with_hint(hint)
    }

    pub fn transport(hint: impl Into<String>) -> Self {
        Self::new(PageErrorKind::Transport)
            .with_hint(hint)
            .retriable(true)
    }
}
