//! The workflow's only memory across navigations.
//!
//! A pending [`Intent`] lives in session storage under a single key. It is
//! written when the user submits an amount and removed only after the final
//! confirmation; every page load derives a [`ResumeSignal`] from it.

use std::fmt;
use std::sync::Arc;

use host_page::{PageError, SessionStorage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Storage key used when none is configured.
pub const DEFAULT_INTENT_KEY: &str = "ghostTradeAmount";

/// A user-requested amount awaiting the workflow. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Intent {
    amount: u64,
}

impl Intent {
    pub fn new(amount: u64) -> Option<Self> {
        (amount > 0).then_some(Self { amount })
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }
}

impl TryFrom<u64> for Intent {
    type Error = IntentError;

    fn try_from(amount: u64) -> Result<Self, Self::Error> {
        Intent::new(amount).ok_or(IntentError::NonPositive)
    }
}

impl From<Intent> for u64 {
    fn from(intent: Intent) -> Self {
        intent.amount
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.amount)
    }
}

/// What a fresh page load should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeSignal {
    Resume(Intent),
    None,
}

impl ResumeSignal {
    pub fn intent(&self) -> Option<Intent> {
        match self {
            ResumeSignal::Resume(intent) => Some(*intent),
            ResumeSignal::None => None,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum IntentError {
    #[error("intent amount must be greater than 0")]
    NonPositive,

    #[error("session storage failed: {0}")]
    Storage(#[from] PageError),
}

impl IntentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, IntentError::Storage(err) if err.retriable)
    }
}

/// Single-slot, last-writer-wins store over session storage.
#[derive(Clone)]
pub struct IntentStore {
    storage: Arc<dyn SessionStorage>,
    key: String,
}

impl IntentStore {
    pub fn new(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn with_default_key(storage: Arc<dyn SessionStorage>) -> Self {
        Self::new(storage, DEFAULT_INTENT_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Overwrite any pending intent with `amount`.
    pub async fn save(&self, amount: u64) -> Result<Intent, IntentError> {
        let intent = Intent::try_from(amount)?;
        self.storage
            .set_item(&self.key, &intent.amount.to_string())
            .await?;
        debug!(key = %self.key, amount, "intent saved");
        Ok(intent)
    }

    /// Pending intent, if any. Unreadable values count as absent.
    pub async fn load(&self) -> Result<Option<Intent>, IntentError> {
        let Some(raw) = self.storage.get_item(&self.key).await? else {
            return Ok(None);
        };
        let parsed = raw.trim().parse::<u64>().ok().and_then(Intent::new);
        if parsed.is_none() {
            warn!(key = %self.key, stored = %raw, "ignoring unusable stored intent");
        }
        Ok(parsed)
    }

    pub async fn clear(&self) -> Result<(), IntentError> {
        self.storage.remove_item(&self.key).await?;
        debug!(key = %self.key, "intent cleared");
        Ok(())
    }

    pub async fn resume_signal(&self) -> Result<ResumeSignal, IntentError> {
        Ok(match self.load().await? {
            Some(intent) => ResumeSignal::Resume(intent),
            None => ResumeSignal::None,
        })
    }
}
