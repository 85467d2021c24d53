//! Host page contract for ghost-trader.
//!
//! Everything the workflow knows about the third-party application goes
//! through [`HostPage`] and [`SessionStorage`]. Two implementations ship:
//! - [`MemoryPage`]: an in-process document used by tests and the demo
//! - `CdpPage` (feature `cdp`): a Chromium tab driven over DevTools

pub mod error;
pub mod memory;
pub mod page;
pub mod selector;
pub mod types;

#[cfg(feature = "cdp")]
pub mod cdp;

pub use error::{PageError, PageErrorKind};
pub use memory::{ClickRecord, Document, El, EventRecord, HostScript, MemoryPage, NodeId};
pub use page::{resolve_href, same_document, HostPage, SessionStorage};
pub use selector::{Selector, SelectorTree};
pub use types::{DomEvent, ElementHandle, MutationBatch, MutationRecord, PageLifecycle};

#[cfg(feature = "cdp")]
pub use cdp::{CdpBrowser, CdpPage, CdpSettings};
