//! The host page contract consumed by the workflow engine.

use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use crate::error::PageError;
use crate::types::{DomEvent, ElementHandle, MutationBatch, PageLifecycle};

/// Eventually-consistent view of the third-party page. Selectors are the
/// wire format; nothing here knows what the host's markup means.
#[async_trait]
pub trait HostPage: Send + Sync {
    async fn current_url(&self) -> Result<String, PageError>;

    /// First node in document order matching `selector`.
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, PageError>;

    /// First descendant of `scope` matching `selector`.
    async fn query_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, PageError>;

    /// Every descendant of `scope` matching `selector`, in document order.
    async fn query_all_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, PageError>;

    /// Rendered text of the node and its descendants.
    async fn text_content(&self, element: &ElementHandle) -> Result<String, PageError>;

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    /// Current `value` property of a form control.
    async fn value(&self, element: &ElementHandle) -> Result<String, PageError>;

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), PageError>;

    /// Dispatch a bubbling synthetic event on the element.
    async fn dispatch_event(&self, element: &ElementHandle, event: DomEvent)
        -> Result<(), PageError>;

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool, PageError>;

    /// Clear the `disabled` property and drop a `disabled` class if present.
    async fn force_enable(&self, element: &ElementHandle) -> Result<(), PageError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError>;

    /// Point the page at `url`. Whether this replaces the document is
    /// reported through [`HostPage::lifecycle`].
    async fn navigate(&self, url: &str) -> Result<(), PageError>;

    /// Show a blocking message to the user.
    async fn alert(&self, message: &str) -> Result<(), PageError>;

    /// Subscribe to document-wide mutation batches. Dropping the receiver
    /// disconnects the observer.
    fn mutations(&self) -> broadcast::Receiver<MutationBatch>;

    fn lifecycle(&self) -> broadcast::Receiver<PageLifecycle>;

    /// Number of live mutation subscriptions.
    fn mutation_observer_count(&self) -> usize;
}

/// Key/value storage scoped to the browsing session. Survives navigation,
/// not a browser restart.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, PageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), PageError>;
    async fn remove_item(&self, key: &str) -> Result<(), PageError>;
}

/// True when `a` and `b` only differ by fragment, i.e. moving from one to the
/// other keeps the current document.
pub fn same_document(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(mut left), Ok(mut right)) => {
            left.set_fragment(None);
            right.set_fragment(None);
            left == right
        }
        _ => strip_fragment(a) == strip_fragment(b),
    }
}

/// Resolve `href` the way an anchor click would, relative to `base`.
pub fn resolve_href(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map(|(head, _)| head).unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_only_changes_keep_document() {
        assert!(same_document(
            "https://www.torn.com/trade.php#step=start&userID=1",
            "https://www.torn.com/trade.php#step=view&ID=9"
        ));
        assert!(!same_document(
            "https://www.torn.com/trade.php#step=start",
            "https://www.torn.com/trade.php?reload=1#step=start"
        ));
        assert!(!same_document(
            "https://www.torn.com/index.php",
            "https://www.torn.com/trade.php"
        ));
    }

    #[test]
    fn relative_hrefs_resolve_against_base() {
        assert_eq!(
            resolve_href(
                "https://www.torn.com/trade.php#step=start",
                "trade.php#step=view&ID=42"
            ),
            "https://www.torn.com/trade.php#step=view&ID=42"
        );
        assert_eq!(
            resolve_href("https://www.torn.com/a/b.php", "/index.php"),
            "https://www.torn.com/index.php"
        );
    }
}
