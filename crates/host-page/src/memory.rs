//! In-process host page.
//!
//! `MemoryPage` keeps a small document tree, batches mutations the way a
//! MutationObserver sees them, and models navigation: fragment-only changes
//! keep the document, anything else unloads it and asks the installed
//! [`HostScript`] to render the next one. Session storage outlives
//! navigations. Tests and the demo host drive the workflow through it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::PageError;
use crate::page::{resolve_href, same_document, HostPage, SessionStorage};
use crate::selector::{Selector, SelectorTree};
use crate::types::{DomEvent, ElementHandle, MutationBatch, MutationRecord, PageLifecycle};

pub type NodeId = u64;

const CHANNEL_CAPACITY: usize = 256;

/// One element in the document.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub value: String,
    pub disabled: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().any(|x| x == class))
            .unwrap_or(false)
    }
}

/// Builder describing an element subtree to insert.
#[derive(Clone, Debug, Default)]
pub struct El {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    value: String,
    disabled: bool,
    children: Vec<El>,
}

impl El {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn child(mut self, child: El) -> Self {
        self.children.push(child);
        self
    }
}

/// Mutable node tree. Structural and attribute edits are recorded so the
/// owning page can publish them as one batch; property edits (`value`,
/// `disabled`) are not, matching how the DOM reports them.
#[derive(Debug)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    body: NodeId,
    next_id: NodeId,
    pending: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let body = Node {
            id: 1,
            tag: "body".to_string(),
            attributes: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            disabled: false,
            parent: None,
            children: Vec::new(),
        };
        let mut nodes = HashMap::new();
        nodes.insert(1, body);
        Self {
            nodes,
            body: 1,
            next_id: 2,
            pending: Vec::new(),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Insert `el` (and its children) as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, el: El) -> Option<NodeId> {
        if !self.nodes.contains_key(&parent) {
            return None;
        }
        let id = self.insert_subtree(parent, el);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        self.pending.push(MutationRecord::ChildList { target: parent });
        Some(id)
    }

    fn insert_subtree(&mut self, parent: NodeId, el: El) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        let El {
            tag,
            attributes,
            text,
            value,
            disabled,
            children,
        } = el;
        self.nodes.insert(
            id,
            Node {
                id,
                tag,
                attributes,
                text,
                value,
                disabled,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        for child in children {
            let child_id = self.insert_subtree(id, child);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(child_id);
            }
        }
        id
    }

    /// Detach `id` and drop its subtree. The body cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.body {
            return false;
        }
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
            }
        }
        self.pending.push(MutationRecord::ChildList { target: parent });
        true
    }

    /// Remove every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.remove(child);
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.attributes.insert(name.to_string(), value.clone());
        self.pending.push(MutationRecord::Attribute {
            target: id,
            name: name.to_string(),
            value: Some(value),
        });
        true
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.attributes.remove(name).is_none() {
            return false;
        }
        self.pending.push(MutationRecord::Attribute {
            target: id,
            name: name.to_string(),
            value: None,
        });
        true
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        let Some(current) = self.nodes.get(&id).and_then(|n| n.attributes.get("class")) else {
            return false;
        };
        if !current.split_whitespace().any(|c| c == class) {
            return false;
        }
        let next = current
            .split_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(id, "class", next)
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.text = text.into();
        self.pending.push(MutationRecord::ChildList { target: id });
        true
    }

    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn set_disabled(&mut self, id: NodeId, disabled: bool) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.disabled = disabled;
                true
            }
            None => false,
        }
    }

    /// Nodes under `root` (excluded) in document order.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn query(&self, selector: &Selector) -> Option<NodeId> {
        if selector.matches(self, self.body) {
            return Some(self.body);
        }
        self.query_within(self.body, selector)
    }

    pub fn query_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|id| selector.matches(self, *id))
    }

    pub fn query_all_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    pub fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    /// Text of the node followed by its descendants, one line per non-empty
    /// piece, roughly what `innerText` yields for block content.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut lines = Vec::new();
        if let Some(node) = self.nodes.get(&id) {
            if !node.text.is_empty() {
                lines.push(node.text.clone());
            }
        }
        for child in self.descendants(id) {
            if let Some(node) = self.nodes.get(&child) {
                if !node.text.is_empty() {
                    lines.push(node.text.clone());
                }
            }
        }
        lines.join("\n")
    }

    fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }
}

impl SelectorTree for Document {
    type Id = NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn tag(&self, node: NodeId) -> &str {
        self.nodes.get(&node).map(|n| n.tag.as_str()).unwrap_or("")
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }
}

/// Host-side behaviour for a [`MemoryPage`]: renders documents and reacts to
/// user actions. Implementations must not call back into the page while
/// holding their own locks across an await.
pub trait HostScript: Send + Sync {
    /// Render the document for a fresh load of `url`.
    fn load(&self, page: &MemoryPage, url: &str);

    /// The fragment changed without replacing the document.
    fn fragment_changed(&self, _page: &MemoryPage, _url: &str) {}

    /// An enabled node was clicked. Return `true` to suppress the default
    /// action (following an anchor's `href`).
    fn clicked(&self, _page: &MemoryPage, _node: NodeId) -> bool {
        false
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClickRecord {
    pub node: NodeId,
    pub tag: String,
    /// Disabled controls swallow clicks, as in the browser.
    pub ignored: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub node: NodeId,
    pub event: DomEvent,
}

#[derive(Default)]
struct PageState {
    url: String,
    doc: Document,
    loads: u64,
    clicks: Vec<ClickRecord>,
    events: Vec<EventRecord>,
    alerts: Vec<String>,
    navigations: Vec<String>,
}

struct Inner {
    state: Mutex<PageState>,
    storage: Mutex<HashMap<String, String>>,
    script: Mutex<Option<Arc<dyn HostScript>>>,
    mutations: broadcast::Sender<MutationBatch>,
    lifecycle: broadcast::Sender<PageLifecycle>,
}

/// Cheaply cloneable handle to one in-memory tab.
#[derive(Clone)]
pub struct MemoryPage {
    inner: Arc<Inner>,
}

impl MemoryPage {
    /// Blank page at `url` with no host behaviour.
    pub fn new(url: impl Into<String>) -> Self {
        let (mutations, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (lifecycle, _) = broadcast::channel(CHANNEL_CAPACITY);
        let state = PageState {
            url: url.into(),
            loads: 1,
            ..PageState::default()
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                storage: Mutex::new(HashMap::new()),
                script: Mutex::new(None),
                mutations,
                lifecycle,
            }),
        }
    }

    /// Page at `url` whose documents are rendered by `script`.
    pub fn with_script(url: impl Into<String>, script: Arc<dyn HostScript>) -> Self {
        let url = url.into();
        let page = Self::new(url.clone());
        *page.inner.script.lock() = Some(Arc::clone(&script));
        script.load(&page, &url);
        page
    }

    /// Apply `edit` to the document and publish what it changed as one batch.
    pub fn mutate<R>(&self, edit: impl FnOnce(&mut Document) -> R) -> R {
        let (result, records) = {
            let mut state = self.inner.state.lock();
            let result = edit(&mut state.doc);
            (result, state.doc.take_mutations())
        };
        if !records.is_empty() {
            trace!(count = records.len(), "publishing mutation batch");
            // No receivers simply means nobody is observing.
            let _ = self.inner.mutations.send(MutationBatch { records });
        }
        result
    }

    pub fn read<R>(&self, view: impl FnOnce(&Document) -> R) -> R {
        let state = self.inner.state.lock();
        view(&state.doc)
    }

    pub fn url(&self) -> String {
        self.inner.state.lock().url.clone()
    }

    /// Number of full document loads, the initial one included.
    pub fn load_count(&self) -> u64 {
        self.inner.state.lock().loads
    }

    pub fn clicks(&self) -> Vec<ClickRecord> {
        self.inner.state.lock().clicks.clone()
    }

    pub fn dispatched_events(&self) -> Vec<EventRecord> {
        self.inner.state.lock().events.clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.inner.state.lock().alerts.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.inner.state.lock().navigations.clone()
    }

    /// Snapshot of session storage.
    pub fn storage_snapshot(&self) -> HashMap<String, String> {
        self.inner.storage.lock().clone()
    }

    /// Drop session storage, as closing the tab would.
    pub fn end_session(&self) {
        self.inner.storage.lock().clear();
    }

    fn script(&self) -> Option<Arc<dyn HostScript>> {
        self.inner.script.lock().clone()
    }

    fn resolve(&self, selector: &str) -> Result<Selector, PageError> {
        Selector::parse(selector)
    }

    fn with_node<R>(
        &self,
        handle: &ElementHandle,
        view: impl FnOnce(&Node) -> R,
    ) -> Result<R, PageError> {
        let state = self.inner.state.lock();
        state
            .doc
            .get(handle.id)
            .map(view)
            .ok_or_else(|| PageError::stale(handle))
    }

    fn ensure_attached(&self, handle: &ElementHandle) -> Result<(), PageError> {
        self.with_node(handle, |_| ())
    }
}

#[async_trait]
impl HostPage for MemoryPage {
    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.url())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, PageError> {
        let parsed = self.resolve(selector)?;
        Ok(self
            .read(|doc| doc.query(&parsed))
            .map(|id| ElementHandle::new(id, selector)))
    }

    async fn query_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, PageError> {
        let parsed = self.resolve(selector)?;
        self.ensure_attached(scope)?;
        Ok(self
            .read(|doc| doc.query_within(scope.id, &parsed))
            .map(|id| ElementHandle::new(id, selector)))
    }

    async fn query_all_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, PageError> {
        let parsed = self.resolve(selector)?;
        self.ensure_attached(scope)?;
        Ok(self
            .read(|doc| doc.query_all_within(scope.id, &parsed))
            .into_iter()
            .map(|id| ElementHandle::new(id, selector))
            .collect())
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, PageError> {
        self.ensure_attached(element)?;
        Ok(self.read(|doc| doc.text_content(element.id)))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        self.with_node(element, |node| node.attributes.get(name).cloned())
    }

    async fn value(&self, element: &ElementHandle) -> Result<String, PageError> {
        self.with_node(element, |node| node.value.clone())
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), PageError> {
        if self.mutate(|doc| doc.set_value(element.id, value)) {
            Ok(())
        } else {
            Err(PageError::stale(element))
        }
    }

    async fn dispatch_event(
        &self,
        element: &ElementHandle,
        event: DomEvent,
    ) -> Result<(), PageError> {
        self.ensure_attached(element)?;
        self.inner.state.lock().events.push(EventRecord {
            node: element.id,
            event,
        });
        Ok(())
    }

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool, PageError> {
        self.with_node(element, |node| node.disabled)
    }

    async fn force_enable(&self, element: &ElementHandle) -> Result<(), PageError> {
        let attached = self.mutate(|doc| {
            let attached = doc.set_disabled(element.id, false);
            doc.remove_class(element.id, "disabled");
            attached
        });
        if attached {
            Ok(())
        } else {
            Err(PageError::stale(element))
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        let (tag, disabled, href) = self.with_node(element, |node| {
            (
                node.tag.clone(),
                node.disabled,
                node.attributes.get("href").cloned(),
            )
        })?;
        self.inner.state.lock().clicks.push(ClickRecord {
            node: element.id,
            tag: tag.clone(),
            ignored: disabled,
        });
        if disabled {
            debug!(element = %element, "click on disabled control ignored");
            return Ok(());
        }

        let handled = match self.script() {
            Some(script) => script.clicked(self, element.id),
            None => false,
        };
        if !handled && tag.eq_ignore_ascii_case("a") {
            if let Some(href) = href {
                let target = resolve_href(&self.url(), &href);
                return self.navigate(&target).await;
            }
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        let previous = {
            let mut state = self.inner.state.lock();
            state.navigations.push(url.to_string());
            state.url.clone()
        };
        let script = self.script();

        if same_document(&previous, url) {
            self.inner.state.lock().url = url.to_string();
            let _ = self.inner.lifecycle.send(PageLifecycle::HashChanged {
                url: url.to_string(),
            });
            if let Some(script) = script {
                script.fragment_changed(self, url);
            }
            return Ok(());
        }

        let _ = self
            .inner
            .lifecycle
            .send(PageLifecycle::Unloading { url: previous });
        {
            let mut state = self.inner.state.lock();
            state.doc = Document::new();
            state.url = url.to_string();
            state.loads += 1;
        }
        if let Some(script) = script {
            script.load(self, url);
        }
        let _ = self.inner.lifecycle.send(PageLifecycle::Loaded {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn alert(&self, message: &str) -> Result<(), PageError> {
        self.inner.state.lock().alerts.push(message.to_string());
        Ok(())
    }

    fn mutations(&self) -> broadcast::Receiver<MutationBatch> {
        self.inner.mutations.subscribe()
    }

    fn lifecycle(&self) -> broadcast::Receiver<PageLifecycle> {
        self.inner.lifecycle.subscribe()
    }

    fn mutation_observer_count(&self) -> usize {
        self.inner.mutations.receiver_count()
    }
}

#[async_trait]
impl SessionStorage for MemoryPage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, PageError> {
        Ok(self.inner.storage.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), PageError> {
        self.inner
            .storage
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), PageError> {
        self.inner.storage.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_page() -> MemoryPage {
        let page = MemoryPage::new("https://www.torn.com/index.php");
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(
                body,
                El::new("span").id("user-money").attr("data-money", "1000"),
            );
        });
        page
    }

    #[tokio::test]
    async fn query_and_read_attribute() {
        let page = wallet_page();
        let handle = page.query("#user-money").await.unwrap().unwrap();
        assert_eq!(
            page.attribute(&handle, "data-money").await.unwrap(),
            Some("1000".to_string())
        );
        assert!(page.query("#missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attribute_edits_are_batched() {
        let page = wallet_page();
        let mut rx = page.mutations();
        let id = page.read(|doc| doc.query(&Selector::parse("#user-money").unwrap()));
        let id = id.unwrap();
        page.mutate(|doc| {
            doc.set_attribute(id, "data-money", "400");
            doc.set_attribute(id, "data-money", "300");
        });
        let batch = rx.recv().await.unwrap();
        let values: Vec<_> = batch.attribute_values(id, "data-money").collect();
        assert_eq!(values, vec![Some("400"), Some("300")]);
    }

    #[tokio::test]
    async fn removed_nodes_make_handles_stale() {
        let page = wallet_page();
        let handle = page.query("#user-money").await.unwrap().unwrap();
        page.mutate(|doc| doc.remove(handle.id));
        let err = page.value(&handle).await.unwrap_err();
        assert_eq!(err.kind, crate::PageErrorKind::StaleHandle);
        assert!(err.retriable);
    }

    #[tokio::test]
    async fn disabled_controls_swallow_clicks_until_enabled() {
        let page = MemoryPage::new("https://www.torn.com/trade.php");
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(
                body,
                El::new("input")
                    .attr("type", "submit")
                    .class("torn-btn disabled")
                    .disabled(true),
            );
        });
        let button = page.query("input.torn-btn").await.unwrap().unwrap();
        page.click(&button).await.unwrap();
        page.force_enable(&button).await.unwrap();
        assert!(!page.is_disabled(&button).await.unwrap());
        assert!(page.query("input.disabled").await.unwrap().is_none());
        page.click(&button).await.unwrap();
        let clicks = page.clicks();
        assert_eq!(clicks.len(), 2);
        assert!(clicks[0].ignored);
        assert!(!clicks[1].ignored);
    }

    #[tokio::test]
    async fn navigation_keeps_storage_and_reports_lifecycle() {
        let page = wallet_page();
        page.set_item("k", "42").await.unwrap();
        let mut lifecycle = page.lifecycle();

        page.navigate("https://www.torn.com/index.php#top")
            .await
            .unwrap();
        assert!(matches!(
            lifecycle.recv().await.unwrap(),
            PageLifecycle::HashChanged { .. }
        ));
        assert!(page.query("#user-money").await.unwrap().is_some());

        page.navigate("https://www.torn.com/trade.php").await.unwrap();
        assert!(matches!(
            lifecycle.recv().await.unwrap(),
            PageLifecycle::Unloading { .. }
        ));
        assert!(matches!(
            lifecycle.recv().await.unwrap(),
            PageLifecycle::Loaded { .. }
        ));
        assert!(page.query("#user-money").await.unwrap().is_none());
        assert_eq!(page.get_item("k").await.unwrap(), Some("42".to_string()));
        assert_eq!(page.load_count(), 2);
    }

    #[tokio::test]
    async fn anchor_click_follows_href() {
        let page = MemoryPage::new("https://www.torn.com/trade.php#step=start");
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(body, El::new("a").attr("href", "trade.php#step=view&ID=5"));
        });
        let link = page.query("a").await.unwrap().unwrap();
        page.click(&link).await.unwrap();
        assert_eq!(page.url(), "https://www.torn.com/trade.php#step=view&ID=5");
        assert_eq!(page.load_count(), 1);
    }

    #[test]
    fn text_content_joins_descendants() {
        let mut doc = Document::new();
        let body = doc.body();
        let list = doc
            .append(
                body,
                El::new("ul")
                    .child(El::new("li").text("Trade with Bob"))
                    .child(El::new("li").text("Description: Auto Ghost Trade")),
            )
            .unwrap();
        assert_eq!(
            doc.text_content(list),
            "Trade with Bob\nDescription: Auto Ghost Trade"
        );
    }
}
