//! Chromium-backed host page.
//!
//! A bridge script is installed on every new document. It keeps a handle
//! table (so queries never mutate the DOM to tag nodes) and a document-wide
//! MutationObserver whose batches are buffered in the page. A pump task
//! drains that buffer and turns document identity changes into lifecycle
//! events.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PageError, PageErrorKind};
use crate::page::{same_document, HostPage, SessionStorage};
use crate::types::{DomEvent, ElementHandle, MutationBatch, MutationRecord, PageLifecycle};

const CHANNEL_CAPACITY: usize = 256;

const BRIDGE_SCRIPT: &str = r#"
(() => {
  if (window.__ghostBridge) return;
  const bridge = {
    doc: Math.random().toString(36).slice(2) + Date.now().toString(36),
    next: 1,
    ids: new WeakMap(),
    nodes: new Map(),
    batches: [],
    track(el) {
      if (!el) return null;
      let id = this.ids.get(el);
      if (!id) {
        id = this.next++;
        this.ids.set(el, id);
        this.nodes.set(id, new WeakRef(el));
      }
      return id;
    },
    node(id) {
      const ref = this.nodes.get(id);
      const el = ref && ref.deref();
      return el && el.isConnected ? el : null;
    },
  };
  Object.defineProperty(window, '__ghostBridge', { value: bridge });
  const start = () => {
    new MutationObserver((mutations) => {
      const records = [];
      for (const m of mutations) {
        if (m.type === 'attributes') {
          records.push({
            kind: 'attribute',
            target: bridge.track(m.target),
            name: m.attributeName,
            value: m.target.getAttribute(m.attributeName),
          });
        } else {
          records.push({ kind: 'child_list', target: bridge.track(m.target) });
        }
      }
      bridge.batches.push({ records });
    }).observe(document.documentElement, { childList: true, subtree: true, attributes: true });
  };
  if (document.documentElement) start();
  else document.addEventListener('readystatechange', start, { once: true });
})();
"#;

const DRAIN_SCRIPT: &str = r#"(() => {
  const b = window.__ghostBridge;
  if (!b) return { stale: true };
  return { value: { doc: b.doc, href: location.href, batches: b.batches.splice(0) } };
})()"#;

/// Launch/attach settings for Chromium.
#[derive(Clone, Debug)]
pub struct CdpSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    /// How often mutation batches and document identity are drained.
    pub pump_interval: Duration,
}

impl Default for CdpSettings {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            user_data_dir: None,
            websocket_url: None,
            pump_interval: Duration::from_millis(100),
        }
    }
}

/// A running (or attached) Chromium instance.
pub struct CdpBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    pump_interval: Duration,
}

impl CdpBrowser {
    pub async fn launch(settings: &CdpSettings) -> Result<Self, PageError> {
        let (browser, mut handler) = match &settings.websocket_url {
            Some(ws) => {
                info!(url = %ws, "attaching to running browser");
                Browser::connect(ws.clone())
                    .await
                    .map_err(|err| PageError::transport(err.to_string()))?
            }
            None => {
                let mut builder = BrowserConfig::builder();
                if !settings.headless {
                    builder = builder.with_head();
                }
                if let Some(path) = &settings.executable {
                    builder = builder.chrome_executable(path);
                }
                if let Some(dir) = &settings.user_data_dir {
                    builder = builder.user_data_dir(dir);
                }
                let config = builder.build().map_err(PageError::transport)?;
                info!(headless = settings.headless, "launching browser");
                Browser::launch(config)
                    .await
                    .map_err(|err| PageError::transport(err.to_string()))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(error = %err, "browser handler stopped");
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            pump_interval: settings.pump_interval,
        })
    }

    /// Open a tab at `url` with the bridge installed.
    pub async fn open(&self, url: &str) -> Result<CdpPage, PageError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|err| PageError::transport(err.to_string()))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(BRIDGE_SCRIPT))
            .await
            .map_err(|err| PageError::transport(err.to_string()))?;
        page.goto(url)
            .await
            .map_err(|err| PageError::transport(err.to_string()))?;
        // The document loaded by goto may predate the registration.
        page.evaluate(BRIDGE_SCRIPT)
            .await
            .map_err(|err| PageError::script(err.to_string()))?;
        Ok(CdpPage::start(page, self.pump_interval))
    }

    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            debug!(error = %err, "browser close failed");
        }
        self.handler.abort();
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Reply<T> {
    #[serde(default)]
    stale: bool,
    #[serde(default)]
    value: Option<T>,
}

#[derive(Deserialize)]
struct Drained {
    doc: String,
    href: String,
    batches: Vec<MutationBatch>,
}

/// Evaluate `script` (an expression producing a `{stale}`/`{value}` object)
/// and decode the reply. Results travel as JSON text so `null`/`undefined`
/// never reach the protocol layer.
async fn reply<T: DeserializeOwned>(page: &Page, script: &str) -> Result<Reply<T>, PageError> {
    let expr = format!("JSON.stringify({script})");
    let result = page
        .evaluate(expr)
        .await
        .map_err(|err| PageError::script(err.to_string()))?;
    let raw: String = result
        .into_value()
        .map_err(|err| PageError::script(format!("unexpected evaluation result: {err}")))?;
    serde_json::from_str(&raw)
        .map_err(|err| PageError::script(format!("undecodable reply {raw:?}: {err}")))
}

fn js_string(value: &str) -> String {
    // serde_json string encoding is a valid JS string literal.
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Chromium tab implementing [`HostPage`] and [`SessionStorage`].
pub struct CdpPage {
    page: Page,
    mutations: broadcast::Sender<MutationBatch>,
    lifecycle: broadcast::Sender<PageLifecycle>,
    unload_announced: Arc<AtomicBool>,
    pump: CancellationToken,
}

impl CdpPage {
    fn start(page: Page, interval: Duration) -> Self {
        let (mutations, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (lifecycle, _) = broadcast::channel(CHANNEL_CAPACITY);
        let unload_announced = Arc::new(AtomicBool::new(false));
        let pump = CancellationToken::new();

        tokio::spawn(run_pump(
            page.clone(),
            mutations.clone(),
            lifecycle.clone(),
            Arc::clone(&unload_announced),
            pump.clone(),
            interval,
        ));

        Self {
            page,
            mutations,
            lifecycle,
            unload_announced,
            pump,
        }
    }

    async fn on_element<T: DeserializeOwned>(
        &self,
        element: &ElementHandle,
        body: &str,
    ) -> Result<Option<T>, PageError> {
        let script = format!(
            "(() => {{ const b = window.__ghostBridge; if (!b) return {{ stale: true }}; \
             const el = b.node({id}); if (!el) return {{ stale: true }}; {body} }})()",
            id = element.id
        );
        let reply: Reply<T> = reply(&self.page, &script).await?;
        if reply.stale {
            return Err(PageError::stale(element));
        }
        Ok(reply.value)
    }

    async fn bridge<T: DeserializeOwned>(&self, body: &str) -> Result<Option<T>, PageError> {
        let script = format!(
            "(() => {{ const b = window.__ghostBridge; if (!b) return {{ stale: true }}; {body} }})()"
        );
        let reply: Reply<T> = reply(&self.page, &script).await?;
        if reply.stale {
            return Err(PageError::new(PageErrorKind::Script)
                .with_hint("bridge not installed in current document")
                .retriable(true));
        }
        Ok(reply.value)
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        self.pump.cancel();
    }
}

async fn run_pump(
    page: Page,
    mutations: broadcast::Sender<MutationBatch>,
    lifecycle: broadcast::Sender<PageLifecycle>,
    unload_announced: Arc<AtomicBool>,
    cancel: CancellationToken,
    interval: Duration,
) {
    let mut last: Option<(String, String)> = None;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let drained = match reply::<Drained>(&page, DRAIN_SCRIPT).await {
            Ok(Reply {
                value: Some(drained),
                ..
            }) => drained,
            // Bridge absent: a navigation is in flight.
            Ok(_) => continue,
            Err(err) => {
                debug!(error = %err, "drain failed");
                continue;
            }
        };

        match &last {
            None => {
                let _ = lifecycle.send(PageLifecycle::Loaded {
                    url: drained.href.clone(),
                });
            }
            Some((doc, href)) if *doc != drained.doc => {
                if !unload_announced.swap(false, Ordering::SeqCst) {
                    let _ = lifecycle.send(PageLifecycle::Unloading { url: href.clone() });
                }
                let _ = lifecycle.send(PageLifecycle::Loaded {
                    url: drained.href.clone(),
                });
            }
            Some((_, href)) if *href != drained.href => {
                let _ = lifecycle.send(PageLifecycle::HashChanged {
                    url: drained.href.clone(),
                });
            }
            Some(_) => {}
        }

        for batch in drained.batches.into_iter().filter(|b| !b.is_empty()) {
            let _ = mutations.send(batch);
        }
        last = Some((drained.doc, drained.href));
    }
    debug!("mutation pump stopped");
}

#[async_trait]
impl HostPage for CdpPage {
    async fn current_url(&self) -> Result<String, PageError> {
        self.page
            .url()
            .await
            .map_err(|err| PageError::transport(err.to_string()))?
            .ok_or_else(|| PageError::new(PageErrorKind::Closed))
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, PageError> {
        let body = format!(
            "return {{ value: b.track(document.querySelector({})) }};",
            js_string(selector)
        );
        let id: Option<u64> = self.bridge(&body).await?;
        Ok(id.map(|id| ElementHandle::new(id, selector)))
    }

    async fn query_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, PageError> {
        let body = format!(
            "return {{ value: b.track(el.querySelector({})) }};",
            js_string(selector)
        );
        let id: Option<u64> = self.on_element(scope, &body).await?;
        Ok(id.map(|id| ElementHandle::new(id, selector)))
    }

    async fn query_all_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, PageError> {
        let body = format!(
            "return {{ value: Array.from(el.querySelectorAll({})).map((n) => b.track(n)) }};",
            js_string(selector)
        );
        let ids: Option<Vec<u64>> = self.on_element(scope, &body).await?;
        Ok(ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| ElementHandle::new(id, selector))
            .collect())
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, PageError> {
        let text: Option<String> = self
            .on_element(element, "return { value: el.innerText || el.textContent || '' };")
            .await?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let body = format!("return {{ value: el.getAttribute({}) }};", js_string(name));
        self.on_element(element, &body).await
    }

    async fn value(&self, element: &ElementHandle) -> Result<String, PageError> {
        let value: Option<String> = self
            .on_element(element, "return { value: String(el.value ?? '') };")
            .await?;
        Ok(value.unwrap_or_default())
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), PageError> {
        let body = format!("el.value = {}; return {{ value: true }};", js_string(value));
        self.on_element::<bool>(element, &body).await.map(|_| ())
    }

    async fn dispatch_event(
        &self,
        element: &ElementHandle,
        event: DomEvent,
    ) -> Result<(), PageError> {
        let body = format!(
            "el.dispatchEvent(new Event({}, {{ bubbles: true }})); return {{ value: true }};",
            js_string(event.name())
        );
        self.on_element::<bool>(element, &body).await.map(|_| ())
    }

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool, PageError> {
        let disabled: Option<bool> = self
            .on_element(element, "return { value: !!el.disabled };")
            .await?;
        Ok(disabled.unwrap_or(false))
    }

    async fn force_enable(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.on_element::<bool>(
            element,
            "el.disabled = false; el.classList.remove('disabled'); return { value: true };",
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.on_element::<bool>(element, "el.click(); return { value: true };")
            .await
            .map(|_| ())
    }

    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        let current = self.current_url().await?;
        if !same_document(&current, url) {
            self.unload_announced.store(true, Ordering::SeqCst);
            let _ = self
                .lifecycle
                .send(PageLifecycle::Unloading { url: current });
        }
        let body = format!(
            "setTimeout(() => {{ window.location.href = {}; }}, 0); return {{ value: true }};",
            js_string(url)
        );
        self.bridge::<bool>(&body).await.map(|_| ())
    }

    async fn alert(&self, message: &str) -> Result<(), PageError> {
        // Deferred so evaluation returns before the dialog blocks the page.
        let body = format!(
            "setTimeout(() => alert({}), 0); return {{ value: true }};",
            js_string(message)
        );
        self.bridge::<bool>(&body).await.map(|_| ())
    }

    fn mutations(&self) -> broadcast::Receiver<MutationBatch> {
        self.mutations.subscribe()
    }

    fn lifecycle(&self) -> broadcast::Receiver<PageLifecycle> {
        self.lifecycle.subscribe()
    }

    fn mutation_observer_count(&self) -> usize {
        self.mutations.receiver_count()
    }
}

#[async_trait]
impl SessionStorage for CdpPage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, PageError> {
        let body = format!(
            "return {{ value: window.sessionStorage.getItem({}) }};",
            js_string(key)
        );
        self.bridge(&body).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), PageError> {
        let body = format!(
            "window.sessionStorage.setItem({}, {}); return {{ value: true }};",
            js_string(key),
            js_string(value)
        );
        self.bridge::<bool>(&body).await.map(|_| ())
    }

    async fn remove_item(&self, key: &str) -> Result<(), PageError> {
        let body = format!(
            "window.sessionStorage.removeItem({}); return {{ value: true }};",
            js_string(key)
        );
        self.bridge::<bool>(&body).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(
            js_string(r#"a[href*="x"]"#),
            r#""a[href*=\"x\"]""#
        );
    }

    #[test]
    fn reply_decodes_stale_and_value() {
        let stale: Reply<u64> = serde_json::from_str(r#"{"stale":true}"#).unwrap();
        assert!(stale.stale);
        let value: Reply<u64> = serde_json::from_str(r#"{"value":3}"#).unwrap();
        assert_eq!(value.value, Some(3));
        let null: Reply<u64> = serde_json::from_str(r#"{"value":null}"#).unwrap();
        assert!(!null.stale && null.value.is_none());
    }

    #[test]
    fn drained_batches_decode() {
        let drained: Drained = serde_json::from_str(
            r#"{"doc":"d1","href":"https://x/","batches":[{"records":[{"kind":"child_list","target":1}]}]}"#,
        )
        .unwrap();
        assert_eq!(drained.batches.len(), 1);
        assert_eq!(
            drained.batches[0].records[0],
            MutationRecord::ChildList { target: 1 }
        );
    }
}
