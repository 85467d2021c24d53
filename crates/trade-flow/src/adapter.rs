//! Everything the workflow knows about the host's markup and URLs.

use async_trait::async_trait;
use host_page::{ElementHandle, HostPage, PageError};
use page_watch::AttributeSource;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Description field plus the control that creates the trade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateForm {
    pub description: ElementHandle,
    pub submit: ElementHandle,
}

/// Quantity field plus the control that confirms it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmForm {
    pub quantity: ElementHandle,
    pub confirm: ElementHandle,
}

/// Selectors and URLs of the host application.
#[async_trait]
pub trait HostUiAdapter: Send + Sync {
    /// Trade screen for the counterpart. `cache_bust` adds a query marker so
    /// the browser reloads even when already on the trade screen.
    fn destination_url(&self, cache_bust: Option<i64>) -> String;

    /// Whether `url` is the trade-start screen for the counterpart.
    fn is_destination(&self, url: &str) -> bool;

    /// Whether `url` shows one specific trade.
    fn is_target_view(&self, url: &str) -> bool;

    /// Whether `url` is any trade screen.
    fn is_trade_screen(&self, url: &str) -> bool;

    fn balance_source(&self) -> AttributeSource;

    fn target_list_selector(&self) -> &str;

    /// Tag written into the description of trades this tool creates.
    fn marker(&self) -> &str;

    /// Link of the list entry carrying our marker, if the list has one.
    async fn find_reusable_target(
        &self,
        page: &dyn HostPage,
        list: &ElementHandle,
    ) -> Result<Option<ElementHandle>, PageError>;

    /// Both creation controls, once rendered.
    async fn locate_create_form(&self, page: &dyn HostPage)
        -> Result<Option<CreateForm>, PageError>;

    fn add_quantity_selector(&self) -> &str;

    /// Both confirmation controls, once rendered.
    async fn locate_confirm_form(
        &self,
        page: &dyn HostPage,
    ) -> Result<Option<ConfirmForm>, PageError>;
}

/// Selectors of the Torn trade pages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub balance: String,
    pub balance_attribute: String,
    pub target_list: String,
    pub target_item: String,
    pub view_link: String,
    pub description: String,
    pub submit: String,
    pub add_quantity: String,
    pub quantity_input: String,
    pub confirm: String,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            balance: "#user-money".into(),
            balance_attribute: "data-money".into(),
            target_list: "ul.trades-cont.current".into(),
            target_item: "li".into(),
            view_link: r#"a[href*="trade.php#step=view&ID="]"#.into(),
            description: "#description".into(),
            submit: "input[type='submit'].torn-btn".into(),
            add_quantity: r#"a[aria-label*="Add money to trade"]"#.into(),
            quantity_input: "input.input-money".into(),
            confirm: r#"input[type="submit"].torn-btn"#.into(),
        }
    }
}

pub const DEFAULT_BASE_URL: &str = "https://www.torn.com";
pub const DEFAULT_MARKER: &str = "Auto Ghost Trade";

/// [`HostUiAdapter`] for Torn's trade pages.
#[derive(Clone, Debug)]
pub struct TornUiAdapter {
    base_url: String,
    counterpart_id: u64,
    marker: String,
    selectors: SelectorSet,
}

impl TornUiAdapter {
    pub fn new(counterpart_id: u64) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            counterpart_id,
            marker: DEFAULT_MARKER.to_string(),
            selectors: SelectorSet::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_selectors(mut self, selectors: SelectorSet) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn counterpart_id(&self) -> u64 {
        self.counterpart_id
    }

    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    /// Fragment `key=value` pairs of a trade.php URL, or `None` for any
    /// other page.
    fn trade_fragment(url: &str) -> Option<Vec<(String, String)>> {
        let parsed = Url::parse(url).ok()?;
        if !parsed.path().ends_with("/trade.php") {
            return None;
        }
        let fragment = parsed.fragment().unwrap_or("");
        Some(
            fragment
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (pair.to_string(), String::new()),
                })
                .collect(),
        )
    }
}

fn has_pair(pairs: &[(String, String)], key: &str, value: &str) -> bool {
    pairs.iter().any(|(k, v)| k == key && v == value)
}

#[async_trait]
impl HostUiAdapter for TornUiAdapter {
    fn destination_url(&self, cache_bust: Option<i64>) -> String {
        let query = cache_bust
            .map(|marker| format!("?reload={marker}"))
            .unwrap_or_default();
        format!(
            "{}/trade.php{}#step=start&userID={}",
            self.base_url, query, self.counterpart_id
        )
    }

    fn is_destination(&self, url: &str) -> bool {
        Self::trade_fragment(url).is_some_and(|pairs| {
            has_pair(&pairs, "step", "start")
                && has_pair(&pairs, "userID", &self.counterpart_id.to_string())
        })
    }

    fn is_target_view(&self, url: &str) -> bool {
        Self::trade_fragment(url).is_some_and(|pairs| {
            has_pair(&pairs, "step", "view") && pairs.iter().any(|(k, v)| k == "ID" && !v.is_empty())
        })
    }

    fn is_trade_screen(&self, url: &str) -> bool {
        url.contains("trade.php")
    }

    fn balance_source(&self) -> AttributeSource {
        AttributeSource::new(&self.selectors.balance, &self.selectors.balance_attribute)
    }

    fn target_list_selector(&self) -> &str {
        &self.selectors.target_list
    }

    fn marker(&self) -> &str {
        &self.marker
    }

    async fn find_reusable_target(
        &self,
        page: &dyn HostPage,
        list: &ElementHandle,
    ) -> Result<Option<ElementHandle>, PageError> {
        let tag = format!("Description: {}", self.marker);
        if !page.text_content(list).await?.contains(&tag) {
            debug!(marker = %self.marker, "no marked trade in list");
            return Ok(None);
        }
        // Only the link inside the marked entry; other trades share the list.
        for item in page.query_all_within(list, &self.selectors.target_item).await? {
            if !page.text_content(&item).await?.contains(&tag) {
                continue;
            }
            if let Some(link) = page.query_within(&item, &self.selectors.view_link).await? {
                return Ok(Some(link));
            }
        }
        debug!(marker = %self.marker, "marked trade has no view link");
        Ok(None)
    }

    async fn locate_create_form(
        &self,
        page: &dyn HostPage,
    ) -> Result<Option<CreateForm>, PageError> {
        let Some(description) = page.query(&self.selectors.description).await? else {
            return Ok(None);
        };
        let Some(submit) = page.query(&self.selectors.submit).await? else {
            return Ok(None);
        };
        Ok(Some(CreateForm {
            description,
            submit,
        }))
    }

    fn add_quantity_selector(&self) -> &str {
        &self.selectors.add_quantity
    }

    async fn locate_confirm_form(
        &self,
        page: &dyn HostPage,
    ) -> Result<Option<ConfirmForm>, PageError> {
        let Some(quantity) = page.query(&self.selectors.quantity_input).await? else {
            return Ok(None);
        };
        let Some(confirm) = page.query(&self.selectors.confirm).await? else {
            return Ok(None);
        };
        Ok(Some(ConfirmForm { quantity, confirm }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_page::{El, MemoryPage};

    fn adapter() -> TornUiAdapter {
        TornUiAdapter::new(2_718_281)
    }

    #[test]
    fn destination_carries_counterpart_and_optional_marker() {
        let adapter = adapter();
        assert_eq!(
            adapter.destination_url(None),
            "https://www.torn.com/trade.php#step=start&userID=2718281"
        );
        assert_eq!(
            adapter.destination_url(Some(1_700_000_000_000)),
            "https://www.torn.com/trade.php?reload=1700000000000#step=start&userID=2718281"
        );
    }

    #[test]
    fn destination_match_ignores_query() {
        let adapter = adapter();
        assert!(adapter.is_destination(&adapter.destination_url(None)));
        assert!(adapter.is_destination(&adapter.destination_url(Some(5))));
        assert!(!adapter.is_destination("https://www.torn.com/trade.php#step=start&userID=1"));
        assert!(!adapter.is_destination("https://www.torn.com/trade.php"));
        assert!(!adapter.is_destination("https://www.torn.com/index.php#step=start&userID=2718281"));
    }

    #[test]
    fn target_view_needs_an_id() {
        let adapter = adapter();
        assert!(adapter.is_target_view("https://www.torn.com/trade.php#step=view&ID=881"));
        assert!(!adapter.is_target_view("https://www.torn.com/trade.php#step=view&ID="));
        assert!(!adapter.is_target_view(&adapter.destination_url(None)));
    }

    #[test]
    fn base_url_is_normalised() {
        let adapter = adapter().with_base_url("http://127.0.0.1:8080/");
        assert_eq!(
            adapter.destination_url(None),
            "http://127.0.0.1:8080/trade.php#step=start&userID=2718281"
        );
    }

    #[test]
    fn selector_set_fills_missing_fields_from_defaults() {
        let set: SelectorSet = serde_yaml::from_str("target_list: ul.trades\n").unwrap();
        assert_eq!(set.target_list, "ul.trades");
        assert_eq!(set.balance, "#user-money");
    }

    fn trade_item(description: &str, id: u64) -> El {
        El::new("li")
            .child(El::new("span").text(format!("Description: {description}")))
            .child(El::new("a").attr("href", format!("trade.php#step=view&ID={id}")))
    }

    #[tokio::test]
    async fn reusable_target_requires_the_marker() {
        let page = MemoryPage::new("https://www.torn.com/trade.php#step=start&userID=2718281");
        let list = page
            .mutate(|doc| {
                let body = doc.body();
                doc.append(
                    body,
                    El::new("ul")
                        .class("trades-cont current")
                        .child(trade_item("Someone else", 7)),
                )
            })
            .unwrap();
        let adapter = adapter();
        let handle = ElementHandle::new(list, "ul.trades-cont.current");

        assert!(adapter
            .find_reusable_target(&page, &handle)
            .await
            .unwrap()
            .is_none());

        page.mutate(|doc| {
            doc.append(list, trade_item("Auto Ghost Trade", 9));
        });
        let link = adapter
            .find_reusable_target(&page, &handle)
            .await
            .unwrap()
            .expect("marked trade is reusable");
        assert_eq!(
            page.attribute(&link, "href").await.unwrap().as_deref(),
            Some("trade.php#step=view&ID=9")
        );
    }

    #[tokio::test]
    async fn forms_need_both_controls() {
        let page = MemoryPage::new("https://www.torn.com/trade.php");
        let adapter = adapter();
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(body, El::new("textarea").id("description"));
        });
        assert!(adapter.locate_create_form(&page).await.unwrap().is_none());

        page.mutate(|doc| {
            let body = doc.body();
            doc.append(
                body,
                El::new("input").attr("type", "submit").class("torn-btn"),
            );
        });
        assert!(adapter.locate_create_form(&page).await.unwrap().is_some());
        assert!(adapter.locate_confirm_form(&page).await.unwrap().is_none());
    }
}
