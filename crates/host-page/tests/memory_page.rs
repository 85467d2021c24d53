//! Behaviour of the in-memory page through the public `HostPage` contract.

use std::sync::Arc;

use host_page::{
    DomEvent, El, HostPage, HostScript, MemoryPage, MutationRecord, NodeId, PageErrorKind,
    PageLifecycle, SessionStorage,
};

struct TwoScreens;

impl HostScript for TwoScreens {
    fn load(&self, page: &MemoryPage, url: &str) {
        let screen = if url.contains("second") { "second" } else { "first" };
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(body, El::new("h1").id("title").text(screen));
            doc.append(
                body,
                El::new("a").id("next").attr("href", "/second.php").text("next"),
            );
        });
    }

    fn fragment_changed(&self, page: &MemoryPage, url: &str) {
        let fragment = url.split_once('#').map(|(_, f)| f.to_string()).unwrap_or_default();
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(body, El::new("p").class("fragment").text(fragment));
        });
    }
}

fn two_screens() -> MemoryPage {
    MemoryPage::with_script("https://host.test/first.php", Arc::new(TwoScreens))
}

#[tokio::test]
async fn query_reads_text_and_attributes() {
    let page = two_screens();
    let title = page.query("h1#title").await.unwrap().expect("title rendered");
    assert_eq!(page.text_content(&title).await.unwrap(), "first");

    let link = page.query("a[href$='second.php']").await.unwrap().unwrap();
    assert_eq!(
        page.attribute(&link, "href").await.unwrap().as_deref(),
        Some("/second.php")
    );
    assert!(page.query("a[href*=missing]").await.unwrap().is_none());
}

#[tokio::test]
async fn scoped_queries_stay_inside_the_scope() {
    let page = MemoryPage::new("https://host.test/list.php");
    page.mutate(|doc| {
        let body = doc.body();
        doc.append(body, El::new("li").text("outside"));
        doc.append(
            body,
            El::new("ul")
                .id("list")
                .child(El::new("li").text("one"))
                .child(El::new("li").text("two")),
        );
    });
    let list = page.query("#list").await.unwrap().unwrap();

    let items = page.query_all_within(&list, "li").await.unwrap();
    let mut texts = Vec::new();
    for item in &items {
        texts.push(page.text_content(item).await.unwrap());
    }
    assert_eq!(texts, vec!["one", "two"]);
    assert!(page.query_all_within(&list, "a").await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_selector_is_reported() {
    let page = two_screens();
    let err = page.query("ul > li").await.unwrap_err();
    assert_eq!(err.kind, PageErrorKind::InvalidSelector);
}

#[tokio::test]
async fn clicking_a_link_replaces_the_document() {
    let page = two_screens();
    let mut lifecycle = page.lifecycle();
    let link = page.query("#next").await.unwrap().unwrap();

    page.click(&link).await.unwrap();

    assert_eq!(
        lifecycle.recv().await.unwrap(),
        PageLifecycle::Unloading {
            url: "https://host.test/first.php".into()
        }
    );
    assert_eq!(
        lifecycle.recv().await.unwrap(),
        PageLifecycle::Loaded {
            url: "https://host.test/second.php".into()
        }
    );
    assert_eq!(page.load_count(), 2);

    let title = page.query("#title").await.unwrap().unwrap();
    assert_eq!(page.text_content(&title).await.unwrap(), "second");

    let err = page.text_content(&link).await.unwrap_err();
    assert_eq!(err.kind, PageErrorKind::StaleHandle);
    assert!(err.retriable);
}

#[tokio::test]
async fn fragment_navigation_keeps_the_document() {
    let page = two_screens();
    let mut lifecycle = page.lifecycle();
    let title = page.query("#title").await.unwrap().unwrap();

    page.navigate("https://host.test/first.php#step=view")
        .await
        .unwrap();

    assert!(matches!(
        lifecycle.recv().await.unwrap(),
        PageLifecycle::HashChanged { .. }
    ));
    assert_eq!(page.load_count(), 1);
    assert!(page.text_content(&title).await.is_ok());
    let note = page.query("p.fragment").await.unwrap().unwrap();
    assert_eq!(page.text_content(&note).await.unwrap(), "step=view");
}

#[tokio::test]
async fn mutations_are_published_as_batches() {
    let page = two_screens();
    let mut batches = page.mutations();
    assert_eq!(page.mutation_observer_count(), 1);

    let title: NodeId = page
        .read(|doc| doc.query(&"#title".parse().unwrap()))
        .unwrap();
    page.mutate(|doc| {
        doc.set_attribute(title, "data-money", "10");
        doc.set_attribute(title, "data-money", "20");
    });

    let batch = batches.recv().await.unwrap();
    assert_eq!(batch.records.len(), 2);
    assert_eq!(
        batch.records[1],
        MutationRecord::Attribute {
            target: title,
            name: "data-money".into(),
            value: Some("20".into())
        }
    );

    drop(batches);
    assert_eq!(page.mutation_observer_count(), 0);
}

#[tokio::test]
async fn disabled_controls_swallow_clicks_until_enabled() {
    let page = MemoryPage::new("https://host.test/form.php");
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
    assert!(page.is_disabled(&button).await.unwrap());

    page.click(&button).await.unwrap();
    page.force_enable(&button).await.unwrap();
    page.click(&button).await.unwrap();

    let clicks = page.clicks();
    assert_eq!(clicks.len(), 2);
    assert!(clicks[0].ignored);
    assert!(!clicks[1].ignored);
    assert!(!page.is_disabled(&button).await.unwrap());
    assert!(page.query("input.disabled").await.unwrap().is_none());
}

#[tokio::test]
async fn values_and_events_are_recorded() {
    let page = MemoryPage::new("https://host.test/form.php");
    page.mutate(|doc| {
        let body = doc.body();
        doc.append(body, El::new("input").class("input-money").value("1,000"));
    });
    let input = page.query("input.input-money").await.unwrap().unwrap();
    assert_eq!(page.value(&input).await.unwrap(), "1,000");

    page.set_value(&input, "1300").await.unwrap();
    page.dispatch_event(&input, DomEvent::Change).await.unwrap();

    assert_eq!(page.value(&input).await.unwrap(), "1300");
    let events = page.dispatched_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, DomEvent::Change);
}

#[tokio::test]
async fn session_storage_survives_navigation() {
    let page = two_screens();
    page.set_item("ghostTradeAmount", "42").await.unwrap();

    page.navigate("https://host.test/second.php").await.unwrap();
    assert_eq!(
        page.get_item("ghostTradeAmount").await.unwrap().as_deref(),
        Some("42")
    );

    page.remove_item("ghostTradeAmount").await.unwrap();
    assert!(page.get_item("ghostTradeAmount").await.unwrap().is_none());

    page.set_item("k", "v").await.unwrap();
    page.end_session();
    assert!(page.storage_snapshot().is_empty());
}

#[tokio::test]
async fn alerts_do_not_block() {
    let page = MemoryPage::new("https://host.test/");
    page.alert("Please enter a valid amount greater than 0")
        .await
        .unwrap();
    assert_eq!(page.alerts(), vec!["Please enter a valid amount greater than 0"]);
}
