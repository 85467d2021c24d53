use std::sync::Arc;

use async_trait::async_trait;
use host_page::{HostPage, MemoryPage, PageError, SessionStorage};
use intent_store::{IntentError, IntentStore, ResumeSignal, DEFAULT_INTENT_KEY};

fn store() -> (MemoryPage, IntentStore) {
    let page = MemoryPage::new("https://www.torn.com/index.php");
    let store = IntentStore::with_default_key(Arc::new(page.clone()));
    (page, store)
}

#[tokio::test]
async fn save_load_clear_round_trip() {
    let (_page, store) = store();
    store.save(42).await.unwrap();
    assert_eq!(store.load().await.unwrap().map(|i| i.amount()), Some(42));
    store.clear().await.unwrap();
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn last_write_wins() {
    let (page, store) = store();
    store.save(100).await.unwrap();
    store.save(250).await.unwrap();
    assert_eq!(
        page.storage_snapshot().get(DEFAULT_INTENT_KEY).map(String::as_str),
        Some("250")
    );
}

#[tokio::test]
async fn zero_is_rejected_and_nothing_is_written() {
    let (page, store) = store();
    assert!(matches!(store.save(0).await, Err(IntentError::NonPositive)));
    assert!(page.storage_snapshot().is_empty());
}

#[tokio::test]
async fn corrupt_values_read_as_absent() {
    let (page, store) = store();
    for raw in ["abc", "", "0", "-3", "12.5"] {
        page.set_item(DEFAULT_INTENT_KEY, raw).await.unwrap();
        assert!(store.load().await.unwrap().is_none(), "{raw:?} should be absent");
    }
    page.set_item(DEFAULT_INTENT_KEY, " 300 ").await.unwrap();
    assert_eq!(store.load().await.unwrap().map(|i| i.amount()), Some(300));
}

#[tokio::test]
async fn resume_signal_follows_storage() {
    let (page, store) = store();
    assert_eq!(store.resume_signal().await.unwrap(), ResumeSignal::None);

    store.save(300).await.unwrap();
    page.navigate("https://www.torn.com/trade.php#step=start&userID=1")
        .await
        .unwrap();

    match store.resume_signal().await.unwrap() {
        ResumeSignal::Resume(intent) => assert_eq!(intent.amount(), 300),
        ResumeSignal::None => panic!("intent lost across navigation"),
    }
}

#[tokio::test]
async fn custom_key_is_isolated() {
    let page = MemoryPage::new("https://www.torn.com/index.php");
    let store = IntentStore::new(Arc::new(page.clone()), "otherKey");
    store.save(5).await.unwrap();
    assert_eq!(store.key(), "otherKey");
    assert!(page.get_item(DEFAULT_INTENT_KEY).await.unwrap().is_none());
}

struct BrokenStorage;

#[async_trait]
impl SessionStorage for BrokenStorage {
    async fn get_item(&self, _key: &str) -> Result<Option<String>, PageError> {
        Err(PageError::transport("connection reset"))
    }
    async fn set_item(&self, _key: &str, _value: &str) -> Result<(), PageError> {
        Err(PageError::script("quota exceeded"))
    }
    async fn remove_item(&self, _key: &str) -> Result<(), PageError> {
        Err(PageError::transport("connection reset"))
    }
}

#[tokio::test]
async fn backend_failures_surface_as_storage_errors() {
    let store = IntentStore::with_default_key(Arc::new(BrokenStorage));
    let err = store.load().await.unwrap_err();
    assert!(matches!(err, IntentError::Storage(_)));
    assert!(err.is_retryable());
    assert!(!store.save(1).await.unwrap_err().is_retryable());
}
