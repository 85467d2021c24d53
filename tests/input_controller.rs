use std::sync::Arc;
use std::time::Duration;

use ghost_trader::{should_offer_input, GhostTraderError, InputController, INVALID_AMOUNT_MESSAGE};
use host_page::{HostPage, MemoryPage, SessionStorage};
use intent_store::IntentStore;
use page_watch::WatcherRegistry;
use trade_flow::sim::TradeSite;
use trade_flow::TornUiAdapter;

const HOME: &str = "https://www.torn.com/index.php";
const START: &str = "https://www.torn.com/trade.php#step=start&userID=7";

async fn controller(page: &MemoryPage) -> InputController {
    InputController::new(
        Arc::new(page.clone()),
        Arc::new(TornUiAdapter::new(7)),
        IntentStore::with_default_key(Arc::new(page.clone())),
    )
    .await
    .unwrap()
}

async fn pending(page: &MemoryPage) -> Option<String> {
    page.get_item("ghostTradeAmount").await.unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[tokio::test]
async fn quarter_of_a_million() {
    let (page, _site) = TradeSite::new(1_000_000).open(HOME);
    let input = controller(&page).await;

    assert_eq!(input.on_input("25%"), "25%");
    let intent = input.trigger().await.unwrap();

    assert_eq!(intent.amount(), 250_000);
    assert_eq!(pending(&page).await.as_deref(), Some("250000"));
    assert_eq!(page.navigations(), vec![START.to_string()]);
    assert_eq!(page.url(), START);
}

#[tokio::test]
async fn amount_above_balance_is_clamped_while_typing() {
    let (page, _site) = TradeSite::new(500).open(HOME);
    let input = controller(&page).await;

    assert_eq!(input.on_input("700"), "500");
    assert_eq!(input.trigger().await.unwrap().amount(), 500);
    assert_eq!(pending(&page).await.as_deref(), Some("500"));
}

#[tokio::test]
async fn balance_drop_clamps_a_plain_amount() {
    let (page, site) = TradeSite::new(1200).open(HOME);
    let input = controller(&page).await;
    let registry = WatcherRegistry::new(Arc::new(page.clone()));
    input.attach(&registry).await.unwrap();
    input.on_input("800");

    site.set_balance(&page, 1000);
    assert!(eventually(|| input.display_balance() == 1000).await);
    assert_eq!(input.text(), "800");

    site.set_balance(&page, 400);
    assert!(eventually(|| input.text() == "400").await);
    assert_eq!(input.display_balance(), 400);
}

#[tokio::test]
async fn percent_survives_balance_changes() {
    let (page, site) = TradeSite::new(1200).open(HOME);
    let input = controller(&page).await;
    let registry = WatcherRegistry::new(Arc::new(page.clone()));
    input.attach(&registry).await.unwrap();
    input.on_input("80%");

    site.set_balance(&page, 10);
    assert!(eventually(|| input.display_balance() == 10).await);
    assert_eq!(input.text(), "80%");
}

#[tokio::test]
async fn teardown_stops_following_the_balance() {
    let (page, site) = TradeSite::new(1200).open(HOME);
    let input = controller(&page).await;
    let registry = WatcherRegistry::new(Arc::new(page.clone()));
    input.attach(&registry).await.unwrap();

    assert_eq!(registry.teardown_all(), 1);
    assert!(eventually(|| page.mutation_observer_count() == 0).await);
    site.set_balance(&page, 5);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(input.display_balance(), 1200);
}

#[tokio::test]
async fn empty_field_uses_the_balance_at_trigger_time() {
    let (page, site) = TradeSite::new(1000).open(HOME);
    let input = controller(&page).await;
    assert_eq!(input.display_balance(), 1000);

    // Not attached, so the display is stale; the trigger re-reads.
    site.set_balance(&page, 600);
    let intent = input.trigger().await.unwrap();
    assert_eq!(intent.amount(), 600);
}

#[tokio::test]
async fn unusable_amount_alerts_and_stays_put() {
    let (page, _site) = TradeSite::new(1000).open(HOME);
    let input = controller(&page).await;
    input.on_input("abc");

    let err = input.trigger().await.unwrap_err();
    assert!(matches!(err, GhostTraderError::Validation(_)));
    assert_eq!(page.alerts(), vec![INVALID_AMOUNT_MESSAGE.to_string()]);
    assert_eq!(pending(&page).await, None);
    assert!(page.navigations().is_empty());
}

#[tokio::test]
async fn empty_wallet_is_rejected() {
    let (page, _site) = TradeSite::new(0).open(HOME);
    let input = controller(&page).await;

    assert!(input.trigger().await.unwrap_err().is_validation());
    assert_eq!(page.alerts().len(), 1);
}

#[tokio::test]
async fn trigger_on_trade_screen_forces_a_reload() {
    let (page, _site) = TradeSite::new(1000).open(START);
    let input = controller(&page).await;
    input.on_input("100");
    let loads = page.load_count();

    input.trigger().await.unwrap();

    let target = page.navigations().pop().unwrap();
    assert!(target.starts_with("https://www.torn.com/trade.php?reload="));
    assert!(target.ends_with("#step=start&userID=7"));
    assert_eq!(page.load_count(), loads + 1);
}

#[tokio::test]
async fn input_is_offered_unless_a_trade_list_is_shown() {
    let adapter = TornUiAdapter::new(7);

    let (home, _site) = TradeSite::new(1000).open(HOME);
    assert!(should_offer_input(&home, &adapter).await.unwrap());

    let (empty_start, _site) = TradeSite::new(1000).open(START);
    assert!(should_offer_input(&empty_start, &adapter).await.unwrap());

    let (listed, _site) = TradeSite::new(1000)
        .with_trade("Auto Ghost Trade", 0)
        .open(START);
    assert!(!should_offer_input(&listed, &adapter).await.unwrap());
}
