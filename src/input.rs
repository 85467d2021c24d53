//! The amount field and its trigger.
//!
//! Accepts an empty field (the whole balance), `N%` (a share of the
//! balance) or a plain integer (capped at the balance). The displayed text
//! follows the live balance: a plain integer above it is lowered in place.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use host_page::{HostPage, PageError};
use intent_store::{Intent, IntentStore};
use page_watch::{parse_balance, read_balance, Subscription, WaitError, WatcherRegistry};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use trade_flow::HostUiAdapter;

use crate::errors::{GhostTraderError, ValidationError, INVALID_AMOUNT_MESSAGE};

/// A parsed field value, before it is applied to a balance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AmountInput {
    /// Empty field
    Full,
    Percent(f64),
    Absolute(i64),
    Invalid,
}

impl AmountInput {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::Full;
        }
        if text.contains('%') {
            let stripped = text.replacen('%', "", 1);
            if let Some(percent) = float_prefix(stripped.trim()) {
                return Self::Percent(percent);
            }
        }
        match integer_prefix(text) {
            Some(amount) => Self::Absolute(amount),
            None => Self::Invalid,
        }
    }

    /// Amount this input stands for against `balance`, within `[0, balance]`.
    pub fn resolve(&self, balance: u64) -> u64 {
        match *self {
            Self::Full => balance,
            Self::Percent(percent) => {
                let raw = (balance as f64 * percent) / 100.0;
                if raw.is_nan() || raw <= 0.0 {
                    0
                } else if raw >= balance as f64 {
                    balance
                } else {
                    raw.floor() as u64
                }
            }
            Self::Absolute(amount) => u64::try_from(amount).map_or(0, |n| n.min(balance)),
            Self::Invalid => 0,
        }
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, Self::Percent(_))
    }
}

impl fmt::Display for AmountInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full balance"),
            Self::Percent(percent) => write!(f, "{percent}% of balance"),
            Self::Absolute(amount) => write!(f, "{amount}"),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}

/// Optional sign followed by decimal digits; trailing text is ignored.
/// Saturates instead of overflowing.
fn integer_prefix(text: &str) -> Option<i64> {
    let (negative, rest) = split_sign(text);
    let digits: &str = &rest[..rest.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Longest leading decimal number (`-1.5`, `.5`, `2e3`); trailing text is
/// ignored.
fn float_prefix(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end.min(bytes.len())..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }
    text[..end].parse::<f64>().ok().filter(|value| !value.is_nan())
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

#[derive(Debug, Default)]
struct FieldState {
    text: String,
    balance: u64,
}

impl FieldState {
    fn clamp(&mut self) {
        let text = self.text.trim();
        if text.is_empty() || text.contains('%') {
            return;
        }
        if let Some(amount) = integer_prefix(text) {
            if amount > i64::try_from(self.balance).unwrap_or(i64::MAX) {
                debug!(from = %text, to = self.balance, "amount clamped to balance");
                self.text = self.balance.to_string();
            }
        }
    }
}

/// Whether the amount field belongs on the page at `url`: away from the
/// trade screen, or on it while no trade list is shown.
pub async fn should_offer_input(
    page: &dyn HostPage,
    adapter: &dyn HostUiAdapter,
) -> Result<bool, PageError> {
    let url = page.current_url().await?;
    if !adapter.is_trade_screen(&url) {
        return Ok(true);
    }
    Ok(page.query(adapter.target_list_selector()).await?.is_none())
}

/// Amount field bound to the live balance.
pub struct InputController {
    page: Arc<dyn HostPage>,
    adapter: Arc<dyn HostUiAdapter>,
    intents: IntentStore,
    field: Arc<Mutex<FieldState>>,
}

impl InputController {
    /// Reads the balance once to seed the display.
    pub async fn new(
        page: Arc<dyn HostPage>,
        adapter: Arc<dyn HostUiAdapter>,
        intents: IntentStore,
    ) -> Result<Self, PageError> {
        let balance = read_balance(page.as_ref(), &adapter.balance_source()).await?;
        Ok(Self {
            page,
            adapter,
            intents,
            field: Arc::new(Mutex::new(FieldState {
                text: String::new(),
                balance,
            })),
        })
    }

    pub fn text(&self) -> String {
        self.field.lock().text.clone()
    }

    pub fn display_balance(&self) -> u64 {
        self.field.lock().balance
    }

    /// The user typed `text`; returns the field content after clamping.
    pub fn on_input(&self, text: &str) -> String {
        let mut field = self.field.lock();
        field.text = text.to_string();
        field.clamp();
        field.text.clone()
    }

    pub fn on_balance_change(&self, balance: u64) {
        let mut field = self.field.lock();
        field.balance = balance;
        field.clamp();
    }

    /// Follow the page's balance for as long as `registry` lives.
    pub async fn attach(&self, registry: &WatcherRegistry) -> Result<Subscription, WaitError> {
        let field = Arc::clone(&self.field);
        registry
            .observe(&self.adapter.balance_source(), move |raw| {
                let mut field = field.lock();
                field.balance = parse_balance(raw.as_deref());
                field.clamp();
            })
            .await
    }

    /// Resolve the field against a fresh balance read, store the intent and
    /// head for the trade screen.
    pub async fn trigger(&self) -> Result<Intent, GhostTraderError> {
        let balance = read_balance(self.page.as_ref(), &self.adapter.balance_source()).await?;
        let text = {
            let mut field = self.field.lock();
            field.balance = balance;
            field.text.clone()
        };
        let input = AmountInput::parse(&text);
        let amount = input.resolve(balance);
        if amount == 0 {
            warn!(input = %text, balance, "amount rejected");
            self.page.alert(INVALID_AMOUNT_MESSAGE).await?;
            return Err(ValidationError::NotPositive { input: text }.into());
        }

        let intent = self.intents.save(amount).await?;
        let url = self.page.current_url().await?;
        let cache_bust = self
            .adapter
            .is_trade_screen(&url)
            .then(|| Utc::now().timestamp_millis());
        let destination = self.adapter.destination_url(cache_bust);
        info!(amount, %input, balance, %destination, "ghost trade requested");
        self.page.navigate(&destination).await?;
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_shapes() {
        assert_eq!(AmountInput::parse("   "), AmountInput::Full);
        assert_eq!(AmountInput::parse("25%"), AmountInput::Percent(25.0));
        assert_eq!(AmountInput::parse(" 12.5 % "), AmountInput::Percent(12.5));
        assert_eq!(AmountInput::parse("700"), AmountInput::Absolute(700));
        assert_eq!(AmountInput::parse("700abc"), AmountInput::Absolute(700));
        assert_eq!(AmountInput::parse("-5"), AmountInput::Absolute(-5));
        assert_eq!(AmountInput::parse("abc"), AmountInput::Invalid);
    }

    #[test]
    fn unreadable_percent_falls_back_to_integer() {
        assert_eq!(AmountInput::parse("abc%"), AmountInput::Invalid);
        assert_eq!(AmountInput::parse("7x%"), AmountInput::Percent(7.0));
    }

    #[test]
    fn percent_is_floored_share_of_balance() {
        for balance in [0u64, 1, 7, 99, 500, 1_000_000, 123_456_789] {
            for percent in 0..=100u64 {
                let resolved = AmountInput::Percent(percent as f64).resolve(balance);
                assert_eq!(resolved, balance * percent / 100, "{percent}% of {balance}");
            }
        }
        assert_eq!(AmountInput::parse("25%").resolve(1_000_000), 250_000);
    }

    #[test]
    fn percent_out_of_range_is_clamped() {
        assert_eq!(AmountInput::Percent(150.0).resolve(400), 400);
        assert_eq!(AmountInput::Percent(-10.0).resolve(400), 0);
        assert_eq!(AmountInput::Percent(f64::INFINITY).resolve(0), 0);
    }

    #[test]
    fn integers_are_capped_at_balance() {
        assert_eq!(AmountInput::Absolute(700).resolve(500), 500);
        assert_eq!(AmountInput::Absolute(300).resolve(500), 300);
        assert_eq!(AmountInput::Absolute(-3).resolve(500), 0);
        assert_eq!(AmountInput::Full.resolve(500), 500);
        assert_eq!(AmountInput::Invalid.resolve(500), 0);
    }

    #[test]
    fn huge_integers_saturate() {
        assert_eq!(
            AmountInput::parse("99999999999999999999999"),
            AmountInput::Absolute(i64::MAX)
        );
    }

    #[test]
    fn field_clamp_leaves_percent_alone() {
        let mut field = FieldState {
            text: "80%".into(),
            balance: 10,
        };
        field.clamp();
        assert_eq!(field.text, "80%");

        field.text = "800".into();
        field.balance = 400;
        field.clamp();
        assert_eq!(field.text, "400");
    }
}
