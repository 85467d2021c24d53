//! Simulated Torn trade pages for a [`MemoryPage`].
//!
//! Renders just enough of the real markup for the workflow: the balance
//! header on every page, the trade-start screen (current trades list and
//! creation form), a trade view with the add-money link, and the money form.

use std::sync::Arc;
use std::time::Duration;

use host_page::{El, HostScript, MemoryPage, NodeId, Selector};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimTrade {
    pub id: u64,
    pub description: String,
    pub money: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Screen {
    Other,
    Start,
    View(u64),
    AddMoney(u64),
}

struct SiteState {
    balance: u64,
    trades: Vec<SimTrade>,
    next_id: u64,
    screen: Screen,
    generation: u64,
    confirmations: Vec<(u64, u64)>,
}

/// Host behaviour of the trade pages.
pub struct TradeSite {
    state: Arc<Mutex<SiteState>>,
    render_delay: Option<Duration>,
}

impl TradeSite {
    pub fn new(balance: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SiteState {
                balance,
                trades: Vec::new(),
                next_id: 1,
                screen: Screen::Other,
                generation: 0,
                confirmations: Vec::new(),
            })),
            render_delay: None,
        }
    }

    /// Render the creation form and the add-money link only after `delay`,
    /// like the real pages do once their scripts have run.
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }

    /// Seed an open trade.
    pub fn with_trade(self, description: impl Into<String>, money: u64) -> Self {
        {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.trades.push(SimTrade {
                id,
                description: description.into(),
                money,
            });
        }
        self
    }

    /// Open a page at `url` rendered by a fresh site.
    pub fn open(self, url: &str) -> (MemoryPage, Arc<TradeSite>) {
        let site = Arc::new(self);
        let page = MemoryPage::with_script(url, Arc::clone(&site) as Arc<dyn HostScript>);
        (page, site)
    }

    pub fn trades(&self) -> Vec<SimTrade> {
        self.state.lock().trades.clone()
    }

    /// `(trade id, confirmed total)` for every confirmed money form.
    pub fn confirmations(&self) -> Vec<(u64, u64)> {
        self.state.lock().confirmations.clone()
    }

    pub fn balance(&self) -> u64 {
        self.state.lock().balance
    }

    /// Change the wallet, as the host does after any spend or income.
    pub fn set_balance(&self, page: &MemoryPage, balance: u64) {
        self.state.lock().balance = balance;
        page.mutate(|doc| {
            if let Some(money) = find(doc, "#user-money") {
                doc.set_attribute(money, "data-money", balance.to_string());
                doc.set_text(money, format_money(balance));
            }
        });
    }

    fn screen_for(url: &str) -> Screen {
        let Ok(parsed) = Url::parse(url) else {
            return Screen::Other;
        };
        if !parsed.path().ends_with("/trade.php") {
            return Screen::Other;
        }
        let fragment = parsed.fragment().unwrap_or("");
        let pairs: Vec<(&str, &str)> = fragment
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let id = pairs
            .iter()
            .find(|(k, _)| *k == "ID")
            .and_then(|(_, v)| v.parse().ok());
        let step = pairs.iter().find(|(k, _)| *k == "step").map(|(_, v)| *v);
        match (step, id) {
            (Some("view"), Some(id)) => Screen::View(id),
            (Some("addmoney"), Some(id)) => Screen::AddMoney(id),
            _ => Screen::Start,
        }
    }

    fn show(&self, page: &MemoryPage, screen: Screen) {
        let (generation, balance, trades) = {
            let mut state = self.state.lock();
            state.screen = screen;
            state.generation += 1;
            (state.generation, state.balance, state.trades.clone())
        };
        debug!(?screen, "rendering trade site screen");

        page.mutate(|doc| {
            let body = doc.body();
            doc.clear_children(body);
            doc.append(
                body,
                El::new("div").class("points___UO9AU").child(
                    El::new("span")
                        .id("user-money")
                        .attr("data-money", balance.to_string())
                        .text(format_money(balance)),
                ),
            );
            match screen {
                Screen::Other => {
                    doc.append(body, El::new("h4").text("Home"));
                }
                Screen::Start => {
                    let open: Vec<&SimTrade> = trades.iter().collect();
                    if !open.is_empty() {
                        let mut list = El::new("ul").class("trades-cont current");
                        for trade in open {
                            list = list.child(
                                El::new("li")
                                    .child(El::new("span").text(format!(
                                        "Description: {}",
                                        trade.description
                                    )))
                                    .child(
                                        El::new("a")
                                            .attr(
                                                "href",
                                                format!("trade.php#step=view&ID={}", trade.id),
                                            )
                                            .text("View"),
                                    ),
                            );
                        }
                        doc.append(body, list);
                    }
                }
                Screen::View(id) | Screen::AddMoney(id) => {
                    let money = trades.iter().find(|t| t.id == id).map(|t| t.money);
                    doc.append(
                        body,
                        El::new("div")
                            .class("trade-view")
                            .text(format!("Trade #{id}: {}", format_money(money.unwrap_or(0)))),
                    );
                }
            }
        });

        match screen {
            Screen::Start | Screen::View(_) => self.render_later(page, generation, screen),
            Screen::AddMoney(id) => self.render_money_form(page, id),
            Screen::Other => {}
        }
    }

    /// Parts of a screen the host renders asynchronously.
    fn render_later(&self, page: &MemoryPage, generation: u64, screen: Screen) {
        let Some(delay) = self.render_delay else {
            render_controls(page, screen);
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            render_controls(page, screen);
            return;
        };
        let page = page.clone();
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Skip if the page moved on to another screen meanwhile.
            if state.lock().generation == generation {
                render_controls(&page, screen);
            }
        });
    }

    fn render_money_form(&self, page: &MemoryPage, id: u64) {
        let current = self
            .state
            .lock()
            .trades
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.money)
            .unwrap_or(0);
        let shown = if current > 0 {
            format_digits(current)
        } else {
            String::new()
        };
        page.mutate(|doc| {
            let body = doc.body();
            doc.append(
                body,
                El::new("form")
                    .class("add-money")
                    .child(El::new("input").class("input-money").value(shown))
                    .child(
                        El::new("input")
                            .attr("type", "submit")
                            .class("torn-btn disabled")
                            .disabled(true),
                    ),
            );
        });
    }

    fn create_trade(&self, page: &MemoryPage) -> u64 {
        let description = page.read(|doc| {
            find(doc, "#description")
                .and_then(|id| doc.get(id))
                .map(|node| node.value.clone())
                .unwrap_or_default()
        });
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.trades.push(SimTrade {
                id,
                description,
                money: 0,
            });
            id
        };
        debug!(id, "trade created");
        id
    }

    fn confirm_money(&self, page: &MemoryPage, id: u64) {
        let raw = page.read(|doc| {
            find(doc, "input.input-money")
                .and_then(|node| doc.get(node))
                .map(|node| node.value.clone())
                .unwrap_or_default()
        });
        let total: u64 = raw
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap_or(0);
        let mut state = self.state.lock();
        if let Some(trade) = state.trades.iter_mut().find(|t| t.id == id) {
            trade.money = total;
        }
        state.confirmations.push((id, total));
        debug!(id, total, "money confirmed");
    }
}

impl HostScript for TradeSite {
    fn load(&self, page: &MemoryPage, url: &str) {
        self.show(page, Self::screen_for(url));
    }

    fn fragment_changed(&self, page: &MemoryPage, url: &str) {
        self.show(page, Self::screen_for(url));
    }

    fn clicked(&self, page: &MemoryPage, node: NodeId) -> bool {
        let screen = self.state.lock().screen;
        let (is_submit, is_add_money) = page.read(|doc| {
            let Some(el) = doc.get(node) else {
                return (false, false);
            };
            let submit = el.tag == "input"
                && el.attributes.get("type").map(String::as_str) == Some("submit");
            let add = el
                .attributes
                .get("aria-label")
                .is_some_and(|label| label.contains("Add money to trade"));
            (submit, add)
        });

        match screen {
            Screen::Start if is_submit => {
                let id = self.create_trade(page);
                self.show(page, Screen::View(id));
                true
            }
            Screen::View(id) if is_add_money => {
                self.show(page, Screen::AddMoney(id));
                true
            }
            Screen::AddMoney(id) if is_submit => {
                self.confirm_money(page, id);
                self.show(page, Screen::View(id));
                true
            }
            _ => false,
        }
    }
}

fn render_controls(page: &MemoryPage, screen: Screen) {
    page.mutate(|doc| {
        let body = doc.body();
        match screen {
            Screen::Start => {
                doc.append(
                    body,
                    El::new("form")
                        .class("create-trade")
                        .child(El::new("textarea").id("description"))
                        .child(
                            El::new("input")
                                .attr("type", "submit")
                                .class("torn-btn")
                                .disabled(true),
                        ),
                );
            }
            Screen::View(id) => {
                doc.append(
                    body,
                    El::new("a")
                        .attr("aria-label", "Add money to trade")
                        .attr("href", format!("trade.php#step=addmoney&ID={id}"))
                        .text("Add money"),
                );
            }
            Screen::AddMoney(_) | Screen::Other => {}
        }
    });
}

fn find(doc: &host_page::Document, selector: &str) -> Option<NodeId> {
    Selector::parse(selector).ok().and_then(|s| doc.query(&s))
}

fn format_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_money(value: u64) -> String {
    format!("${}", format_digits(value))
}
