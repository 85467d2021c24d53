use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use ghost_trader::{GhostSession, SessionEvent};
use ghosttrader_event_bus::to_mpsc;
use host_page::{HostPage, SessionStorage};
use intent_store::IntentStore;
use serde::Serialize;
use trade_flow::sim::{SimTrade, TradeSite};
use trade_flow::{FlowTiming, WorkflowOutcome, WorkflowReport};

use crate::cli::context::CliContext;
use crate::cli::output::{emit, print_event, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// Wallet balance of the simulated player
    #[arg(long, default_value_t = 1_000_000)]
    pub balance: u64,

    /// Amount field content: empty for the whole balance, `N%` or a number
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub amount: String,

    /// Seed an open trade that already carries the marker
    #[arg(long)]
    pub existing_target: bool,

    /// Money already in the seeded trade
    #[arg(long, default_value_t = 0)]
    pub current_quantity: u64,

    /// Use the configured timings instead of compressed ones
    #[arg(long)]
    pub real_timing: bool,

    /// Seconds before giving up
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Debug, Serialize)]
struct DemoSummary {
    outcome: Option<WorkflowOutcome>,
    trades: Vec<TradeLine>,
    confirmations: Vec<(u64, u64)>,
    pending_intent: Option<String>,
}

#[derive(Debug, Serialize)]
struct TradeLine {
    id: u64,
    description: String,
    money: u64,
}

impl From<SimTrade> for TradeLine {
    fn from(trade: SimTrade) -> Self {
        Self {
            id: trade.id,
            description: trade.description,
            money: trade.money,
        }
    }
}

/// Timings scaled down for the simulated pages, which render instantly.
fn demo_timing() -> FlowTiming {
    FlowTiming {
        settle_delay: Duration::from_millis(50),
        list_wait_timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(50),
        add_control_timeout: Duration::from_millis(500),
        confirm_settle: Duration::from_millis(50),
        max_attempts: 200,
        max_duration: None,
        stall_log_every: 20,
    }
}

pub async fn cmd_demo(args: DemoArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let config = ctx.config();
    config.validate()?;

    let mut site = TradeSite::new(args.balance);
    if args.existing_target {
        site = site.with_trade(config.site.marker.clone(), args.current_quantity);
    }
    let start_url = format!("{}/index.php", config.site.base_url.trim_end_matches('/'));
    let (page, site) = site.open(&start_url);
    let page = Arc::new(page);

    let timing = if args.real_timing {
        config.flow_timing()
    } else {
        demo_timing()
    };
    let session = GhostSession::new(
        Arc::clone(&page) as Arc<dyn HostPage>,
        Arc::new(config.adapter()),
        IntentStore::new(
            Arc::clone(&page) as Arc<dyn SessionStorage>,
            config.storage.intent_key.clone(),
        ),
        timing,
    );
    let mut events = to_mpsc(session.events(), 64);
    let (handle, task) = session.spawn();

    let watch = async {
        let mut submitted = false;
        loop {
            let Some(event) = events.recv().await else {
                bail!("session ended before the trade finished");
            };
            print_event(&format, &event)?;
            match event {
                SessionEvent::InputOffered { .. } if !submitted => {
                    submitted = true;
                    handle.submit(args.amount.clone()).await?;
                }
                SessionEvent::Rejected { .. } => return Ok(None),
                SessionEvent::Finished { report } if finished(&report) => {
                    return Ok(Some(report))
                }
                _ => {}
            }
        }
    };
    let report: Option<WorkflowReport> =
        tokio::time::timeout(Duration::from_secs(args.timeout), watch)
            .await
            .context("demo timed out")??;

    handle.shutdown().await.ok();
    task.await.context("session task failed")?;

    let pending_intent = page.get_item(&config.storage.intent_key).await?;
    let summary = DemoSummary {
        outcome: report.map(|r| r.outcome),
        trades: site.trades().into_iter().map(TradeLine::from).collect(),
        confirmations: site.confirmations(),
        pending_intent,
    };
    emit(&format, &summary, || {
        let mut lines = vec!["--- simulated site ---".to_string()];
        for trade in &summary.trades {
            lines.push(format!(
                "trade #{} {:?}: {}",
                trade.id, trade.description, trade.money
            ));
        }
        lines.push(format!("wallet: {}", site.balance()));
        lines.push(format!(
            "pending intent: {}",
            summary.pending_intent.as_deref().unwrap_or("none")
        ));
        lines.join("\n")
    })
}

fn finished(report: &WorkflowReport) -> bool {
    matches!(
        report.outcome,
        WorkflowOutcome::Done { .. } | WorkflowOutcome::Abandoned { .. }
    )
}
