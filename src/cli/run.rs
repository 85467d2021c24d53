use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Page to open first (defaults to the site's home page)
    #[arg(long)]
    pub url: Option<String>,

    /// Run Chrome without a window
    #[arg(long)]
    pub headless: bool,

    /// Attach to an existing Chrome DevTools websocket instead of launching
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Chrome/Chromium executable
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,
}

#[cfg(feature = "cdp")]
pub async fn cmd_run(args: RunArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Context;
    use ghost_trader::{GhostSession, SessionCommand};
    use ghosttrader_event_bus::to_mpsc;
    use host_page::{CdpBrowser, CdpSettings, HostPage, SessionStorage};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tracing::info;

    use crate::cli::output::print_event;

    let config = ctx.config();
    config.validate()?;

    let settings = CdpSettings {
        headless: args.headless || config.browser.headless,
        executable: args.chrome_path.or_else(|| config.browser.executable.clone()),
        user_data_dir: config.browser.user_data_dir.clone(),
        websocket_url: args.ws_url.or_else(|| config.browser.websocket_url.clone()),
        pump_interval: Duration::from_millis(config.browser.pump_interval_ms.max(10)),
    };
    let url = args
        .url
        .unwrap_or_else(|| format!("{}/index.php", config.site.base_url.trim_end_matches('/')));

    let browser = CdpBrowser::launch(&settings)
        .await
        .context("starting browser")?;
    let page = Arc::new(browser.open(&url).await.context("opening page")?);
    info!(%url, counterpart = config.site.counterpart_id, "browser session ready");

    let session = GhostSession::from_config(
        Arc::clone(&page) as Arc<dyn HostPage>,
        Arc::clone(&page) as Arc<dyn SessionStorage>,
        config,
    );
    let mut events = to_mpsc(session.events(), 64);
    let (handle, task) = session.spawn();

    println!(
        "Enter an amount (empty = whole balance, N% = share of balance). \
         Commands: :cancel, :discard, :quit"
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match line.trim() {
                    ":quit" | ":q" => break,
                    ":cancel" => handle.send(SessionCommand::Cancel).await?,
                    ":discard" => handle.send(SessionCommand::Discard).await?,
                    text => handle.submit(text).await?,
                }
            }
            event = events.recv() => match event {
                Some(event) => print_event(&format, &event)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    handle.shutdown().await.ok();
    task.await.context("session task failed")?;
    drop(page);
    browser.close().await;
    Ok(())
}

#[cfg(not(feature = "cdp"))]
pub async fn cmd_run(_args: RunArgs, _ctx: &CliContext, _format: OutputFormat) -> Result<()> {
    anyhow::bail!("this build has no browser support; rebuild with the `cdp` feature")
}
