use clap::Subcommand;

use super::config::ConfigArgs;
use super::demo::DemoArgs;
use super::resolve::ResolveArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Drive ghost trades in a Chromium tab; each stdin line is an amount
    Run(RunArgs),

    /// Run one ghost trade against the built-in simulated trade pages
    Demo(DemoArgs),

    /// Show the amount an input resolves to for a balance
    Resolve(ResolveArgs),

    /// Manage ghost-trader configuration
    Config(ConfigArgs),
}
