use super::config::cmd_config;
use super::demo::cmd_demo;
use super::env::CliArgs;
use super::resolve::cmd_resolve;
use super::run::cmd_run;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx, cli.output.clone()).await,
        Commands::Demo(args) => cmd_demo(args, ctx, cli.output.clone()).await,
        Commands::Resolve(args) => cmd_resolve(args, cli.output.clone()),
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
