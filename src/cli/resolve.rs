use anyhow::Result;
use clap::Args;
use ghost_trader::{AmountInput, ValidationError};
use serde::Serialize;

use crate::cli::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// Live balance to resolve against
    #[arg(long)]
    pub balance: u64,

    /// Amount field content: empty for the whole balance, `N%` or a number
    #[arg(default_value = "", allow_hyphen_values = true)]
    pub input: String,
}

#[derive(Debug, Serialize)]
struct Resolution<'a> {
    input: &'a str,
    parsed: String,
    balance: u64,
    amount: u64,
}

pub fn cmd_resolve(args: ResolveArgs, format: OutputFormat) -> Result<()> {
    let parsed = AmountInput::parse(&args.input);
    let amount = parsed.resolve(args.balance);
    if amount == 0 {
        return Err(ValidationError::NotPositive { input: args.input }.into());
    }
    let resolution = Resolution {
        input: &args.input,
        parsed: parsed.to_string(),
        balance: args.balance,
        amount,
    };
    emit(&format, &resolution, || {
        format!("{amount} ({parsed}, balance {})", args.balance)
    })
}
