//! CurveBank CLI - Main entry point

use curvebank_cli::commands;
use curvebank_core::format_units;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "curvebank")]
#[command(about = "CurveBank - bonding-curve markets with mortgage positions", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Raw curve cost between two supply points
    Cost {
        /// Starting supply (tokens)
        from: String,
        /// Ending supply (tokens)
        to: String,
    },

    /// Price a buy, fees included
    QuoteBuy {
        /// Tokens to buy
        amount: String,
        /// Current supply (tokens)
        #[arg(long, default_value = "0")]
        supply: String,
    },

    /// Price a sell, fees deducted
    QuoteSell {
        /// Tokens to sell
        amount: String,
        /// Current supply (tokens)
        #[arg(long)]
        supply: String,
    },

    /// Replay a scenario file and print the final state as JSON
    Simulate {
        /// Scenario file path
        scenario: PathBuf,
        /// Stop at the first failed step
        #[arg(long)]
        strict: bool,
        /// Print only the per-step outcomes
        #[arg(long)]
        steps_only: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Cost { from, to } => {
            let cost = commands::cost(&config, &from, &to)?;
            println!("C({}, {}) = {} ({})", from, to, cost, format_units(cost));
        }

        Commands::QuoteBuy { amount, supply } => {
            let quote = commands::quote_buy(&config, &supply, &amount)?;
            println!("Buy {} at supply {}", amount, supply);
            println!("   Curve cost:    {}", format_units(quote.base));
            println!("   Creator fee:   {}", format_units(quote.fees.creator));
            println!("   Community fee: {}", format_units(quote.fees.community));
            println!("   Total:         {} ({})", format_units(quote.total), quote.total);
        }

        Commands::QuoteSell { amount, supply } => {
            let quote = commands::quote_sell(&config, &supply, &amount)?;
            println!("Sell {} at supply {}", amount, supply);
            println!("   Curve value:   {}", format_units(quote.base));
            println!("   Creator fee:   {}", format_units(quote.fees.creator));
            println!("   Community fee: {}", format_units(quote.fees.community));
            println!("   Received:      {} ({})", format_units(quote.received), quote.received);
        }

        Commands::Simulate {
            scenario,
            strict,
            steps_only,
        } => {
            let report = commands::simulate(&config, &scenario, strict)?;
            let output = if steps_only {
                serde_json::to_string_pretty(&report.steps)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", output);

            if report.failures() > 0 {
                eprintln!("❌ {} of {} steps failed", report.failures(), report.steps.len());
            } else {
                eprintln!("✅ {} steps applied", report.steps.len());
            }
        }
    }

    Ok(())
}
