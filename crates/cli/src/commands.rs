//! CLI commands

use anyhow::Context;
use curvebank_core::{parse_units, TokenAmount, U256};
use curvebank_market::{BuyQuote, EngineConfig, MarketEngine, SellQuote};
use curvebank_settlement::NativeCurrency;
use std::path::Path;

use crate::scenario::{Scenario, SimulationReport, Simulator};

/// Load the engine configuration, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Engine with no markets, used for pricing only
fn pricing_engine(config: &EngineConfig) -> anyhow::Result<MarketEngine> {
    Ok(MarketEngine::new(config, Box::new(NativeCurrency::new()))?)
}

fn tokens(amount: &str) -> anyhow::Result<TokenAmount> {
    parse_units(amount).with_context(|| format!("Invalid token amount '{amount}'"))
}

/// Raw curve cost between two supply points
pub fn cost(config: &EngineConfig, from: &str, to: &str) -> anyhow::Result<U256> {
    let engine = pricing_engine(config)?;
    Ok(engine.get_cost(tokens(from)?, tokens(to)?)?)
}

/// Buy price of `amount` at `supply`, fees included
pub fn quote_buy(config: &EngineConfig, supply: &str, amount: &str) -> anyhow::Result<BuyQuote> {
    let engine = pricing_engine(config)?;
    Ok(engine.quote_buy_at(tokens(supply)?, tokens(amount)?)?)
}

/// Sell proceeds of `amount` at `supply`, fees deducted
pub fn quote_sell(config: &EngineConfig, supply: &str, amount: &str) -> anyhow::Result<SellQuote> {
    let engine = pricing_engine(config)?;
    Ok(engine.quote_sell_at(tokens(supply)?, tokens(amount)?)?)
}

/// Replay a scenario file against a fresh engine
pub fn simulate(
    config: &EngineConfig,
    scenario: impl AsRef<Path>,
    strict: bool,
) -> anyhow::Result<SimulationReport> {
    let scenario = Scenario::from_file(scenario)?;
    let simulator = Simulator::new(&scenario, config)?;
    let report = simulator.run(&scenario.steps, strict)?;
    tracing::info!(
        steps = report.steps.len(),
        failed = report.failures(),
        events = report.events.len(),
        "Simulation finished"
    );
    Ok(report)
}
