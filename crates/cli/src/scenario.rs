//! Scenario files - scripted operation sequences replayed against a fresh engine
//!
//! Token and value amounts are decimal strings with up to 18 fractional
//! digits (`"83333.333"`). Positions created by a step can be given a
//! label and referenced by it in later steps; a literal id such as `"0v0"`
//! works as well.

use anyhow::Context;
use curvebank_core::{format_units, parse_units, Address, MarketId, PositionId, TokenAmount, U256};
use curvebank_market::{
    EngineConfig, MarketEngine, MarketEvent, MarketSnapshot, MarketSpec, PositionView,
};
use curvebank_settlement::{AssetKind, FungibleToken, NativeCurrency, PaymentAsset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use strum_macros::AsRefStr;

/// A scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Overrides the configuration passed on the command line
    #[serde(default)]
    pub config: Option<EngineConfig>,

    /// Starting wallet balance per address
    #[serde(default)]
    pub funding: BTreeMap<String, String>,

    #[serde(default)]
    pub markets: Vec<MarketSpec>,

    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }
}

/// One scripted operation
#[derive(Debug, Clone, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "op", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    CreateMarket {
        market: String,
        creator: String,
        community: String,
    },
    Buy {
        caller: String,
        market: String,
        amount: String,
        max_pay: Option<String>,
    },
    Sell {
        caller: String,
        market: String,
        amount: String,
        min_receive: Option<String>,
    },
    Mortgage {
        caller: String,
        market: String,
        amount: String,
        min_payout: Option<String>,
        label: Option<String>,
    },
    MortgageAdd {
        caller: String,
        position: String,
        amount: String,
        min_payout: Option<String>,
    },
    Redeem {
        caller: String,
        position: String,
        amount: String,
        max_pay: Option<String>,
    },
    Merge {
        caller: String,
        target: String,
        source: String,
        min_rebate: Option<String>,
    },
    Split {
        caller: String,
        position: String,
        amount: String,
        max_pay: Option<String>,
        label: Option<String>,
    },
    Multiply {
        caller: String,
        market: String,
        amount: String,
        max_pay: Option<String>,
        label: Option<String>,
    },
    MultiplyAdd {
        caller: String,
        position: String,
        amount: String,
        max_pay: Option<String>,
    },
    Transfer {
        caller: String,
        to: String,
        position: String,
    },
    Approve {
        caller: String,
        position: String,
        delegate: Option<String>,
    },
    SetOperator {
        caller: String,
        operator: String,
        approved: bool,
    },
}

impl Step {
    pub fn name(&self) -> &str {
        self.as_ref()
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub op: String,
    /// Operation receipt on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Final state after a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    pub markets: Vec<MarketSnapshot>,
    pub positions: Vec<PositionView>,
    /// Wallet balances, formatted as decimal strings
    pub balances: BTreeMap<String, String>,
    pub events: Vec<MarketEvent>,
}

impl SimulationReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.succeeded()).count()
    }
}

/// Replays scenario steps against one engine
pub struct Simulator {
    engine: MarketEngine,
    labels: HashMap<String, PositionId>,
    wallets: Vec<Address>,
}

impl Simulator {
    /// Build the engine, fund wallets and register the scenario's markets
    pub fn new(scenario: &Scenario, fallback: &EngineConfig) -> anyhow::Result<Self> {
        let config = scenario.config.as_ref().unwrap_or(fallback);

        let mut funding = Vec::with_capacity(scenario.funding.len());
        for (holder, amount) in &scenario.funding {
            funding.push((Address::from(holder.as_str()), value(amount)?));
        }
        let asset = fund(config.asset, &funding)?;

        let mut engine = MarketEngine::new(config, asset)?;
        for spec in &scenario.markets {
            engine
                .create_market(spec.clone())
                .with_context(|| format!("Failed to create market {}", spec.id))?;
        }

        let mut wallets: Vec<Address> = funding.into_iter().map(|(holder, _)| holder).collect();
        wallets.push(engine.protocol_fee_recipient().clone());
        for spec in &scenario.markets {
            wallets.push(spec.creator.clone());
            wallets.push(spec.community.clone());
        }

        Ok(Self {
            engine,
            labels: HashMap::new(),
            wallets,
        })
    }

    pub fn engine(&self) -> &MarketEngine {
        &self.engine
    }

    /// Run every step. Failed steps are recorded and skipped unless `strict`.
    pub fn run(mut self, steps: &[Step], strict: bool) -> anyhow::Result<SimulationReport> {
        let mut reports = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let report = match self.apply(step) {
                Ok(receipt) => StepReport {
                    index,
                    op: step.name().to_string(),
                    receipt: Some(receipt),
                    error: None,
                },
                Err(e) if strict => {
                    return Err(e.context(format!("Step {index} ({}) failed", step.name())));
                }
                Err(e) => {
                    tracing::warn!(index, op = step.name(), error = %e, "Step failed");
                    StepReport {
                        index,
                        op: step.name().to_string(),
                        receipt: None,
                        error: Some(format!("{e:#}")),
                    }
                }
            };
            reports.push(report);
        }
        Ok(self.finish(reports))
    }

    fn finish(mut self, steps: Vec<StepReport>) -> SimulationReport {
        let engine = &self.engine;
        let markets = engine
            .ledger()
            .markets()
            .filter_map(|record| engine.market(&record.id))
            .collect();
        let positions = engine
            .ledger()
            .positions()
            .iter()
            .filter_map(|position| engine.position(position.id))
            .collect();

        let mut balances = BTreeMap::new();
        for wallet in &self.wallets {
            balances.insert(
                wallet.to_string(),
                format_units(engine.asset().balance_of(wallet)),
            );
        }

        SimulationReport {
            steps,
            markets,
            positions,
            balances,
            events: self.engine.drain_events(),
        }
    }

    /// Apply one step and return its receipt as JSON
    pub fn apply(&mut self, step: &Step) -> anyhow::Result<serde_json::Value> {
        let receipt = match step {
            Step::CreateMarket {
                market,
                creator,
                community,
            } => {
                let spec = MarketSpec::new(market.as_str(), creator.as_str(), community.as_str());
                self.wallets.push(spec.creator.clone());
                self.wallets.push(spec.community.clone());
                self.engine.create_market(spec.clone())?;
                serde_json::to_value(spec)?
            }
            Step::Buy {
                caller,
                market,
                amount,
                max_pay,
            } => {
                let caller = Address::from(caller.as_str());
                let max_pay = self.max_pay(&caller, max_pay.as_deref())?;
                let receipt =
                    self.engine
                        .buy(&caller, &MarketId::from(market.as_str()), tokens(amount)?, max_pay)?;
                serde_json::to_value(receipt)?
            }
            Step::Sell {
                caller,
                market,
                amount,
                min_receive,
            } => {
                let receipt = self.engine.sell(
                    &Address::from(caller.as_str()),
                    &MarketId::from(market.as_str()),
                    tokens(amount)?,
                    minimum(min_receive.as_deref())?,
                )?;
                serde_json::to_value(receipt)?
            }
            Step::Mortgage {
                caller,
                market,
                amount,
                min_payout,
                label,
            } => {
                let receipt = self.engine.mortgage(
                    &Address::from(caller.as_str()),
                    &MarketId::from(market.as_str()),
                    tokens(amount)?,
                    minimum(min_payout.as_deref())?,
                )?;
                self.label(label.as_deref(), receipt.position);
                serde_json::to_value(receipt)?
            }
            Step::MortgageAdd {
                caller,
                position,
                amount,
                min_payout,
            } => {
                let id = self.position(position)?;
                let receipt = self.engine.mortgage_add(
                    &Address::from(caller.as_str()),
                    id,
                    tokens(amount)?,
                    minimum(min_payout.as_deref())?,
                )?;
                serde_json::to_value(receipt)?
            }
            Step::Redeem {
                caller,
                position,
                amount,
                max_pay,
            } => {
                let caller = Address::from(caller.as_str());
                let max_pay = self.max_pay(&caller, max_pay.as_deref())?;
                let id = self.position(position)?;
                let receipt = self.engine.redeem(&caller, id, tokens(amount)?, max_pay)?;
                serde_json::to_value(receipt)?
            }
            Step::Merge {
                caller,
                target,
                source,
                min_rebate,
            } => {
                let (target, source) = (self.position(target)?, self.position(source)?);
                let receipt = self.engine.merge(
                    &Address::from(caller.as_str()),
                    target,
                    source,
                    minimum(min_rebate.as_deref())?,
                )?;
                serde_json::to_value(receipt)?
            }
            Step::Split {
                caller,
                position,
                amount,
                max_pay,
                label,
            } => {
                let caller = Address::from(caller.as_str());
                let max_pay = self.max_pay(&caller, max_pay.as_deref())?;
                let id = self.position(position)?;
                let receipt = self.engine.split(&caller, id, tokens(amount)?, max_pay)?;
                self.label(label.as_deref(), receipt.created);
                serde_json::to_value(receipt)?
            }
            Step::Multiply {
                caller,
                market,
                amount,
                max_pay,
                label,
            } => {
                let caller = Address::from(caller.as_str());
                let max_pay = self.max_pay(&caller, max_pay.as_deref())?;
                let receipt = self.engine.multiply(
                    &caller,
                    &MarketId::from(market.as_str()),
                    tokens(amount)?,
                    max_pay,
                )?;
                self.label(label.as_deref(), receipt.position);
                serde_json::to_value(receipt)?
            }
            Step::MultiplyAdd {
                caller,
                position,
                amount,
                max_pay,
            } => {
                let caller = Address::from(caller.as_str());
                let max_pay = self.max_pay(&caller, max_pay.as_deref())?;
                let id = self.position(position)?;
                let receipt = self.engine.multiply_add(&caller, id, tokens(amount)?, max_pay)?;
                serde_json::to_value(receipt)?
            }
            Step::Transfer {
                caller,
                to,
                position,
            } => {
                let id = self.position(position)?;
                let to = Address::from(to.as_str());
                self.engine
                    .transfer_position(&Address::from(caller.as_str()), &to, id)?;
                self.wallets.push(to.clone());
                serde_json::json!({ "position": id, "to": to })
            }
            Step::Approve {
                caller,
                position,
                delegate,
            } => {
                let id = self.position(position)?;
                let delegate = delegate.as_deref().map(Address::from);
                self.engine
                    .approve_position(&Address::from(caller.as_str()), id, delegate.clone())?;
                serde_json::json!({ "position": id, "delegate": delegate })
            }
            Step::SetOperator {
                caller,
                operator,
                approved,
            } => {
                self.engine.set_operator(
                    &Address::from(caller.as_str()),
                    &Address::from(operator.as_str()),
                    *approved,
                )?;
                serde_json::json!({ "operator": operator, "approved": approved })
            }
        };
        Ok(receipt)
    }

    /// Resolve a label or a literal position id
    fn position(&self, reference: &str) -> anyhow::Result<PositionId> {
        if let Some(id) = self.labels.get(reference) {
            return Ok(*id);
        }
        reference
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Unknown position reference '{reference}': {e}"))
    }

    fn label(&mut self, label: Option<&str>, id: PositionId) {
        if let Some(label) = label {
            self.labels.insert(label.to_string(), id);
        }
    }

    /// Explicit cap, or everything the caller holds
    fn max_pay(&self, caller: &Address, explicit: Option<&str>) -> anyhow::Result<U256> {
        match explicit {
            Some(amount) => value(amount),
            None => Ok(self.engine.asset().balance_of(caller)),
        }
    }
}

fn tokens(amount: &str) -> anyhow::Result<TokenAmount> {
    parse_units(amount).with_context(|| format!("Invalid token amount '{amount}'"))
}

fn value(amount: &str) -> anyhow::Result<U256> {
    Ok(U256::from(tokens(amount)?))
}

fn minimum(limit: Option<&str>) -> anyhow::Result<U256> {
    limit.map_or(Ok(U256::zero()), value)
}

/// Build the settlement asset with every wallet funded
fn fund(kind: AssetKind, funding: &[(Address, U256)]) -> anyhow::Result<Box<dyn PaymentAsset>> {
    Ok(match kind {
        AssetKind::Native => {
            let mut native = NativeCurrency::new();
            for (holder, amount) in funding {
                native.deposit(holder, *amount)?;
            }
            Box::new(native)
        }
        AssetKind::Token => {
            let mut token = FungibleToken::new("CBT");
            let custody = token.custody().clone();
            for (holder, amount) in funding {
                token.mint(holder, *amount)?;
                token.approve(holder, &custody, U256::max_value());
            }
            Box::new(token)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_parse_from_tagged_json() {
        let step: Step = serde_json::from_str(
            r#"{"op": "multiply", "caller": "alice", "market": "app-1", "amount": "83333.333", "label": "lev"}"#,
        )
        .unwrap();
        assert_eq!(step.name(), "multiply");
        let set_operator: Step =
            serde_json::from_str(r#"{"op": "set_operator", "caller": "a", "operator": "b", "approved": true}"#)
                .unwrap();
        assert_eq!(set_operator.name(), "set_operator");
        assert!(matches!(
            step,
            Step::Multiply { max_pay: None, label: Some(ref l), .. } if l == "lev"
        ));

        let unknown = serde_json::from_str::<Step>(r#"{"op": "liquidate", "caller": "alice"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_minimum_defaults_to_zero() {
        assert!(minimum(None).unwrap().is_zero());
        assert_eq!(minimum(Some("1.5")).unwrap(), U256::from(1_500_000_000_000_000_000u128));
        assert!(minimum(Some("abc")).is_err());
    }
}
