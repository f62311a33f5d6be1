//! Settlement plans - the value movements of one operation
//!
//! An operation first collects what the caller owes (if anything), then pays
//! out proceeds and fees from custody. Execution is all-or-nothing: when a
//! transfer fails, every completed transfer is reversed in reverse order.

use curvebank_core::{Address, U256};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::asset::{Collected, PaymentAsset};
use crate::error::SettlementError;

/// Why value leaves custody
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayoutKind {
    /// Sale proceeds, mortgage payout or merge rebate
    Proceeds,
    CreatorFee,
    CommunityFee,
    ProtocolFee,
}

/// A payment owed by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub payer: Address,
    pub due: U256,
    pub offered: U256,
}

/// A transfer out of custody
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub to: Address,
    pub amount: U256,
    pub kind: PayoutKind,
}

/// What a successful settlement moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementReport {
    pub collected: Option<Collected>,
    pub paid_out: U256,
}

impl SettlementReport {
    /// Amount refunded to the payer (native assets only)
    pub fn refunded(&self) -> U256 {
        self.collected
            .map(|c| c.refunded)
            .unwrap_or_else(U256::zero)
    }
}

/// Value movements of one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementPlan {
    collection: Option<Collection>,
    payouts: Vec<Payout>,
}

/// A transfer that has already happened and may need reversing
enum Completed {
    Collected { payer: Address, collected: Collected },
    Paid { to: Address, amount: U256 },
}

impl SettlementPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `due` from `payer`, who offered `offered`
    pub fn collect(mut self, payer: &Address, due: U256, offered: U256) -> Self {
        self.collection = Some(Collection {
            payer: payer.clone(),
            due,
            offered,
        });
        self
    }

    /// Pay `amount` out of custody; zero amounts are dropped
    pub fn pay(mut self, to: &Address, amount: U256, kind: PayoutKind) -> Self {
        if !amount.is_zero() {
            self.payouts.push(Payout {
                to: to.clone(),
                amount,
                kind,
            });
        }
        self
    }

    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref()
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    /// Sum of all payouts
    pub fn total_out(&self) -> U256 {
        self.payouts
            .iter()
            .fold(U256::zero(), |acc, p| acc.saturating_add(p.amount))
    }

    /// Execute the plan against a payment asset
    pub fn execute(
        &self,
        asset: &mut dyn PaymentAsset,
    ) -> Result<SettlementReport, SettlementError> {
        let mut completed: Vec<Completed> = Vec::with_capacity(self.payouts.len() + 1);

        let collected = match &self.collection {
            Some(c) if !c.due.is_zero() || c.offered > c.due => {
                let collected = asset.collect(&c.payer, c.due, c.offered)?;
                completed.push(Completed::Collected {
                    payer: c.payer.clone(),
                    collected,
                });
                Some(collected)
            }
            _ => None,
        };

        let mut paid_out = U256::zero();
        for payout in &self.payouts {
            if let Err(e) = asset.transfer_out(&payout.to, payout.amount) {
                tracing::warn!(
                    to = %payout.to,
                    amount = %payout.amount,
                    kind = payout.kind.as_ref(),
                    error = %e,
                    "Payout failed, reversing settlement"
                );
                compensate(asset, completed);
                return Err(e);
            }
            paid_out = paid_out.saturating_add(payout.amount);
            completed.push(Completed::Paid {
                to: payout.to.clone(),
                amount: payout.amount,
            });
        }

        tracing::debug!(
            collected = %collected.map(|c| c.net()).unwrap_or_else(U256::zero),
            paid_out = %paid_out,
            "Settlement executed"
        );

        Ok(SettlementReport {
            collected,
            paid_out,
        })
    }

    /// Reverse a plan that `execute` completed
    pub fn revert(&self, asset: &mut dyn PaymentAsset, report: &SettlementReport) {
        let mut completed = Vec::with_capacity(self.payouts.len() + 1);
        if let (Some(c), Some(collected)) = (&self.collection, report.collected) {
            completed.push(Completed::Collected {
                payer: c.payer.clone(),
                collected,
            });
        }
        completed.extend(self.payouts.iter().map(|p| Completed::Paid {
            to: p.to.clone(),
            amount: p.amount,
        }));
        tracing::warn!(steps = completed.len(), "Reverting settlement");
        compensate(asset, completed);
    }
}

fn compensate(asset: &mut dyn PaymentAsset, completed: Vec<Completed>) {
    for step in completed.into_iter().rev() {
        let result = match &step {
            Completed::Paid { to, amount } => asset.reclaim(to, *amount),
            Completed::Collected { payer, collected } => asset.uncollect(payer, *collected),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Settlement compensation failed");
        }
    }
}
