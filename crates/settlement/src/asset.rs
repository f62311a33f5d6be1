//! Payment asset boundary

use curvebank_core::{Address, U256};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::SettlementError;

/// Which kind of asset settles payments
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetKind {
    /// Value attached to the call; the whole offer is taken and the excess refunded
    Native,
    /// Fungible token pulled against an allowance; exactly the amount due is taken
    Token,
}

/// Result of collecting a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collected {
    /// Amount moved into custody
    pub taken: U256,
    /// Amount sent back to the payer
    pub refunded: U256,
}

impl Collected {
    /// Value that stayed in custody
    pub fn net(&self) -> U256 {
        self.taken.saturating_sub(self.refunded)
    }
}

/// A payment asset the engine settles through.
///
/// Implementations move value between holders and the engine's custody
/// account. Each transfer is atomic; the settlement plan compensates
/// completed transfers when a later one fails.
pub trait PaymentAsset: Send {
    /// Asset kind, fixed for the lifetime of the asset
    fn kind(&self) -> AssetKind;

    /// Account holding the engine's funds
    fn custody(&self) -> &Address;

    /// Balance of a holder
    fn balance_of(&self, holder: &Address) -> U256;

    /// Move `amount` from `from` into custody
    fn transfer_in(&mut self, from: &Address, amount: U256) -> Result<(), SettlementError>;

    /// Move `amount` out of custody to `to`
    fn transfer_out(&mut self, to: &Address, amount: U256) -> Result<(), SettlementError>;

    /// Take back a payout made to `from` while reversing a settlement
    fn reclaim(&mut self, from: &Address, amount: U256) -> Result<(), SettlementError> {
        self.transfer_in(from, amount)
    }

    /// Reverse a collection made by `collect`
    fn uncollect(&mut self, payer: &Address, collected: Collected) -> Result<(), SettlementError> {
        self.transfer_out(payer, collected.net())
    }

    /// Collect a payment of `due` from a payer who offered `offered`.
    ///
    /// The default pulls exactly `due`, which is how allowance-based
    /// tokens behave.
    fn collect(
        &mut self,
        from: &Address,
        due: U256,
        offered: U256,
    ) -> Result<Collected, SettlementError> {
        if offered < due {
            return Err(SettlementError::Underpaid { due, offered });
        }
        self.transfer_in(from, due)?;
        Ok(Collected {
            taken: due,
            refunded: U256::zero(),
        })
    }
}
