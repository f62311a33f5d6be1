//! Native currency - value attached to the call

use curvebank_core::{Address, U256};

use crate::asset::{AssetKind, Collected, PaymentAsset};
use crate::book::Book;
use crate::error::SettlementError;

/// In-memory native currency.
///
/// Payments behave like value attached to a call: the payer hands over the
/// whole offer and the excess over what is due comes straight back.
#[derive(Debug, Clone)]
pub struct NativeCurrency {
    custody: Address,
    book: Book,
}

impl NativeCurrency {
    pub fn new() -> Self {
        Self::with_custody(Address::custody())
    }

    pub fn with_custody(custody: Address) -> Self {
        Self {
            custody,
            book: Book::default(),
        }
    }

    /// Credit a wallet with freshly issued value
    pub fn deposit(&mut self, holder: &Address, amount: U256) -> Result<(), SettlementError> {
        self.book.credit(holder, amount)
    }

    /// Total value across all wallets, custody included
    pub fn total_issued(&self) -> U256 {
        self.book.total()
    }
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentAsset for NativeCurrency {
    fn kind(&self) -> AssetKind {
        AssetKind::Native
    }

    fn custody(&self) -> &Address {
        &self.custody
    }

    fn balance_of(&self, holder: &Address) -> U256 {
        self.book.balance_of(holder)
    }

    fn transfer_in(&mut self, from: &Address, amount: U256) -> Result<(), SettlementError> {
        let custody = self.custody.clone();
        self.book.transfer(from, &custody, amount)
    }

    fn transfer_out(&mut self, to: &Address, amount: U256) -> Result<(), SettlementError> {
        let custody = self.custody.clone();
        self.book.transfer(&custody, to, amount)
    }

    fn collect(
        &mut self,
        from: &Address,
        due: U256,
        offered: U256,
    ) -> Result<Collected, SettlementError> {
        if offered < due {
            return Err(SettlementError::Underpaid { due, offered });
        }
        self.transfer_in(from, offered)?;

        let refunded = offered - due;
        if !refunded.is_zero() {
            if let Err(e) = self.transfer_out(from, refunded) {
                self.transfer_out(from, offered)?;
                return Err(e);
            }
        }
        Ok(Collected {
            taken: offered,
            refunded,
        })
    }
}
