//! Fungible token - pulled against an allowance

use std::collections::HashMap;

use curvebank_core::{Address, U256};

use crate::asset::{AssetKind, Collected, PaymentAsset};
use crate::book::Book;
use crate::error::SettlementError;

/// In-memory fungible token with allowances.
///
/// The engine pulls exactly the amount due from the payer, who must first
/// approve the engine's custody account as spender.
#[derive(Debug, Clone)]
pub struct FungibleToken {
    symbol: String,
    custody: Address,
    book: Book,
    allowances: HashMap<(Address, Address), U256>,
}

impl FungibleToken {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_custody(symbol, Address::custody())
    }

    pub fn with_custody(symbol: impl Into<String>, custody: Address) -> Self {
        Self {
            symbol: symbol.into(),
            custody,
            book: Book::default(),
            allowances: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Issue new tokens to a holder
    pub fn mint(&mut self, holder: &Address, amount: U256) -> Result<(), SettlementError> {
        self.book.credit(holder, amount)
    }

    /// Set the amount `spender` may pull from `owner`
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: U256) {
        self.allowances
            .insert((owner.clone(), spender.clone()), amount);
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_else(U256::zero)
    }

    pub fn total_supply(&self) -> U256 {
        self.book.total()
    }
}

impl PaymentAsset for FungibleToken {
    fn kind(&self) -> AssetKind {
        AssetKind::Token
    }

    fn custody(&self) -> &Address {
        &self.custody
    }

    fn balance_of(&self, holder: &Address) -> U256 {
        self.book.balance_of(holder)
    }

    fn transfer_in(&mut self, from: &Address, amount: U256) -> Result<(), SettlementError> {
        let custody = self.custody.clone();
        let allowance = self.allowance(from, &custody);
        if allowance < amount {
            return Err(SettlementError::InsufficientAllowance {
                owner: from.clone(),
                allowance,
                required: amount,
            });
        }
        self.book.transfer(from, &custody, amount)?;
        self.allowances
            .insert((from.clone(), custody), allowance - amount);
        Ok(())
    }

    fn transfer_out(&mut self, to: &Address, amount: U256) -> Result<(), SettlementError> {
        let custody = self.custody.clone();
        self.book.transfer(&custody, to, amount)
    }

    fn reclaim(&mut self, from: &Address, amount: U256) -> Result<(), SettlementError> {
        let custody = self.custody.clone();
        self.book.transfer(from, &custody, amount)
    }

    fn uncollect(&mut self, payer: &Address, collected: Collected) -> Result<(), SettlementError> {
        let custody = self.custody.clone();
        let net = collected.net();
        self.book.transfer(&custody, payer, net)?;
        let allowance = self.allowance(payer, &custody);
        self.allowances
            .insert((payer.clone(), custody), allowance.saturating_add(net));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_collect_pulls_exactly_due() {
        let mut token = FungibleToken::new("USDC");
        let alice = Address::from("alice");
        token.mint(&alice, wei(1_000)).unwrap();
        token.approve(&alice, &Address::custody(), wei(800));

        let collected = token.collect(&alice, wei(300), wei(800)).unwrap();

        assert_eq!(collected.taken, wei(300));
        assert!(collected.refunded.is_zero());
        assert_eq!(token.balance_of(&alice), wei(700));
        assert_eq!(token.allowance(&alice, &Address::custody()), wei(500));
    }

    #[test]
    fn test_transfer_in_requires_allowance() {
        let mut token = FungibleToken::new("USDC");
        let alice = Address::from("alice");
        token.mint(&alice, wei(1_000)).unwrap();

        let result = token.transfer_in(&alice, wei(1));
        assert!(matches!(
            result,
            Err(SettlementError::InsufficientAllowance { .. })
        ));
        assert_eq!(token.kind(), AssetKind::Token);
        assert_eq!(token.kind().to_string(), "token");
    }

    #[test]
    fn test_failed_plan_restores_allowance() {
        use crate::plan::{PayoutKind, SettlementPlan};

        let mut token = FungibleToken::new("USDC");
        let alice = Address::from("alice");
        let bob = Address::from("bob");
        token.mint(&alice, wei(100)).unwrap();
        token.approve(&alice, &Address::custody(), wei(100));

        // Custody holds 50 after collection, the second payout cannot be covered
        let plan = SettlementPlan::new()
            .collect(&alice, wei(50), wei(100))
            .pay(&bob, wei(30), PayoutKind::Proceeds)
            .pay(&bob, wei(30), PayoutKind::Proceeds);
        assert!(plan.execute(&mut token).is_err());

        assert_eq!(token.balance_of(&alice), wei(100));
        assert!(token.balance_of(&bob).is_zero());
        assert_eq!(token.allowance(&alice, &Address::custody()), wei(100));
    }
}
