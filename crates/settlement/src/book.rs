//! In-memory balance book shared by the bundled payment assets

use std::collections::HashMap;

use curvebank_core::{Address, U256};

use crate::error::SettlementError;

#[derive(Debug, Clone, Default)]
pub(crate) struct Book {
    balances: HashMap<Address, U256>,
}

impl Book {
    pub(crate) fn balance_of(&self, holder: &Address) -> U256 {
        self.balances.get(holder).copied().unwrap_or_else(U256::zero)
    }

    pub(crate) fn credit(&mut self, holder: &Address, amount: U256) -> Result<(), SettlementError> {
        let updated = self
            .balance_of(holder)
            .checked_add(amount)
            .ok_or(SettlementError::Overflow)?;
        self.balances.insert(holder.clone(), updated);
        Ok(())
    }

    pub(crate) fn debit(&mut self, holder: &Address, amount: U256) -> Result<(), SettlementError> {
        let available = self.balance_of(holder);
        let updated = available
            .checked_sub(amount)
            .ok_or_else(|| SettlementError::InsufficientFunds {
                holder: holder.clone(),
                available,
                required: amount,
            })?;
        self.balances.insert(holder.clone(), updated);
        Ok(())
    }

    pub(crate) fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), SettlementError> {
        self.debit(from, amount)?;
        if let Err(e) = self.credit(to, amount) {
            // Undo the debit; the credit back cannot overflow what was just held
            self.balances
                .insert(from.clone(), self.balance_of(from).saturating_add(amount));
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn total(&self) -> U256 {
        self.balances
            .values()
            .fold(U256::zero(), |acc, v| acc.saturating_add(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_value() {
        let mut book = Book::default();
        let alice = Address::from("alice");
        let bob = Address::from("bob");

        book.credit(&alice, U256::from(100u64)).unwrap();
        book.transfer(&alice, &bob, U256::from(30u64)).unwrap();

        assert_eq!(book.balance_of(&alice), U256::from(70u64));
        assert_eq!(book.balance_of(&bob), U256::from(30u64));
        assert_eq!(book.total(), U256::from(100u64));
    }

    #[test]
    fn test_debit_rejects_overdraft() {
        let mut book = Book::default();
        let alice = Address::from("alice");
        let result = book.debit(&alice, U256::one());
        assert!(matches!(
            result,
            Err(SettlementError::InsufficientFunds { .. })
        ));
        assert!(book.balance_of(&alice).is_zero());
    }
}
