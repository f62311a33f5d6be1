//! Collateral receipts - the ownership registry of positions
//!
//! The registry is the only record of who owns a position. Receipts are
//! transferable; each receipt may carry one approved delegate, and each
//! owner may approve operators over all of their receipts.

use curvebank_core::{Address, PositionId};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::OwnershipError;

/// Ownership registry consumed by the market engine
pub trait OwnershipRegistry: Send {
    /// Mint a receipt for a new position
    fn mint(&mut self, to: &Address, id: PositionId) -> Result<(), OwnershipError>;

    /// Burn the receipt of a deleted position, clearing its approval
    fn burn(&mut self, id: PositionId) -> Result<(), OwnershipError>;

    fn owner_of(&self, id: PositionId) -> Option<Address>;

    /// Per-receipt delegate, if any
    fn approved(&self, id: PositionId) -> Option<Address>;

    fn is_operator(&self, owner: &Address, operator: &Address) -> bool;

    /// Set or clear the delegate of a receipt; only the owner or an operator may
    fn approve(
        &mut self,
        caller: &Address,
        id: PositionId,
        delegate: Option<Address>,
    ) -> Result<(), OwnershipError>;

    fn set_operator(&mut self, owner: &Address, operator: &Address, approved: bool);

    /// Move a receipt; clears its delegate
    fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        id: PositionId,
    ) -> Result<(), OwnershipError>;

    /// Receipts held by `owner`, in id order
    fn receipts_of(&self, owner: &Address) -> Vec<PositionId>;

    /// Owner, delegate or one of the owner's operators
    fn is_authorized(&self, spender: &Address, id: PositionId) -> bool {
        match self.owner_of(id) {
            Some(owner) => {
                &owner == spender
                    || self.approved(id).as_ref() == Some(spender)
                    || self.is_operator(&owner, spender)
            }
            None => false,
        }
    }
}

/// In-memory ownership registry
#[derive(Debug, Default)]
pub struct ReceiptRegistry {
    owners: HashMap<PositionId, Address>,
    held: HashMap<Address, BTreeSet<PositionId>>,
    approvals: HashMap<PositionId, Address>,
    operators: HashMap<Address, HashSet<Address>>,
}

impl ReceiptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live receipts
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    fn detach(&mut self, owner: &Address, id: PositionId) {
        if let Some(ids) = self.held.get_mut(owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.held.remove(owner);
            }
        }
    }
}

impl OwnershipRegistry for ReceiptRegistry {
    fn mint(&mut self, to: &Address, id: PositionId) -> Result<(), OwnershipError> {
        if to.is_system() {
            return Err(OwnershipError::InvalidRecipient(to.clone()));
        }
        if self.owners.contains_key(&id) {
            return Err(OwnershipError::AlreadyMinted(id));
        }
        self.owners.insert(id, to.clone());
        self.held.entry(to.clone()).or_default().insert(id);
        Ok(())
    }

    fn burn(&mut self, id: PositionId) -> Result<(), OwnershipError> {
        let owner = self
            .owners
            .remove(&id)
            .ok_or(OwnershipError::UnknownReceipt(id))?;
        self.detach(&owner, id);
        self.approvals.remove(&id);
        Ok(())
    }

    fn owner_of(&self, id: PositionId) -> Option<Address> {
        self.owners.get(&id).cloned()
    }

    fn approved(&self, id: PositionId) -> Option<Address> {
        self.approvals.get(&id).cloned()
    }

    fn is_operator(&self, owner: &Address, operator: &Address) -> bool {
        self.operators
            .get(owner)
            .is_some_and(|ops| ops.contains(operator))
    }

    fn approve(
        &mut self,
        caller: &Address,
        id: PositionId,
        delegate: Option<Address>,
    ) -> Result<(), OwnershipError> {
        let owner = self.owner_of(id).ok_or(OwnershipError::UnknownReceipt(id))?;
        if &owner != caller && !self.is_operator(&owner, caller) {
            return Err(OwnershipError::NotAuthorized {
                caller: caller.clone(),
                id,
            });
        }
        match delegate {
            Some(delegate) => {
                self.approvals.insert(id, delegate);
            }
            None => {
                self.approvals.remove(&id);
            }
        }
        Ok(())
    }

    fn set_operator(&mut self, owner: &Address, operator: &Address, approved: bool) {
        if approved {
            self.operators
                .entry(owner.clone())
                .or_default()
                .insert(operator.clone());
        } else if let Some(ops) = self.operators.get_mut(owner) {
            ops.remove(operator);
            if ops.is_empty() {
                self.operators.remove(owner);
            }
        }
    }

    fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        id: PositionId,
    ) -> Result<(), OwnershipError> {
        let owner = self.owner_of(id).ok_or(OwnershipError::UnknownReceipt(id))?;
        if !self.is_authorized(caller, id) {
            return Err(OwnershipError::NotAuthorized {
                caller: caller.clone(),
                id,
            });
        }
        if to.is_system() {
            return Err(OwnershipError::InvalidRecipient(to.clone()));
        }

        self.detach(&owner, id);
        self.approvals.remove(&id);
        self.owners.insert(id, to.clone());
        self.held.entry(to.clone()).or_default().insert(id);
        Ok(())
    }

    fn receipts_of(&self, owner: &Address) -> Vec<PositionId> {
        self.held
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::from(s)
    }

    #[test]
    fn test_mint_and_burn() {
        let mut registry = ReceiptRegistry::new();
        let id = PositionId::new(0, 0);

        registry.mint(&addr("alice"), id).unwrap();
        assert_eq!(registry.owner_of(id), Some(addr("alice")));
        assert_eq!(
            registry.mint(&addr("bob"), id),
            Err(OwnershipError::AlreadyMinted(id))
        );

        registry.burn(id).unwrap();
        assert_eq!(registry.owner_of(id), None);
        assert!(registry.receipts_of(&addr("alice")).is_empty());
        assert_eq!(registry.burn(id), Err(OwnershipError::UnknownReceipt(id)));
    }

    #[test]
    fn test_authorization_paths() {
        let mut registry = ReceiptRegistry::new();
        let id = PositionId::new(1, 0);
        registry.mint(&addr("alice"), id).unwrap();

        assert!(registry.is_authorized(&addr("alice"), id));
        assert!(!registry.is_authorized(&addr("bob"), id));

        registry.approve(&addr("alice"), id, Some(addr("bob"))).unwrap();
        assert!(registry.is_authorized(&addr("bob"), id));

        registry.set_operator(&addr("alice"), &addr("carol"), true);
        assert!(registry.is_authorized(&addr("carol"), id));
        registry.set_operator(&addr("alice"), &addr("carol"), false);
        assert!(!registry.is_authorized(&addr("carol"), id));

        // A delegate cannot re-delegate
        assert!(matches!(
            registry.approve(&addr("bob"), id, Some(addr("dave"))),
            Err(OwnershipError::NotAuthorized { .. })
        ));
    }

    #[test]
    fn test_transfer_clears_approval() {
        let mut registry = ReceiptRegistry::new();
        let id = PositionId::new(2, 0);
        registry.mint(&addr("alice"), id).unwrap();
        registry.approve(&addr("alice"), id, Some(addr("bob"))).unwrap();

        registry.transfer(&addr("bob"), &addr("erin"), id).unwrap();
        assert_eq!(registry.owner_of(id), Some(addr("erin")));
        assert_eq!(registry.approved(id), None);
        assert!(!registry.is_authorized(&addr("bob"), id));
        assert_eq!(registry.receipts_of(&addr("erin")), vec![id]);
        assert!(registry.receipts_of(&addr("alice")).is_empty());
    }

    #[test]
    fn test_rejects_system_recipients() {
        let mut registry = ReceiptRegistry::new();
        let id = PositionId::new(3, 0);
        assert!(matches!(
            registry.mint(&Address::mortgage_reserve(), id),
            Err(OwnershipError::InvalidRecipient(_))
        ));

        registry.mint(&addr("alice"), id).unwrap();
        assert!(matches!(
            registry.transfer(&addr("alice"), &Address::custody(), id),
            Err(OwnershipError::InvalidRecipient(_))
        ));
        assert_eq!(registry.owner_of(id), Some(addr("alice")));
    }
}
