//! Position registry - collateral positions in a generational arena
//!
//! Removing a position bumps its slot's generation and frees the slot for
//! reuse. A handle carrying an older generation never resolves again. A slot
//! whose generation cannot be bumped any further is retired.

use curvebank_core::{serde_u128, MarketId, PositionId, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A collateral position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    /// Creation order, never reused
    pub serial: u64,
    pub market: MarketId,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    entry: Option<Position>,
}

/// Generational storage of live positions
#[derive(Debug, Clone, Default)]
pub struct PositionArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_serial: u64,
    live: usize,
}

impl PositionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live positions
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn contains(&self, id: PositionId) -> bool {
        self.get(id).is_some()
    }

    /// Live positions in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.slots.iter().filter_map(|slot| slot.entry.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: PositionId) -> Option<&mut Position> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_mut())
    }

    pub(crate) fn insert(
        &mut self,
        market: MarketId,
        amount: TokenAmount,
    ) -> Result<PositionId, LedgerError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| LedgerError::ArenaFull)?;
                self.slots.push(Slot::default());
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = PositionId::new(index, slot.generation);
        slot.entry = Some(Position {
            id,
            serial: self.next_serial,
            market,
            amount,
        });
        self.next_serial += 1;
        self.live += 1;
        Ok(id)
    }

    pub(crate) fn remove(&mut self, id: PositionId) -> Option<Position> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())?;
        let position = slot.entry.take()?;

        // Retire the slot once its generation is exhausted
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(id.index());
        }
        self.live -= 1;
        Some(position)
    }

    /// Reverse the most recent `insert` that returned `id`
    pub(crate) fn undo_insert(&mut self, id: PositionId) {
        let index = id.index() as usize;
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if slot.entry.take().is_none() {
            return;
        }
        self.live -= 1;
        self.next_serial = self.next_serial.saturating_sub(1);

        // Generation 0 means the slot was pushed by this insert
        if id.generation() == 0 && index + 1 == self.slots.len() {
            self.slots.pop();
        } else {
            self.free.push(id.index());
        }
    }

    /// Reverse the most recent `remove` that returned `position`
    pub(crate) fn undo_remove(&mut self, position: Position) {
        let index = position.id.index();
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return;
        };
        if self.free.last() == Some(&index) {
            self.free.pop();
        }
        slot.generation = position.id.generation();
        slot.entry = Some(position);
        self.live += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> MarketId {
        MarketId::from("m")
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = PositionArena::new();
        let a = arena.insert(market(), 10).unwrap();
        let b = arena.insert(market(), 20).unwrap();

        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).unwrap().amount, 10);
        assert_eq!(arena.get(b).unwrap().serial, 1);
    }

    #[test]
    fn test_stale_id_never_resolves() {
        let mut arena = PositionArena::new();
        let old = arena.insert(market(), 10).unwrap();
        arena.remove(old).unwrap();

        let reused = arena.insert(market(), 30).unwrap();
        assert_eq!(reused.index(), old.index());
        assert_ne!(reused.generation(), old.generation());
        assert!(arena.get(old).is_none());
        assert!(arena.remove(old).is_none());
        assert_eq!(arena.get(reused).unwrap().amount, 30);
        assert_eq!(arena.get(reused).unwrap().serial, 1);
    }

    #[test]
    fn test_undo_insert_restores_layout() {
        let mut arena = PositionArena::new();
        let kept = arena.insert(market(), 1).unwrap();
        let fresh = arena.insert(market(), 2).unwrap();
        arena.undo_insert(fresh);

        assert_eq!(arena.len(), 1);
        assert!(arena.get(fresh).is_none());
        assert_eq!(arena.insert(market(), 3).unwrap(), fresh);

        // Reused slot goes back on the free list
        arena.remove(kept).unwrap();
        let reused = arena.insert(market(), 4).unwrap();
        arena.undo_insert(reused);
        assert_eq!(arena.insert(market(), 5).unwrap(), reused);
    }

    #[test]
    fn test_undo_remove_restores_position() {
        let mut arena = PositionArena::new();
        let id = arena.insert(market(), 7).unwrap();
        let removed = arena.remove(id).unwrap();
        arena.undo_remove(removed);

        assert_eq!(arena.get(id).unwrap().amount, 7);
        assert_eq!(arena.len(), 1);

        // The slot is no longer free
        let next = arena.insert(market(), 1).unwrap();
        assert_ne!(next.index(), id.index());
    }
}
