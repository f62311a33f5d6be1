//! Market events
//!
//! Appended after an operation commits; a failed operation records nothing.

use chrono::{DateTime, Utc};
use curvebank_core::{Address, Clock, FeeConfig, MarketId, PositionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::AsRefStr;

use crate::outcome::{
    BuyReceipt, MergeReceipt, MortgageReceipt, MultiplyReceipt, RedeemReceipt, SellReceipt,
    SplitReceipt,
};

/// A committed state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Monotonic, starting at 1
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    MarketCreated {
        market: MarketId,
        creator: Address,
        community: Address,
        fees: FeeConfig,
    },
    Bought {
        caller: Address,
        receipt: BuyReceipt,
    },
    Sold {
        caller: Address,
        receipt: SellReceipt,
    },
    Mortgaged {
        caller: Address,
        market: MarketId,
        receipt: MortgageReceipt,
    },
    MortgageIncreased {
        caller: Address,
        receipt: MortgageReceipt,
    },
    Redeemed {
        caller: Address,
        receipt: RedeemReceipt,
    },
    Merged {
        caller: Address,
        receipt: MergeReceipt,
    },
    Split {
        caller: Address,
        receipt: SplitReceipt,
    },
    Multiplied {
        caller: Address,
        receipt: MultiplyReceipt,
    },
    PositionTransferred {
        position: PositionId,
        from: Address,
        to: Address,
    },
}

impl EventKind {
    /// Event name for logs
    pub fn name(&self) -> &str {
        self.as_ref()
    }
}

/// Append-only event buffer
pub struct EventLog {
    clock: Arc<dyn Clock>,
    next_sequence: u64,
    pending: Vec<MarketEvent>,
}

impl EventLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_sequence: 1,
            pending: Vec::new(),
        }
    }

    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub fn record(&mut self, kind: EventKind) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        tracing::debug!(sequence, event = kind.name(), "Event recorded");
        self.pending.push(MarketEvent {
            sequence,
            timestamp: self.clock.now(),
            kind,
        });
        sequence
    }

    /// Events recorded since the last drain
    pub fn pending(&self) -> &[MarketEvent] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.pending)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("next_sequence", &self.next_sequence)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use curvebank_core::FixedClock;

    #[test]
    fn test_sequence_and_drain() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut log = EventLog::new(Arc::new(FixedClock::new(at)));

        let transfer = EventKind::PositionTransferred {
            position: PositionId::new(0, 0),
            from: Address::from("alice"),
            to: Address::from("bob"),
        };
        assert_eq!(log.record(transfer.clone()), 1);
        assert_eq!(log.record(transfer), 2);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].sequence, 2);
        assert_eq!(drained[0].timestamp, at);
        assert!(log.pending().is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let kind = EventKind::MarketCreated {
            market: MarketId::from("m"),
            creator: Address::from("c"),
            community: Address::from("k"),
            fees: FeeConfig::standard(),
        };
        assert_eq!(kind.name(), "market_created");

        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["market_created"]["market"], "m");
    }
}
