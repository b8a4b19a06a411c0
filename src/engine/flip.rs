//! Flip Order Model
//!
//! A flip order rests on the book and, on full fill, atomically re-posts as
//! an order of the opposite side at `flip_tick`, funded from the maker's
//! internal exchange balance. The side/destination invariants are checked
//! here at construction time: the exchange would reject a violating order
//! on-chain anyway, but that would burn a transaction and a budget slot.

use thiserror::Error;

use crate::chain::types::Side;

use super::ticks::{is_valid_tick, InvalidTick};

// ======================= ERRORS =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlipViolation {
    /// A bid's flip destination must sit above its resting tick.
    #[error("bid at tick {tick} cannot flip to {flip_tick}: destination must be above")]
    BidFlipNotAbove { tick: i64, flip_tick: i64 },
    /// An ask's flip destination must sit below its resting tick.
    #[error("ask at tick {tick} cannot flip to {flip_tick}: destination must be below")]
    AskFlipNotBelow { tick: i64, flip_tick: i64 },
    #[error(transparent)]
    Tick(#[from] InvalidTick),
}

// ======================= FLIP ORDER =======================

/// A validated flip order, ready for submission.
///
/// Construction is the only way to obtain one, so any `FlipOrder` handed to
/// the chain client already satisfies the grid and side/destination
/// invariants.
#[derive(Debug, Clone)]
pub struct FlipOrder {
    pub side: Side,
    pub tick: i64,
    pub flip_tick: i64,
    /// Address of the token posted at `tick`.
    pub token: String,
    /// Order size in base units of `token`.
    pub amount: u128,
}

impl FlipOrder {
    pub fn new(
        side: Side,
        tick: i64,
        flip_tick: i64,
        token: String,
        amount: u128,
    ) -> Result<Self, FlipViolation> {
        if !is_valid_tick(tick) {
            return Err(InvalidTick(tick).into());
        }
        if !is_valid_tick(flip_tick) {
            return Err(InvalidTick(flip_tick).into());
        }
        match side {
            Side::Bid if flip_tick <= tick => {
                return Err(FlipViolation::BidFlipNotAbove { tick, flip_tick })
            }
            Side::Ask if flip_tick >= tick => {
                return Err(FlipViolation::AskFlipNotBelow { tick, flip_tick })
            }
            _ => {}
        }
        Ok(Self {
            side,
            tick,
            flip_tick,
            token,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ticks::{calculate_quote_ticks, TICK_SPACING};

    fn token() -> String {
        "0x00000000000000000000000000000000000000aa".to_string()
    }

    #[test]
    fn test_bid_flip_must_be_above() {
        assert!(FlipOrder::new(Side::Bid, -50, 50, token(), 1_000_000).is_ok());
        let err = FlipOrder::new(Side::Bid, -50, -50, token(), 1_000_000).unwrap_err();
        assert!(matches!(err, FlipViolation::BidFlipNotAbove { .. }));
        let err = FlipOrder::new(Side::Bid, -50, -60, token(), 1_000_000).unwrap_err();
        assert!(matches!(err, FlipViolation::BidFlipNotAbove { .. }));
    }

    #[test]
    fn test_ask_flip_must_be_below() {
        assert!(FlipOrder::new(Side::Ask, 50, -50, token(), 1_000_000).is_ok());
        let err = FlipOrder::new(Side::Ask, 50, 50, token(), 1_000_000).unwrap_err();
        assert!(matches!(err, FlipViolation::AskFlipNotBelow { .. }));
        let err = FlipOrder::new(Side::Ask, 50, 60, token(), 1_000_000).unwrap_err();
        assert!(matches!(err, FlipViolation::AskFlipNotBelow { .. }));
    }

    #[test]
    fn test_off_grid_tick_rejected() {
        let err = FlipOrder::new(Side::Bid, -55, 50, token(), 1).unwrap_err();
        assert!(matches!(err, FlipViolation::Tick(_)));
        let err = FlipOrder::new(Side::Bid, -50, 55, token(), 1).unwrap_err();
        assert!(matches!(err, FlipViolation::Tick(_)));
    }

    #[test]
    fn test_symmetric_quote_always_constructible() {
        // The symmetric flip policy (bid flips to ask tick and vice versa)
        // satisfies the constraint for every spread wide enough to split
        // the sides.
        for bps in [1u32, 10, 25, 100] {
            let qt = calculate_quote_ticks(bps).unwrap();
            if qt.ask - qt.bid < TICK_SPACING {
                continue;
            }
            FlipOrder::new(Side::Bid, qt.bid, qt.bid_flip(), token(), 5_000_000).unwrap();
            FlipOrder::new(Side::Ask, qt.ask, qt.ask_flip(), token(), 5_000_000).unwrap();
        }
    }
}
