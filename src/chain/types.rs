//! Chain-side types
//!
//! Core types for orders, receipts, and chain client errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ======================= ORDER ID =======================

/// Opaque on-chain order identifier, assigned by the exchange contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ======================= ORDER SIDE =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ======================= ORDER RECORD =======================

/// Authoritative order state as reported by the exchange contract.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: OrderId,
    pub side: Side,
    pub tick: i64,
    /// Destination tick of the auto-flip, if the order was placed as a flip order.
    pub flip_tick: Option<i64>,
    /// Remaining unfilled quantity in base units of the posted token.
    pub remaining: u128,
    pub original: u128,
}

impl OrderRecord {
    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }
}

// ======================= RECEIPTS =======================

#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub gas_used: u64,
}

/// Result of a successful flip-order placement.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub tx_hash: String,
}

// ======================= ERRORS =======================

/// Chain client failures.
///
/// "Order does not exist" is NOT an error: `read_order` reports it as
/// `Ok(None)`. Every variant here means the call itself failed and the
/// caller must not infer anything about on-chain state from it.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed rpc response: {0}")]
    Decode(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
}

// ======================= AMOUNT SCALING =======================

/// Convert a human-units amount into fixed-point base units for `decimals`.
pub fn to_base_units(amount: f64, decimals: u8) -> u128 {
    (amount * 10f64.powi(decimals as i32)).round() as u128
}
