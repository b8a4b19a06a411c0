//! Chain Client Abstraction
//!
//! Trait contract for everything the engine needs from the chain. The
//! engine core only ever talks through this trait; the JSON-RPC wiring
//! behind it is mechanical.

use async_trait::async_trait;

use crate::engine::flip::FlipOrder;

use super::types::{ChainError, OrderId, OrderRecord, PlacedOrder, TxReceipt};

/// On-chain exchange + token collaborator.
///
/// Read calls are side-effect free. Mutating calls (`approve`,
/// `place_flip_order`, `cancel_order`) consume transaction budget and must
/// only be issued after the caller has reserved a slot.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain head block number.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Authoritative order lookup.
    ///
    /// `Ok(None)` means the order does not exist on-chain (filled or
    /// cancelled) and is an expected outcome. Transport failures are `Err`
    /// and must never be collapsed into `None`.
    async fn read_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>, ChainError>;

    /// Wallet balance of `token` held by `account`, in base units.
    async fn read_balance(&self, token: &str, account: &str) -> Result<u128, ChainError>;

    /// ERC-20 allowance granted by `owner` to `spender`.
    async fn read_allowance(
        &self,
        token: &str,
        owner: &str,
        spender: &str,
    ) -> Result<u128, ChainError>;

    /// Approve `spender` to move `amount` of `token`.
    async fn approve(
        &self,
        token: &str,
        spender: &str,
        amount: u128,
    ) -> Result<TxReceipt, ChainError>;

    /// Maker funds held inside the exchange contract, used to fund flip
    /// reposts. Distinct from the wallet balance.
    async fn internal_balance(&self, token: &str, maker: &str) -> Result<u128, ChainError>;

    /// Decimals of `token`.
    async fn token_decimals(&self, token: &str) -> Result<u8, ChainError>;

    /// Create the trading pair on the exchange if it does not exist yet.
    async fn ensure_pair(&self, base: &str, quote: &str) -> Result<(), ChainError>;

    /// Submit a flip order. Returns the assigned order id and tx hash.
    async fn place_flip_order(&self, order: &FlipOrder) -> Result<PlacedOrder, ChainError>;

    /// Cancel a resting order by id.
    async fn cancel_order(&self, order_id: OrderId) -> Result<TxReceipt, ChainError>;
}
