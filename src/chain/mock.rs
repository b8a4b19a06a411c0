//! Scriptable in-memory chain client for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::flip::FlipOrder;

use super::traits::ChainClient;
use super::types::{ChainError, OrderId, OrderRecord, PlacedOrder, Side, TxReceipt};

#[derive(Default)]
pub struct MockChain {
    pub orders: Mutex<HashMap<u64, OrderRecord>>,
    /// (token, account) -> wallet balance.
    pub balances: Mutex<HashMap<(String, String), u128>>,
    /// (token, owner) -> allowance granted to the exchange.
    pub allowances: Mutex<HashMap<(String, String), u128>>,
    /// token -> maker internal exchange balance.
    pub internal: Mutex<HashMap<String, u128>>,
    pub decimals: Mutex<HashMap<String, u8>>,
    pub pairs_created: Mutex<Vec<(String, String)>>,
    pub placed: Mutex<Vec<FlipOrder>>,
    pub cancelled: Mutex<Vec<OrderId>>,
    pub approvals: Mutex<Vec<(String, u128)>>,
    next_id: AtomicU64,
    fail_transport: AtomicBool,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(100),
            ..Default::default()
        }
    }

    pub fn add_order(&self, rec: OrderRecord) {
        self.orders.lock().unwrap().insert(rec.id.0, rec);
    }

    pub fn set_balance(&self, token: &str, account: &str, amount: u128) {
        self.balances
            .lock()
            .unwrap()
            .insert((token.to_string(), account.to_string()), amount);
    }

    pub fn set_allowance(&self, token: &str, owner: &str, amount: u128) {
        self.allowances
            .lock()
            .unwrap()
            .insert((token.to_string(), owner.to_string()), amount);
    }

    pub fn set_internal(&self, token: &str, amount: u128) {
        self.internal.lock().unwrap().insert(token.to_string(), amount);
    }

    pub fn set_decimals(&self, token: &str, decimals: u8) {
        self.decimals.lock().unwrap().insert(token.to_string(), decimals);
    }

    /// Make every subsequent call fail with an RPC transport error.
    pub fn fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    fn gate(&self) -> Result<(), ChainError> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "injected transport failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.gate()?;
        Ok(1_000)
    }

    async fn read_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>, ChainError> {
        self.gate()?;
        Ok(self.orders.lock().unwrap().get(&order_id.0).cloned())
    }

    async fn read_balance(&self, token: &str, account: &str) -> Result<u128, ChainError> {
        self.gate()?;
        Ok(*self
            .balances
            .lock()
            .unwrap()
            .get(&(token.to_string(), account.to_string()))
            .unwrap_or(&0))
    }

    async fn read_allowance(
        &self,
        token: &str,
        owner: &str,
        _spender: &str,
    ) -> Result<u128, ChainError> {
        self.gate()?;
        Ok(*self
            .allowances
            .lock()
            .unwrap()
            .get(&(token.to_string(), owner.to_string()))
            .unwrap_or(&0))
    }

    async fn approve(
        &self,
        token: &str,
        _spender: &str,
        amount: u128,
    ) -> Result<TxReceipt, ChainError> {
        self.gate()?;
        self.approvals
            .lock()
            .unwrap()
            .push((token.to_string(), amount));
        Ok(TxReceipt {
            tx_hash: "0xapproved".to_string(),
            gas_used: 46_000,
        })
    }

    async fn internal_balance(&self, token: &str, _maker: &str) -> Result<u128, ChainError> {
        self.gate()?;
        Ok(*self.internal.lock().unwrap().get(token).unwrap_or(&0))
    }

    async fn token_decimals(&self, token: &str) -> Result<u8, ChainError> {
        self.gate()?;
        Ok(*self.decimals.lock().unwrap().get(token).unwrap_or(&6))
    }

    async fn ensure_pair(&self, base: &str, quote: &str) -> Result<(), ChainError> {
        self.gate()?;
        self.pairs_created
            .lock()
            .unwrap()
            .push((base.to_string(), quote.to_string()));
        Ok(())
    }

    async fn place_flip_order(&self, order: &FlipOrder) -> Result<PlacedOrder, ChainError> {
        self.gate()?;
        let id = OrderId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.orders.lock().unwrap().insert(
            id.0,
            OrderRecord {
                id,
                side: order.side,
                tick: order.tick,
                flip_tick: Some(order.flip_tick),
                remaining: order.amount,
                original: order.amount,
            },
        );
        self.placed.lock().unwrap().push(order.clone());
        Ok(PlacedOrder {
            order_id: id,
            tx_hash: format!("0xplace{}", id.0),
        })
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<TxReceipt, ChainError> {
        self.gate()?;
        self.orders.lock().unwrap().remove(&order_id.0);
        self.cancelled.lock().unwrap().push(order_id);
        Ok(TxReceipt {
            tx_hash: format!("0xcancel{}", order_id.0),
            gas_used: 60_000,
        })
    }
}

/// Open order fixture resting on the given side.
pub fn open_order(id: u64, side: Side, tick: i64, flip_tick: i64, amount: u128) -> OrderRecord {
    OrderRecord {
        id: OrderId(id),
        side,
        tick,
        flip_tick: Some(flip_tick),
        remaining: amount,
        original: amount,
    }
}
