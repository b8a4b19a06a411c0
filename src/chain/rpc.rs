//! JSON-RPC Chain Client
//!
//! Thin wrapper over the maker node's JSON-RPC surface. The node holds the
//! maker key and signs mutating calls server-side; this client only shapes
//! requests and decodes responses. No retries live here: the engine's next
//! loop pass is the retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::engine::flip::FlipOrder;

use super::traits::ChainClient;
use super::types::{ChainError, OrderId, OrderRecord, PlacedOrder, Side, TxReceipt};

// ==================== WIRE TYPES ====================

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    id: u64,
    side: Side,
    tick: i64,
    flip_tick: Option<i64>,
    remaining: String,
    original: String,
}

impl OrderBody {
    fn into_record(self) -> Result<OrderRecord, ChainError> {
        Ok(OrderRecord {
            id: OrderId(self.id),
            side: self.side,
            tick: self.tick,
            flip_tick: self.flip_tick,
            remaining: parse_quantity(&self.remaining)?,
            original: parse_quantity(&self.original)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacedBody {
    order_id: u64,
    tx_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptBody {
    tx_hash: String,
    gas_used: u64,
}

impl From<ReceiptBody> for TxReceipt {
    fn from(body: ReceiptBody) -> Self {
        Self {
            tx_hash: body.tx_hash,
            gas_used: body.gas_used,
        }
    }
}

// ==================== QUANTITIES ====================

/// Amounts cross the wire as 0x-hex quantities.
fn parse_quantity(s: &str) -> Result<u128, ChainError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Decode(format!("bad quantity {:?}: {}", s, e)))
}

fn encode_quantity(v: u128) -> String {
    format!("{:#x}", v)
}

// ==================== CLIENT ====================

pub struct RpcChainClient {
    http: Client,
    url: String,
    exchange: String,
    next_id: AtomicU64,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, exchange: &str) -> Result<Self, ChainError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .tcp_nodelay(true)
            .build()?;
        Ok(Self {
            http,
            url: rpc_url.to_string(),
            exchange: exchange.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ChainError> {
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            method,
            params,
        };
        debug!("[RPC] {} {}", method, req.params);
        let resp = self.http.post(&self.url).json(&req).send().await?;
        let body: RpcResponse<T> = resp.json().await?;
        if let Some(err) = body.error {
            if err.message.contains("revert") {
                return Err(ChainError::Reverted(err.message));
            }
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result)
    }

    /// For methods where a null result is a malformed response, not a
    /// domain outcome.
    async fn call_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        self.call(method, params)
            .await?
            .ok_or_else(|| ChainError::Decode(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        let raw: String = self.call_required("eth_blockNumber", json!([])).await?;
        Ok(parse_quantity(&raw)? as u64)
    }

    async fn read_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>, ChainError> {
        let body: Option<OrderBody> = self
            .call("dex_getOrder", json!([self.exchange, order_id.0]))
            .await?;
        body.map(OrderBody::into_record).transpose()
    }

    async fn read_balance(&self, token: &str, account: &str) -> Result<u128, ChainError> {
        let raw: String = self
            .call_required("dex_tokenBalance", json!([token, account]))
            .await?;
        parse_quantity(&raw)
    }

    async fn read_allowance(
        &self,
        token: &str,
        owner: &str,
        spender: &str,
    ) -> Result<u128, ChainError> {
        let raw: String = self
            .call_required("dex_allowance", json!([token, owner, spender]))
            .await?;
        parse_quantity(&raw)
    }

    async fn approve(
        &self,
        token: &str,
        spender: &str,
        amount: u128,
    ) -> Result<TxReceipt, ChainError> {
        let body: ReceiptBody = self
            .call_required(
                "dex_approve",
                json!([token, spender, encode_quantity(amount)]),
            )
            .await?;
        Ok(body.into())
    }

    async fn internal_balance(&self, token: &str, maker: &str) -> Result<u128, ChainError> {
        let raw: String = self
            .call_required("dex_internalBalance", json!([self.exchange, token, maker]))
            .await?;
        parse_quantity(&raw)
    }

    async fn token_decimals(&self, token: &str) -> Result<u8, ChainError> {
        self.call_required("dex_tokenDecimals", json!([token])).await
    }

    async fn ensure_pair(&self, base: &str, quote: &str) -> Result<(), ChainError> {
        let _: Value = self
            .call_required("dex_ensurePair", json!([self.exchange, base, quote]))
            .await?;
        Ok(())
    }

    async fn place_flip_order(&self, order: &FlipOrder) -> Result<PlacedOrder, ChainError> {
        let body: PlacedBody = self
            .call_required(
                "dex_placeFlipOrder",
                json!([self.exchange, {
                    "token": order.token,
                    "amount": encode_quantity(order.amount),
                    "side": order.side,
                    "tick": order.tick,
                    "flipTick": order.flip_tick,
                }]),
            )
            .await?;
        Ok(PlacedOrder {
            order_id: OrderId(body.order_id),
            tx_hash: body.tx_hash,
        })
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<TxReceipt, ChainError> {
        let body: ReceiptBody = self
            .call_required("dex_cancelOrder", json!([self.exchange, order_id.0]))
            .await?;
        Ok(body.into())
    }
}
