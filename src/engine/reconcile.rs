//! Reconciliation Subsystem
//!
//! Cross-checks stored order identifiers against authoritative chain
//! lookups. An order the chain no longer knows (or reports fully filled)
//! is cleared from pair state and recorded as stale. Transport failures
//! propagate to the caller untouched: a lookup that errored says nothing
//! about whether the order exists.
//!
//! The exchange exposes no "list all my open orders", so only orders whose
//! identifier we stored can be verified. An id lost between submission and
//! write-back leaves an orphan on the book, handled out of band.

use tracing::{debug, info};

use crate::chain::traits::ChainClient;
use crate::chain::types::{ChainError, OrderId, Side};

use super::state::EngineState;

// ======================= REPORT =======================

#[derive(Debug, Clone)]
pub struct StaleOrder {
    pub pair: String,
    pub side: Side,
    pub order_id: OrderId,
}

/// Per-pair side validity after a reconcile pass.
#[derive(Debug, Clone)]
pub struct PairSides {
    pub pair: String,
    pub bid_valid: bool,
    pub ask_valid: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub sides: Vec<PairSides>,
    pub stale: Vec<StaleOrder>,
    /// Number of order lookups actually issued.
    pub checked: usize,
}

impl ReconcileReport {
    pub fn has_stale(&self) -> bool {
        !self.stale.is_empty()
    }
}

// ======================= RECONCILE =======================

/// Per-cycle reconcile: verify every stored order id, clearing the ones
/// the chain no longer has resting.
pub async fn reconcile_orders(
    chain: &dyn ChainClient,
    state: &mut EngineState,
) -> Result<ReconcileReport, ChainError> {
    reconcile_inner(chain, state, false).await
}

/// Bootstrap reconcile: same checks, but believed tick levels are
/// re-derived from the authoritative order record, so a restarted process
/// trusts the chain rather than stale local values.
pub async fn full_reconcile(
    chain: &dyn ChainClient,
    state: &mut EngineState,
) -> Result<ReconcileReport, ChainError> {
    reconcile_inner(chain, state, true).await
}

async fn reconcile_inner(
    chain: &dyn ChainClient,
    state: &mut EngineState,
    refresh_ticks: bool,
) -> Result<ReconcileReport, ChainError> {
    let mut report = ReconcileReport::default();
    for pair in state.pairs.iter_mut() {
        let key = pair.key();
        let mut sides = PairSides {
            pair: key.clone(),
            bid_valid: false,
            ask_valid: false,
        };
        for side in [Side::Bid, Side::Ask] {
            let Some(id) = pair.order_id(side) else {
                continue;
            };
            report.checked += 1;
            match chain.read_order(id).await? {
                Some(rec) if !rec.is_filled() => {
                    if refresh_ticks {
                        pair.set_side(side, id, rec.tick, rec.flip_tick.unwrap_or(rec.tick));
                    }
                    match side {
                        Side::Bid => sides.bid_valid = true,
                        Side::Ask => sides.ask_valid = true,
                    }
                    debug!("[RECON] {} {} {} live, {} remaining", key, side, id, rec.remaining);
                }
                found => {
                    let reason = if found.is_some() { "fully filled" } else { "not found" };
                    info!("[RECON] {} {} {} {} on-chain, clearing", key, side, id, reason);
                    pair.clear_side(side);
                    report.stale.push(StaleOrder {
                        pair: key.clone(),
                        side,
                        order_id: id,
                    });
                }
            }
        }
        report.sides.push(sides);
    }
    Ok(report)
}
