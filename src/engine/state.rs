//! Persistent Engine State
//!
//! Versioned on-disk record of per-pair order identity, last known quote
//! levels, and transaction counters. One JSON document per maker identity,
//! rewritten in full after every mutation. The process is the sole writer
//! for its lifetime; the write is deliberately synchronous so the on-disk
//! record never trails the in-memory record across a crash.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chain::types::{OrderId, Side};

/// Bumped whenever the document layout changes. A mismatch on load is
/// treated as "different logical bot instance" and fabricates a fresh
/// state rather than migrating.
pub const STATE_VERSION: u32 = 2;

// ======================= TX COUNTERS =======================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxCounters {
    pub daily_tx_count: u32,
    /// Start of the current calendar-day window (UTC).
    pub daily_reset_at: DateTime<Utc>,
    pub hourly_cancel_count: u32,
    /// Start of the current rolling one-hour cancel window.
    pub hourly_reset_at: DateTime<Utc>,
}

impl TxCounters {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_tx_count: 0,
            daily_reset_at: now,
            hourly_cancel_count: 0,
            hourly_reset_at: now,
        }
    }
}

// ======================= PAIR STATE =======================

/// Per-pair order identity and last known quote levels.
///
/// A non-null order id means the engine believes that order is live
/// on-chain. The belief is reconciled every cycle, never trusted
/// indefinitely. Pair records are created lazily and never deleted, only
/// cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairState {
    pub base: String,
    pub quote: String,
    pub bid_order_id: Option<OrderId>,
    pub ask_order_id: Option<OrderId>,
    pub last_bid_tick: Option<i64>,
    pub last_ask_tick: Option<i64>,
    pub last_bid_flip_tick: Option<i64>,
    pub last_ask_flip_tick: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl PairState {
    fn new(base: &str, quote: &str, now: DateTime<Utc>) -> Self {
        Self {
            base: base.to_string(),
            quote: quote.to_string(),
            bid_order_id: None,
            ask_order_id: None,
            last_bid_tick: None,
            last_ask_tick: None,
            last_bid_flip_tick: None,
            last_ask_flip_tick: None,
            updated_at: now,
        }
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    pub fn order_id(&self, side: Side) -> Option<OrderId> {
        match side {
            Side::Bid => self.bid_order_id,
            Side::Ask => self.ask_order_id,
        }
    }

    pub fn last_tick(&self, side: Side) -> Option<i64> {
        match side {
            Side::Bid => self.last_bid_tick,
            Side::Ask => self.last_ask_tick,
        }
    }

    pub fn last_flip_tick(&self, side: Side) -> Option<i64> {
        match side {
            Side::Bid => self.last_bid_flip_tick,
            Side::Ask => self.last_ask_flip_tick,
        }
    }

    /// Record a freshly placed order on one side.
    pub fn set_side(&mut self, side: Side, id: OrderId, tick: i64, flip_tick: i64) {
        match side {
            Side::Bid => {
                self.bid_order_id = Some(id);
                self.last_bid_tick = Some(tick);
                self.last_bid_flip_tick = Some(flip_tick);
            }
            Side::Ask => {
                self.ask_order_id = Some(id);
                self.last_ask_tick = Some(tick);
                self.last_ask_flip_tick = Some(flip_tick);
            }
        }
        self.updated_at = Utc::now();
    }

    /// Forget the order id on one side. Last tick levels are kept so a
    /// flip's destination stays recognizable after the fill.
    pub fn clear_side(&mut self, side: Side) {
        match side {
            Side::Bid => self.bid_order_id = None,
            Side::Ask => self.ask_order_id = None,
        }
        self.updated_at = Utc::now();
    }
}

// ======================= ENGINE STATE =======================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub version: u32,
    pub maker: String,
    pub pairs: Vec<PairState>,
    pub last_block: u64,
    pub counters: TxCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EngineState {
    pub fn fresh(maker: &str) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION,
            maker: maker.to_lowercase(),
            pairs: Vec::new(),
            last_block: 0,
            counters: TxCounters::new(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the pair record, creating it lazily on first use.
    pub fn pair_mut(&mut self, base: &str, quote: &str) -> &mut PairState {
        if let Some(idx) = self
            .pairs
            .iter()
            .position(|p| p.base == base && p.quote == quote)
        {
            return &mut self.pairs[idx];
        }
        self.pairs.push(PairState::new(base, quote, Utc::now()));
        self.pairs.last_mut().unwrap()
    }

    pub fn pair(&self, base: &str, quote: &str) -> Option<&PairState> {
        self.pairs.iter().find(|p| p.base == base && p.quote == quote)
    }
}

// ======================= STATE STORE =======================

/// Owns the on-disk location and the load/save cycle.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state for `maker`, fabricating and persisting a fresh one
    /// if the file is absent or belongs to a different logical bot
    /// instance (schema version or maker mismatch).
    pub fn load(&self, maker: &str) -> Result<EngineState> {
        let maker = maker.to_lowercase();
        if !self.path.exists() {
            info!("[STATE] no state file at {}, starting fresh", self.path.display());
            let mut state = EngineState::fresh(&maker);
            self.save(&mut state)?;
            return Ok(state);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading state file {}", self.path.display()))?;
        let parsed: EngineState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("[STATE] unreadable state file ({}), starting fresh", e);
                let mut state = EngineState::fresh(&maker);
                self.save(&mut state)?;
                return Ok(state);
            }
        };
        if parsed.version != STATE_VERSION {
            warn!(
                "[STATE] schema version {} != {}, discarding tracked orders and starting fresh",
                parsed.version, STATE_VERSION
            );
            let mut state = EngineState::fresh(&maker);
            self.save(&mut state)?;
            return Ok(state);
        }
        if parsed.maker != maker {
            warn!(
                "[STATE] state belongs to maker {}, not {}; starting fresh",
                parsed.maker, maker
            );
            let mut state = EngineState::fresh(&maker);
            self.save(&mut state)?;
            return Ok(state);
        }
        info!(
            "[STATE] loaded {} pair(s), {} tx today",
            parsed.pairs.len(),
            parsed.counters.daily_tx_count
        );
        Ok(parsed)
    }

    /// Atomic full-file rewrite: write a sibling temp file, then rename
    /// over the target. Blocking on purpose so no mutation is observable
    /// in memory before it is durable on disk.
    pub fn save(&self, state: &mut EngineState) -> Result<()> {
        state.updated_at = Utc::now();
        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .with_context(|| format!("writing state file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing state file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAKER: &str = "0x00000000000000000000000000000000000000f1";

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_fresh_state_when_file_absent() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let state = store.load(MAKER).unwrap();
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.maker, MAKER);
        assert!(state.pairs.is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let mut state = store.load(MAKER).unwrap();
        {
            let pair = state.pair_mut("USDA", "USDB");
            pair.set_side(Side::Bid, OrderId(41), -50, 50);
            pair.set_side(Side::Ask, OrderId(42), 50, -50);
        }
        state.counters.daily_tx_count = 7;
        store.save(&mut state).unwrap();

        let mut reloaded = store.load(MAKER).unwrap();
        store.save(&mut reloaded).unwrap();
        let again = store.load(MAKER).unwrap();

        assert_eq!(again.version, reloaded.version);
        assert_eq!(again.maker, reloaded.maker);
        assert_eq!(again.last_block, reloaded.last_block);
        assert_eq!(again.counters.daily_tx_count, 7);
        let p = again.pair("USDA", "USDB").unwrap();
        assert_eq!(p.bid_order_id, Some(OrderId(41)));
        assert_eq!(p.ask_order_id, Some(OrderId(42)));
        assert_eq!(p.last_bid_tick, Some(-50));
        assert_eq!(p.last_ask_flip_tick, Some(-50));
    }

    #[test]
    fn test_version_mismatch_starts_fresh() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let mut state = store.load(MAKER).unwrap();
        state.pair_mut("USDA", "USDB").set_side(Side::Bid, OrderId(9), -50, 50);
        state.version = STATE_VERSION + 1;
        store.save(&mut state).unwrap();

        let reloaded = store.load(MAKER).unwrap();
        assert_eq!(reloaded.version, STATE_VERSION);
        assert!(reloaded.pairs.is_empty());
    }

    #[test]
    fn test_maker_mismatch_starts_fresh() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let mut state = store.load(MAKER).unwrap();
        state.pair_mut("USDA", "USDB").set_side(Side::Ask, OrderId(9), 50, -50);
        store.save(&mut state).unwrap();

        let other = store
            .load("0x00000000000000000000000000000000000000f2")
            .unwrap();
        assert!(other.pairs.is_empty());
    }

    #[test]
    fn test_unreadable_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "not json").unwrap();
        let state = store.load(MAKER).unwrap();
        assert_eq!(state.version, STATE_VERSION);
        assert!(state.pairs.is_empty());
    }

    #[test]
    fn test_pair_mut_is_lazy_and_stable() {
        let mut state = EngineState::fresh(MAKER);
        state.pair_mut("USDA", "USDB");
        state.pair_mut("USDA", "USDB");
        state.pair_mut("USDA", "USDC");
        assert_eq!(state.pairs.len(), 2);
    }

    #[test]
    fn test_clear_side_keeps_tick_levels() {
        let mut state = EngineState::fresh(MAKER);
        let pair = state.pair_mut("USDA", "USDB");
        pair.set_side(Side::Bid, OrderId(5), -50, 50);
        pair.clear_side(Side::Bid);
        assert_eq!(pair.bid_order_id, None);
        assert_eq!(pair.last_bid_tick, Some(-50));
        assert_eq!(pair.last_bid_flip_tick, Some(50));
    }
}
