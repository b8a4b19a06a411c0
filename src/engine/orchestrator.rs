//! Quote Orchestrator
//!
//! The control loop: bootstrap once, then one pass per enabled pair per
//! loop tick. Each pass reconciles stored order ids against the chain,
//! diagnoses missing flip successors, and re-quotes empty sides subject to
//! the per-pair cooldown, bounded submission jitter, and the transaction
//! budget. Pairs are processed sequentially; the shutdown flag is only
//! observed between pairs and passes, never mid-call, so an in-flight
//! submission always completes and gets reconciled on the next start.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use crate::chain::traits::ChainClient;
use crate::chain::types::{to_base_units, ChainError, Side};
use crate::config::{Config, PairConfig, TokenConfig};

use super::budget::{self, TxKind};
use super::flip::FlipOrder;
use super::reconcile;
use super::state::{EngineState, StateStore};
use super::ticks::{self, QuoteTicks};

/// Extended sleep while the daily budget is exhausted.
const COOLDOWN_SLEEP: Duration = Duration::from_secs(3_600);

// ======================= STATUS =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Bootstrap,
    Running,
    Cooldown,
    Stopped,
}

// ======================= ENGINE =======================

pub struct QuoteEngine {
    cfg: Config,
    chain: Arc<dyn ChainClient>,
    store: StateStore,
    state: EngineState,
    status: EngineStatus,
    stop: Arc<AtomicBool>,
    /// Last (re)quote attempt per pair, for the cooldown gate.
    last_attempt: HashMap<String, Instant>,
}

impl QuoteEngine {
    pub fn new(
        cfg: Config,
        chain: Arc<dyn ChainClient>,
        store: StateStore,
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        let state = store.load(&cfg.chain.maker)?;
        Ok(Self {
            cfg,
            chain,
            store,
            state,
            status: EngineStatus::Idle,
            stop,
            last_attempt: HashMap::new(),
        })
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    // ======================= MAIN LOOP =======================

    pub async fn run(&mut self) -> Result<()> {
        self.status = EngineStatus::Bootstrap;
        self.bootstrap().await?;
        self.status = EngineStatus::Running;
        info!(
            "[RUN] quoting {} pair(s), loop every {}s",
            self.cfg.pairs.len(),
            self.cfg.engine.loop_secs
        );

        let limits = self.cfg.budget_limits();
        while !self.stopped() {
            if self.status == EngineStatus::Cooldown {
                if budget::has_daily_headroom(&self.state.counters, &limits, Utc::now()) {
                    info!("[BUDGET] daily window reopened, resuming");
                    self.status = EngineStatus::Running;
                } else {
                    self.sleep_interruptible(COOLDOWN_SLEEP).await;
                    continue;
                }
            }

            self.run_pass().await;

            if self.status == EngineStatus::Cooldown {
                info!(
                    "[BUDGET] daily tx budget exhausted, cooling down for {}s",
                    COOLDOWN_SLEEP.as_secs()
                );
                continue;
            }
            self.sleep_interruptible(Duration::from_secs(self.cfg.engine.loop_secs)).await;
        }

        self.status = EngineStatus::Stopped;
        self.store.save(&mut self.state)?;
        info!("[STOP] state persisted, shutting down");
        Ok(())
    }

    /// Sleep in short slices so a stop request is honored promptly without
    /// ever interrupting a chain call.
    async fn sleep_interruptible(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.stopped() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            tokio::time::sleep(left.min(Duration::from_millis(500))).await;
        }
    }

    // ======================= BOOTSTRAP =======================

    /// One-time startup: ensure pairs and approvals exist (fatal on
    /// failure), snapshot inventory, verify quotability (warning only),
    /// then reconcile everything we remember against the chain.
    async fn bootstrap(&mut self) -> Result<()> {
        info!("[BOOT] bootstrapping {} pair(s)", self.cfg.pairs.len());
        let pairs = self.cfg.pairs.clone();
        for pair in &pairs {
            self.state.pair_mut(&pair.base.symbol, &pair.quote.symbol);
            self.chain
                .ensure_pair(&pair.base.address, &pair.quote.address)
                .await
                .with_context(|| format!("creating pair {}", pair.key()))?;
            self.ensure_allowance(&pair.base).await?;
            self.ensure_allowance(&pair.quote).await?;
            if let Err(e) = self.check_quotable(pair).await {
                warn!("[BOOT] {} inventory snapshot failed: {}", pair.key(), e);
            }
        }
        self.store.save(&mut self.state)?;

        match reconcile::full_reconcile(self.chain.as_ref(), &mut self.state).await {
            Ok(report) => {
                info!(
                    "[BOOT] full reconcile: {} checked, {} stale",
                    report.checked,
                    report.stale.len()
                );
            }
            Err(e) => {
                warn!("[BOOT] full reconcile failed ({}), verifying per cycle instead", e);
            }
        }
        if let Ok(block) = self.chain.block_number().await {
            self.state.last_block = block;
        }
        self.store.save(&mut self.state)?;
        Ok(())
    }

    /// Fatal if the approval transaction fails; a missing allowance makes
    /// every later placement revert.
    async fn ensure_allowance(&mut self, token: &TokenConfig) -> Result<()> {
        let maker = self.cfg.chain.maker.clone();
        let exchange = self.cfg.chain.exchange.clone();
        let decimals = self.chain.token_decimals(&token.address).await?;
        let needed = to_base_units(self.cfg.engine.order_size, decimals);
        let allowance = self
            .chain
            .read_allowance(&token.address, &maker, &exchange)
            .await?;
        if allowance >= needed {
            return Ok(());
        }
        let limits = self.cfg.budget_limits();
        if !budget::reserve(&mut self.state.counters, &limits, TxKind::Place, Utc::now()) {
            anyhow::bail!("no tx budget left to approve {}", token.symbol);
        }
        self.store.save(&mut self.state)?;
        self.chain
            .approve(&token.address, &exchange, u128::MAX)
            .await
            .with_context(|| format!("approving {}", token.symbol))?;
        info!("[BOOT] approved {} for the exchange", token.symbol);
        Ok(())
    }

    /// Inventory snapshot + quotability check. A pair that cannot fund one
    /// order is a warning, not fatal: other pairs proceed.
    async fn check_quotable(&self, pair: &PairConfig) -> Result<(), ChainError> {
        let maker = &self.cfg.chain.maker;
        for token in [&pair.base, &pair.quote] {
            let decimals = self.chain.token_decimals(&token.address).await?;
            let wallet = self.chain.read_balance(&token.address, maker).await?;
            let internal = self.chain.internal_balance(&token.address, maker).await?;
            let needed = to_base_units(self.cfg.engine.order_size, decimals);
            info!(
                "[BOOT] {} {}: wallet {} + exchange {} (one order = {})",
                pair.key(),
                token.symbol,
                wallet,
                internal,
                needed
            );
            if wallet + internal < needed {
                warn!(
                    "[BOOT] {} unquotable on {}: combined balance below one order",
                    pair.key(),
                    token.symbol
                );
            }
        }
        Ok(())
    }

    // ======================= PASS =======================

    /// One pass over every pair: reconcile, then refresh/re-quote.
    pub(crate) async fn run_pass(&mut self) {
        match reconcile::reconcile_orders(self.chain.as_ref(), &mut self.state).await {
            Ok(report) => {
                if report.has_stale() {
                    if let Err(e) = self.store.save(&mut self.state) {
                        warn!("[STATE] persisting reconcile result failed: {:#}", e);
                    }
                }
                for stale in &report.stale {
                    info!(
                        "[FILL] {} {} {} left the book",
                        stale.pair, stale.side, stale.order_id
                    );
                    self.note_flip_successor(&stale.pair, stale.side).await;
                }
            }
            Err(e) => {
                warn!("[RECON] pass failed ({}), stored ids kept until next pass", e);
            }
        }

        let pairs = self.cfg.pairs.clone();
        for pair in &pairs {
            if self.stopped() {
                break;
            }
            if let Err(e) = self.process_pair_quotes(pair).await {
                warn!("[PAIR] {} pass abandoned: {:#}", pair.key(), e);
            }
        }

        if let Ok(block) = self.chain.block_number().await {
            if block != self.state.last_block {
                self.state.last_block = block;
                if let Err(e) = self.store.save(&mut self.state) {
                    warn!("[STATE] persisting block cursor failed: {:#}", e);
                }
            }
        }
    }

    /// A cleared order that carried a flip destination should have an
    /// untracked successor resting there. Report where it should be and
    /// diagnose the one failure mode we can observe: an internal balance
    /// too small to have funded the repost.
    async fn note_flip_successor(&self, pair_key: &str, filled_side: Side) {
        let Some(pair) = self.cfg.pairs.iter().find(|p| p.key() == pair_key) else {
            return;
        };
        let flip_tick = self
            .state
            .pair(&pair.base.symbol, &pair.quote.symbol)
            .and_then(|p| p.last_flip_tick(filled_side));
        let Some(flip_tick) = flip_tick else {
            return;
        };
        info!(
            "[FLIP] {} successor should rest at tick {} (id unknown until placed orders are reconciled out of band)",
            pair_key, flip_tick
        );
        match self.diagnose_flip(pair, filled_side).await {
            Ok(Some(missing)) => warn!(
                "[FLIP] {} internal balance short by {} base units; the successor likely never posted",
                pair_key, missing
            ),
            Ok(None) => {}
            Err(e) => warn!("[FLIP] {} successor diagnosis failed: {}", pair_key, e),
        }
    }

    /// Compare the post-fill internal balance against one order plus the
    /// configured buffer. Returns the missing amount if short.
    async fn diagnose_flip(
        &self,
        pair: &PairConfig,
        filled_side: Side,
    ) -> Result<Option<u128>, ChainError> {
        // A filled bid reposts as an ask selling base; a filled ask
        // reposts as a bid selling quote.
        let token = match filled_side {
            Side::Bid => &pair.base,
            Side::Ask => &pair.quote,
        };
        if self.cfg.engine.flip_check_delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(self.cfg.engine.flip_check_delay_secs)).await;
        }
        let decimals = self.chain.token_decimals(&token.address).await?;
        let needed = to_base_units(
            self.cfg.engine.order_size + self.cfg.engine.flip_buffer,
            decimals,
        );
        let have = self
            .chain
            .internal_balance(&token.address, &self.cfg.chain.maker)
            .await?;
        Ok(if have < needed { Some(needed - have) } else { None })
    }

    /// Refresh and re-quote one pair: cancel a side resting off-target,
    /// then place fresh flip orders on any empty side, subject to the
    /// per-pair cooldown and the budget.
    async fn process_pair_quotes(&mut self, pair: &PairConfig) -> Result<()> {
        let quote_ticks = ticks::calculate_quote_ticks(self.cfg.engine.spread_bps)?;
        self.refresh_side(pair, Side::Bid, quote_ticks).await?;
        self.refresh_side(pair, Side::Ask, quote_ticks).await?;

        let (need_bid, need_ask) = {
            let p = self.state.pair_mut(&pair.base.symbol, &pair.quote.symbol);
            (p.bid_order_id.is_none(), p.ask_order_id.is_none())
        };
        if !need_bid && !need_ask {
            return Ok(());
        }

        let key = pair.key();
        let cooldown = Duration::from_secs(self.cfg.engine.cooldown_secs);
        if let Some(last) = self.last_attempt.get(&key) {
            if last.elapsed() < cooldown {
                return Ok(());
            }
        }
        self.last_attempt.insert(key, Instant::now());

        if need_bid {
            self.requote_side(pair, Side::Bid, quote_ticks).await?;
        }
        if need_ask {
            self.requote_side(pair, Side::Ask, quote_ticks).await?;
        }
        Ok(())
    }

    /// Cancel a resting order whose level no longer matches the target
    /// spread, freeing the side for a fresh quote.
    async fn refresh_side(
        &mut self,
        pair: &PairConfig,
        side: Side,
        quote_ticks: QuoteTicks,
    ) -> Result<()> {
        let target = match side {
            Side::Bid => quote_ticks.bid,
            Side::Ask => quote_ticks.ask,
        };
        let (id, last_tick) = {
            let p = self.state.pair_mut(&pair.base.symbol, &pair.quote.symbol);
            (p.order_id(side), p.last_tick(side))
        };
        let (Some(id), Some(last_tick)) = (id, last_tick) else {
            return Ok(());
        };
        if last_tick == target {
            return Ok(());
        }
        let limits = self.cfg.budget_limits();
        if !budget::reserve(&mut self.state.counters, &limits, TxKind::Cancel, Utc::now()) {
            info!(
                "[BUDGET] no cancel budget, {} {} stays at tick {} (target {})",
                pair.key(),
                side,
                last_tick,
                target
            );
            if !budget::has_daily_headroom(&self.state.counters, &limits, Utc::now()) {
                self.status = EngineStatus::Cooldown;
            }
            return Ok(());
        }
        self.store.save(&mut self.state)?;
        let receipt = self.chain.cancel_order(id).await?;
        self.state
            .pair_mut(&pair.base.symbol, &pair.quote.symbol)
            .clear_side(side);
        self.store.save(&mut self.state)?;
        info!(
            "[CANCEL] {} {} {} was resting at tick {}, target moved to {} | tx {}",
            pair.key(),
            side,
            id,
            last_tick,
            target,
            receipt.tx_hash
        );
        Ok(())
    }

    /// Place a fresh flip order on one side. Client-side checks run before
    /// a budget slot is reserved so a doomed call never burns budget.
    async fn requote_side(
        &mut self,
        pair: &PairConfig,
        side: Side,
        quote_ticks: QuoteTicks,
    ) -> Result<()> {
        let (tick, flip_tick) = match side {
            Side::Bid => (quote_ticks.bid, quote_ticks.bid_flip()),
            Side::Ask => (quote_ticks.ask, quote_ticks.ask_flip()),
        };
        // A bid posts the quote token, an ask posts the base token.
        let token = match side {
            Side::Bid => &pair.quote,
            Side::Ask => &pair.base,
        };
        let key = pair.key();
        let maker = self.cfg.chain.maker.clone();

        let decimals = self.chain.token_decimals(&token.address).await?;
        let amount = to_base_units(self.cfg.engine.order_size, decimals);
        let wallet = self.chain.read_balance(&token.address, &maker).await?;
        let internal = self.chain.internal_balance(&token.address, &maker).await?;
        if wallet + internal < amount {
            warn!(
                "[QUOTE] {} {} skipped: {} balance {} + {} below order size {}",
                key, side, token.symbol, wallet, internal, amount
            );
            return Ok(());
        }

        let order = match FlipOrder::new(side, tick, flip_tick, token.address.clone(), amount) {
            Ok(order) => order,
            Err(e) => {
                error!("[QUOTE] {} {} rejected before submission: {}", key, side, e);
                return Ok(());
            }
        };

        let limits = self.cfg.budget_limits();
        if !budget::reserve(&mut self.state.counters, &limits, TxKind::Place, Utc::now()) {
            info!("[BUDGET] daily tx budget exhausted, entering cooldown");
            self.status = EngineStatus::Cooldown;
            return Ok(());
        }
        self.store.save(&mut self.state)?;

        let jitter_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..=self.cfg.engine.jitter_ms_max)
        };
        if jitter_ms > 0 {
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        match self.chain.place_flip_order(&order).await {
            Ok(placed) => {
                self.state
                    .pair_mut(&pair.base.symbol, &pair.quote.symbol)
                    .set_side(side, placed.order_id, tick, flip_tick);
                self.store.save(&mut self.state)?;
                info!(
                    "[QUOTE] {} {} {} at tick {} (px {:.5}) flip {} | tx {}",
                    key,
                    side,
                    placed.order_id,
                    tick,
                    ticks::price_multiplier(tick),
                    flip_tick,
                    placed.tx_hash
                );
            }
            Err(e) => {
                warn!("[QUOTE] {} {} placement failed: {}", key, side, e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{open_order, MockChain};
    use crate::chain::types::OrderId;
    use crate::config::{ChainConfig, EngineConfig, TokenConfig};
    use tempfile::TempDir;

    const MAKER: &str = "0x00000000000000000000000000000000000000f1";
    const EXCHANGE: &str = "0x00000000000000000000000000000000000000e0";
    const USDA: &str = "0x00000000000000000000000000000000000000aa";
    const USDB: &str = "0x00000000000000000000000000000000000000bb";

    fn test_config(dir: &TempDir) -> Config {
        Config {
            engine: EngineConfig {
                spread_bps: 10,
                order_size: 500.0,
                flip_buffer: 25.0,
                max_tx_per_day: 100,
                max_cancels_per_hour: 10,
                cooldown_secs: 0,
                jitter_ms_max: 0,
                flip_check_delay_secs: 0,
                loop_secs: 1,
                state_path: dir.path().join("state.json"),
            },
            chain: ChainConfig {
                rpc_url: "http://localhost:8545".to_string(),
                exchange: EXCHANGE.to_string(),
                maker: MAKER.to_string(),
            },
            pairs: vec![PairConfig {
                base: TokenConfig {
                    symbol: "USDA".to_string(),
                    address: USDA.to_string(),
                },
                quote: TokenConfig {
                    symbol: "USDB".to_string(),
                    address: USDB.to_string(),
                },
            }],
        }
    }

    fn funded_chain() -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new());
        for token in [USDA, USDB] {
            chain.set_decimals(token, 6);
            chain.set_balance(token, MAKER, 2_000_000_000);
            chain.set_internal(token, 1_000_000_000);
            chain.set_allowance(token, MAKER, u128::MAX);
        }
        chain
    }

    fn engine(dir: &TempDir, chain: Arc<MockChain>) -> QuoteEngine {
        let cfg = test_config(dir);
        let store = StateStore::new(cfg.engine.state_path.clone());
        QuoteEngine::new(cfg, chain, store, Arc::new(AtomicBool::new(false))).unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_creates_pair_and_approvals() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        chain.set_allowance(USDA, MAKER, 0);
        chain.set_allowance(USDB, MAKER, 0);
        let mut eng = engine(&dir, chain.clone());

        eng.bootstrap().await.unwrap();

        assert_eq!(
            chain.pairs_created.lock().unwrap().as_slice(),
            &[(USDA.to_string(), USDB.to_string())]
        );
        assert_eq!(chain.approvals.lock().unwrap().len(), 2);
        // Approvals are chain-mutating and consume daily budget.
        assert_eq!(eng.state.counters.daily_tx_count, 2);
        assert_eq!(eng.state.pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_pass_places_both_sides() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        let mut eng = engine(&dir, chain.clone());
        eng.bootstrap().await.unwrap();

        eng.run_pass().await;

        let placed = chain.placed.lock().unwrap();
        assert_eq!(placed.len(), 2);
        let bid = placed.iter().find(|o| o.side == Side::Bid).unwrap();
        let ask = placed.iter().find(|o| o.side == Side::Ask).unwrap();
        assert_eq!((bid.tick, bid.flip_tick), (-50, 50));
        assert_eq!((ask.tick, ask.flip_tick), (50, -50));
        // Bids post the quote token, asks the base token.
        assert_eq!(bid.token, USDB);
        assert_eq!(ask.token, USDA);
        assert_eq!(bid.amount, 500_000_000);

        let pair = eng.state.pair("USDA", "USDB").unwrap();
        assert!(pair.bid_order_id.is_some());
        assert!(pair.ask_order_id.is_some());
        assert_eq!(pair.last_bid_tick, Some(-50));
        assert_eq!(pair.last_ask_flip_tick, Some(-50));
    }

    #[tokio::test]
    async fn test_vanished_bid_is_cleared_and_requoted() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        // The ask still rests on the book; the bid is gone (filled).
        chain.add_order(open_order(8, Side::Ask, 50, -50, 500_000_000));
        let mut eng = engine(&dir, chain.clone());
        {
            let pair = eng.state.pair_mut("USDA", "USDB");
            pair.set_side(Side::Bid, OrderId(7), -50, 50);
            pair.set_side(Side::Ask, OrderId(8), 50, -50);
        }

        eng.run_pass().await;

        let placed = chain.placed.lock().unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].side, Side::Bid);
        let pair = eng.state.pair("USDA", "USDB").unwrap();
        assert_ne!(pair.bid_order_id, Some(OrderId(7)));
        assert!(pair.bid_order_id.is_some());
        assert_eq!(pair.ask_order_id, Some(OrderId(8)));
    }

    #[tokio::test]
    async fn test_exhausted_budget_skips_submission_and_cools_down() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        let mut eng = engine(&dir, chain.clone());
        eng.state.counters.daily_tx_count = eng.cfg.engine.max_tx_per_day;

        eng.run_pass().await;

        assert!(chain.placed.lock().unwrap().is_empty());
        assert_eq!(eng.status(), EngineStatus::Cooldown);
        assert_eq!(eng.state.counters.daily_tx_count, eng.cfg.engine.max_tx_per_day);
    }

    #[tokio::test]
    async fn test_drifted_side_is_cancelled() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        chain.add_order(open_order(7, Side::Bid, -80, 80, 500_000_000));
        let mut eng = engine(&dir, chain.clone());
        eng.state
            .pair_mut("USDA", "USDB")
            .set_side(Side::Bid, OrderId(7), -80, 80);

        eng.run_pass().await;

        assert_eq!(chain.cancelled.lock().unwrap().as_slice(), &[OrderId(7)]);
        assert_eq!(eng.state.counters.hourly_cancel_count, 1);
        // The freed side re-quotes at the target level within the same pass.
        let placed = chain.placed.lock().unwrap();
        assert!(placed.iter().any(|o| o.side == Side::Bid && o.tick == -50));
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_stored_ids() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        let mut eng = engine(&dir, chain.clone());
        {
            let pair = eng.state.pair_mut("USDA", "USDB");
            pair.set_side(Side::Bid, OrderId(7), -50, 50);
            pair.set_side(Side::Ask, OrderId(8), 50, -50);
        }
        chain.fail_transport(true);

        eng.run_pass().await;

        let pair = eng.state.pair("USDA", "USDB").unwrap();
        assert_eq!(pair.bid_order_id, Some(OrderId(7)));
        assert_eq!(pair.ask_order_id, Some(OrderId(8)));
        assert!(chain.placed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flip_shortfall_is_diagnosed() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        // One order plus buffer is 525 units; the exchange only holds 100.
        chain.set_internal(USDA, 100_000_000);
        let eng = engine(&dir, chain.clone());
        let pair = eng.cfg.pairs[0].clone();

        let missing = eng.diagnose_flip(&pair, Side::Bid).await.unwrap();
        assert_eq!(missing, Some(425_000_000));

        chain.set_internal(USDA, 600_000_000);
        assert_eq!(eng.diagnose_flip(&pair, Side::Bid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cooldown_gate_limits_attempts() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        let mut eng = engine(&dir, chain.clone());
        eng.cfg.engine.cooldown_secs = 3_600;
        eng.bootstrap().await.unwrap();

        eng.run_pass().await;
        assert_eq!(chain.placed.lock().unwrap().len(), 2);

        // Drop the placed orders from the book: both sides are now empty,
        // but the pair is inside its cooldown window.
        chain.orders.lock().unwrap().clear();
        eng.run_pass().await;
        assert_eq!(chain.placed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_cooperatively() {
        let dir = TempDir::new().unwrap();
        let chain = funded_chain();
        let stop = Arc::new(AtomicBool::new(true));
        let cfg = test_config(&dir);
        let store = StateStore::new(cfg.engine.state_path.clone());
        let mut eng = QuoteEngine::new(cfg, chain, store, stop).unwrap();

        eng.run().await.unwrap();

        assert_eq!(eng.status(), EngineStatus::Stopped);
        assert!(eng.store.path().exists());
    }
}
