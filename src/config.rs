//! Configuration
//!
//! TOML file plus environment for the maker identity. Everything is
//! validated up front: a config that cannot quote safely is a fatal
//! startup error, never a silently degraded run.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::engine::budget::BudgetLimits;
use crate::engine::ticks;

pub const MAKER_ENV: &str = "FLIPMAKER_MAKER";

// ======================= SECTIONS =======================

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub chain: ChainConfig,
    pub pairs: Vec<PairConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Total quoted spread in basis points, split symmetrically around mid.
    pub spread_bps: u32,
    /// Order size in human units of the posted token.
    pub order_size: f64,
    /// Minimum internal-balance headroom (human units) a flip repost needs
    /// on top of the order size.
    #[serde(default)]
    pub flip_buffer: f64,
    #[serde(default = "default_max_tx_per_day")]
    pub max_tx_per_day: u32,
    #[serde(default = "default_max_cancels_per_hour")]
    pub max_cancels_per_hour: u32,
    /// Minimum seconds between (re)quote attempts for one pair.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Upper bound of the random pre-submission delay.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms_max: u64,
    /// Settle wait before diagnosing a missing flip successor.
    #[serde(default = "default_flip_check_delay")]
    pub flip_check_delay_secs: u64,
    /// Outer loop tick.
    #[serde(default = "default_loop_secs")]
    pub loop_secs: u64,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Exchange contract address.
    pub exchange: String,
    /// Maker address. `FLIPMAKER_MAKER` overrides; required one way or the
    /// other.
    #[serde(default)]
    pub maker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairConfig {
    pub base: TokenConfig,
    pub quote: TokenConfig,
}

impl PairConfig {
    pub fn key(&self) -> String {
        format!("{}/{}", self.base.symbol, self.quote.symbol)
    }
}

fn default_max_tx_per_day() -> u32 {
    100
}
fn default_max_cancels_per_hour() -> u32 {
    10
}
fn default_cooldown_secs() -> u64 {
    60
}
fn default_jitter_ms() -> u64 {
    2_000
}
fn default_flip_check_delay() -> u64 {
    2
}
fn default_loop_secs() -> u64 {
    15
}
fn default_state_path() -> PathBuf {
    PathBuf::from("flipmaker-state.json")
}

// ======================= LOAD / VALIDATE =======================

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut cfg: Config =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        if let Ok(maker) = env::var(MAKER_ENV) {
            cfg.chain.maker = maker;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn budget_limits(&self) -> BudgetLimits {
        BudgetLimits {
            max_tx_per_day: self.engine.max_tx_per_day,
            max_cancels_per_hour: self.engine.max_cancels_per_hour,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            bail!("no pairs enabled");
        }
        if self.chain.maker.is_empty() {
            bail!("maker address missing: set [chain] maker or {}", MAKER_ENV);
        }
        if !is_address(&self.chain.maker) {
            bail!("maker address {} is not a 20-byte hex address", self.chain.maker);
        }
        if !is_address(&self.chain.exchange) {
            bail!(
                "exchange address {} is not a 20-byte hex address",
                self.chain.exchange
            );
        }
        for pair in &self.pairs {
            for token in [&pair.base, &pair.quote] {
                if !is_address(&token.address) {
                    bail!(
                        "token {} address {} is not a 20-byte hex address",
                        token.symbol,
                        token.address
                    );
                }
            }
        }
        if self.engine.order_size <= 0.0 {
            bail!("order_size must be positive");
        }
        if self.engine.flip_buffer < 0.0 {
            bail!("flip_buffer must not be negative");
        }
        if self.engine.max_tx_per_day == 0 {
            bail!("max_tx_per_day must be at least 1");
        }
        let qt = ticks::calculate_quote_ticks(self.engine.spread_bps)
            .with_context(|| "spread_bps incompatible with the tick grid")?;
        if qt.bid >= qt.ask {
            bail!(
                "spread_bps {} rounds to a half-spread of 0 ticks; widen the spread",
                self.engine.spread_bps
            );
        }
        Ok(())
    }
}

/// 20-byte 0x-prefixed hex address check.
pub fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .and_then(|h| hex::decode(h).ok())
        .map_or(false, |bytes| bytes.len() == 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> String {
        r#"
[engine]
spread_bps = 10
order_size = 500.0
flip_buffer = 25.0

[chain]
rpc_url = "http://localhost:8545"
exchange = "0x00000000000000000000000000000000000000e0"
maker = "0x00000000000000000000000000000000000000f1"

[[pairs]]
base = { symbol = "USDA", address = "0x00000000000000000000000000000000000000aa" }
quote = { symbol = "USDB", address = "0x00000000000000000000000000000000000000bb" }
"#
        .to_string()
    }

    fn parse(body: &str) -> Result<Config> {
        let cfg: Config = toml::from_str(body)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[test]
    fn test_sample_config_parses() {
        let cfg = parse(&sample_toml()).unwrap();
        assert_eq!(cfg.engine.spread_bps, 10);
        assert_eq!(cfg.engine.max_tx_per_day, 100);
        assert_eq!(cfg.engine.cooldown_secs, 60);
        assert_eq!(cfg.pairs[0].key(), "USDA/USDB");
    }

    #[test]
    fn test_no_pairs_is_fatal() {
        let body = sample_toml().replace("[[pairs]]", "[[unused]]");
        assert!(parse(&body).is_err());
    }

    #[test]
    fn test_bad_address_is_fatal() {
        let body = sample_toml().replace(
            "0x00000000000000000000000000000000000000aa",
            "0xnothex",
        );
        assert!(parse(&body).is_err());
    }

    #[test]
    fn test_collapsing_spread_is_fatal() {
        // 0 bps has no sides at all; 1 bps rounds its half-spread to 0.
        for bad in ["spread_bps = 0", "spread_bps = 1"] {
            let body = sample_toml().replace("spread_bps = 10", bad);
            assert!(parse(&body).is_err(), "{} should not validate", bad);
        }
    }

    #[test]
    fn test_is_address() {
        assert!(is_address("0x00000000000000000000000000000000000000aa"));
        assert!(!is_address("00000000000000000000000000000000000000aa"));
        assert!(!is_address("0x00aa"));
        assert!(!is_address("0xzz000000000000000000000000000000000000aa"));
    }
}
