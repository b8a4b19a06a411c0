//! Budget Enforcer
//!
//! Two independent windows gate chain-mutating calls: a calendar-day cap
//! on all transactions and a rolling one-hour cap on cancels. Counts are
//! monotone within a window and reset exactly once when the boundary is
//! crossed. `reserve` re-derives the windows, checks, and increments as
//! one logical step; the caller persists the counters before issuing the
//! call, so no call is ever in flight without a reserved slot.

use chrono::{DateTime, Datelike, Duration, Utc};

use super::state::TxCounters;

// ======================= LIMITS =======================

#[derive(Debug, Clone, Copy)]
pub struct BudgetLimits {
    pub max_tx_per_day: u32,
    pub max_cancels_per_hour: u32,
}

/// What kind of mutating call is asking for budget. Cancels are counted
/// against both windows; everything else only against the daily one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Place,
    Cancel,
}

// ======================= WINDOWS =======================

fn same_utc_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month() && a.day() == b.day()
}

/// Apply any window resets implied by `now`. Idempotent within a window.
fn roll_windows(counters: &mut TxCounters, now: DateTime<Utc>) {
    if !same_utc_day(counters.daily_reset_at, now) {
        counters.daily_tx_count = 0;
        counters.daily_reset_at = now;
    }
    if now - counters.hourly_reset_at > Duration::minutes(60) {
        counters.hourly_cancel_count = 0;
        counters.hourly_reset_at = now;
    }
}

// ======================= CHECK / RESERVE =======================

/// Non-mutating preview: would a call of `kind` be allowed right now?
pub fn check(counters: &TxCounters, limits: &BudgetLimits, kind: TxKind, now: DateTime<Utc>) -> bool {
    let mut scratch = counters.clone();
    roll_windows(&mut scratch, now);
    allowed(&scratch, limits, kind)
}

/// True while the daily window still has headroom for any mutating call.
pub fn has_daily_headroom(counters: &TxCounters, limits: &BudgetLimits, now: DateTime<Utc>) -> bool {
    check(counters, limits, TxKind::Place, now)
}

/// Re-derive the windows, check the allowance, and increment only if
/// allowed. Returns whether the slot was granted; on `false` the counters
/// are unchanged apart from any window reset.
pub fn reserve(
    counters: &mut TxCounters,
    limits: &BudgetLimits,
    kind: TxKind,
    now: DateTime<Utc>,
) -> bool {
    roll_windows(counters, now);
    if !allowed(counters, limits, kind) {
        return false;
    }
    counters.daily_tx_count += 1;
    if kind == TxKind::Cancel {
        counters.hourly_cancel_count += 1;
    }
    true
}

fn allowed(counters: &TxCounters, limits: &BudgetLimits, kind: TxKind) -> bool {
    if counters.daily_tx_count >= limits.max_tx_per_day {
        return false;
    }
    if kind == TxKind::Cancel && counters.hourly_cancel_count >= limits.max_cancels_per_hour {
        return false;
    }
    true
}
