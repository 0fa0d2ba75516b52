//! Metrics collection for observability
//!
//! Prometheus metrics on a private registry, so several dispatchers can
//! coexist in one process.
//!
//! # Metrics
//!
//! - `staking_bonds_total` - Committed bond outputs
//! - `staking_unbonds_initiated_total` - Committed bonded withdrawals
//! - `staking_unbonds_matured_total` - Unbonding entries paid out
//! - `staking_payout_coins_total` - Coins credited by matured unbonds
//! - `staking_rejected_transactions_total` - Rejected transactions
//! - `staking_unbonding_queue_length` - Entries waiting to mature

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed bond outputs
    pub bonds_total: IntCounter,

    /// Committed bonded withdrawals
    pub unbonds_initiated_total: IntCounter,

    /// Unbonding entries paid out
    pub unbonds_matured_total: IntCounter,

    /// Coins credited by matured unbonds
    pub payout_coins_total: IntCounter,

    /// Rejected transactions
    pub rejected_total: IntCounter,

    /// Entries waiting to mature
    pub unbonding_queue_length: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let bonds_total = IntCounter::new("staking_bonds_total", "Committed bond outputs")?;
        registry.register(Box::new(bonds_total.clone()))?;

        let unbonds_initiated_total = IntCounter::new(
            "staking_unbonds_initiated_total",
            "Committed bonded withdrawals",
        )?;
        registry.register(Box::new(unbonds_initiated_total.clone()))?;

        let unbonds_matured_total = IntCounter::new(
            "staking_unbonds_matured_total",
            "Unbonding entries paid out",
        )?;
        registry.register(Box::new(unbonds_matured_total.clone()))?;

        let payout_coins_total = IntCounter::new(
            "staking_payout_coins_total",
            "Coins credited by matured unbonds",
        )?;
        registry.register(Box::new(payout_coins_total.clone()))?;

        let rejected_total = IntCounter::new(
            "staking_rejected_transactions_total",
            "Rejected transactions",
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let unbonding_queue_length = IntGauge::new(
            "staking_unbonding_queue_length",
            "Entries waiting to mature",
        )?;
        registry.register(Box::new(unbonding_queue_length.clone()))?;

        Ok(Self {
            bonds_total,
            unbonds_initiated_total,
            unbonds_matured_total,
            payout_coins_total,
            rejected_total,
            unbonding_queue_length,
            registry,
        })
    }

    /// Record a committed transaction's bonds and unbond initiations
    pub fn record_committed(&self, bonds: u64, unbonds: u64) {
        self.bonds_total.inc_by(bonds);
        self.unbonds_initiated_total.inc_by(unbonds);
    }

    /// Record a rejected transaction
    pub fn record_rejected(&self) {
        self.rejected_total.inc();
    }

    /// Record one matured payout
    pub fn record_payout(&self, coins: u64) {
        self.unbonds_matured_total.inc();
        self.payout_coins_total.inc_by(coins);
    }

    /// Update unbonding queue length
    pub fn update_queue_length(&self, length: usize) {
        self.unbonding_queue_length
            .set(i64::try_from(length).unwrap_or(i64::MAX));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn export(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            crate::Error::Metrics(prometheus::Error::Msg(format!(
                "Metrics output is not UTF-8: {}",
                e
            )))
        })
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("bonds_total", &self.bonds_total.get())
            .field("unbonds_initiated_total", &self.unbonds_initiated_total.get())
            .field("unbonds_matured_total", &self.unbonds_matured_total.get())
            .field("rejected_total", &self.rejected_total.get())
            .field("unbonding_queue_length", &self.unbonding_queue_length.get())
            .finish_non_exhaustive()
    }
}
