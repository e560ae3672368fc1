use std::collections::{BTreeMap, HashMap};

use chrono::DateTime;

use crate::types::{Direction, LiquidityEvent, ProtocolVersion};
use crate::utils::ratio_percent;

/// Add/remove counts and USD sums for one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowTotals {
    pub adds: usize,
    pub removes: usize,
    pub added_usd: f64,
    pub removed_usd: f64,
}

impl FlowTotals {
    pub fn record(&mut self, event: &LiquidityEvent) {
        match event.direction {
            Direction::Add => {
                self.adds += 1;
                self.added_usd += event.usd_value;
            }
            Direction::Remove => {
                self.removes += 1;
                self.removed_usd += event.usd_value;
            }
        }
    }

    pub fn events(&self) -> usize {
        self.adds + self.removes
    }

    pub fn net_usd(&self) -> f64 {
        self.added_usd - self.removed_usd
    }

    pub fn gross_usd(&self) -> f64 {
        self.added_usd + self.removed_usd
    }

    pub fn average_usd(&self) -> f64 {
        if self.events() == 0 {
            0.0
        } else {
            self.gross_usd() / self.events() as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowSummary {
    pub total: FlowTotals,
    pub by_chain: BTreeMap<String, FlowTotals>,
    pub by_version: BTreeMap<ProtocolVersion, FlowTotals>,
    pub by_chain_version: BTreeMap<(String, ProtocolVersion), FlowTotals>,
    /// Keyed by UTC date (`YYYY-MM-DD`), `unknown` when the timestamp is missing.
    pub by_day: BTreeMap<String, FlowTotals>,
}

impl FlowSummary {
    /// Share of the overall gross USD flow handled by `chain`.
    pub fn chain_share(&self, chain: &str) -> f64 {
        let gross = self.by_chain.get(chain).map(FlowTotals::gross_usd).unwrap_or(0.0);
        ratio_percent(gross, self.total.gross_usd())
    }

    pub fn version_share(&self, version: ProtocolVersion) -> f64 {
        let gross = self
            .by_version
            .get(&version)
            .map(FlowTotals::gross_usd)
            .unwrap_or(0.0);
        ratio_percent(gross, self.total.gross_usd())
    }
}

pub fn day_key(timestamp: i64) -> String {
    if timestamp <= 0 {
        return "unknown".to_string();
    }
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Folds the event list into per-chain, per-version and per-day buckets.
pub fn aggregate(events: &[LiquidityEvent]) -> FlowSummary {
    let mut summary = FlowSummary::default();
    for event in events {
        summary.total.record(event);
        summary
            .by_chain
            .entry(event.chain.clone())
            .or_default()
            .record(event);
        summary
            .by_version
            .entry(event.version)
            .or_default()
            .record(event);
        summary
            .by_chain_version
            .entry((event.chain.clone(), event.version))
            .or_default()
            .record(event);
        summary
            .by_day
            .entry(day_key(event.timestamp))
            .or_default()
            .record(event);
    }
    summary
}

/// Prices each event with `usd_prices` (keyed by upper-case symbol); unknown symbols count as 0.
pub fn apply_usd_values(events: &mut [LiquidityEvent], usd_prices: &HashMap<String, f64>) {
    let price = |symbol: &str| {
        usd_prices
            .get(&symbol.to_ascii_uppercase())
            .copied()
            .unwrap_or(0.0)
    };
    for event in events.iter_mut() {
        event.usd_value = event.amount0 * price(&event.token0_symbol)
            + event.amount1 * price(&event.token1_symbol);
    }
}
