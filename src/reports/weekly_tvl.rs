use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use crate::config::RunConfig;
use crate::csv_export::{write_csv, Column, CsvRecord};
use crate::fetch::fetch_with_fallback;
use crate::format::{ascii_bar, format_pct, format_usd, print_header, separator};
use crate::http::ApiClient;
use crate::reports::llama::{find_closest_data_point, DataPoint, LlamaClient};
use crate::types::Result;
use crate::utils::ratio_percent;

pub const PROTOCOL_SLUG: &str = "uniswap-v3";
pub const DEFAULT_WEEKS: usize = 12;
/// Maximum lookahead past a week start when choosing its data point.
pub const TOLERANCE_SECS: i64 = 3 * 24 * 60 * 60;

/// Maps report chain labels to the keys DefiLlama used when the series was captured.
#[derive(Debug, Clone, Copy)]
pub struct ChainNaming {
    pub name: &'static str,
    pub chains: &'static [(&'static str, &'static str)],
}

pub const CURRENT_NAMING: ChainNaming = ChainNaming {
    name: "current",
    chains: &[
        ("Ethereum", "Ethereum"),
        ("Arbitrum", "Arbitrum"),
        ("Optimism", "OP Mainnet"),
        ("Base", "Base"),
        ("Polygon", "Polygon"),
        ("BSC", "BSC"),
    ],
};

pub const LEGACY_NAMING: ChainNaming = ChainNaming {
    name: "legacy",
    chains: &[
        ("Ethereum", "Ethereum"),
        ("Arbitrum", "Arbitrum"),
        ("Optimism", "Optimism"),
        ("Polygon", "Polygon"),
        ("BSC", "Binance"),
    ],
};

/// Timestamps of the last `count` Mondays at 00:00 UTC, oldest first.
/// The most recent is the Monday starting the week containing `now`.
pub fn week_starts(now: DateTime<Utc>, count: usize) -> Vec<i64> {
    let today = now.date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let start = Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN)).timestamp();
    let week = Duration::weeks(1).num_seconds();
    (0..count as i64).rev().map(|i| start - i * week).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyRow {
    pub week_start: i64,
    pub chain: String,
    pub tvl: f64,
    pub share_pct: f64,
    /// Change against the same chain's previous week; `None` for the first week
    /// or when the previous week had no TVL.
    pub change_pct: Option<f64>,
}

impl WeeklyRow {
    pub fn week_label(&self) -> String {
        DateTime::from_timestamp(self.week_start, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| self.week_start.to_string())
    }
}

impl CsvRecord for WeeklyRow {
    fn field(&self, id: &str) -> Option<String> {
        Some(match id {
            "week" => self.week_label(),
            "chain" => self.chain.clone(),
            "tvl" => format!("{:.2}", self.tvl),
            "share_pct" => format!("{:.4}", self.share_pct),
            "change_pct" => self.change_pct.map(|c| format!("{c:.4}")).unwrap_or_default(),
            _ => return None,
        })
    }
}

pub const COLUMNS: &[Column] = &[
    Column::new("week", "Week Starting"),
    Column::new("chain", "Chain"),
    Column::new("tvl", "TVL (USD)"),
    Column::new("share_pct", "Share (%)"),
    Column::new("change_pct", "WoW Change (%)"),
];

/// Per-week, per-chain TVL and its share of that week's total across the named chains.
pub fn weekly_shares(
    history: &BTreeMap<String, Vec<DataPoint>>,
    naming: &ChainNaming,
    weeks: &[i64],
    tolerance: i64,
) -> Vec<WeeklyRow> {
    let mut rows = Vec::with_capacity(weeks.len() * naming.chains.len());
    let mut previous: BTreeMap<&str, f64> = BTreeMap::new();

    for &week in weeks {
        let values: Vec<(&str, f64)> = naming
            .chains
            .iter()
            .map(|(label, key)| {
                let tvl = history
                    .get(*key)
                    .and_then(|points| find_closest_data_point(points, week, tolerance))
                    .map(|p| p.value)
                    .unwrap_or(0.0);
                (*label, tvl)
            })
            .collect();
        let total: f64 = values.iter().map(|(_, tvl)| tvl).sum();

        for (label, tvl) in values {
            let change_pct = previous
                .get(label)
                .filter(|prev| **prev > 0.0)
                .map(|prev| (tvl - prev) / prev * 100.0);
            rows.push(WeeklyRow {
                week_start: week,
                chain: label.to_string(),
                tvl,
                share_pct: ratio_percent(tvl, total),
                change_pct,
            });
            previous.insert(label, tvl);
        }
    }
    rows
}

pub async fn run(config: &RunConfig, naming: &ChainNaming, csv_name: &str) -> Result<()> {
    let client = ApiClient::new(config)?;
    let llama = LlamaClient::new(&client);

    log::info!(
        "[weekly_tvl::run] Fetching {PROTOCOL_SLUG} history ({} naming)",
        naming.name
    );
    let history = fetch_with_fallback(
        PROTOCOL_SLUG,
        llama.protocol_chain_history(PROTOCOL_SLUG),
        BTreeMap::new(),
    )
    .await;
    for (_, key) in naming.chains {
        if !history.value().contains_key(*key) {
            log::warn!("⚠️ [weekly_tvl::run] no series for chain key {key:?}");
        }
    }

    let weeks = week_starts(Utc::now(), DEFAULT_WEEKS);
    let rows = weekly_shares(history.value(), naming, &weeks, TOLERANCE_SECS);

    print_header(&format!(
        "📅 WEEKLY TVL BY CHAIN: {PROTOCOL_SLUG} ({} naming)",
        naming.name
    ));
    if history.is_fallback() {
        println!("⚠️  History unavailable; all values are zero.");
    }
    for week_rows in rows.chunks(naming.chains.len().max(1)) {
        let Some(first) = week_rows.first() else {
            continue;
        };
        let total: f64 = week_rows.iter().map(|r| r.tvl).sum();
        println!("\nWeek of {} (total {})", first.week_label(), format_usd(total));
        println!("{}", separator(72));
        for row in week_rows {
            println!(
                "{:<10} {:>10} {} {:>8} {:>9}",
                row.chain,
                format_usd(row.tvl),
                ascii_bar(row.share_pct, 30),
                format!("{:.2}%", row.share_pct),
                row.change_pct.map(format_pct).unwrap_or_else(|| "-".into())
            );
        }
    }

    write_csv(&config.output_path(csv_name), COLUMNS, &rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::*;

    const DAY: i64 = 24 * 60 * 60;

    fn series(points: &[(i64, f64)]) -> Vec<DataPoint> {
        points
            .iter()
            .map(|(timestamp, value)| DataPoint { timestamp: *timestamp, value: *value })
            .collect()
    }

    #[test]
    fn test_week_starts_are_mondays() {
        // Thursday 2024-03-14 15:30 UTC
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 15, 30, 0).unwrap();
        let weeks = week_starts(now, 3);
        let expected = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap().timestamp();
        assert_eq!(weeks.len(), 3);
        assert_eq!(*weeks.last().unwrap(), expected);
        assert!(weeks.windows(2).all(|w| w[1] - w[0] == 7 * DAY));
        for ts in weeks {
            let date = DateTime::from_timestamp(ts, 0).unwrap();
            assert_eq!(date.weekday(), Weekday::Mon);
        }
    }

    #[test]
    fn test_week_starts_on_a_monday() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(week_starts(now, 1), vec![now.timestamp()]);
    }

    #[test]
    fn test_shares_sum_to_hundred() {
        let weeks = [10 * DAY, 17 * DAY];
        let mut history = BTreeMap::new();
        history.insert("Ethereum".to_string(), series(&[(10 * DAY, 300.0), (17 * DAY, 600.0)]));
        history.insert("OP Mainnet".to_string(), series(&[(10 * DAY, 100.0), (17 * DAY, 100.0)]));
        history.insert("Optimism".to_string(), series(&[(10 * DAY, 999.0)]));

        let rows = weekly_shares(&history, &CURRENT_NAMING, &weeks, TOLERANCE_SECS);
        assert_eq!(rows.len(), 2 * CURRENT_NAMING.chains.len());

        let first_week: Vec<_> = rows.iter().filter(|r| r.week_start == weeks[0]).collect();
        let total: f64 = first_week.iter().map(|r| r.share_pct).sum();
        assert!((total - 100.0).abs() < 1e-9);

        let eth = first_week.iter().find(|r| r.chain == "Ethereum").unwrap();
        assert!((eth.share_pct - 75.0).abs() < 1e-9);
        assert_eq!(eth.change_pct, None);

        let eth_next = rows
            .iter()
            .find(|r| r.week_start == weeks[1] && r.chain == "Ethereum")
            .unwrap();
        assert!((eth_next.change_pct.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_namings_read_different_keys() {
        let mut history = BTreeMap::new();
        history.insert("OP Mainnet".to_string(), series(&[(DAY, 50.0)]));
        history.insert("Optimism".to_string(), series(&[(DAY, 20.0)]));
        history.insert("Binance".to_string(), series(&[(DAY, 30.0)]));

        let current = weekly_shares(&history, &CURRENT_NAMING, &[DAY], TOLERANCE_SECS);
        let legacy = weekly_shares(&history, &LEGACY_NAMING, &[DAY], TOLERANCE_SECS);

        let tvl = |rows: &[WeeklyRow], chain: &str| {
            rows.iter().find(|r| r.chain == chain).map(|r| r.tvl)
        };
        assert_eq!(tvl(&current, "Optimism"), Some(50.0));
        assert_eq!(tvl(&legacy, "Optimism"), Some(20.0));
        assert_eq!(tvl(&current, "BSC"), Some(0.0));
        assert_eq!(tvl(&legacy, "BSC"), Some(30.0));
        assert_eq!(tvl(&legacy, "Base"), None);
    }

    #[test]
    fn test_empty_history_yields_zero_rows() {
        let rows = weekly_shares(&BTreeMap::new(), &LEGACY_NAMING, &[DAY], TOLERANCE_SECS);
        assert!(rows.iter().all(|r| r.tvl == 0.0 && r.share_pct == 0.0));
        assert_eq!(rows[0].field("change_pct").as_deref(), Some(""));
    }
}
