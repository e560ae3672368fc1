use std::path::Path;

use chrono::DateTime;

use crate::config::find_chain;
use crate::csv_export::{write_csv, Column, CsvRecord};
use crate::format::{ascii_bar, format_amount, format_usd, print_header, separator};
use crate::liquidity::aggregate::{FlowSummary, FlowTotals};
use crate::types::{LiquidityEvent, ProtocolVersion, Result};

pub const EVENT_COLUMNS: &[Column] = &[
    Column::new("chain", "Chain"),
    Column::new("version", "Version"),
    Column::new("event_type", "Event Type"),
    Column::new("direction", "Direction"),
    Column::new("token0", "Token0"),
    Column::new("token1", "Token1"),
    Column::new("amount0", "Amount0"),
    Column::new("amount1", "Amount1"),
    Column::new("liquidity_delta", "Liquidity Delta"),
    Column::new("usd_value", "USD Value"),
    Column::new("block_number", "Block"),
    Column::new("timestamp", "Timestamp"),
    Column::new("tx_hash", "Transaction Hash"),
    Column::new("explorer_url", "Explorer Link"),
];

pub const SUMMARY_COLUMNS: &[Column] = &[
    Column::new("chain", "Chain"),
    Column::new("version", "Version"),
    Column::new("adds", "Add Events"),
    Column::new("removes", "Remove Events"),
    Column::new("added_usd", "Added USD"),
    Column::new("removed_usd", "Removed USD"),
    Column::new("net_usd", "Net USD"),
    Column::new("average_usd", "Average Event USD"),
];

pub const DAILY_COLUMNS: &[Column] = &[
    Column::new("date", "Date"),
    Column::new("adds", "Add Events"),
    Column::new("removes", "Remove Events"),
    Column::new("added_usd", "Added USD"),
    Column::new("removed_usd", "Removed USD"),
    Column::new("net_usd", "Net USD"),
];

impl CsvRecord for LiquidityEvent {
    fn field(&self, id: &str) -> Option<String> {
        let value = match id {
            "chain" => self.chain.clone(),
            "version" => self.version.to_string(),
            "event_type" => self.kind.as_str().to_string(),
            "direction" => self.direction.as_str().to_string(),
            "token0" => self.token0_symbol.clone(),
            "token1" => self.token1_symbol.clone(),
            "amount0" => self.amount0.to_string(),
            "amount1" => self.amount1.to_string(),
            "liquidity_delta" => self.liquidity_delta.to_string(),
            "usd_value" => format!("{:.2}", self.usd_value),
            "block_number" => self.block_number.to_string(),
            "timestamp" => {
                if self.timestamp <= 0 {
                    return None;
                }
                DateTime::from_timestamp(self.timestamp, 0)?.to_rfc3339()
            }
            "tx_hash" => self.tx_hash.clone(),
            "explorer_url" => find_chain(&self.chain)?.tx_url(&self.tx_hash),
            _ => return None,
        };
        Some(value)
    }
}

/// One aggregate bucket flattened for CSV.
pub struct BucketRow<'a> {
    pub chain: Option<&'a str>,
    pub version: Option<ProtocolVersion>,
    pub date: Option<&'a str>,
    pub totals: &'a FlowTotals,
}

impl CsvRecord for BucketRow<'_> {
    fn field(&self, id: &str) -> Option<String> {
        let t = self.totals;
        Some(match id {
            "chain" => self.chain?.to_string(),
            "version" => self.version?.to_string(),
            "date" => self.date?.to_string(),
            "adds" => t.adds.to_string(),
            "removes" => t.removes.to_string(),
            "added_usd" => format!("{:.2}", t.added_usd),
            "removed_usd" => format!("{:.2}", t.removed_usd),
            "net_usd" => format!("{:.2}", t.net_usd()),
            "average_usd" => format!("{:.2}", t.average_usd()),
            _ => return None,
        })
    }
}

pub fn summary_rows(summary: &FlowSummary) -> Vec<BucketRow<'_>> {
    summary
        .by_chain_version
        .iter()
        .map(|((chain, version), totals)| BucketRow {
            chain: Some(chain.as_str()),
            version: Some(*version),
            date: None,
            totals,
        })
        .collect()
}

pub fn daily_rows(summary: &FlowSummary) -> Vec<BucketRow<'_>> {
    summary
        .by_day
        .iter()
        .map(|(date, totals)| BucketRow {
            chain: None,
            version: None,
            date: Some(date.as_str()),
            totals,
        })
        .collect()
}

pub fn write_outputs(dir: &Path, events: &[LiquidityEvent], summary: &FlowSummary) -> Result<()> {
    write_csv(&dir.join("liquidity_events.csv"), EVENT_COLUMNS, events)?;
    write_csv(&dir.join("liquidity_summary.csv"), SUMMARY_COLUMNS, &summary_rows(summary))?;
    write_csv(&dir.join("liquidity_daily.csv"), DAILY_COLUMNS, &daily_rows(summary))?;
    Ok(())
}

fn print_totals_row(label: &str, t: &FlowTotals) {
    println!(
        "{:<22} {:>6} {:>6} {:>12} {:>12} {:>12}",
        label,
        t.adds,
        t.removes,
        format_usd(t.added_usd),
        format_usd(t.removed_usd),
        format_usd(t.net_usd())
    );
}

fn print_table_header(first: &str) {
    println!(
        "{:<22} {:>6} {:>6} {:>12} {:>12} {:>12}",
        first, "Adds", "Rems", "Added", "Removed", "Net"
    );
    println!("{}", separator(76));
}

/// `estimated` lists symbols whose USD price came from the fallback table.
pub fn print_report(events: &[LiquidityEvent], summary: &FlowSummary, estimated: &[String]) {
    print_header("💧 LIQUIDITY FLOW REPORT");
    for symbol in estimated {
        println!("⚠️  {symbol} priced from fallback table; its USD values are estimates.");
    }

    if events.is_empty() {
        println!("No liquidity events found in the analyzed window.");
        return;
    }

    println!("\nBy chain:");
    print_table_header("Chain");
    for (chain, totals) in &summary.by_chain {
        let label = find_chain(chain).map(|c| c.name).unwrap_or(chain.as_str());
        print_totals_row(label, totals);
    }

    println!("\nBy protocol version:");
    print_table_header("Version");
    for (version, totals) in &summary.by_version {
        print_totals_row(version.as_str(), totals);
    }

    println!("\nBy chain and version:");
    print_table_header("Chain / Version");
    for ((chain, version), totals) in &summary.by_chain_version {
        print_totals_row(&format!("{chain} {version}"), totals);
    }

    println!("\nBy day (UTC):");
    print_table_header("Date");
    for (day, totals) in &summary.by_day {
        print_totals_row(day, totals);
    }

    println!("{}", separator(76));
    print_totals_row("TOTAL", &summary.total);
    println!(
        "Average event size: {}",
        format_usd(summary.total.average_usd())
    );

    println!("\nShare of gross flow by chain:");
    for chain in summary.by_chain.keys() {
        let share = summary.chain_share(chain);
        println!("{:<12} {} {:>6.2}%", chain, ascii_bar(share, 40), share);
    }

    println!("\nShare of gross flow by version:");
    for version in summary.by_version.keys() {
        let share = summary.version_share(*version);
        println!("{:<12} {} {:>6.2}%", version.as_str(), ascii_bar(share, 40), share);
    }

    println!("\nLargest events:");
    let mut largest: Vec<&LiquidityEvent> = events.iter().collect();
    largest.sort_by(|a, b| b.usd_value.total_cmp(&a.usd_value));
    for event in largest.into_iter().take(5) {
        let marker = if is_estimated(event, estimated) { "⚠️ " } else { "" };
        println!(
            "  {marker}{:<9} {} {:<8} {} {} + {} {} ({})",
            event.chain,
            event.version,
            event.kind.as_str(),
            format_amount(event.amount0),
            event.token0_symbol,
            format_amount(event.amount1),
            event.token1_symbol,
            format_usd(event.usd_value)
        );
    }
}

/// True when either side of the event was valued with a fallback price.
pub fn is_estimated(event: &LiquidityEvent, estimated: &[String]) -> bool {
    estimated.iter().any(|symbol| {
        symbol.eq_ignore_ascii_case(&event.token0_symbol)
            || symbol.eq_ignore_ascii_case(&event.token1_symbol)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidity::aggregate::aggregate;
    use crate::types::{Direction, EventKind};

    fn event() -> LiquidityEvent {
        LiquidityEvent {
            chain: "arbitrum".into(),
            version: ProtocolVersion::V3,
            kind: EventKind::Increase,
            direction: Direction::Add,
            token0_symbol: "WETH".into(),
            token1_symbol: "USDC".into(),
            amount0: 1.5,
            amount1: 3000.0,
            liquidity_delta: 77,
            usd_value: 6000.0,
            tx_hash: "0xabc".into(),
            block_number: 12,
            timestamp: 0,
        }
    }

    #[test]
    fn test_estimated_events_match_either_token() {
        let e = event();
        assert!(is_estimated(&e, &["usdc".to_string()]));
        assert!(is_estimated(&e, &["WETH".to_string()]));
        assert!(!is_estimated(&e, &["UNKNOWN".to_string()]));
        assert!(!is_estimated(&e, &[]));
    }

    #[test]
    fn test_event_row_fields() {
        let e = event();
        assert_eq!(e.field("event_type").as_deref(), Some("increase"));
        assert_eq!(e.field("usd_value").as_deref(), Some("6000.00"));
        assert_eq!(
            e.field("explorer_url").as_deref(),
            Some("https://arbiscan.io/tx/0xabc")
        );
        assert_eq!(e.field("timestamp"), None);
        assert_eq!(e.field("nope"), None);
    }

    #[test]
    fn test_write_outputs_row_counts() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![event(), event()];
        let summary = aggregate(&events);
        write_outputs(dir.path(), &events, &summary).unwrap();

        let count = |name: &str| {
            csv::Reader::from_path(dir.path().join(name))
                .unwrap()
                .records()
                .count()
        };
        assert_eq!(count("liquidity_events.csv"), 2);
        assert_eq!(count("liquidity_summary.csv"), 1);
        assert_eq!(count("liquidity_daily.csv"), 1);
    }
}
