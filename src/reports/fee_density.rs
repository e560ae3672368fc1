use crate::config::RunConfig;
use crate::csv_export::{write_csv, Column, CsvRecord};
use crate::fetch::fetch_with_fallback;
use crate::format::{ascii_bar, format_pct, format_usd, print_header, separator};
use crate::http::ApiClient;
use crate::reports::llama::LlamaClient;
use crate::types::Result;
use crate::utils::{annualize_daily, fee_density, ratio_percent};

/// DEX protocol tracked by the report, with values used when DefiLlama is unavailable.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolSpec {
    pub name: &'static str,
    pub slug: &'static str,
    pub fallback_tvl: f64,
    pub fallback_fees: f64,
    pub fallback_volume: f64,
}

pub const PROTOCOLS: &[ProtocolSpec] = &[
    ProtocolSpec {
        name: "Uniswap",
        slug: "uniswap",
        fallback_tvl: 4_500_000_000.0,
        fallback_fees: 2_500_000.0,
        fallback_volume: 1_500_000_000.0,
    },
    ProtocolSpec {
        name: "PancakeSwap",
        slug: "pancakeswap",
        fallback_tvl: 1_800_000_000.0,
        fallback_fees: 900_000.0,
        fallback_volume: 800_000_000.0,
    },
    ProtocolSpec {
        name: "Curve",
        slug: "curve-dex",
        fallback_tvl: 2_000_000_000.0,
        fallback_fees: 100_000.0,
        fallback_volume: 150_000_000.0,
    },
    ProtocolSpec {
        name: "Aerodrome",
        slug: "aerodrome",
        fallback_tvl: 500_000_000.0,
        fallback_fees: 300_000.0,
        fallback_volume: 300_000_000.0,
    },
    ProtocolSpec {
        name: "Balancer",
        slug: "balancer",
        fallback_tvl: 800_000_000.0,
        fallback_fees: 150_000.0,
        fallback_volume: 100_000_000.0,
    },
    ProtocolSpec {
        name: "SushiSwap",
        slug: "sushi",
        fallback_tvl: 300_000_000.0,
        fallback_fees: 80_000.0,
        fallback_volume: 60_000_000.0,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeeDensityRow {
    pub protocol: String,
    pub tvl: f64,
    pub daily_fees: f64,
    pub daily_volume: f64,
    pub daily_density: f64,
    pub annualized_density: f64,
    pub turnover: f64,
    pub used_fallback: bool,
}

impl FeeDensityRow {
    pub fn compute(protocol: &str, tvl: f64, daily_fees: f64, daily_volume: f64) -> Self {
        let daily_density = fee_density(daily_fees, tvl);
        Self {
            protocol: protocol.to_string(),
            tvl,
            daily_fees,
            daily_volume,
            daily_density,
            annualized_density: annualize_daily(daily_density),
            turnover: ratio_percent(daily_volume, tvl),
            used_fallback: false,
        }
    }
}

impl CsvRecord for FeeDensityRow {
    fn field(&self, id: &str) -> Option<String> {
        Some(match id {
            "protocol" => self.protocol.clone(),
            "tvl" => format!("{:.2}", self.tvl),
            "daily_fees" => format!("{:.2}", self.daily_fees),
            "daily_volume" => format!("{:.2}", self.daily_volume),
            "daily_density" => format!("{:.6}", self.daily_density),
            "annualized_density" => format!("{:.4}", self.annualized_density),
            "turnover" => format!("{:.4}", self.turnover),
            "data_source" => (if self.used_fallback { "fallback" } else { "live" }).to_string(),
            _ => return None,
        })
    }
}

pub const COLUMNS: &[Column] = &[
    Column::new("protocol", "Protocol"),
    Column::new("tvl", "TVL (USD)"),
    Column::new("daily_fees", "24h Fees (USD)"),
    Column::new("daily_volume", "24h Volume (USD)"),
    Column::new("daily_density", "Daily Fee Density (%)"),
    Column::new("annualized_density", "Annualized Fee Density (%)"),
    Column::new("turnover", "Volume/TVL (%)"),
    Column::new("data_source", "Data Source"),
];

/// Highest daily fee density first.
pub fn rank(rows: &mut [FeeDensityRow]) {
    rows.sort_by(|a, b| b.daily_density.total_cmp(&a.daily_density));
}

pub async fn run(config: &RunConfig) -> Result<()> {
    let client = ApiClient::new(config)?;
    let llama = LlamaClient::new(&client);

    let mut rows = Vec::with_capacity(PROTOCOLS.len());
    for spec in PROTOCOLS {
        log::info!("[fee_density::run] Fetching {}", spec.name);
        let tvl = llama.protocol_tvl(spec.slug);
        let tvl = fetch_with_fallback(spec.slug, tvl, spec.fallback_tvl).await;
        client.throttle().await;
        let fees = llama.daily_fees(spec.slug);
        let fees = fetch_with_fallback(spec.slug, fees, spec.fallback_fees).await;
        client.throttle().await;
        let volume = llama.daily_volume(spec.slug);
        let volume = fetch_with_fallback(spec.slug, volume, spec.fallback_volume).await;
        client.throttle().await;

        let (tvl_usd, fees_usd, volume_usd) = (*tvl.value(), *fees.value(), *volume.value());
        let mut row = FeeDensityRow::compute(spec.name, tvl_usd, fees_usd, volume_usd);
        row.used_fallback = tvl.is_fallback() || fees.is_fallback() || volume.is_fallback();
        rows.push(row);
    }
    rank(&mut rows);

    print_report(&rows);
    write_csv(&config.output_path("fee_density.csv"), COLUMNS, &rows)?;
    Ok(())
}

fn print_report(rows: &[FeeDensityRow]) {
    print_header("💰 DEX FEE DENSITY (fees / TVL)");
    println!(
        "{:<16} {:>12} {:>12} {:>12} {:>10} {:>12} {:>10}",
        "Protocol", "TVL", "24h Fees", "24h Volume", "Daily", "Annualized", "Turnover"
    );
    println!("{}", separator(92));
    for row in rows {
        let marker = if row.used_fallback { "⚠️ " } else { "" };
        println!(
            "{:<16} {:>12} {:>12} {:>12} {:>10} {:>12} {:>10}",
            format!("{marker}{}", row.protocol),
            format_usd(row.tvl),
            format_usd(row.daily_fees),
            format_usd(row.daily_volume),
            format!("{:.4}%", row.daily_density),
            format_pct(row.annualized_density),
            format_pct(row.turnover)
        );
    }

    let max = rows
        .iter()
        .map(|r| r.annualized_density)
        .fold(0.0_f64, f64::max);
    println!("\nAnnualized fee density:");
    for row in rows {
        let share = ratio_percent(row.annualized_density, max);
        println!(
            "{:<16} {} {}",
            row.protocol,
            ascii_bar(share, 40),
            format_pct(row.annualized_density)
        );
    }
    if rows.iter().any(|r| r.used_fallback) {
        println!("\n⚠️  Rows marked ⚠️ use fallback values for at least one metric.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_row() {
        let row = FeeDensityRow::compute("Uniswap", 4_000_000_000.0, 2_000_000.0, 1_000_000_000.0);
        assert!((row.daily_density - 0.05).abs() < 1e-12);
        assert!((row.annualized_density - 18.25).abs() < 1e-9);
        assert!((row.turnover - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tvl_yields_zero_density() {
        let row = FeeDensityRow::compute("Empty", 0.0, 1_000.0, 1_000.0);
        assert_eq!(row.daily_density, 0.0);
        assert_eq!(row.annualized_density, 0.0);
        assert_eq!(row.turnover, 0.0);
    }

    #[test]
    fn test_rank_orders_by_daily_density() {
        let mut rows: Vec<_> = PROTOCOLS
            .iter()
            .map(|p| {
                FeeDensityRow::compute(p.name, p.fallback_tvl, p.fallback_fees, p.fallback_volume)
            })
            .collect();
        rank(&mut rows);
        assert_eq!(rows[0].protocol, "Aerodrome");
        assert!(rows.windows(2).all(|w| w[0].daily_density >= w[1].daily_density));
    }

    #[test]
    fn test_csv_marks_fallback_rows() {
        let mut row = FeeDensityRow::compute("Curve", 1.0, 1.0, 1.0);
        assert_eq!(row.field("data_source").as_deref(), Some("live"));
        row.used_fallback = true;
        assert_eq!(row.field("data_source").as_deref(), Some("fallback"));
    }
}
