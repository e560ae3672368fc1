use crate::config::RunConfig;
use crate::csv_export::{write_csv, Column, CsvRecord};
use crate::format::{format_pct, format_usd, print_header, separator};
use crate::http::ApiClient;
use crate::price::PriceService;
use crate::types::Result;

/// Per-chain price multipliers applied to the reference price.
const CHAIN_VARIATIONS: &[(&str, f64)] = &[
    ("ethereum", 1.000),
    ("arbitrum", 0.998),
    ("optimism", 1.001),
    ("base", 0.999),
    ("polygon", 1.0005),
];

pub fn chain_variation(chain: &str) -> f64 {
    CHAIN_VARIATIONS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(chain))
        .map(|(_, m)| *m)
        .unwrap_or(1.0)
}

pub fn apply_chain_variation(base_price: f64, chain: &str) -> f64 {
    base_price * chain_variation(chain)
}

#[derive(Debug, Clone, PartialEq)]
pub struct VenuePrice {
    pub venue: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spread {
    pub buy: VenuePrice,
    pub sell: VenuePrice,
    pub spread_pct: f64,
}

/// Cheapest venue to buy, most expensive to sell. `None` for an empty list.
pub fn compute_spread(prices: &[VenuePrice]) -> Option<Spread> {
    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price).then_with(|| a.venue.cmp(&b.venue)));
    let buy = sorted.first()?.clone();
    let sell = sorted.last()?.clone();
    let spread_pct = if buy.price > 0.0 {
        (sell.price - buy.price) / buy.price * 100.0
    } else {
        0.0
    };
    Some(Spread {
        buy,
        sell,
        spread_pct,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadRow {
    pub chain: String,
    pub price: f64,
    pub deviation_pct: f64,
    pub role: &'static str,
}

impl CsvRecord for SpreadRow {
    fn field(&self, id: &str) -> Option<String> {
        Some(match id {
            "chain" => self.chain.clone(),
            "price" => format!("{:.4}", self.price),
            "deviation_pct" => format!("{:.4}", self.deviation_pct),
            "role" => self.role.to_string(),
            _ => return None,
        })
    }
}

pub const COLUMNS: &[Column] = &[
    Column::new("chain", "Chain"),
    Column::new("price", "ETH Price (USD)"),
    Column::new("deviation_pct", "Deviation From Reference (%)"),
    Column::new("role", "Role"),
];

pub fn spread_rows(base_price: f64, prices: &[VenuePrice], spread: &Spread) -> Vec<SpreadRow> {
    prices
        .iter()
        .map(|p| SpreadRow {
            chain: p.venue.clone(),
            price: p.price,
            deviation_pct: if base_price > 0.0 {
                (p.price - base_price) / base_price * 100.0
            } else {
                0.0
            },
            role: if p.venue == spread.buy.venue {
                "buy"
            } else if p.venue == spread.sell.venue {
                "sell"
            } else {
                ""
            },
        })
        .collect()
}

pub async fn run(config: &RunConfig) -> Result<()> {
    let client = ApiClient::new(config)?;
    let base = PriceService::new(&client).eth_price().await;
    let base_price = *base.value();

    let prices: Vec<VenuePrice> = config
        .selected_chains()
        .iter()
        .map(|chain| VenuePrice {
            venue: chain.key.to_string(),
            price: apply_chain_variation(base_price, chain.key),
        })
        .collect();

    let Some(spread) = compute_spread(&prices) else {
        log::warn!("⚠️ [price_spread::run] no venues selected");
        return Ok(());
    };
    let rows = spread_rows(base_price, &prices, &spread);

    print_header("📈 CROSS-CHAIN ETH PRICE SPREAD");
    println!("Reference price: {}{}", base.marker(), format_usd(base_price));
    println!();
    println!("{:<12} {:>14} {:>12} {:>6}", "Chain", "Price", "Deviation", "Role");
    println!("{}", separator(47));
    for row in &rows {
        println!(
            "{:<12} {:>14} {:>12} {:>6}",
            row.chain,
            format!("${:.2}", row.price),
            format_pct(row.deviation_pct),
            row.role
        );
    }
    println!("{}", separator(47));
    println!(
        "Buy on {} at ${:.2}, sell on {} at ${:.2}: spread {:.4}%",
        spread.buy.venue, spread.buy.price, spread.sell.venue, spread.sell.price, spread.spread_pct
    );

    write_csv(&config.output_path("price_spread.csv"), COLUMNS, &rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn venues(prices: &[(&str, f64)]) -> Vec<VenuePrice> {
        prices
            .iter()
            .map(|(v, p)| VenuePrice { venue: v.to_string(), price: *p })
            .collect()
    }

    #[rstest]
    #[case("arbitrum", 1996.0)]
    #[case("ethereum", 2000.0)]
    #[case("Optimism", 2002.0)]
    #[case("base", 1998.0)]
    #[case("unknown-chain", 2000.0)]
    fn test_apply_chain_variation(#[case] chain: &str, #[case] expected: f64) {
        assert!((apply_chain_variation(2000.0, chain) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_spread_example() {
        let prices = venues(&[
            ("arbitrum", 1996.0),
            ("ethereum", 2000.0),
            ("optimism", 2002.0),
            ("base", 1998.0),
        ]);
        let spread = compute_spread(&prices).unwrap();
        assert_eq!(spread.buy.price, 1996.0);
        assert_eq!(spread.sell.price, 2002.0);
        assert!((spread.spread_pct - 0.3006).abs() < 1e-4);
    }

    #[test]
    fn test_spread_is_order_independent() {
        let a = venues(&[("a", 1996.0), ("b", 2000.0), ("c", 2002.0), ("d", 1998.0)]);
        let mut b = a.clone();
        b.reverse();
        b.swap(0, 2);
        assert_eq!(compute_spread(&a), compute_spread(&b));
    }

    #[test]
    fn test_spread_edge_cases() {
        assert_eq!(compute_spread(&[]), None);
        let single = compute_spread(&venues(&[("x", 10.0)])).unwrap();
        assert_eq!(single.spread_pct, 0.0);
        let zero = compute_spread(&venues(&[("x", 0.0), ("y", 5.0)])).unwrap();
        assert_eq!(zero.spread_pct, 0.0);
    }

    #[test]
    fn test_rows_tag_buy_and_sell() {
        let prices = venues(&[("ethereum", 2000.0), ("arbitrum", 1996.0), ("optimism", 2002.0)]);
        let spread = compute_spread(&prices).unwrap();
        let rows = spread_rows(2000.0, &prices, &spread);
        let roles: Vec<_> = rows.iter().map(|r| r.role).collect();
        assert_eq!(roles, vec!["", "buy", "sell"]);
        assert!((rows[1].deviation_pct + 0.2).abs() < 1e-9);
    }
}
