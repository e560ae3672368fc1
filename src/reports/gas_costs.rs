use serde::Deserialize;

use crate::config::RunConfig;
use crate::csv_export::{write_csv, Column, CsvRecord};
use crate::fetch::{fetch_with_fallback, FetchError, Fetched};
use crate::format::{format_usd, print_header, separator};
use crate::http::ApiClient;
use crate::price::PriceService;
use crate::types::Result;
use crate::utils::{gas_cost_eth, gas_cost_usd};

const ETHERSCAN_API: &str = "https://api.etherscan.io/api";
pub const FALLBACK_GAS_GWEI: f64 = 30.0;
/// Gas prices (gwei) for the sensitivity table.
pub const SENSITIVITY_GWEI: &[f64] = &[5.0, 15.0, 30.0, 60.0, 100.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasBenchmark {
    pub operation: &'static str,
    pub gas_units: u64,
}

impl GasBenchmark {
    pub const fn new(operation: &'static str, gas_units: u64) -> Self {
        Self {
            operation,
            gas_units,
        }
    }
}

pub const BENCHMARKS: &[GasBenchmark] = &[
    GasBenchmark::new("ETH transfer", 21_000),
    GasBenchmark::new("ERC-20 approve", 46_000),
    GasBenchmark::new("Uniswap V2 swap", 95_000),
    GasBenchmark::new("Uniswap V4 swap", 110_000),
    GasBenchmark::new("Uniswap V3 collect fees", 120_000),
    GasBenchmark::new("Uniswap V3 swap", 130_000),
    GasBenchmark::new("Uniswap V2 add liquidity", 150_000),
    GasBenchmark::new("Uniswap V3 mint position", 350_000),
];

#[derive(Debug, Clone, PartialEq)]
pub struct GasCostRow {
    pub operation: String,
    pub gas_units: u64,
    pub gas_price_gwei: f64,
    pub eth_price_usd: f64,
    pub cost_eth: f64,
    pub cost_usd: f64,
}

impl GasCostRow {
    pub fn compute(benchmark: &GasBenchmark, gas_price_gwei: f64, eth_price_usd: f64) -> Self {
        Self {
            operation: benchmark.operation.to_string(),
            gas_units: benchmark.gas_units,
            gas_price_gwei,
            eth_price_usd,
            cost_eth: gas_cost_eth(benchmark.gas_units, gas_price_gwei),
            cost_usd: gas_cost_usd(benchmark.gas_units, gas_price_gwei, eth_price_usd),
        }
    }
}

impl CsvRecord for GasCostRow {
    fn field(&self, id: &str) -> Option<String> {
        Some(match id {
            "operation" => self.operation.clone(),
            "gas_units" => self.gas_units.to_string(),
            "gas_price_gwei" => format!("{:.2}", self.gas_price_gwei),
            "eth_price_usd" => format!("{:.2}", self.eth_price_usd),
            "cost_eth" => format!("{:.8}", self.cost_eth),
            "cost_usd" => format!("{:.4}", self.cost_usd),
            _ => return None,
        })
    }
}

pub const COLUMNS: &[Column] = &[
    Column::new("operation", "Operation"),
    Column::new("gas_units", "Gas Units"),
    Column::new("gas_price_gwei", "Gas Price (gwei)"),
    Column::new("eth_price_usd", "ETH Price (USD)"),
    Column::new("cost_eth", "Cost (ETH)"),
    Column::new("cost_usd", "Cost (USD)"),
];

#[derive(Debug, Deserialize)]
struct GasOracleResponse {
    status: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GasOracleResult {
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: String,
}

pub fn parse_gas_oracle(body: serde_json::Value) -> std::result::Result<f64, FetchError> {
    let response: GasOracleResponse = serde_json::from_value(body)?;
    if response.status != "1" {
        return Err(FetchError::Decode(format!(
            "gas oracle returned status {}: {}",
            response.status, response.result
        )));
    }
    let result: GasOracleResult = serde_json::from_value(response.result)?;
    result
        .propose_gas_price
        .trim()
        .parse::<f64>()
        .map_err(|e| FetchError::Decode(format!("ProposeGasPrice: {e}")))
}

async fn fetch_gas_price(
    client: &ApiClient,
    api_key: Option<&str>,
) -> std::result::Result<f64, FetchError> {
    let mut url = format!("{ETHERSCAN_API}?module=gastracker&action=gasoracle");
    if let Some(key) = api_key {
        url.push_str("&apikey=");
        url.push_str(key);
    }
    parse_gas_oracle(client.get_json(&url).await?)
}

pub async fn run(config: &RunConfig) -> Result<()> {
    let client = ApiClient::new(config)?;
    let gas = fetch_with_fallback(
        "gas oracle",
        fetch_gas_price(&client, config.etherscan_api_key.as_deref()),
        FALLBACK_GAS_GWEI,
    )
    .await;
    client.throttle().await;
    let eth = PriceService::new(&client).eth_price().await;

    let rows: Vec<GasCostRow> = BENCHMARKS
        .iter()
        .map(|b| GasCostRow::compute(b, *gas.value(), *eth.value()))
        .collect();

    print_report(&rows, &gas, &eth);
    write_csv(&config.output_path("gas_costs.csv"), COLUMNS, &rows)?;
    Ok(())
}

fn print_report(rows: &[GasCostRow], gas: &Fetched<f64>, eth: &Fetched<f64>) {
    print_header("⛽ DEX OPERATION GAS COSTS (Ethereum mainnet)");
    println!("Gas price: {}{:.2} gwei", gas.marker(), gas.value());
    println!("ETH price: {}{}", eth.marker(), format_usd(*eth.value()));
    println!();
    println!("{:<28} {:>10} {:>14} {:>12}", "Operation", "Gas", "ETH", "USD");
    println!("{}", separator(67));
    for row in rows {
        println!(
            "{:<28} {:>10} {:>14.6} {:>12}",
            row.operation,
            row.gas_units,
            row.cost_eth,
            format_usd(row.cost_usd)
        );
    }

    println!("\nUSD cost by gas price:");
    print!("{:<28}", "Operation");
    for gwei in SENSITIVITY_GWEI {
        print!(" {:>10}", format!("{gwei} gwei"));
    }
    println!();
    println!("{}", separator(28 + 11 * SENSITIVITY_GWEI.len()));
    for row in rows {
        print!("{:<28}", row.operation);
        for gwei in SENSITIVITY_GWEI {
            print!(" {:>10}", format_usd(gas_cost_usd(row.gas_units, *gwei, row.eth_price_usd)));
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_v2_swap_cost_example() {
        let v2_swap = BENCHMARKS
            .iter()
            .find(|b| b.gas_units == 95_000)
            .unwrap();
        let row = GasCostRow::compute(v2_swap, 30.0, 2000.0);
        assert!((row.cost_usd - 5.7).abs() < 1e-9);
        assert!((row.cost_eth - 0.00285).abs() < 1e-12);
    }

    #[test]
    fn test_cost_scales_with_gas_price() {
        let b = &BENCHMARKS[0];
        let low = GasCostRow::compute(b, 10.0, 2000.0);
        let high = GasCostRow::compute(b, 20.0, 2000.0);
        assert!((high.cost_usd - 2.0 * low.cost_usd).abs() < 1e-9);
    }

    #[test]
    fn test_parse_gas_oracle() {
        let ok = json!({
            "status": "1",
            "message": "OK",
            "result": {"SafeGasPrice": "11", "ProposeGasPrice": "12.5", "FastGasPrice": "14"}
        });
        assert_eq!(parse_gas_oracle(ok).unwrap(), 12.5);

        let rate_limited = json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Max rate limit reached"
        });
        assert!(parse_gas_oracle(rate_limited).is_err());

        let garbage = json!({"status": "1", "result": {"ProposeGasPrice": "fast"}});
        assert!(parse_gas_oracle(garbage).is_err());
    }
}
