//! On-chain liquidity flow tracking across chains and protocol generations.

use std::collections::{BTreeSet, HashMap};

use crate::config::{ChainConfig, RunConfig};
use crate::fetch::Fetched;
use crate::http::ApiClient;
use crate::price::PriceService;
use crate::types::{LiquidityEvent, Result};

pub mod abi;
pub mod aggregate;
pub mod blocks;
pub mod decoder;
pub mod report;
pub mod source;
pub mod tracker;

pub use aggregate::{aggregate, apply_usd_values, FlowSummary, FlowTotals};
pub use blocks::BlockWindow;
pub use source::{LogSource, Web3Source};
pub use tracker::ChainTracker;

/// Scans every selected chain, prices the events, prints the report and writes the CSVs.
pub async fn run(config: &RunConfig) -> Result<()> {
    let abis = abi::Abis::load()?;
    let mut events = Vec::new();
    for chain in config.selected_chains() {
        events.extend(scan_chain(config, chain, &abis).await);
    }

    let client = ApiClient::new(config)?;
    let symbols = token_symbols(&events);
    log::info!("[liquidity::run] Pricing {} tokens", symbols.len());
    let fetched = PriceService::new(&client).prices_for(&symbols).await;
    let estimated = fallback_symbols(&fetched);
    let prices: HashMap<String, f64> = fetched
        .into_iter()
        .map(|(symbol, price)| (symbol, price.into_value()))
        .collect();

    apply_usd_values(&mut events, &prices);
    sort_events(&mut events);
    let summary = aggregate(&events);

    report::print_report(&events, &summary, &estimated);
    report::write_outputs(&config.output_dir, &events, &summary)?;
    log::info!(
        "[liquidity::run] Wrote {} events to {}",
        events.len(),
        config.output_dir.display()
    );
    Ok(())
}

/// Symbols priced from the fallback table rather than a live quote, sorted.
pub fn fallback_symbols(prices: &HashMap<String, Fetched<f64>>) -> Vec<String> {
    let mut symbols: Vec<String> = prices
        .iter()
        .filter(|(_, price)| price.is_fallback())
        .map(|(symbol, _)| symbol.clone())
        .collect();
    symbols.sort();
    symbols
}

/// Groups events per chain, in block order within each chain.
pub fn sort_events(events: &mut [LiquidityEvent]) {
    events.sort_by(|a, b| (&a.chain, a.block_number).cmp(&(&b.chain, b.block_number)));
}

/// A chain whose node cannot be reached contributes no events.
async fn scan_chain(
    config: &RunConfig,
    chain: &ChainConfig,
    abis: &abi::Abis,
) -> Vec<LiquidityEvent> {
    let rpc_url = config.rpc_url_for(chain);
    let source = match Web3Source::connect(&rpc_url) {
        Ok(source) => source,
        Err(e) => {
            log::warn!(
                "⚠️ [liquidity::scan_chain] {}: cannot connect to {rpc_url}: {e}",
                chain.name
            );
            return Vec::new();
        }
    };
    let head = match config.fixed_head(chain) {
        Some(block) => block,
        None => match source.head_block().await {
            Ok(head) => head,
            Err(e) => {
                log::warn!(
                    "⚠️ [liquidity::scan_chain] {}: head block unavailable: {e}",
                    chain.name
                );
                return Vec::new();
            }
        },
    };
    let window = BlockWindow::plan(head, config.blocks_to_analyze, config.start_block);
    ChainTracker::new(chain, &source, abis, config.chunk_size, config.request_delay)
        .track(window)
        .await
}

/// Distinct upper-case token symbols across `events`, sorted.
pub fn token_symbols(events: &[LiquidityEvent]) -> Vec<String> {
    events
        .iter()
        .flat_map(|e| [&e.token0_symbol, &e.token1_symbol])
        .map(|s| s.to_ascii_uppercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
