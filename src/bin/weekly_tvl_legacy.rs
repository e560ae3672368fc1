use std::process::ExitCode;

use dex_analytics::cli;
use dex_analytics::reports::weekly_tvl::{self, LEGACY_NAMING};

// Older DefiLlama chain keys ("Optimism", "Binance"); kept apart from the current report.
#[tokio::main]
async fn main() -> ExitCode {
    cli::run_main("weekly TVL report (legacy naming)", |config| async move {
        weekly_tvl::run(&config, &LEGACY_NAMING, "weekly_tvl_legacy.csv").await
    })
    .await
}
