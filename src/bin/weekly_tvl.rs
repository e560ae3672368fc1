use std::process::ExitCode;

use dex_analytics::cli;
use dex_analytics::reports::weekly_tvl::{self, CURRENT_NAMING};

#[tokio::main]
async fn main() -> ExitCode {
    cli::run_main("weekly TVL report", |config| async move {
        weekly_tvl::run(&config, &CURRENT_NAMING, "weekly_tvl.csv").await
    })
    .await
}
