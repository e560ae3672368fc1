use std::process::ExitCode;

use dex_analytics::cli;
use dex_analytics::reports::price_spread;

#[tokio::main]
async fn main() -> ExitCode {
    cli::run_main("price spread report", |config| async move {
        price_spread::run(&config).await
    })
    .await
}
