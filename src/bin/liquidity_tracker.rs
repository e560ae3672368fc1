use std::process::ExitCode;

use dex_analytics::{cli, liquidity};

#[tokio::main]
async fn main() -> ExitCode {
    cli::run_main("liquidity tracker", |config| async move {
        liquidity::run(&config).await
    })
    .await
}
