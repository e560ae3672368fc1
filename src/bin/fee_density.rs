use std::process::ExitCode;

use dex_analytics::cli;
use dex_analytics::reports::fee_density;

#[tokio::main]
async fn main() -> ExitCode {
    cli::run_main("fee density report", |config| async move {
        fee_density::run(&config).await
    })
    .await
}
