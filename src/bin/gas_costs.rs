use std::process::ExitCode;

use dex_analytics::cli;
use dex_analytics::reports::gas_costs;

#[tokio::main]
async fn main() -> ExitCode {
    cli::run_main("gas cost report", |config| async move {
        gas_costs::run(&config).await
    })
    .await
}
