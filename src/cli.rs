use std::future::Future;
use std::process::ExitCode;

use env_logger::Env;

use crate::config::RunConfig;
use crate::types::{DynError, Result};

/// Loads `.env`, reads the run configuration and installs the logger.
pub fn bootstrap() -> Result<RunConfig> {
    dotenvy::dotenv().ok();
    let config = RunConfig::from_env()?;
    init_logging(config.debug);
    Ok(config)
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` when `DEBUG` is set.
pub fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default)).init();
}

pub fn report_failure(err: &DynError, debug: bool) {
    if debug {
        eprintln!("❌ {err:?}");
    } else {
        eprintln!("❌ {err}");
    }
}

/// Shared body of every binary's `main`: bootstrap, run once, map failure to a non-zero exit.
pub async fn run_main<F, Fut>(name: &str, report: F) -> ExitCode
where
    F: FnOnce(RunConfig) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let config = match bootstrap() {
        Ok(config) => config,
        Err(e) => {
            report_failure(&e, true);
            return ExitCode::FAILURE;
        }
    };
    let debug = config.debug;
    log::info!("[main] Starting {name}...");
    match report(config).await {
        Ok(()) => {
            log::info!("[main] {name} finished.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_failure(&e, debug);
            ExitCode::FAILURE
        }
    }
}
