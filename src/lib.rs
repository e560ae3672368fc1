pub mod cli;
pub mod config;
pub mod csv_export;
pub mod fetch;
pub mod format;
pub mod http;
pub mod liquidity;
pub mod price;
pub mod reports;
pub mod types;
pub mod utils;
