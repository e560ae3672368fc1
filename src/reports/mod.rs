//! REST-backed reports. Each `run` prints a console table and writes one CSV.

pub mod fee_density;
pub mod gas_costs;
pub mod llama;
pub mod price_spread;
pub mod weekly_tvl;
