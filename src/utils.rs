use web3::types::U256;

pub const DAYS_PER_YEAR: f64 = 365.0;

/// `part / whole * 100`, or 0 when `whole` is not positive.
pub fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        (part / whole) * 100.0
    }
}

/// Daily fees as a percentage of TVL.
pub fn fee_density(daily_fees: f64, tvl: f64) -> f64 {
    ratio_percent(daily_fees, tvl)
}

pub fn annualize_daily(daily_pct: f64) -> f64 {
    daily_pct * DAYS_PER_YEAR
}

pub fn gas_cost_eth(gas_units: u64, gas_price_gwei: f64) -> f64 {
    gas_units as f64 * gas_price_gwei / 1e9
}

pub fn gas_cost_usd(gas_units: u64, gas_price_gwei: f64, eth_price_usd: f64) -> f64 {
    gas_cost_eth(gas_units, gas_price_gwei) * eth_price_usd
}

/// Largest `n` with `10^n` representable in a U256.
pub const MAX_TOKEN_DECIMALS: u8 = 77;

/// Converts a raw token amount into a human-readable quantity.
/// Decimals above [`MAX_TOKEN_DECIMALS`] are clamped to it.
pub fn scale_amount(raw: U256, decimals: u8) -> f64 {
    let decimals = decimals.min(MAX_TOKEN_DECIMALS);
    // Split to keep precision for amounts above 2^53.
    let unit = U256::exp10(decimals as usize);
    let whole = raw / unit;
    let frac = raw % unit;
    u256_to_f64(whole) + u256_to_f64(frac) / 10f64.powi(decimals as i32)
}

pub fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

/// Interprets a two's-complement int256 word, saturating to the i128 range.
pub fn int256_to_i128(word: U256) -> i128 {
    let negative = word.bit(255);
    let magnitude = if negative {
        (!word).overflowing_add(U256::one()).0
    } else {
        word
    };
    let capped = if magnitude > U256::from(i128::MAX as u128) {
        i128::MAX
    } else {
        magnitude.as_u128() as i128
    };
    if negative {
        -capped
    } else {
        capped
    }
}
