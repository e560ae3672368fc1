use std::fmt;

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type Result<T> = std::result::Result<T, DynError>;

/// Protocol generation of the DEX whose liquidity is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V2,
    V3,
    V4,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 3] = [Self::V2, Self::V3, Self::V4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
            Self::V4 => "v4",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Mint,
    Burn,
    Increase,
    Decrease,
    Modify,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Burn => "burn",
            Self::Increase => "increase",
            Self::Decrease => "decrease",
            Self::Modify => "modify",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Add,
    Remove,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

/// One decoded liquidity log. Amounts are already scaled by token decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityEvent {
    pub chain: String,
    pub version: ProtocolVersion,
    pub kind: EventKind,
    pub direction: Direction,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub amount0: f64,
    pub amount1: f64,
    pub liquidity_delta: i128,
    pub usd_value: f64,
    pub tx_hash: String,
    pub block_number: u64,
    /// Unix seconds; 0 when the block timestamp could not be fetched.
    pub timestamp: i64,
}
