use ethabi::{Event, RawLog as AbiRawLog, Token};
use thiserror::Error;
use web3::types::{Address, U256};

use crate::liquidity::abi::{sort_tokens, Abis};
use crate::liquidity::source::RawLog;
use crate::types::{Direction, EventKind, LiquidityEvent, ProtocolVersion};
use crate::utils::{int256_to_i128, scale_amount};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log does not match any tracked event (topic0 {0:?})")]
    UnknownTopic(Option<web3::types::H256>),
    #[error("abi decode failed: {0}")]
    Abi(#[from] ethabi::Error),
    #[error("missing `{0}` parameter")]
    MissingParam(&'static str),
    #[error("missing {0} on log")]
    MissingMeta(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMeta {
    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            symbol: "UNKNOWN".to_string(),
            decimals: 18,
        }
    }
}

/// Tracked pair in pool order (token0 has the lower address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairMeta {
    pub token0: TokenMeta,
    pub token1: TokenMeta,
}

impl PairMeta {
    pub fn new(a: TokenMeta, b: TokenMeta) -> Self {
        let (lo, _) = sort_tokens(a.address, b.address);
        if lo == a.address {
            Self { token0: a, token1: b }
        } else {
            Self { token0: b, token1: a }
        }
    }

    pub fn matches(&self, token0: Address, token1: Address) -> bool {
        sort_tokens(token0, token1) == (self.token0.address, self.token1.address)
    }
}

/// Fields common to every decoded event.
struct Decoded {
    kind: EventKind,
    direction: Direction,
    amount0: U256,
    amount1: U256,
    liquidity_delta: i128,
}

/// Decodes raw logs of one protocol generation into [`LiquidityEvent`]s.
pub struct EventDecoder<'a> {
    abis: &'a Abis,
    chain: &'a str,
    pair: &'a PairMeta,
}

impl<'a> EventDecoder<'a> {
    pub fn new(abis: &'a Abis, chain: &'a str, pair: &'a PairMeta) -> Self {
        Self { abis, chain, pair }
    }

    pub fn decode(
        &self,
        version: ProtocolVersion,
        log: &RawLog,
    ) -> Result<LiquidityEvent, DecodeError> {
        let decoded = match version {
            ProtocolVersion::V2 => self.decode_v2(log)?,
            ProtocolVersion::V3 => self.decode_v3(log)?,
            ProtocolVersion::V4 => self.decode_v4(log)?,
        };

        let tx_hash = log
            .tx_hash
            .ok_or(DecodeError::MissingMeta("transaction hash"))?;
        let block_number = log.block_number.ok_or(DecodeError::MissingMeta("block number"))?;

        Ok(LiquidityEvent {
            chain: self.chain.to_string(),
            version,
            kind: decoded.kind,
            direction: decoded.direction,
            token0_symbol: self.pair.token0.symbol.clone(),
            token1_symbol: self.pair.token1.symbol.clone(),
            amount0: scale_amount(decoded.amount0, self.pair.token0.decimals),
            amount1: scale_amount(decoded.amount1, self.pair.token1.decimals),
            liquidity_delta: decoded.liquidity_delta,
            usd_value: 0.0,
            tx_hash: format!("{tx_hash:?}"),
            block_number,
            timestamp: 0,
        })
    }

    /// Token id carried in topic1 of a V3 position manager event.
    pub fn v3_token_id(log: &RawLog) -> Result<U256, DecodeError> {
        log.topics
            .get(1)
            .map(|t| U256::from_big_endian(t.as_bytes()))
            .ok_or(DecodeError::MissingParam("tokenId"))
    }

    fn decode_v2(&self, log: &RawLog) -> Result<Decoded, DecodeError> {
        let mint = self.abis.v2_mint()?;
        let burn = self.abis.v2_burn()?;
        let (kind, direction, event) = match log.topics.first() {
            Some(t) if *t == mint.signature() => (EventKind::Mint, Direction::Add, mint),
            Some(t) if *t == burn.signature() => (EventKind::Burn, Direction::Remove, burn),
            other => return Err(DecodeError::UnknownTopic(other.copied())),
        };
        let params = parse(event, log)?;
        Ok(Decoded {
            kind,
            direction,
            amount0: uint_param(&params, "amount0")?,
            amount1: uint_param(&params, "amount1")?,
            liquidity_delta: 0,
        })
    }

    fn decode_v3(&self, log: &RawLog) -> Result<Decoded, DecodeError> {
        let increase = self.abis.v3_increase()?;
        let decrease = self.abis.v3_decrease()?;
        let (kind, direction, event) = match log.topics.first() {
            Some(t) if *t == increase.signature() => {
                (EventKind::Increase, Direction::Add, increase)
            }
            Some(t) if *t == decrease.signature() => {
                (EventKind::Decrease, Direction::Remove, decrease)
            }
            other => return Err(DecodeError::UnknownTopic(other.copied())),
        };
        let params = parse(event, log)?;
        let liquidity = uint_param(&params, "liquidity")?.low_u128() as i128;
        Ok(Decoded {
            kind,
            direction,
            amount0: uint_param(&params, "amount0")?,
            amount1: uint_param(&params, "amount1")?,
            liquidity_delta: match direction {
                Direction::Add => liquidity,
                Direction::Remove => -liquidity,
            },
        })
    }

    fn decode_v4(&self, log: &RawLog) -> Result<Decoded, DecodeError> {
        let modify = self.abis.v4_modify()?;
        match log.topics.first() {
            Some(t) if *t == modify.signature() => {}
            other => return Err(DecodeError::UnknownTopic(other.copied())),
        }
        let params = parse(modify, log)?;
        let delta = match find_param(&params, "liquidityDelta")? {
            Token::Int(word) => int256_to_i128(*word),
            _ => return Err(DecodeError::MissingParam("liquidityDelta")),
        };
        // ModifyLiquidity carries no token amounts.
        Ok(Decoded {
            kind: EventKind::Modify,
            direction: if delta >= 0 {
                Direction::Add
            } else {
                Direction::Remove
            },
            amount0: U256::zero(),
            amount1: U256::zero(),
            liquidity_delta: delta,
        })
    }
}

fn parse(event: &Event, log: &RawLog) -> Result<Vec<ethabi::LogParam>, DecodeError> {
    let parsed = event.parse_log(AbiRawLog {
        topics: log.topics.clone(),
        data: log.data.clone(),
    })?;
    Ok(parsed.params)
}

fn find_param<'p>(
    params: &'p [ethabi::LogParam],
    name: &'static str,
) -> Result<&'p Token, DecodeError> {
    params
        .iter()
        .find(|p| p.name == name)
        .map(|p| &p.value)
        .ok_or(DecodeError::MissingParam(name))
}

fn uint_param(params: &[ethabi::LogParam], name: &'static str) -> Result<U256, DecodeError> {
    match find_param(params, name)? {
        Token::Uint(value) => Ok(*value),
        _ => Err(DecodeError::MissingParam(name)),
    }
}
