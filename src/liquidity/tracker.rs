use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use ethabi::Token;
use web3::types::{Address, H256, U256};

use crate::config::ChainConfig;
use crate::fetch::FetchError;
use crate::liquidity::abi::{
    sort_tokens, v4_pool_id, Abis, V4_DEFAULT_FEE, V4_DEFAULT_TICK_SPACING,
};
use crate::liquidity::blocks::BlockWindow;
use crate::liquidity::decoder::{EventDecoder, PairMeta, TokenMeta};
use crate::liquidity::source::{LogQuery, LogSource, RawLog};
use crate::types::{LiquidityEvent, ProtocolVersion};
use crate::utils::MAX_TOKEN_DECIMALS;

/// Scans one chain's liquidity events, chunk by chunk, over a block window.
pub struct ChainTracker<'a> {
    chain: &'a ChainConfig,
    source: &'a dyn LogSource,
    abis: &'a Abis,
    chunk_size: u64,
    delay: Duration,
}

impl<'a> ChainTracker<'a> {
    pub fn new(
        chain: &'a ChainConfig,
        source: &'a dyn LogSource,
        abis: &'a Abis,
        chunk_size: u64,
        delay: Duration,
    ) -> Self {
        Self {
            chain,
            source,
            abis,
            chunk_size,
            delay,
        }
    }

    /// All tracked events of the chain's configured pair. Never fails: missing
    /// configuration and RPC errors degrade to fewer (or no) events.
    pub async fn track(&self, window: BlockWindow) -> Vec<LiquidityEvent> {
        let pair = match self.resolve_pair().await {
            Some(pair) => pair,
            None => return Vec::new(),
        };
        log::info!(
            "[ChainTracker::track] {} {}/{} blocks {}..={} ({} blocks)",
            self.chain.name,
            pair.token0.symbol,
            pair.token1.symbol,
            window.start,
            window.end,
            window.block_count()
        );

        let mut events = Vec::new();
        for version in ProtocolVersion::ALL {
            let found = self.track_version(version, &pair, window).await;
            log::info!(
                "[ChainTracker::track] {} {}: {} events",
                self.chain.name,
                version,
                found.len()
            );
            events.extend(found);
        }
        self.attach_timestamps(&mut events).await;
        events
    }

    pub async fn track_version(
        &self,
        version: ProtocolVersion,
        pair: &PairMeta,
        window: BlockWindow,
    ) -> Vec<LiquidityEvent> {
        let result = match version {
            ProtocolVersion::V2 => self.track_v2(pair, window).await,
            ProtocolVersion::V3 => self.track_v3(pair, window).await,
            ProtocolVersion::V4 => self.track_v4(pair, window).await,
        };
        match result {
            Ok(events) => events,
            Err(e) => {
                log::warn!(
                    "⚠️ [ChainTracker::track_version] {} {version}: {e}",
                    self.chain.name
                );
                Vec::new()
            }
        }
    }

    async fn track_v2(
        &self,
        pair: &PairMeta,
        window: BlockWindow,
    ) -> Result<Vec<LiquidityEvent>, FetchError> {
        let Some(factory) = self.contract_address(self.chain.v2_factory, "v2 factory") else {
            return Ok(Vec::new());
        };
        let function = self.abis.v2_factory.function("getPair")?;
        let data = function.encode_input(&[
            Token::Address(pair.token0.address),
            Token::Address(pair.token1.address),
        ])?;
        let output = function.decode_output(&self.source.call(factory, data).await?)?;
        let pool = match output.first() {
            Some(Token::Address(a)) if !a.is_zero() => *a,
            _ => {
                log::info!("[ChainTracker::track_v2] {} has no v2 pair", self.chain.name);
                return Ok(Vec::new());
            }
        };

        let topics = vec![self.abis.v2_mint()?.signature(), self.abis.v2_burn()?.signature()];
        let logs = self.fetch_logs(pool, topics, None, window).await;
        Ok(self.decode_all(ProtocolVersion::V2, pair, &logs))
    }

    async fn track_v3(
        &self,
        pair: &PairMeta,
        window: BlockWindow,
    ) -> Result<Vec<LiquidityEvent>, FetchError> {
        let Some(manager) =
            self.contract_address(self.chain.v3_position_manager, "v3 position manager")
        else {
            return Ok(Vec::new());
        };
        let topics = vec![
            self.abis.v3_increase()?.signature(),
            self.abis.v3_decrease()?.signature(),
        ];
        let logs = self.fetch_logs(manager, topics, None, window).await;

        // The position manager serves every pool; keep positions of the tracked pair.
        let mut owned_by_pair: HashMap<U256, bool> = HashMap::new();
        let mut kept = Vec::with_capacity(logs.len());
        for log in logs {
            let token_id = match EventDecoder::v3_token_id(&log) {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("⚠️ [ChainTracker::track_v3] skipping log: {e}");
                    continue;
                }
            };
            let matches = match owned_by_pair.get(&token_id) {
                Some(m) => *m,
                None => {
                    let m = self.position_matches(manager, token_id, pair).await;
                    owned_by_pair.insert(token_id, m);
                    m
                }
            };
            if matches {
                kept.push(log);
            }
        }
        Ok(self.decode_all(ProtocolVersion::V3, pair, &kept))
    }

    async fn track_v4(
        &self,
        pair: &PairMeta,
        window: BlockWindow,
    ) -> Result<Vec<LiquidityEvent>, FetchError> {
        let Some(manager) = self.contract_address(self.chain.v4_pool_manager, "v4 pool manager")
        else {
            return Ok(Vec::new());
        };
        let topics = vec![self.abis.v4_modify()?.signature()];
        let logs = self.fetch_logs(manager, topics, Some(v4_pool_ids(pair)), window).await;
        Ok(self.decode_all(ProtocolVersion::V4, pair, &logs))
    }

    /// Chunked `eth_getLogs`. A failed chunk is logged and skipped.
    pub async fn fetch_logs(
        &self,
        address: Address,
        topic0: Vec<H256>,
        topic1: Option<Vec<H256>>,
        window: BlockWindow,
    ) -> Vec<RawLog> {
        let mut logs = Vec::new();
        let mut first = true;
        for (from_block, to_block) in window.chunks(self.chunk_size) {
            if !first {
                tokio::time::sleep(self.delay).await;
            }
            first = false;

            let query = LogQuery {
                address,
                topic0: topic0.clone(),
                topic1: topic1.clone(),
                from_block,
                to_block,
            };
            match self.source.logs(&query).await {
                Ok(chunk) => {
                    if !chunk.is_empty() {
                        log::debug!(
                            "[ChainTracker::fetch_logs] {} {from_block}..={to_block}: {} logs",
                            self.chain.name,
                            chunk.len()
                        );
                    }
                    logs.extend(chunk);
                }
                Err(e) => {
                    log::warn!(
                        "⚠️ [ChainTracker::fetch_logs] {} {from_block}..={to_block} failed: {e}",
                        self.chain.name
                    );
                }
            }
        }
        logs
    }

    pub async fn resolve_pair(&self) -> Option<PairMeta> {
        let token_a = self.contract_address(Some(self.chain.token_a), "token a")?;
        let token_b = self.contract_address(Some(self.chain.token_b), "token b")?;
        let (token0, token1) = sort_tokens(token_a, token_b);
        let meta0 = self.token_meta(token0).await;
        let meta1 = self.token_meta(token1).await;
        Some(PairMeta::new(meta0, meta1))
    }

    /// `symbol()` and `decimals()` of an ERC-20, or placeholders when the calls fail.
    pub async fn token_meta(&self, token: Address) -> TokenMeta {
        match self.query_token_meta(token).await {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("⚠️ [ChainTracker::token_meta] {token:?}: {e}");
                TokenMeta::unknown(token)
            }
        }
    }

    async fn query_token_meta(&self, token: Address) -> Result<TokenMeta, FetchError> {
        let symbol_fn = self.abis.erc20.function("symbol")?;
        let decimals_fn = self.abis.erc20.function("decimals")?;

        let raw = self.source.call(token, symbol_fn.encode_input(&[])?).await?;
        let symbol = match symbol_fn.decode_output(&raw)?.into_iter().next() {
            Some(Token::String(s)) => s,
            _ => return Err(FetchError::Missing("symbol")),
        };

        let raw = self.source.call(token, decimals_fn.encode_input(&[])?).await?;
        let decimals = match decimals_fn.decode_output(&raw)?.into_iter().next() {
            Some(Token::Uint(d)) if d <= U256::from(MAX_TOKEN_DECIMALS) => d.low_u32() as u8,
            Some(Token::Uint(d)) => {
                return Err(FetchError::Decode(format!("implausible decimals {d}")));
            }
            _ => return Err(FetchError::Missing("decimals")),
        };

        Ok(TokenMeta {
            address: token,
            symbol,
            decimals,
        })
    }

    async fn position_matches(&self, manager: Address, token_id: U256, pair: &PairMeta) -> bool {
        match self.query_position_tokens(manager, token_id).await {
            Ok((token0, token1)) => pair.matches(token0, token1),
            Err(e) => {
                log::warn!("⚠️ [ChainTracker::position_matches] position {token_id}: {e}");
                false
            }
        }
    }

    async fn query_position_tokens(
        &self,
        manager: Address,
        token_id: U256,
    ) -> Result<(Address, Address), FetchError> {
        let function = self.abis.v3_position_manager.function("positions")?;
        let data = function.encode_input(&[Token::Uint(token_id)])?;
        let tokens = function.decode_output(&self.source.call(manager, data).await?)?;
        match (tokens.get(2), tokens.get(3)) {
            (Some(Token::Address(t0)), Some(Token::Address(t1))) => Ok((*t0, *t1)),
            _ => Err(FetchError::Missing("position tokens")),
        }
    }

    fn decode_all(
        &self,
        version: ProtocolVersion,
        pair: &PairMeta,
        logs: &[RawLog],
    ) -> Vec<LiquidityEvent> {
        let decoder = EventDecoder::new(self.abis, self.chain.key, pair);
        logs.iter()
            .filter_map(|log| match decoder.decode(version, log) {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!(
                        "⚠️ [ChainTracker::decode_all] {} {version}: skipping log: {e}",
                        self.chain.name
                    );
                    None
                }
            })
            .collect()
    }

    async fn attach_timestamps(&self, events: &mut [LiquidityEvent]) {
        let mut timestamps: HashMap<u64, i64> = HashMap::new();
        for event in events.iter_mut() {
            if let Some(ts) = timestamps.get(&event.block_number) {
                event.timestamp = *ts;
                continue;
            }
            let ts = match self.source.block_timestamp(event.block_number).await {
                Ok(ts) => ts,
                Err(e) => {
                    log::warn!(
                        "⚠️ [ChainTracker::attach_timestamps] block {}: {e}",
                        event.block_number
                    );
                    0
                }
            };
            timestamps.insert(event.block_number, ts);
            event.timestamp = ts;
        }
    }

    fn contract_address(&self, configured: Option<&str>, what: &str) -> Option<Address> {
        let Some(raw) = configured else {
            log::info!(
                "[ChainTracker] {} has no {what} configured, skipping",
                self.chain.name
            );
            return None;
        };
        match Address::from_str(raw.trim_start_matches("0x")) {
            Ok(address) => Some(address),
            Err(e) => {
                log::warn!("⚠️ [ChainTracker] {} invalid {what} {raw}: {e}", self.chain.name);
                None
            }
        }
    }
}

/// V4 pool ids of the tracked pair. A WETH pair also matches the native-ETH pool,
/// where currency0 is the zero address.
pub fn v4_pool_ids(pair: &PairMeta) -> Vec<H256> {
    let id = |a: Address, b: Address| {
        v4_pool_id(a, b, V4_DEFAULT_FEE, V4_DEFAULT_TICK_SPACING, Address::zero())
    };
    let (token0, token1) = (&pair.token0, &pair.token1);
    let mut ids = vec![id(token0.address, token1.address)];
    if token0.symbol.eq_ignore_ascii_case("WETH") {
        ids.push(id(Address::zero(), token1.address));
    } else if token1.symbol.eq_ignore_ascii_case("WETH") {
        ids.push(id(Address::zero(), token0.address));
    }
    ids
}
