use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
    #[error("unknown chain {0:?}")]
    UnknownChain(String),
    #[error("CHUNK_SIZE must be greater than zero")]
    ZeroChunk,
    #[error("FORK_PORT requires CHAIN to name the forked chain")]
    ForkWithoutChain,
}

/// Static metadata for one supported chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub key: &'static str,
    pub name: &'static str,
    pub chain_id: u64,
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
    pub v2_factory: Option<&'static str>,
    pub v3_position_manager: Option<&'static str>,
    pub v4_pool_manager: Option<&'static str>,
    /// Tracked pair, usually WETH/USDC.
    pub token_a: &'static str,
    pub token_b: &'static str,
}

impl ChainConfig {
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    /// Name of the env var that overrides this chain's RPC endpoint.
    pub fn rpc_env_var(&self) -> String {
        format!("{}_RPC_URL", self.key.to_uppercase())
    }
}

const CHAINS: &[ChainConfig] = &[
    ChainConfig {
        key: "ethereum",
        name: "Ethereum",
        chain_id: 1,
        rpc_url: "https://eth.llamarpc.com",
        explorer_url: "https://etherscan.io",
        v2_factory: Some("0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"),
        v3_position_manager: Some("0xC36442b4a4522E871399CD717aBDD847Ab11FE88"),
        v4_pool_manager: Some("0x000000000004444c5dc75cB358380D2e3dE08A90"),
        token_a: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        token_b: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
    },
    ChainConfig {
        key: "arbitrum",
        name: "Arbitrum One",
        chain_id: 42161,
        rpc_url: "https://arb1.arbitrum.io/rpc",
        explorer_url: "https://arbiscan.io",
        v2_factory: Some("0xf1D7CC64Fb4452F05c498126312eBE29f30Fbcf9"),
        v3_position_manager: Some("0xC36442b4a4522E871399CD717aBDD847Ab11FE88"),
        v4_pool_manager: Some("0x360E68faCcca8cA495c1B759Fd9EEe466db9FB32"),
        token_a: "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1",
        token_b: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
    },
    ChainConfig {
        key: "optimism",
        name: "Optimism",
        chain_id: 10,
        rpc_url: "https://mainnet.optimism.io",
        explorer_url: "https://optimistic.etherscan.io",
        v2_factory: Some("0x0c3c1c532F1e39EdF36BE9Fe0bE1410313E074Bf"),
        v3_position_manager: Some("0xC36442b4a4522E871399CD717aBDD847Ab11FE88"),
        v4_pool_manager: Some("0x9a13F98Cb987694C9F086b1F5eB990EeA8264Ec3"),
        token_a: "0x4200000000000000000000000000000000000006",
        token_b: "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85",
    },
    ChainConfig {
        key: "base",
        name: "Base",
        chain_id: 8453,
        rpc_url: "https://mainnet.base.org",
        explorer_url: "https://basescan.org",
        v2_factory: Some("0x8909Dc15e40173Ff4699343b6eB8132c65e18eC6"),
        v3_position_manager: Some("0x03a520b32C04BF3bEEf7BEb72E919cf822Ed34f1"),
        v4_pool_manager: Some("0x498581fF718922c3f8e6A244956aF099B2652b2b"),
        token_a: "0x4200000000000000000000000000000000000006",
        token_b: "0x833589fCD6eDb6E08f4c7C32D4f71B54bdA02913",
    },
    ChainConfig {
        key: "polygon",
        name: "Polygon",
        chain_id: 137,
        rpc_url: "https://polygon-rpc.com",
        explorer_url: "https://polygonscan.com",
        v2_factory: Some("0x9e5A52f57b3038F1B8EeE45F28b3C1967e22799C"),
        v3_position_manager: Some("0xC36442b4a4522E871399CD717aBDD847Ab11FE88"),
        v4_pool_manager: Some("0x67366782805870060151383F4BbFF9daB53e5cD6"),
        token_a: "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619",
        token_b: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
    },
];

pub fn chain_registry() -> &'static [ChainConfig] {
    CHAINS
}

pub fn find_chain(key: &str) -> Option<&'static ChainConfig> {
    CHAINS.iter().find(|c| c.key.eq_ignore_ascii_case(key))
}

/// Everything the report binaries read from the environment, loaded once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub blocks_to_analyze: u64,
    pub chunk_size: u64,
    pub start_block: Option<u64>,
    pub chain: Option<String>,
    pub debug: bool,
    pub fork_port: Option<u16>,
    pub fork_block: Option<u64>,
    pub output_dir: PathBuf,
    pub request_delay: Duration,
    pub http_timeout: Duration,
    pub etherscan_api_key: Option<String>,
    rpc_overrides: Vec<(&'static str, String)>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            blocks_to_analyze: 1000,
            chunk_size: 10,
            start_block: None,
            chain: None,
            debug: false,
            fork_port: None,
            fork_block: None,
            output_dir: PathBuf::from("output"),
            request_delay: Duration::from_millis(300),
            http_timeout: Duration::from_secs(15),
            etherscan_api_key: None,
            rpc_overrides: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let chain = get("CHAIN").filter(|c| !c.eq_ignore_ascii_case("all"));
        if let Some(key) = &chain {
            if find_chain(key).is_none() {
                return Err(ConfigError::UnknownChain(key.clone()));
            }
        }

        let chunk_size = parse_var("CHUNK_SIZE", get("CHUNK_SIZE"))?.unwrap_or(defaults.chunk_size);
        if chunk_size == 0 {
            return Err(ConfigError::ZeroChunk);
        }

        let fork_port = parse_var("FORK_PORT", get("FORK_PORT"))?;
        if fork_port.is_some() && chain.is_none() {
            return Err(ConfigError::ForkWithoutChain);
        }

        let rpc_overrides = CHAINS
            .iter()
            .filter_map(|c| get(&c.rpc_env_var()).map(|url| (c.key, url)))
            .collect();

        Ok(Self {
            blocks_to_analyze: parse_var("BLOCKS_TO_ANALYZE", get("BLOCKS_TO_ANALYZE"))?
                .unwrap_or(defaults.blocks_to_analyze),
            chunk_size,
            start_block: parse_var("START_BLOCK", get("START_BLOCK"))?,
            chain,
            debug: get("DEBUG").map(|v| is_truthy(&v)).unwrap_or(false),
            fork_port,
            fork_block: parse_var("FORK_BLOCK", get("FORK_BLOCK"))?,
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            request_delay: parse_var("REQUEST_DELAY_MS", get("REQUEST_DELAY_MS"))?
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            http_timeout: parse_var("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            etherscan_api_key: get("ETHERSCAN_API_KEY"),
            rpc_overrides,
        })
    }

    pub fn selected_chains(&self) -> Vec<&'static ChainConfig> {
        match &self.chain {
            Some(key) => find_chain(key).into_iter().collect(),
            None => CHAINS.iter().collect(),
        }
    }

    /// Only the chain named by `CHAIN` is ever forked.
    pub fn is_forked(&self, chain: &ChainConfig) -> bool {
        self.fork_port.is_some()
            && self
                .chain
                .as_deref()
                .is_some_and(|key| key.eq_ignore_ascii_case(chain.key))
    }

    /// `FORK_BLOCK` stands in for the head of the forked chain only.
    pub fn fixed_head(&self, chain: &ChainConfig) -> Option<u64> {
        self.fork_block.filter(|_| self.is_forked(chain))
    }

    /// RPC endpoint for `chain`: a local fork, then the env override, then the registry default.
    pub fn rpc_url_for(&self, chain: &ChainConfig) -> String {
        if let Some(port) = self.fork_port.filter(|_| self.is_forked(chain)) {
            return format!("http://127.0.0.1:{port}");
        }
        self.rpc_overrides
            .iter()
            .find(|(key, _)| *key == chain.key)
            .map(|(_, url)| url.clone())
            .unwrap_or_else(|| chain.rpc_url.to_string())
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                var,
                value: v.clone(),
            })
        })
        .transpose()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = RunConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.blocks_to_analyze, 1000);
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.start_block, None);
        assert!(!config.debug);
        assert_eq!(config.selected_chains().len(), chain_registry().len());
        assert_eq!(config.output_path("a.csv"), PathBuf::from("output/a.csv"));
    }

    #[test]
    fn test_reads_window_settings() {
        let config = RunConfig::from_lookup(lookup(&[
            ("BLOCKS_TO_ANALYZE", "250"),
            ("CHUNK_SIZE", "25"),
            ("START_BLOCK", "19000000"),
            ("CHAIN", "Base"),
            ("DEBUG", "true"),
        ]))
        .unwrap();
        assert_eq!(config.blocks_to_analyze, 250);
        assert_eq!(config.chunk_size, 25);
        assert_eq!(config.start_block, Some(19_000_000));
        assert!(config.debug);
        let chains = config.selected_chains();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].chain_id, 8453);
    }

    #[rstest]
    #[case("CHUNK_SIZE", "0")]
    #[case("CHUNK_SIZE", "ten")]
    #[case("BLOCKS_TO_ANALYZE", "-5")]
    #[case("FORK_PORT", "99999")]
    #[case("CHAIN", "solana")]
    #[case("FORK_PORT", "8545")]
    fn test_rejects_bad_values(#[case] var: &str, #[case] value: &str) {
        assert!(RunConfig::from_lookup(lookup(&[(var, value)])).is_err());
    }

    #[test]
    fn test_rpc_resolution_order() {
        let config = RunConfig::from_lookup(lookup(&[("ARBITRUM_RPC_URL", "https://arb.example")]))
            .unwrap();
        let arbitrum = find_chain("arbitrum").unwrap();
        let ethereum = find_chain("ethereum").unwrap();
        assert_eq!(config.rpc_url_for(arbitrum), "https://arb.example");
        assert_eq!(config.rpc_url_for(ethereum), ethereum.rpc_url);

        let forked = RunConfig::from_lookup(lookup(&[
            ("CHAIN", "arbitrum"),
            ("FORK_PORT", "8545"),
            ("ARBITRUM_RPC_URL", "https://arb.example"),
        ]))
        .unwrap();
        assert_eq!(forked.rpc_url_for(arbitrum), "http://127.0.0.1:8545");
        assert_eq!(forked.rpc_url_for(ethereum), ethereum.rpc_url);
    }

    #[test]
    fn test_fork_block_applies_to_forked_chain_only() {
        let arbitrum = find_chain("arbitrum").unwrap();
        let base = find_chain("base").unwrap();

        let forked = RunConfig::from_lookup(lookup(&[
            ("CHAIN", "arbitrum"),
            ("FORK_PORT", "8545"),
            ("FORK_BLOCK", "200000000"),
        ]))
        .unwrap();
        assert!(forked.is_forked(arbitrum));
        assert!(!forked.is_forked(base));
        assert_eq!(forked.fixed_head(arbitrum), Some(200_000_000));
        assert_eq!(forked.fixed_head(base), None);

        let not_forking = RunConfig::from_lookup(lookup(&[("FORK_BLOCK", "200000000")])).unwrap();
        assert_eq!(not_forking.fixed_head(arbitrum), None);
        assert_eq!(not_forking.rpc_url_for(arbitrum), arbitrum.rpc_url);
    }

    #[test]
    fn test_explorer_link() {
        let base = find_chain("base").unwrap();
        assert_eq!(base.tx_url("0xabc"), "https://basescan.org/tx/0xabc");
        assert_eq!(base.rpc_env_var(), "BASE_RPC_URL");
    }
}
