use async_trait::async_trait;
use web3::transports::Http;
use web3::types::{
    Address, BlockId, BlockNumber, Bytes, CallRequest, FilterBuilder, H256, U64,
};
use web3::Web3;

use crate::fetch::FetchError;

/// Log entry as returned by the node, before any ABI decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
    pub tx_hash: Option<H256>,
}

/// `eth_getLogs` filter over one inclusive block chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub address: Address,
    /// Any of these event signatures.
    pub topic0: Vec<H256>,
    pub topic1: Option<Vec<H256>>,
    pub from_block: u64,
    pub to_block: u64,
}

/// The read-only node operations the tracker needs.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn head_block(&self) -> Result<u64, FetchError>;

    async fn logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, FetchError>;

    async fn block_timestamp(&self, block: u64) -> Result<i64, FetchError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, FetchError>;
}

/// JSON-RPC backed [`LogSource`]; one connection per chain per run.
pub struct Web3Source {
    web3: Web3<Http>,
}

impl Web3Source {
    pub fn connect(rpc_url: &str) -> Result<Self, FetchError> {
        let transport = Http::new(rpc_url)?;
        Ok(Self {
            web3: Web3::new(transport),
        })
    }
}

#[async_trait]
impl LogSource for Web3Source {
    async fn head_block(&self) -> Result<u64, FetchError> {
        Ok(self.web3.eth().block_number().await?.as_u64())
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, FetchError> {
        let filter = FilterBuilder::default()
            .address(vec![query.address])
            .topics(Some(query.topic0.clone()), query.topic1.clone(), None, None)
            .from_block(BlockNumber::Number(U64::from(query.from_block)))
            .to_block(BlockNumber::Number(U64::from(query.to_block)))
            .build();

        let logs = self.web3.eth().logs(filter).await?;
        Ok(logs
            .into_iter()
            .map(|log| RawLog {
                address: log.address,
                topics: log.topics,
                data: log.data.0,
                block_number: log.block_number.map(|n| n.as_u64()),
                tx_hash: log.transaction_hash,
            })
            .collect())
    }

    async fn block_timestamp(&self, block: u64) -> Result<i64, FetchError> {
        let block = self
            .web3
            .eth()
            .block(BlockId::Number(BlockNumber::Number(U64::from(block))))
            .await?
            .ok_or(FetchError::Missing("block"))?;
        Ok(block.timestamp.low_u64() as i64)
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, FetchError> {
        let call_req = CallRequest {
            from: None,
            to: Some(to),
            gas: None,
            gas_price: None,
            value: None,
            data: Some(Bytes(data)),
            transaction_type: None,
            access_list: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        };
        let raw_bytes = self.web3.eth().call(call_req, None).await?;
        Ok(raw_bytes.0)
    }
}
