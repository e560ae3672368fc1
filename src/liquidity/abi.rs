use ethabi::{Contract, Event, Token};
use web3::types::{Address, H256, U256};

use crate::fetch::FetchError;

const ERC20_ABI: &[u8] = include_bytes!("../abi/erc20.json");
const V2_FACTORY_ABI: &[u8] = include_bytes!("../abi/uniswap_v2_factory.json");
const V2_PAIR_ABI: &[u8] = include_bytes!("../abi/uniswap_v2_pair.json");
const V3_POSITION_MANAGER_ABI: &[u8] = include_bytes!("../abi/uniswap_v3_position_manager.json");
const V4_POOL_MANAGER_ABI: &[u8] = include_bytes!("../abi/uniswap_v4_pool_manager.json");

/// Pool key used to derive the V4 pool id for the tracked pair.
pub const V4_DEFAULT_FEE: u32 = 3000;
pub const V4_DEFAULT_TICK_SPACING: i32 = 60;

/// Parsed contract interfaces for every call and event the tracker touches.
#[derive(Debug, Clone)]
pub struct Abis {
    pub erc20: Contract,
    pub v2_factory: Contract,
    pub v2_pair: Contract,
    pub v3_position_manager: Contract,
    pub v4_pool_manager: Contract,
}

impl Abis {
    pub fn load() -> Result<Self, FetchError> {
        Ok(Self {
            erc20: Contract::load(ERC20_ABI)?,
            v2_factory: Contract::load(V2_FACTORY_ABI)?,
            v2_pair: Contract::load(V2_PAIR_ABI)?,
            v3_position_manager: Contract::load(V3_POSITION_MANAGER_ABI)?,
            v4_pool_manager: Contract::load(V4_POOL_MANAGER_ABI)?,
        })
    }

    pub fn v2_mint(&self) -> ethabi::Result<&Event> {
        self.v2_pair.event("Mint")
    }

    pub fn v2_burn(&self) -> ethabi::Result<&Event> {
        self.v2_pair.event("Burn")
    }

    pub fn v3_increase(&self) -> ethabi::Result<&Event> {
        self.v3_position_manager.event("IncreaseLiquidity")
    }

    pub fn v3_decrease(&self) -> ethabi::Result<&Event> {
        self.v3_position_manager.event("DecreaseLiquidity")
    }

    pub fn v4_modify(&self) -> ethabi::Result<&Event> {
        self.v4_pool_manager.event("ModifyLiquidity")
    }
}

/// Orders two token addresses the way the pool contracts do.
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn int_token(value: i32) -> Token {
    let magnitude = U256::from(value.unsigned_abs());
    if value < 0 {
        Token::Int((!magnitude).overflowing_add(U256::one()).0)
    } else {
        Token::Int(magnitude)
    }
}

/// keccak256(abi.encode(currency0, currency1, fee, tickSpacing, hooks)).
pub fn v4_pool_id(
    currency_a: Address,
    currency_b: Address,
    fee: u32,
    tick_spacing: i32,
    hooks: Address,
) -> H256 {
    let (currency0, currency1) = sort_tokens(currency_a, currency_b);
    let encoded = ethabi::encode(&[
        Token::Address(currency0),
        Token::Address(currency1),
        Token::Uint(U256::from(fee)),
        int_token(tick_spacing),
        Token::Address(hooks),
    ]);
    H256::from(web3::signing::keccak256(&encoded))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_embedded_abis_parse() {
        let abis = Abis::load().unwrap();
        assert!(abis.erc20.function("symbol").is_ok());
        assert!(abis.v2_factory.function("getPair").is_ok());
        assert!(abis.v3_position_manager.function("positions").is_ok());
    }

    #[test]
    fn test_event_topics_match_known_signatures() {
        let abis = Abis::load().unwrap();
        let cases = [
            (
                abis.v2_mint().unwrap().signature(),
                "4c209b5fc8ad50758f13e2e1088ba56a560dff690a1c6fef26394f4c03821c4f",
            ),
            (
                abis.v2_burn().unwrap().signature(),
                "dccd412f0b1252819cb1fd330b93224ca42612892bb3f4f789976e6d81936496",
            ),
            (
                abis.v3_increase().unwrap().signature(),
                "3067048beee31b25b2f1681f88dac838c8bba36af25bfb2b7cf7473a5847e35f",
            ),
            (
                abis.v3_decrease().unwrap().signature(),
                "26f6a048ee9138f2c0ce266f322cb99228e8d619ae2bff30c67f8dcf9d2377b4",
            ),
        ];
        for (topic, expected) in cases {
            assert_eq!(topic, H256::from_str(expected).unwrap());
        }
    }

    #[test]
    fn test_sort_tokens_is_order_independent() {
        let weth = Address::from_low_u64_be(0xff);
        let usdc = Address::from_low_u64_be(0x01);
        assert_eq!(sort_tokens(weth, usdc), (usdc, weth));
        assert_eq!(sort_tokens(usdc, weth), (usdc, weth));
    }

    #[test]
    fn test_v4_pool_id_ignores_argument_order() {
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        let hooks = Address::zero();
        assert_eq!(
            v4_pool_id(a, b, V4_DEFAULT_FEE, V4_DEFAULT_TICK_SPACING, hooks),
            v4_pool_id(b, a, V4_DEFAULT_FEE, V4_DEFAULT_TICK_SPACING, hooks)
        );
        assert_ne!(
            v4_pool_id(a, b, 500, 10, hooks),
            v4_pool_id(a, b, V4_DEFAULT_FEE, V4_DEFAULT_TICK_SPACING, hooks)
        );
    }

    #[test]
    fn test_negative_int_token_is_twos_complement() {
        assert_eq!(int_token(-1), Token::Int(U256::MAX));
        assert_eq!(int_token(60), Token::Int(U256::from(60)));
    }
}
