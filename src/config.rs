//! Configuration loader, chain deployment specs and planner options.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

/// Default swap slippage tolerance (1%).
pub const DFLT_SWAP_SLIPPAGE: f64 = 0.01;
/// Default rebalance slippage tolerance (2%).
pub const DFLT_REBAL_SLIPPAGE: f64 = 0.02;
/// Pool type index used when none is configured.
pub const DFLT_POOL_INDEX: u64 = 420;

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// RPC endpoint for the Ethereum-compatible node.
    pub rpc_url: String,
    /// Hex private key; without one the connection is read-only.
    pub private_key: Option<String>,
    pub chain: ChainSpec,
    pub slippage: f64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// The chain deployment comes either from a `CROC_CHAIN_SPEC` JSON document
    /// or from the individual `CHAIN_ID` / `CROC_*` variables.
    pub fn load() -> Result<Self> {
        let rpc_url = std::env::var("RPC_URL")?;
        let private_key = std::env::var("PRIVATE_KEY").ok().filter(|k| !k.is_empty());
        let chain = match std::env::var("CROC_CHAIN_SPEC") {
            Ok(json) => ChainSpec::from_json(&json)?,
            Err(_) => ChainSpec::from_env()?,
        };
        let slippage = match std::env::var("SLIPPAGE") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("SLIPPAGE: {e}")))?,
            Err(_) => DFLT_SWAP_SLIPPAGE,
        };
        Ok(Self {
            rpc_url,
            private_key,
            chain,
            slippage,
        })
    }
}

/// Contract addresses of one dex deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainAddrs {
    pub dex: Address,
    pub query: Address,
    pub impact: Address,
    #[serde(default)]
    pub router: Option<Address>,
    #[serde(default)]
    pub router_bypass: Option<Address>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyPaths {
    /// Send swaps through the command proxy instead of the hot path.
    #[serde(default)]
    pub dflt_cold_swap: bool,
}

/// Storage location of the dex's hot-path-open flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotPathSlot {
    pub slot: u64,
    /// Byte offset from the low-order end of the storage word.
    pub byte_offset: u8,
}

impl Default for HotPathSlot {
    fn default() -> Self {
        Self {
            slot: 0,
            byte_offset: 22,
        }
    }
}

/// Dex deployment on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSpec {
    pub chain_id: u64,
    pub addrs: ChainAddrs,
    #[serde(default = "default_pool_index")]
    pub pool_index: u64,
    #[serde(default)]
    pub proxy_paths: ProxyPaths,
    #[serde(default)]
    pub hot_path_slot: HotPathSlot,
}

fn default_pool_index() -> u64 {
    DFLT_POOL_INDEX
}

impl ChainSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: ChainSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_env() -> Result<Self> {
        let chain_id = env_parse("CHAIN_ID")?;
        let pool_index = match std::env::var("POOL_INDEX") {
            Ok(_) => env_parse("POOL_INDEX")?,
            Err(_) => DFLT_POOL_INDEX,
        };
        let spec = ChainSpec {
            chain_id,
            addrs: ChainAddrs {
                dex: env_address("CROC_DEX")?,
                query: env_address("CROC_QUERY")?,
                impact: env_address("CROC_IMPACT")?,
                router: env_opt_address("CROC_ROUTER")?,
                router_bypass: env_opt_address("CROC_ROUTER_BYPASS")?,
            },
            pool_index,
            proxy_paths: ProxyPaths {
                dflt_cold_swap: std::env::var("DFLT_COLD_SWAP").is_ok_and(|v| v == "1" || v == "true"),
            },
            hot_path_slot: HotPathSlot::default(),
        };
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        if self.hot_path_slot.byte_offset > 31 {
            return Err(AppError::Config(format!(
                "hot path byte offset {} outside storage word",
                self.hot_path_slot.byte_offset
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    std::env::var(name)?
        .parse()
        .map_err(|e| AppError::Config(format!("{name}: {e}")))
}

fn env_address(name: &str) -> Result<Address> {
    env_parse(name)
}

fn env_opt_address(name: &str) -> Result<Option<Address>> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => Ok(Some(
            raw.parse()
                .map_err(|e| AppError::Config(format!("{name}: {e}")))?,
        )),
        _ => Ok(None),
    }
}

/// Options fixed when a swap plan is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapPlanOpts {
    pub slippage: f64,
}

impl Default for SwapPlanOpts {
    fn default() -> Self {
        Self {
            slippage: DFLT_SWAP_SLIPPAGE,
        }
    }
}

/// Which side(s) of a swap settle against dex surplus collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOpts {
    /// Applies to both sides.
    Uniform(bool),
    Split {
        buy_dex_surplus: bool,
        sell_dex_surplus: bool,
    },
}

impl Default for SettlementOpts {
    fn default() -> Self {
        SettlementOpts::Uniform(false)
    }
}

/// Per-call options for executing a swap plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapExecOpts {
    pub settlement: SettlementOpts,
    /// Gas estimate to use instead of querying the node.
    pub gas_est: Option<U256>,
}

/// Which entry point a swap plan dispatches through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathMode {
    /// Hot path when open, command proxy otherwise.
    #[default]
    Auto,
    Router,
    Bypass,
    Proxy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebalanceOpts {
    pub slippage: f64,
}

impl Default for RebalanceOpts {
    fn default() -> Self {
        Self {
            slippage: DFLT_REBAL_SLIPPAGE,
        }
    }
}
