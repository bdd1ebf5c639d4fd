use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    abi::Detokenize,
    contract::{ContractCall, ContractError, abigen},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, H256, I256, U256},
};
use tracing::{debug, info};

use super::calc::{decode_price, to_display_price};
use super::{
    DexContext, DexEntryPoint, HotPathFlagReader, ImpactFlows, ImpactQuery, ImpactRequest,
    NativeAssetView, PoolView, TokenView,
};
use crate::config::{ChainSpec, HotPathSlot};
use crate::errors::{AppError, Result};
use crate::models::{CallMode, CallOutcome, SwapCallArgs, TxOptions};

abigen!(
    CrocSwapDex,
    r"[
        function swap(address base, address quote, uint256 poolIdx, bool isBuy, bool inBaseQty, uint128 qty, uint16 tip, uint128 limitPrice, uint128 minOut, uint8 reserveFlags) payable returns (int128 baseFlow, int128 quoteFlow)
        function userCmd(uint16 callpath, bytes cmd) payable returns (bytes)
    ]",
);

abigen!(
    CrocQuery,
    r"[
        function queryPrice(address base, address quote, uint256 poolIdx) view returns (uint128)
        function queryCurveTick(address base, address quote, uint256 poolIdx) view returns (int24)
        function querySurplus(address owner, address token) view returns (uint128 surplus)
    ]",
);

abigen!(
    CrocImpact,
    r"[
        function calcImpact(address base, address quote, uint256 poolIdx, bool isBuy, bool inBaseQty, uint128 qty, uint16 poolTip, uint128 limitPrice) view returns (int128 baseFlow, int128 quoteFlow, uint128 finalPrice)
    ]",
);

fn contract_err<M: Middleware>(err: ContractError<M>) -> AppError {
    AppError::Contract(err.to_string())
}

/// Node connection, resolved once at setup into a read-only provider or a
/// signing client.
#[derive(Clone, Debug)]
pub enum Connection {
    ReadOnly(Arc<Provider<Http>>),
    Signing(Arc<SignerMiddleware<Provider<Http>, LocalWallet>>),
}

impl Connection {
    /// Connects to `rpc_url` and checks that the node serves `spec`'s chain.
    pub async fn connect(rpc_url: &str, private_key: Option<&str>, spec: &ChainSpec) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?;
        let chain_id = provider.get_chainid().await?.as_u64();
        if chain_id != spec.chain_id {
            return Err(AppError::Config(format!(
                "node serves chain {chain_id}, expected {}",
                spec.chain_id
            )));
        }
        let conn = match private_key {
            None => Connection::ReadOnly(Arc::new(provider)),
            Some(key) => {
                let wallet = key.parse::<LocalWallet>()?.with_chain_id(chain_id);
                info!(signer = ?wallet.address(), "[DEX] signing connection");
                Connection::Signing(Arc::new(SignerMiddleware::new(provider, wallet)))
            }
        };
        Ok(conn)
    }

    pub fn context(&self, spec: &ChainSpec) -> DexContext {
        match self {
            Connection::ReadOnly(provider) => build_context(provider.clone(), spec, false),
            Connection::Signing(client) => build_context(client.clone(), spec, true),
        }
    }

    /// Price view of the `base`/`quote` pool at the chain's pool index.
    pub fn pool(
        &self,
        spec: &ChainSpec,
        base: &dyn TokenView,
        quote: &dyn TokenView,
    ) -> Arc<dyn PoolView> {
        let base = (base.address(), base.decimals());
        let quote = (quote.address(), quote.decimals());
        match self {
            Connection::ReadOnly(provider) => {
                Arc::new(EthersPool::new(provider.clone(), spec, base, quote))
            }
            Connection::Signing(client) => {
                Arc::new(EthersPool::new(client.clone(), spec, base, quote))
            }
        }
    }
}

fn build_context<M: Middleware + 'static>(
    client: Arc<M>,
    spec: &ChainSpec,
    can_sign: bool,
) -> DexContext {
    let entry = |addr: Address| -> Arc<dyn DexEntryPoint> {
        Arc::new(EthersDex::new(addr, client.clone(), can_sign))
    };
    DexContext {
        dex: entry(spec.addrs.dex),
        router: spec.addrs.router.map(entry),
        router_bypass: spec.addrs.router_bypass.map(entry),
        impact: Arc::new(EthersImpact::new(spec.addrs.impact, client.clone())),
        hot_path: Arc::new(EthersHotPathReader::new(
            spec.addrs.dex,
            client.clone(),
            spec.hot_path_slot,
        )),
        native: Arc::new(EthersNativeView::new(
            spec.addrs.query,
            client.clone(),
            client.default_sender(),
        )),
        pool_index: U256::from(spec.pool_index),
        dflt_cold_swap: spec.proxy_paths.dflt_cold_swap,
    }
}

fn apply_tx<M: Middleware, D: Detokenize>(
    mut call: ContractCall<M, D>,
    tx: &TxOptions,
) -> ContractCall<M, D> {
    if let Some(value) = tx.value {
        call = call.value(value);
    }
    if let Some(gas) = tx.gas_limit {
        call = call.gas(gas);
    }
    call
}

/// Dex, router or bypass contract reached through an ethers middleware.
pub struct EthersDex<M> {
    contract: CrocSwapDex<M>,
    can_sign: bool,
}

impl<M: Middleware + 'static> EthersDex<M> {
    pub fn new(address: Address, client: Arc<M>, can_sign: bool) -> Self {
        Self {
            contract: CrocSwapDex::new(address, client),
            can_sign,
        }
    }

    fn swap_call(&self, args: &SwapCallArgs, tx: &TxOptions) -> ContractCall<M, (i128, i128)> {
        let call = self.contract.swap(
            args.base,
            args.quote,
            args.pool_idx,
            args.is_buy,
            args.in_base_qty,
            args.qty,
            args.tip,
            args.limit_price,
            args.min_out,
            args.reserve_flags,
        );
        apply_tx(call, tx)
    }

    async fn submit<D: Detokenize>(&self, call: ContractCall<M, D>) -> Result<CallOutcome> {
        if !self.can_sign {
            return Err(AppError::NoSigner);
        }
        let pending = call.send().await.map_err(contract_err)?;
        let hash = pending.tx_hash();
        info!(?hash, to = ?self.contract.address(), "[DEX] transaction submitted");
        Ok(CallOutcome::Submitted(hash))
    }
}

#[async_trait]
impl<M: Middleware + 'static> DexEntryPoint for EthersDex<M> {
    async fn swap(
        &self,
        args: &SwapCallArgs,
        tx: &TxOptions,
        mode: CallMode,
    ) -> Result<CallOutcome> {
        let call = self.swap_call(args, tx);
        match mode {
            CallMode::Submit => self.submit(call).await,
            CallMode::Simulate => {
                let (base_flow, quote_flow) = call.call().await.map_err(contract_err)?;
                Ok(CallOutcome::SwapFlows {
                    base_flow,
                    quote_flow,
                })
            }
            CallMode::EstimateGas => {
                let gas = call.estimate_gas().await.map_err(contract_err)?;
                Ok(CallOutcome::GasEstimate(gas))
            }
        }
    }

    async fn user_cmd(
        &self,
        callpath: u16,
        cmd: Bytes,
        tx: &TxOptions,
        mode: CallMode,
    ) -> Result<CallOutcome> {
        debug!(callpath, len = cmd.len(), "[DEX] userCmd");
        let call = apply_tx(self.contract.user_cmd(callpath, cmd), tx);
        match mode {
            CallMode::Submit => self.submit(call).await,
            CallMode::Simulate => {
                let output = call.call().await.map_err(contract_err)?;
                Ok(CallOutcome::CommandOutput(output))
            }
            CallMode::EstimateGas => {
                let gas = call.estimate_gas().await.map_err(contract_err)?;
                Ok(CallOutcome::GasEstimate(gas))
            }
        }
    }

    async fn unsigned_swap_tx(&self, args: &SwapCallArgs, tx: &TxOptions) -> Result<Bytes> {
        let mut call = self.swap_call(args, tx);
        if call.tx.chain_id().is_none() {
            let chain_id = self
                .contract
                .client()
                .get_chainid()
                .await
                .map_err(|e| AppError::Rpc(e.to_string()))?;
            call.tx.set_chain_id(chain_id.as_u64());
        }
        Ok(call.tx.rlp())
    }
}

pub struct EthersImpact<M> {
    contract: CrocImpact<M>,
}

impl<M: Middleware + 'static> EthersImpact<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            contract: CrocImpact::new(address, client),
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ImpactQuery for EthersImpact<M> {
    async fn calc_impact(&self, request: &ImpactRequest) -> Result<ImpactFlows> {
        let (base_flow, quote_flow, final_price) = self
            .contract
            .calc_impact(
                request.base,
                request.quote,
                request.pool_idx,
                request.is_buy,
                request.in_base_qty,
                request.qty,
                request.tip,
                request.limit_price,
            )
            .call()
            .await
            .map_err(contract_err)?;
        Ok(ImpactFlows {
            base_flow: I256::from(base_flow),
            quote_flow: I256::from(quote_flow),
            final_price: U256::from(final_price),
        })
    }
}

/// Reads the hot-path flag straight from the dex's storage.
pub struct EthersHotPathReader<M> {
    dex: Address,
    client: Arc<M>,
    slot: HotPathSlot,
}

impl<M: Middleware + 'static> EthersHotPathReader<M> {
    pub fn new(dex: Address, client: Arc<M>, slot: HotPathSlot) -> Self {
        Self { dex, client, slot }
    }
}

#[async_trait]
impl<M: Middleware + 'static> HotPathFlagReader for EthersHotPathReader<M> {
    async fn is_hot_path_open(&self) -> Result<bool> {
        let word = self
            .client
            .get_storage_at(self.dex, H256::from_low_u64_be(self.slot.slot), None)
            .await
            .map_err(|e| AppError::Rpc(e.to_string()))?;
        // packed storage fills from the low-order end of the word
        let index = 31usize
            .checked_sub(self.slot.byte_offset as usize)
            .ok_or_else(|| AppError::Config(format!("bad hot path offset {}", self.slot.byte_offset)))?;
        let open = word.as_bytes()[index] != 0;
        debug!(open, "[DEX] hot path flag");
        Ok(open)
    }
}

pub struct EthersNativeView<M> {
    query: CrocQuery<M>,
    owner: Option<Address>,
}

impl<M: Middleware + 'static> EthersNativeView<M> {
    pub fn new(query: Address, client: Arc<M>, owner: Option<Address>) -> Self {
        Self {
            query: CrocQuery::new(query, client),
            owner,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> NativeAssetView for EthersNativeView<M> {
    async fn amount_needed_beyond_surplus(&self, amount: U256) -> Result<U256> {
        // without a known owner there is no surplus to draw from
        let Some(owner) = self.owner else {
            return Ok(amount);
        };
        let surplus = self
            .query
            .query_surplus(owner, Address::zero())
            .call()
            .await
            .map_err(contract_err)?;
        Ok(amount.saturating_sub(U256::from(surplus)))
    }
}

/// Pool price view backed by the dex query contract.
pub struct EthersPool<M> {
    query: CrocQuery<M>,
    base: Address,
    quote: Address,
    pool_idx: U256,
    base_decimals: u8,
    quote_decimals: u8,
}

impl<M: Middleware + 'static> EthersPool<M> {
    pub fn new(client: Arc<M>, spec: &ChainSpec, base: (Address, u8), quote: (Address, u8)) -> Self {
        Self {
            query: CrocQuery::new(spec.addrs.query, client),
            base: base.0,
            quote: quote.0,
            pool_idx: U256::from(spec.pool_index),
            base_decimals: base.1,
            quote_decimals: quote.1,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> PoolView for EthersPool<M> {
    async fn spot_price(&self) -> Result<f64> {
        let sqrt_price = self
            .query
            .query_price(self.base, self.quote, self.pool_idx)
            .call()
            .await
            .map_err(contract_err)?;
        Ok(decode_price(U256::from(sqrt_price)))
    }

    async fn spot_tick(&self) -> Result<i32> {
        self.query
            .query_curve_tick(self.base, self.quote, self.pool_idx)
            .call()
            .await
            .map_err(contract_err)
    }

    async fn display_price(&self) -> Result<f64> {
        let spot = self.spot_price().await?;
        self.to_display_price(spot).await
    }

    async fn to_display_price(&self, spot_price: f64) -> Result<f64> {
        Ok(to_display_price(
            spot_price,
            self.base_decimals,
            self.quote_decimals,
            false,
        ))
    }
}
