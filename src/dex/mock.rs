//! In-memory collaborators for planner tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Bytes, H256, I256, U256};

use super::{
    DexContext, DexEntryPoint, HotPathFlagReader, ImpactFlows, ImpactQuery, ImpactRequest,
    NativeAssetView, PoolView,
};
use crate::errors::Result;
use crate::models::{CallMode, CallOutcome, SwapCallArgs, TxOptions};

pub const GAS_ESTIMATE: u64 = 120_000;

pub struct MockPool {
    pub spot_price: f64,
    pub spot_tick: i32,
    /// Multiplier applied by `to_display_price`.
    pub display_scale: f64,
}

#[async_trait]
impl PoolView for MockPool {
    async fn spot_price(&self) -> Result<f64> {
        Ok(self.spot_price)
    }

    async fn spot_tick(&self) -> Result<i32> {
        Ok(self.spot_tick)
    }

    async fn display_price(&self) -> Result<f64> {
        self.to_display_price(self.spot_price).await
    }

    async fn to_display_price(&self, spot_price: f64) -> Result<f64> {
        Ok(spot_price * self.display_scale)
    }
}

/// Returns fixed flows and records every request.
pub struct MockImpact {
    pub flows: ImpactFlows,
    pub requests: Mutex<Vec<ImpactRequest>>,
}

impl MockImpact {
    pub fn new(base_flow: i128, quote_flow: i128, final_price: U256) -> Self {
        Self {
            flows: ImpactFlows {
                base_flow: I256::from(base_flow),
                quote_flow: I256::from(quote_flow),
                final_price,
            },
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImpactQuery for MockImpact {
    async fn calc_impact(&self, request: &ImpactRequest) -> Result<ImpactFlows> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.flows.clone())
    }
}

/// Hot-path flag that can be flipped between calls; counts every read.
pub struct MockHotPath {
    open: AtomicBool,
    reads: AtomicUsize,
}

impl MockHotPath {
    pub fn new(open: bool) -> Self {
        Self {
            open: AtomicBool::new(open),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HotPathFlagReader for MockHotPath {
    async fn is_hot_path_open(&self) -> Result<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.open.load(Ordering::SeqCst))
    }
}

pub struct MockNative {
    pub surplus: U256,
}

#[async_trait]
impl NativeAssetView for MockNative {
    async fn amount_needed_beyond_surplus(&self, amount: U256) -> Result<U256> {
        Ok(amount.saturating_sub(self.surplus))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Swap {
        args: SwapCallArgs,
        tx: TxOptions,
        mode: CallMode,
    },
    UserCmd {
        callpath: u16,
        cmd: Bytes,
        tx: TxOptions,
        mode: CallMode,
    },
}

impl RecordedCall {
    pub fn mode(&self) -> CallMode {
        match self {
            RecordedCall::Swap { mode, .. } | RecordedCall::UserCmd { mode, .. } => *mode,
        }
    }

    pub fn tx(&self) -> &TxOptions {
        match self {
            RecordedCall::Swap { tx, .. } | RecordedCall::UserCmd { tx, .. } => tx,
        }
    }
}

/// Entry point that records calls and answers with canned outcomes.
#[derive(Default)]
pub struct RecordingDex {
    pub calls: Mutex<Vec<RecordedCall>>,
    /// Requests for unsigned swap transactions, kept apart from dispatched calls.
    pub unsigned: Mutex<Vec<(SwapCallArgs, TxOptions)>>,
}

impl RecordingDex {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn unsigned(&self) -> Vec<(SwapCallArgs, TxOptions)> {
        self.unsigned.lock().unwrap().clone()
    }

    fn outcome(mode: CallMode, simulated: CallOutcome) -> CallOutcome {
        match mode {
            CallMode::Submit => CallOutcome::Submitted(H256::repeat_byte(0x42)),
            CallMode::Simulate => simulated,
            CallMode::EstimateGas => CallOutcome::GasEstimate(U256::from(GAS_ESTIMATE)),
        }
    }
}

#[async_trait]
impl DexEntryPoint for RecordingDex {
    async fn swap(
        &self,
        args: &SwapCallArgs,
        tx: &TxOptions,
        mode: CallMode,
    ) -> Result<CallOutcome> {
        self.calls.lock().unwrap().push(RecordedCall::Swap {
            args: args.clone(),
            tx: tx.clone(),
            mode,
        });
        Ok(Self::outcome(
            mode,
            CallOutcome::SwapFlows {
                base_flow: 1,
                quote_flow: -1,
            },
        ))
    }

    async fn user_cmd(
        &self,
        callpath: u16,
        cmd: Bytes,
        tx: &TxOptions,
        mode: CallMode,
    ) -> Result<CallOutcome> {
        self.calls.lock().unwrap().push(RecordedCall::UserCmd {
            callpath,
            cmd,
            tx: tx.clone(),
            mode,
        });
        Ok(Self::outcome(mode, CallOutcome::CommandOutput(Bytes::new())))
    }

    /// Stands in for the RLP payload with the ABI-encoded arguments.
    async fn unsigned_swap_tx(&self, args: &SwapCallArgs, tx: &TxOptions) -> Result<Bytes> {
        self.unsigned
            .lock()
            .unwrap()
            .push((args.clone(), tx.clone()));
        Ok(args.abi_encode())
    }
}

/// Context wired to the given recorders; router targets are optional.
pub struct MockSetup {
    pub dex: Arc<RecordingDex>,
    pub router: Option<Arc<RecordingDex>>,
    pub router_bypass: Option<Arc<RecordingDex>>,
    pub impact: Arc<MockImpact>,
    pub hot_path: Arc<MockHotPath>,
    pub native_surplus: U256,
    pub dflt_cold_swap: bool,
}

impl MockSetup {
    pub fn new(impact: MockImpact) -> Self {
        Self {
            dex: Arc::new(RecordingDex::default()),
            router: None,
            router_bypass: None,
            impact: Arc::new(impact),
            hot_path: Arc::new(MockHotPath::new(true)),
            native_surplus: U256::zero(),
            dflt_cold_swap: false,
        }
    }

    pub fn context(&self) -> DexContext {
        DexContext {
            dex: self.dex.clone(),
            router: self
                .router
                .clone()
                .map(|r| r as Arc<dyn DexEntryPoint>),
            router_bypass: self
                .router_bypass
                .clone()
                .map(|r| r as Arc<dyn DexEntryPoint>),
            impact: self.impact.clone(),
            hot_path: self.hot_path.clone(),
            native: Arc::new(MockNative {
                surplus: self.native_surplus,
            }),
            pool_index: U256::from(420),
            dflt_cold_swap: self.dflt_cold_swap,
        }
    }
}
