use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Wallet error: {0}")]
    Wallet(#[from] ethers::signers::WalletError),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Math error: {0}")]
    Math(#[from] uniswap_v3_math::error::UniswapV3MathError),

    #[error("{0} not available on network")]
    RouterUnavailable(&'static str),

    #[error("Rebalance position not out of range: tick {tick} in [{low}, {high})")]
    NotOutOfRange { tick: i32, low: i32, high: i32 },

    #[error("Invalid tick range: low {low} must be below high {high}")]
    InvalidRange { low: i32, high: i32 },

    #[error("Unknown directive handle: {0}")]
    UnknownHandle(String),

    #[error("Too many {kind} entries to encode: {len} (max 255)")]
    ListOverflow { kind: &'static str, len: usize },

    #[error("Tick {0} does not fit in 24 bits")]
    TickOverflow(i32),

    #[error("Quantity overflow in {0}")]
    QtyOverflow(&'static str),

    #[error("Submission requires a signing connection")]
    NoSigner,

    #[error("Other: {0}")]
    Other(String),
}
