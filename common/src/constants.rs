//! Engine-wide default constants

/// Maximum retained order-book depth per side
pub const MAX_ORDER_BOOK_DEPTH: usize = 50;

/// Default capacity of the normalized-update channel
pub const MARKET_DATA_BUFFER_SIZE: usize = 10_000;

/// Detection loop period in milliseconds
pub const DETECTION_PERIOD_MS: u64 = 100;

/// Default opportunity time-to-live in milliseconds
pub const OPPORTUNITY_TTL_MS: u64 = 500;

/// TTL override for funding opportunities (one 8h funding period)
pub const FUNDING_TTL_MS: u64 = 8 * 60 * 60 * 1_000;

/// Detector-level minimum profit threshold in basis points (0.1%)
pub const MIN_PROFIT_THRESHOLD_BPS: f64 = 10.0;

/// Maximum per-opportunity capital in USD
pub const MAX_POSITION_SIZE_USD: f64 = 100_000.0;

/// Maximum total portfolio exposure in USD
pub const MAX_PORTFOLIO_EXPOSURE: f64 = 1_000_000.0;

/// Expected execution slippage in basis points
pub const EXECUTION_SLIPPAGE_BPS: f64 = 5.0;

/// Maker fee in basis points
pub const MAKER_FEE_BPS: f64 = 2.0;

/// Taker fee in basis points
pub const TAKER_FEE_BPS: f64 = 4.0;

/// Fee buffer subtracted from synthetic-arb expected profit, in basis points
pub const SYNTHETIC_FEE_BUFFER_BPS: f64 = 10.0;

/// Maximum tolerated funding-rate exposure per opportunity
pub const MAX_FUNDING_RATE_EXPOSURE: f64 = 0.01;

/// Minimum acceptable liquidity score
pub const MIN_LIQUIDITY_SCORE: f64 = 0.7;

/// Default per-symbol position limit when none is configured
pub const DEFAULT_POSITION_LIMIT: f64 = 50_000.0;

/// VaR confidence level
pub const VAR_CONFIDENCE_LEVEL: f64 = 0.95;

/// Samples retained in the VaR return window
pub const VAR_LOOKBACK: usize = 30;

/// Samples retained in the realized-PnL history
pub const PNL_HISTORY_CAP: usize = 1_000;

/// Annualized risk-free rate used by the pricers
pub const RISK_FREE_RATE: f64 = 0.05;

/// Funding periods per day (8h cadence)
pub const FUNDING_PERIODS_PER_DAY: f64 = 3.0;

/// Days per year for funding annualization
pub const ANNUALIZATION_DAYS: f64 = 365.0;

/// Days per year for expiry math
pub const YEAR_DAYS: f64 = 365.25;

/// Metrics sampler period in milliseconds
pub const METRICS_UPDATE_INTERVAL_MS: u64 = 1_000;

/// Latency tracker ring capacity
pub const LATENCY_SAMPLE_SIZE: usize = 1_000;

/// Bounded reconnect attempts per adapter
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Delay between reconnect attempts in milliseconds
pub const RECONNECT_DELAY_MS: u64 = 5_000;

/// Heartbeat interval in milliseconds; silence for twice this forces reconnect
pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Comparison tolerance for price arithmetic
pub const EPSILON: f64 = 1e-9;
