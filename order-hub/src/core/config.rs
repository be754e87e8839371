use crate::listeners::ReconnectPolicy;
use crate::utils::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Hub configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | Directory for `orders.redb`, `cart.redb` and `logs/` |
/// | LOG_LEVEL | info | tracing filter |
/// | ORDER_TTL_SECS | 300 | Pending order TTL |
/// | DELIVERY_FEE | 150 | Default delivery fee |
/// | FEED_CAPACITY | 4096 | Change-feed channel capacity |
/// | FEED_RECONNECT_BASE_MS | 500 | First resubscribe delay |
/// | FEED_RECONNECT_MAX_MS | 10000 | Resubscribe delay cap |
/// | WRITE_MAX_RETRIES | 3 | Store write retries |
/// | WRITE_RETRY_BASE_MS | 200 | First write retry delay |
/// | EXPIRY_SWEEP_SECS | 30 | Expiry sweep period |
///
/// ```ignore
/// WORK_DIR=/tmp/souk ORDER_TTL_SECS=60 cargo run
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub work_dir: String,
    pub log_level: String,
    pub order_ttl_secs: u64,
    pub delivery_fee: f64,
    pub feed_capacity: usize,
    pub feed_reconnect_base_ms: u64,
    pub feed_reconnect_max_ms: u64,
    pub write_max_retries: u32,
    pub write_retry_base_ms: u64,
    pub expiry_sweep_secs: u64,
}

/// Parse an env var, falling back on absence or parse failure
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable config value");
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Unset or unparsable variables use the defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or(d.work_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(d.log_level),
            order_ttl_secs: env_or("ORDER_TTL_SECS", d.order_ttl_secs),
            delivery_fee: env_or("DELIVERY_FEE", d.delivery_fee),
            feed_capacity: env_or("FEED_CAPACITY", d.feed_capacity),
            feed_reconnect_base_ms: env_or("FEED_RECONNECT_BASE_MS", d.feed_reconnect_base_ms),
            feed_reconnect_max_ms: env_or("FEED_RECONNECT_MAX_MS", d.feed_reconnect_max_ms),
            write_max_retries: env_or("WRITE_MAX_RETRIES", d.write_max_retries),
            write_retry_base_ms: env_or("WRITE_RETRY_BASE_MS", d.write_retry_base_ms),
            expiry_sweep_secs: env_or("EXPIRY_SWEEP_SECS", d.expiry_sweep_secs),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<String>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_delivery_fee(mut self, fee: f64) -> Self {
        self.delivery_fee = fee;
        self
    }

    pub fn with_reconnect(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.feed_reconnect_base_ms = base_ms;
        self.feed_reconnect_max_ms = max_ms;
        self
    }

    pub fn with_write_retry(mut self, max_retries: u32, base_ms: u64) -> Self {
        self.write_max_retries = max_retries;
        self.write_retry_base_ms = base_ms;
        self
    }

    pub fn with_expiry_sweep(mut self, interval: Duration) -> Self {
        self.expiry_sweep_secs = interval.as_secs().max(1);
        self
    }

    pub fn orders_db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn cart_db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("cart.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn order_ttl(&self) -> Duration {
        Duration::from_secs(self.order_ttl_secs)
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_secs.max(1))
    }

    pub fn write_retry(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.write_retry_base_ms);
        RetryPolicy::new(
            self.write_max_retries,
            base,
            base.saturating_mul(1 << self.write_max_retries.min(8)),
        )
    }

    pub fn reconnect(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.feed_reconnect_base_ms),
            Duration::from_millis(self.feed_reconnect_max_ms.max(self.feed_reconnect_base_ms)),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "./data".into(),
            log_level: "info".into(),
            order_ttl_secs: 300,
            delivery_fee: 150.0,
            feed_capacity: 4096,
            feed_reconnect_base_ms: 500,
            feed_reconnect_max_ms: 10_000,
            write_max_retries: 3,
            write_retry_base_ms: 200,
            expiry_sweep_secs: 30,
        }
    }
}
