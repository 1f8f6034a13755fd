use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::payment::PaymentConfig;

/// Runtime configuration, read once from `INNKEEP_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub sweep_interval: Duration,
    pub pending_ttl: Duration,
    /// Browser origin allowed by CORS and the base of the payment redirect.
    pub frontend_url: String,
    pub payment: PaymentConfig,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{name} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unparsable numbers fall back to the
    /// default, as does a zero sweep interval or compaction threshold.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());
        let num = |name: &str, default: u64| parsed(var(name), default);
        // A zero period or threshold would stall or spin the background tasks.
        let positive = |name: &str, default: u64| match num(name, default) {
            0 => default,
            n => n,
        };

        let jwt_secret = var("INNKEEP_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("INNKEEP_JWT_SECRET"))?;
        let frontend_url = text("INNKEEP_FRONTEND_URL", "http://localhost:5173")
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bind: text("INNKEEP_BIND", "0.0.0.0"),
            port: parsed(var("INNKEEP_PORT"), 8080),
            data_dir: PathBuf::from(text("INNKEEP_DATA_DIR", "./data")),
            jwt_secret,
            metrics_port: var("INNKEEP_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: positive("INNKEEP_COMPACT_THRESHOLD", 1000),
            sweep_interval: Duration::from_secs(positive("INNKEEP_SWEEP_INTERVAL_SECS", 900)),
            pending_ttl: Duration::from_secs(num("INNKEEP_PENDING_TTL_SECS", 900)),
            frontend_url: frontend_url.clone(),
            payment: PaymentConfig {
                endpoint: text(
                    "INNKEEP_MOMO_ENDPOINT",
                    "https://test-payment.momo.vn/v2/gateway/api/create",
                ),
                partner_code: text("INNKEEP_MOMO_PARTNER_CODE", "MOMO"),
                access_key: text("INNKEEP_MOMO_ACCESS_KEY", ""),
                secret_key: text("INNKEEP_MOMO_SECRET_KEY", ""),
                ipn_url: text(
                    "INNKEEP_MOMO_IPN_URL",
                    "http://localhost:8080/api/bookings/momo-webhook",
                ),
                redirect_url: format!("{frontend_url}/profile"),
            },
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.parse().ok()).unwrap_or(default)
}
