use {
    crate::{
        adapters::{cloudpayments, yookassa},
        domain::money::Currency,
    },
    std::{env, str::FromStr, time::Duration},
    thiserror::Error,
};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PROVIDER: &str = "mock";
pub const DEFAULT_MOCK_WEBHOOK_SECRET: &str = "mock-webhook-secret-key";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_NOTIFY_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_NOTIFY_MAX_ATTEMPTS: u32 = 3;
pub const PROVIDER_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub payment_provider: String,
    pub mock_webhook_secret: String,
    pub base_url: String,
    pub currency: Currency,
    pub yookassa: Option<yookassa::YooKassaConfig>,
    pub cloudpayments: Option<cloudpayments::CloudPaymentsConfig>,
    pub notify_queue_capacity: usize,
    pub notify_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: DEFAULT_PORT,
            payment_provider: DEFAULT_PROVIDER.to_string(),
            mock_webhook_secret: DEFAULT_MOCK_WEBHOOK_SECRET.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            currency: Currency::Rub,
            yookassa: None,
            cloudpayments: None,
            notify_queue_capacity: DEFAULT_NOTIFY_QUEUE_CAPACITY,
            notify_max_attempts: DEFAULT_NOTIFY_MAX_ATTEMPTS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let currency = match get("PAYMENT_CURRENCY") {
            Some(raw) => Currency::try_from(raw.as_str()).map_err(|e| ConfigError::Invalid {
                key: "PAYMENT_CURRENCY",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.currency,
        };

        let base_url = get("BASE_URL").unwrap_or(defaults.base_url);

        // A vendor is configured only when its credentials are present.
        let yookassa = match (get("YOOKASSA_SHOP_ID"), get("YOOKASSA_SECRET_KEY")) {
            (Some(shop_id), Some(secret_key)) => Some(yookassa::YooKassaConfig {
                shop_id,
                secret_key,
                api_url: get("YOOKASSA_API_URL")
                    .unwrap_or_else(|| yookassa::DEFAULT_API_URL.to_string()),
                return_url: get("YOOKASSA_RETURN_URL")
                    .unwrap_or_else(|| format!("{base_url}/checkout/success")),
                receipt_email: get("YOOKASSA_RECEIPT_EMAIL")
                    .unwrap_or_else(|| "customer@example.com".to_string()),
            }),
            _ => None,
        };

        let cloudpayments = match (get("CLOUDPAYMENTS_PUBLIC_ID"), get("CLOUDPAYMENTS_API_SECRET")) {
            (Some(public_id), Some(api_secret)) => Some(cloudpayments::CloudPaymentsConfig {
                public_id,
                api_secret,
                api_url: get("CLOUDPAYMENTS_API_URL")
                    .unwrap_or_else(|| cloudpayments::DEFAULT_API_URL.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            port: parse_or(&get, "PORT", defaults.port)?,
            payment_provider: get("PAYMENT_PROVIDER")
                .map(|p| p.trim().to_ascii_lowercase())
                .unwrap_or(defaults.payment_provider),
            mock_webhook_secret: get("MOCK_WEBHOOK_SECRET").unwrap_or(defaults.mock_webhook_secret),
            base_url,
            currency,
            yookassa,
            cloudpayments,
            notify_queue_capacity: parse_or(
                &get,
                "NOTIFY_QUEUE_CAPACITY",
                defaults.notify_queue_capacity,
            )?,
            notify_max_attempts: parse_or(&get, "NOTIFY_MAX_ATTEMPTS", defaults.notify_max_attempts)?,
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
