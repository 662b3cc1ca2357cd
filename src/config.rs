//! Application configuration module
//! Handles environment variable loading, configuration validation, and
//! application settings. Built once at process start and passed into the
//! services; business logic never reads the environment directly.

use crate::payments::types::Currency;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub card: CardConfig,
    pub gateway: GatewayConfig,
    pub psp: PspConfig,
    pub policy: ProviderPolicy,
    pub rates: RateTable,
    pub downloads: DownloadConfig,
    pub mailer: MailerConfig,
    /// Shared secret for the admin manual-review endpoint.
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the storefront, used for post-payment redirects.
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64, // seconds
    pub idle_timeout: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Card processor (hosted checkout sessions + signed webhooks).
#[derive(Debug, Clone)]
pub struct CardConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Currencies the card network accepts.
    pub currencies: Vec<Currency>,
}

/// Regional gateway (redirect + verify handshake).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub merchant_id: Option<String>,
    pub base_url: String,
    /// Public base URL for the callback the gateway redirects back to.
    pub callback_base_url: String,
    /// Bypass the live gateway and synthesize deterministic authorities.
    pub mock_mode: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Secondary regional providers posting the generic signed webhook.
#[derive(Debug, Clone)]
pub struct PspConfig {
    pub webhook_secret: Option<String>,
}

/// Which providers are enabled for a checkout, by country.
#[derive(Debug, Clone)]
pub struct ProviderPolicy {
    pub gateway_countries: Vec<String>,
    pub bank_transfer_countries: Vec<String>,
}

/// Fixed exchange-rate table: gateway native minor units per one whole unit
/// of each checkout currency. Also the pivot for cross-currency coupon
/// conversion, so both paths use the same rates.
#[derive(Debug, Clone, Copy)]
pub struct RateTable {
    pub units_per_usd: i64,
    pub units_per_eur: i64,
}

impl RateTable {
    pub fn units_per(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Usd => self.units_per_usd,
            Currency::Eur => self.units_per_eur,
        }
    }

    /// Whole-unit charge amount converted to the gateway's native minor unit.
    pub fn to_native(&self, amount: i64, currency: Currency) -> i64 {
        amount.saturating_mul(self.units_per(currency))
    }

    /// Cross-currency conversion of whole-unit amounts, rounding half up.
    pub fn convert(&self, amount: i64, from: Currency, to: Currency) -> i64 {
        if from == to {
            return amount;
        }
        let scaled = amount as i128 * self.units_per(from) as i128;
        let per = self.units_per(to) as i128;
        ((scaled + per / 2) / per) as i64
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub token_ttl_days: i64,
    pub token_max_uses: i32,
    /// TTL of a signed download URL, in seconds.
    pub url_ttl_secs: u64,
    pub signing_secret: String,
    /// Base URL of the object-store edge serving the signed URLs.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Notification relay endpoint. Unset disables outbound mail entirely.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            card: CardConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            psp: PspConfig::from_env(),
            policy: ProviderPolicy::from_env(),
            rates: RateTable::from_env()?,
            downloads: DownloadConfig::from_env()?,
            mailer: MailerConfig::from_env()?,
            admin_token: env::var("ADMIN_TOKEN").ok(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.rates.validate()?;
        self.downloads.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }
        Ok(())
    }
}

fn parse_currency_list(raw: &str) -> Result<Vec<Currency>, ConfigError> {
    let mut currencies = Vec::new();
    for part in raw.split(',') {
        let value = part.trim();
        if value.is_empty() {
            continue;
        }
        currencies.push(
            Currency::from_str(value)
                .map_err(|_| ConfigError::InvalidValue(format!("currency '{}'", value)))?,
        );
    }
    Ok(currencies)
}

fn parse_country_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl CardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CardConfig {
            secret_key: env::var("CARD_SECRET_KEY").ok(),
            webhook_secret: env::var("CARD_WEBHOOK_SECRET").ok(),
            base_url: env::var("CARD_BASE_URL")
                .unwrap_or_else(|_| "https://api.cardprocessor.example".to_string()),
            timeout_secs: env::var("CARD_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_retries: env::var("CARD_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            currencies: parse_currency_list(
                &env::var("CARD_CURRENCIES").unwrap_or_else(|_| "USD,EUR".to_string()),
            )?,
        })
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(GatewayConfig {
            merchant_id: env::var("GATEWAY_MERCHANT_ID").ok(),
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://pay.gateway.example".to_string()),
            callback_base_url: env::var("GATEWAY_CALLBACK_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            mock_mode: env::var("GATEWAY_MOCK_MODE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            max_retries: env::var("GATEWAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        })
    }
}

impl PspConfig {
    pub fn from_env() -> Self {
        PspConfig {
            webhook_secret: env::var("PSP_WEBHOOK_SECRET").ok(),
        }
    }
}

impl ProviderPolicy {
    pub fn from_env() -> Self {
        ProviderPolicy {
            gateway_countries: parse_country_list(
                &env::var("GATEWAY_COUNTRIES").unwrap_or_else(|_| "TR".to_string()),
            ),
            bank_transfer_countries: parse_country_list(
                &env::var("BANK_TRANSFER_COUNTRIES").unwrap_or_else(|_| "EG".to_string()),
            ),
        }
    }
}

impl RateTable {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(RateTable {
            units_per_usd: env::var("GATEWAY_UNITS_PER_USD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50_000),
            units_per_eur: env::var("GATEWAY_UNITS_PER_EUR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(55_000),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.units_per_usd <= 0 || self.units_per_eur <= 0 {
            return Err(ConfigError::InvalidValue(
                "gateway unit rates must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl DownloadConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DownloadConfig {
            token_ttl_days: env::var("DOWNLOAD_TOKEN_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            token_max_uses: env::var("DOWNLOAD_TOKEN_MAX_USES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            url_ttl_secs: env::var("DOWNLOAD_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            signing_secret: env::var("DOWNLOAD_SIGNING_SECRET")
                .map_err(|_| ConfigError::MissingVariable("DOWNLOAD_SIGNING_SECRET".to_string()))?,
            base_url: env::var("DOWNLOAD_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000/files".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DOWNLOAD_SIGNING_SECRET cannot be empty".to_string(),
            ));
        }
        if self.token_ttl_days <= 0 || self.token_max_uses <= 0 || self.url_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "download TTLs and use caps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl MailerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(MailerConfig {
            endpoint: env::var("MAILER_ENDPOINT").ok(),
            timeout_secs: env::var("MAILER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            frontend_url: "http://localhost:3000".to_string(),
        };
        assert!(config.validate().is_ok());

        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            frontend_url: "http://localhost:3000".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rate_table_converts_to_native_units() {
        let rates = RateTable {
            units_per_usd: 50_000,
            units_per_eur: 55_000,
        };
        assert_eq!(rates.to_native(49, Currency::Usd), 2_450_000);
        assert_eq!(rates.to_native(1, Currency::Eur), 55_000);
    }

    #[test]
    fn rate_table_cross_currency_conversion_rounds() {
        let rates = RateTable {
            units_per_usd: 50_000,
            units_per_eur: 55_000,
        };
        // 11 USD = 550_000 native = 10 EUR exactly
        assert_eq!(rates.convert(11, Currency::Usd, Currency::Eur), 10);
        // 10 EUR = 550_000 native = 11 USD exactly
        assert_eq!(rates.convert(10, Currency::Eur, Currency::Usd), 11);
        // identity
        assert_eq!(rates.convert(42, Currency::Usd, Currency::Usd), 42);
        // 1 USD = 50_000 / 55_000 EUR, rounds to 1
        assert_eq!(rates.convert(1, Currency::Usd, Currency::Eur), 1);
    }

    #[test]
    fn country_list_parsing_normalizes_case() {
        let parsed = parse_country_list("tr, eg ,");
        assert_eq!(parsed, vec!["TR".to_string(), "EG".to_string()]);
    }
}
