use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Secret used when no JWT_SECRET is provided outside production
const DEV_JWT_SECRET: &str = "marathon-bet-dev-secret";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// External race service configuration
#[derive(Debug, Clone)]
pub struct RaceApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Session token configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt_secret: String,
    pub ttl_days: i64,
    /// Whether cookies must be marked `Secure` / `SameSite=None`
    pub secure_cookies: bool,
}

/// Wagering policy knobs
#[derive(Debug, Clone)]
pub struct WagerConfig {
    pub starting_balance: Decimal,
    pub min_lead_days: i64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub race_api: RaceApiConfig,
    pub session: SessionConfig,
    pub wager: WagerConfig,
    pub log_level: String,
    pub http_port: u16,
    pub ws_port: Option<u16>,
    pub environment: String,
}

/// Read an optional variable: unset is `None`, set but unparseable is an error
fn parse_env<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, env::var(key).ok())
}

fn parse_value<T>(key: &str, raw: Option<String>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {}: {:?} ({})", key, raw, e)),
    }
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = parse_env::<u32>("DATABASE_MAX_CONNECTIONS")?.unwrap_or(10);
        let acquire_timeout_secs = parse_env::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS")?.unwrap_or(30);
        let idle_timeout_secs = parse_env::<u64>("DATABASE_IDLE_TIMEOUT_SECS")?.unwrap_or(600); // 10 minutes
        let max_lifetime_secs = parse_env::<u64>("DATABASE_MAX_LIFETIME_SECS")?.unwrap_or(1800); // 30 minutes
        let test_before_acquire = parse_env::<bool>("DATABASE_TEST_BEFORE_ACQUIRE")?.unwrap_or(true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/marathon_bet".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl RaceApiConfig {
    pub fn from_env() -> Result<Self, String> {
        let base_url = env::var("API_PUBLIC_URI")
            .map_err(|_| "API_PUBLIC_URI environment variable is required")?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err("API_PUBLIC_URI must not be empty".to_string());
        }

        let timeout_secs = parse_env::<u64>("RACE_API_TIMEOUT_SECS")?.unwrap_or(5);
        if timeout_secs == 0 {
            return Err("RACE_API_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            base_url,
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RaceApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            timeout_secs: 5,
        }
    }
}

impl SessionConfig {
    fn from_env(production: bool) -> Result<Self, String> {
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if production => {
                return Err("JWT_SECRET is required in production".to_string());
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let ttl_days = parse_env::<i64>("SESSION_TTL_DAYS")?.unwrap_or(7);
        if ttl_days <= 0 {
            return Err("SESSION_TTL_DAYS must be greater than 0".to_string());
        }

        Ok(Self {
            jwt_secret,
            ttl_days,
            secure_cookies: production,
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            ttl_days: 7,
            secure_cookies: false,
        }
    }
}

impl WagerConfig {
    fn from_env() -> Result<Self, String> {
        let starting_balance = parse_env::<Decimal>("STARTING_BALANCE")?.unwrap_or(Decimal::ONE);
        if starting_balance < Decimal::ZERO {
            return Err("STARTING_BALANCE must not be negative".to_string());
        }
        if starting_balance.normalize().scale() > 2 {
            return Err("STARTING_BALANCE must have at most 2 decimal places".to_string());
        }

        let min_lead_days = parse_env::<i64>("MIN_LEAD_DAYS")?.unwrap_or(3);
        if min_lead_days < 2 {
            return Err("MIN_LEAD_DAYS must be at least 2".to_string());
        }

        Ok(Self {
            starting_balance,
            min_lead_days,
        })
    }
}

impl Default for WagerConfig {
    fn default() -> Self {
        Self {
            starting_balance: Decimal::ONE,
            min_lead_days: 3,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        let environment = environment.to_lowercase();
        if !valid_environments.contains(&environment.as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }
        let production = environment == "production";

        let database = DatabaseConfig::from_env()?;
        let race_api = RaceApiConfig::from_env()?;
        let session = SessionConfig::from_env(production)?;
        let wager = WagerConfig::from_env()?;

        let http_port = parse_env::<u16>("HTTP_PORT")?.unwrap_or(3000);
        let ws_port = parse_env::<u16>("WS_PORT")?;

        if ws_port == Some(http_port) {
            return Err("WS_PORT must differ from HTTP_PORT".to_string());
        }

        Ok(Self {
            database,
            race_api,
            session,
            wager,
            log_level: log_level.to_lowercase(),
            http_port,
            ws_port,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            race_api: RaceApiConfig::default(),
            session: SessionConfig::default(),
            wager: WagerConfig::default(),
            log_level: "info".to_string(),
            http_port: 3000,
            ws_port: None,
            environment: "development".to_string(),
        }
    }
}
