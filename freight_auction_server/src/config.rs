use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use fae_common::{
    helpers::{parse_boolean_flag, parse_fraction},
    Decimal,
    Secret,
    Weight,
};
use freight_auction_engine::{
    config::{DEFAULT_COMPLIANCE_TIMEOUT, DEFAULT_LOT_SIZE_FRACTION, DEFAULT_PICKUP_LEAD_HOURS, DEFAULT_QUOTA_CEILING},
    AuctionPolicy,
    EngineConfig,
};
use log::*;

const DEFAULT_FAE_HOST: &str = "127.0.0.1";
const DEFAULT_FAE_PORT: u16 = 8370;
pub const DEFAULT_COMPLIANCE_ORACLE_URL: &str = "http://localhost:8360/compliance/validate";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_SNIPING_WINDOW_MINS: i64 = 5;
const DEFAULT_AUCTION_EXTENSION_MINS: i64 = 5;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Bids are POSTed to this endpoint before they are admitted.
    pub compliance_oracle_url: String,
    /// Sent as a bearer token to the compliance oracle, if set.
    pub compliance_api_key: Option<Secret<String>>,
    /// A compliance call that takes longer than this rejects the bid.
    pub compliance_timeout: StdDuration,
    pub sweep_interval: StdDuration,
    pub quota_ceiling: Weight,
    pub lot_size_fraction: Decimal,
    pub sniping_window: Duration,
    pub auction_extension: Duration,
    /// `None` means auctions can be extended indefinitely.
    pub max_auction_extensions: Option<u32>,
    pub pickup_lead_time: Duration,
    pub event_buffer_size: usize,
    /// If true, every published event is written to the log as JSON.
    pub log_events: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FAE_HOST.to_string(),
            port: DEFAULT_FAE_PORT,
            database_url: String::default(),
            compliance_oracle_url: DEFAULT_COMPLIANCE_ORACLE_URL.to_string(),
            compliance_api_key: None,
            compliance_timeout: DEFAULT_COMPLIANCE_TIMEOUT,
            sweep_interval: StdDuration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            quota_ceiling: Weight::from(DEFAULT_QUOTA_CEILING),
            lot_size_fraction: DEFAULT_LOT_SIZE_FRACTION,
            sniping_window: Duration::minutes(DEFAULT_SNIPING_WINDOW_MINS),
            auction_extension: Duration::minutes(DEFAULT_AUCTION_EXTENSION_MINS),
            max_auction_extensions: None,
            pickup_lead_time: Duration::hours(DEFAULT_PICKUP_LEAD_HOURS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            log_events: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any key-value source. Missing or invalid values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let host = lookup("FAE_HOST").unwrap_or(defaults.host);
        let port = parse_or_default(&lookup, "FAE_PORT", defaults.port, |_| true);
        let database_url = lookup("FAE_DATABASE_URL").unwrap_or_else(|| {
            error!("🪛️ FAE_DATABASE_URL is not set. Please set it to the URL for the auction database.");
            String::default()
        });
        let compliance_oracle_url = lookup("FAE_COMPLIANCE_ORACLE_URL").unwrap_or_else(|| {
            warn!(
                "🪛️ FAE_COMPLIANCE_ORACLE_URL is not set. Using {DEFAULT_COMPLIANCE_ORACLE_URL}. Every bid will be \
                 rejected if the oracle cannot be reached."
            );
            defaults.compliance_oracle_url
        });
        let compliance_api_key = lookup("FAE_COMPLIANCE_API_KEY").filter(|k| !k.trim().is_empty()).map(Secret::new);
        if compliance_api_key.is_none() {
            info!("🪛️ FAE_COMPLIANCE_API_KEY is not set. Compliance requests will not be authenticated.");
        }
        let default_timeout_ms = DEFAULT_COMPLIANCE_TIMEOUT.as_millis() as u64;
        let timeout_ms = parse_or_default(&lookup, "FAE_COMPLIANCE_TIMEOUT_MS", default_timeout_ms, |ms| *ms > 0);
        let sweep_secs = parse_or_default(&lookup, "FAE_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS, |s| *s > 0);
        let quota_ceiling = parse_or_default(&lookup, "FAE_QUOTA_CEILING", defaults.quota_ceiling, Weight::is_positive);
        let lot_size_fraction = match lookup("FAE_LOT_SIZE_FRACTION") {
            Some(s) => parse_fraction(&s).unwrap_or_else(|e| {
                warn!("🪛️ Invalid configuration value for FAE_LOT_SIZE_FRACTION. {e}. Using the default instead.");
                defaults.lot_size_fraction
            }),
            None => defaults.lot_size_fraction,
        };
        let sniping_window =
            parse_or_default(&lookup, "FAE_SNIPING_WINDOW_MINS", DEFAULT_SNIPING_WINDOW_MINS, |m| *m >= 0);
        let auction_extension =
            parse_or_default(&lookup, "FAE_AUCTION_EXTENSION_MINS", DEFAULT_AUCTION_EXTENSION_MINS, |m| *m > 0);
        let max_auction_extensions = lookup("FAE_MAX_AUCTION_EXTENSIONS").and_then(|s| {
            s.trim()
                .parse::<u32>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for FAE_MAX_AUCTION_EXTENSIONS. {e}. No cap applies."))
                .ok()
        });
        let pickup_lead_hours =
            parse_or_default(&lookup, "FAE_PICKUP_LEAD_HOURS", DEFAULT_PICKUP_LEAD_HOURS, |h| *h >= 0);
        let event_buffer_size = parse_or_default(&lookup, "FAE_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE, |n| *n > 0);
        let log_events = parse_boolean_flag(lookup("FAE_LOG_EVENTS"), false);
        Self {
            host,
            port,
            database_url,
            compliance_oracle_url,
            compliance_api_key,
            compliance_timeout: StdDuration::from_millis(timeout_ms),
            sweep_interval: StdDuration::from_secs(sweep_secs),
            quota_ceiling,
            lot_size_fraction,
            sniping_window: Duration::minutes(sniping_window),
            auction_extension: Duration::minutes(auction_extension),
            max_auction_extensions,
            pickup_lead_time: Duration::hours(pickup_lead_hours),
            event_buffer_size,
            log_events,
        }
    }

    /// The engine policy this configuration describes. Anything not configurable here keeps the engine default.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.decomposition.lot_size_fraction = self.lot_size_fraction;
        config.quota.default_ceiling = self.quota_ceiling;
        config.auction = AuctionPolicy {
            sniping_window: self.sniping_window,
            extension: self.auction_extension,
            max_extensions: self.max_auction_extensions,
        };
        config.lifecycle.pickup_lead_time = self.pickup_lead_time;
        config.compliance_timeout = self.compliance_timeout;
        config
    }
}

fn parse_or_default<T, F, V>(lookup: &F, name: &str, default: T, valid: V) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(value) = lookup(name) else {
        info!("🪛️ {name} is not set. Using the default value of {default}.");
        return default;
    };
    match value.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        Ok(v) => {
            warn!("🪛️ {v} is out of range for {name}. Using the default value of {default} instead.");
            default
        },
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {name} ({value}). {e} Using the default value of {default}.");
            default
        },
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8370);
        assert_eq!(config.compliance_oracle_url, DEFAULT_COMPLIANCE_ORACLE_URL);
        assert_eq!(config.sweep_interval, StdDuration::from_secs(60));
        assert_eq!(config.quota_ceiling, Weight::from(200));
        assert_eq!(config.max_auction_extensions, None);
        assert!(!config.log_events);
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = config_from(&[
            ("FAE_PORT", "9000"),
            ("FAE_DATABASE_URL", "sqlite://data/auction.db"),
            ("FAE_COMPLIANCE_TIMEOUT_MS", "250"),
            ("FAE_SWEEP_INTERVAL_SECS", "15"),
            ("FAE_QUOTA_CEILING", "350"),
            ("FAE_LOT_SIZE_FRACTION", "0.25"),
            ("FAE_MAX_AUCTION_EXTENSIONS", "3"),
            ("FAE_LOG_EVENTS", "true"),
            ("FAE_COMPLIANCE_API_KEY", "s3cr3t"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_url, "sqlite://data/auction.db");
        assert_eq!(config.compliance_timeout, StdDuration::from_millis(250));
        assert_eq!(config.sweep_interval, StdDuration::from_secs(15));
        assert!(config.log_events);
        let key = config.compliance_api_key.as_ref().expect("API key");
        assert_eq!(key.reveal(), "s3cr3t");
        assert!(!format!("{config:?}").contains("s3cr3t"));

        let engine = config.engine_config();
        assert_eq!(engine.quota.default_ceiling, Weight::from(350));
        assert_eq!(engine.decomposition.lot_size_fraction, Decimal::new(25, 2));
        assert_eq!(engine.auction.max_extensions, Some(3));
        assert_eq!(engine.compliance_timeout, StdDuration::from_millis(250));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("FAE_PORT", "eighty"),
            ("FAE_SWEEP_INTERVAL_SECS", "0"),
            ("FAE_QUOTA_CEILING", "-5"),
            ("FAE_LOT_SIZE_FRACTION", "1.5"),
            ("FAE_EVENT_BUFFER_SIZE", "0"),
            ("FAE_MAX_AUCTION_EXTENSIONS", "lots"),
        ]);
        assert_eq!(config.port, 8370);
        assert_eq!(config.sweep_interval, StdDuration::from_secs(60));
        assert_eq!(config.quota_ceiling, Weight::from(200));
        assert_eq!(config.lot_size_fraction, DEFAULT_LOT_SIZE_FRACTION);
        assert_eq!(config.event_buffer_size, 25);
        assert_eq!(config.max_auction_extensions, None);
    }
}
