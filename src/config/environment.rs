use base64::Engine;
use std::env;
use std::fmt;
use std::time::Duration;

const DEFAULT_NODE_PORT: u16 = 8080;
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 120;
// Tor round trips are slow; anything much shorter flags healthy nodes as down.
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_CIRCUIT_REFRESH_SECS: u64 = 300;
const DEFAULT_TOR_PROXY_URL: &str = "socks5h://127.0.0.1:9050";
const DEFAULT_TOR_CHECK_URL: &str = "http://check.torproject.org/api/ip";
const DEFAULT_COMMAND_RATE_LIMIT: u32 = 6;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Environment configuration
/// Loads and validates environment variables once, before any task starts.
#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,
    pub node_onion_address: String,
    pub node_port: u16,
    pub macaroon_hex: String,
    pub check_interval: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub circuit_refresh_interval: Duration,
    pub tor_proxy_url: String,
    pub tor_control_addr: Option<String>,
    pub tor_control_password: Option<String>,
    pub tor_check_url: String,
    pub command_rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_bot_token =
            var("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let telegram_chat_id = var("TELEGRAM_CHAT_ID")
            .ok_or(ConfigError::Missing("TELEGRAM_CHAT_ID"))?
            .parse::<i64>()
            .map_err(|e| ConfigError::Invalid {
                name: "TELEGRAM_CHAT_ID",
                reason: e.to_string(),
            })?;

        let node_onion_address =
            var("LND_NODE_ONION_ADDRESS").ok_or(ConfigError::Missing("LND_NODE_ONION_ADDRESS"))?;

        let node_port = match var("LND_NODE_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "LND_NODE_PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_NODE_PORT,
        };

        let macaroon_hex = decode_macaroon(
            &var("LND_MACAROON_RO").ok_or(ConfigError::Missing("LND_MACAROON_RO"))?,
        )?;

        let check_interval = Duration::from_secs(positive(
            "CHECK_INTERVAL",
            var("CHECK_INTERVAL"),
            DEFAULT_CHECK_INTERVAL_SECS,
        )?);
        let timeout = Duration::from_secs(positive("TIMEOUT", var("TIMEOUT"), DEFAULT_TIMEOUT_SECS)?);
        let max_retries = positive_u32("MAX_RETRIES", var("MAX_RETRIES"), DEFAULT_MAX_RETRIES)?;
        let circuit_refresh_interval = Duration::from_secs(positive(
            "CIRCUIT_REFRESH_INTERVAL",
            var("CIRCUIT_REFRESH_INTERVAL"),
            DEFAULT_CIRCUIT_REFRESH_SECS,
        )?);

        let tor_proxy_url = var("TOR_PROXY_URL").unwrap_or_else(|| DEFAULT_TOR_PROXY_URL.to_string());
        if !(tor_proxy_url.starts_with("socks5h://") || tor_proxy_url.starts_with("socks5://")) {
            return Err(ConfigError::Invalid {
                name: "TOR_PROXY_URL",
                reason: "expected a socks5h:// or socks5:// URL".to_string(),
            });
        }

        let tor_control_addr = var("TOR_CONTROL_ADDR");
        if let Some(addr) = &tor_control_addr {
            if !addr.contains(':') {
                return Err(ConfigError::Invalid {
                    name: "TOR_CONTROL_ADDR",
                    reason: "expected host:port".to_string(),
                });
            }
        }

        let command_rate_limit_per_minute = positive_u32(
            "COMMAND_RATE_LIMIT_PER_MINUTE",
            var("COMMAND_RATE_LIMIT_PER_MINUTE"),
            DEFAULT_COMMAND_RATE_LIMIT,
        )?;

        Ok(Self {
            telegram_bot_token,
            telegram_chat_id,
            node_onion_address,
            node_port,
            macaroon_hex,
            check_interval,
            timeout,
            max_retries,
            circuit_refresh_interval,
            tor_proxy_url,
            tor_control_addr,
            tor_control_password: var("TOR_CONTROL_PASSWORD"),
            tor_check_url: var("TOR_CHECK_URL").unwrap_or_else(|| DEFAULT_TOR_CHECK_URL.to_string()),
            command_rate_limit_per_minute,
        })
    }

    /// REST endpoint of the node's getinfo call
    pub fn node_info_url(&self) -> String {
        format!("https://{}:{}/v1/getinfo", self.node_onion_address, self.node_port)
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("node_onion_address", &self.node_onion_address)
            .field("node_port", &self.node_port)
            .field("macaroon_hex", &"<redacted>")
            .field("check_interval", &self.check_interval)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("circuit_refresh_interval", &self.circuit_refresh_interval)
            .field("tor_proxy_url", &self.tor_proxy_url)
            .field("tor_control_addr", &self.tor_control_addr)
            .field("tor_check_url", &self.tor_check_url)
            .field("command_rate_limit_per_minute", &self.command_rate_limit_per_minute)
            .finish()
    }
}

fn positive(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn positive_u32(name: &'static str, raw: Option<String>, default: u32) -> Result<u32, ConfigError> {
    let value = positive(name, raw, u64::from(default))?;
    u32::try_from(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// The read-only macaroon arrives base64-encoded; LND expects hex in the header.
fn decode_macaroon(encoded: &str) -> Result<String, ConfigError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ConfigError::Invalid {
            name: "LND_MACAROON_RO",
            reason: e.to_string(),
        })?;
    Ok(hex::encode(bytes))
}
