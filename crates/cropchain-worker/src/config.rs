//! Worker configuration, read once at startup.
//!
//! Variable names follow the deployed worker's `.env`:
//!
//! | Variable | Default |
//! |---|---|
//! | `CONTRACT_ADDRESS`, `ABI`, `PRIVATE_KEY`, `ADDRESS`, `HTTP_PROVIDER_1` | required |
//! | `WSS_PROVIDER_1`, `WSS_PROVIDER_2`, `HTTP_PROVIDER_2` | optional |
//! | `NOTIFICATION_URL` | [`DEFAULT_NOTIFICATION_URL`] |
//! | `NOTIFICATION_IMAGE_TYPE` | unset |
//! | `RETRY_MAX_ATTEMPTS` / `RETRY_BASE_SECS` | 5 / 10 |
//! | `POLL_INTERVAL_SECS` | 60 |
//! | `PROBE_TIMEOUT_SECS` | 10 |
//! | `RECEIPT_TIMEOUT_SECS` / `RECEIPT_POLL_MILLIS` | 120 / 1000 |

use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use cropchain_rpc_core::{Endpoint, RetryConfig};
use thiserror::Error;

use crate::signer::TransactionSigner;

pub const DEFAULT_NOTIFICATION_URL: &str =
    "https://cropchain-backend-9b3l.onrender.com/fcm/sendNotification/";

/// Streaming endpoints first, in priority order, then request-response ones.
const PROVIDER_VARS: [&str; 4] = [
    "WSS_PROVIDER_1",
    "WSS_PROVIDER_2",
    "HTTP_PROVIDER_1",
    "HTTP_PROVIDER_2",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("ADDRESS {configured} does not match the address of PRIVATE_KEY ({derived})")]
    SignerMismatch { configured: Address, derived: Address },
}

/// Immutable startup configuration shared by reference.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub contract_address: Address,
    pub abi_json: String,
    /// Every configured node, in the order the deployment lists them.
    pub endpoints: Vec<Endpoint>,
    /// Request-response endpoint used for writes and contract reads.
    pub write_endpoint: String,
    pub signer: TransactionSigner,
    pub notification_url: String,
    pub notification_image_type: Option<String>,
    pub retry: RetryConfig,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub receipt_timeout: Duration,
    pub receipt_poll: Duration,
}

impl WorkerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let contract_address = parse::<Address>("CONTRACT_ADDRESS", &required("CONTRACT_ADDRESS")?)?;
        let abi_json = required("ABI")?;
        let write_endpoint = required("HTTP_PROVIDER_1")?;

        let endpoints = PROVIDER_VARS
            .iter()
            .filter_map(|&name| get(name).map(|url| (name, url)))
            .map(|(name, url)| {
                Endpoint::from_url(name.to_ascii_lowercase(), url).map_err(|e| ConfigError::Invalid {
                    name,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let signer = TransactionSigner::from_hex(&required("PRIVATE_KEY")?).map_err(|e| ConfigError::Invalid {
            name: "PRIVATE_KEY",
            reason: e.to_string(),
        })?;
        let configured = parse::<Address>("ADDRESS", &required("ADDRESS")?)?;
        if configured != signer.address() {
            return Err(ConfigError::SignerMismatch {
                configured,
                derived: signer.address(),
            });
        }

        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            get(name).map_or(Ok(default), |v| parse(name, &v))
        };
        let nonzero = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match number(name, default)? {
                0 => Err(ConfigError::Invalid {
                    name,
                    reason: "must be at least 1".into(),
                }),
                n => Ok(n),
            }
        };

        let max_attempts = nonzero("RETRY_MAX_ATTEMPTS", 5)?;
        let retry = RetryConfig {
            max_attempts: u32::try_from(max_attempts).map_err(|e| ConfigError::Invalid {
                name: "RETRY_MAX_ATTEMPTS",
                reason: e.to_string(),
            })?,
            initial_backoff: Duration::from_secs(number("RETRY_BASE_SECS", 10)?),
            ..RetryConfig::default()
        };

        Ok(Self {
            contract_address,
            abi_json,
            endpoints,
            write_endpoint,
            signer,
            notification_url: get("NOTIFICATION_URL").unwrap_or_else(|| DEFAULT_NOTIFICATION_URL.to_string()),
            notification_image_type: get("NOTIFICATION_IMAGE_TYPE"),
            retry,
            poll_interval: Duration::from_secs(nonzero("POLL_INTERVAL_SECS", 60)?),
            probe_timeout: Duration::from_secs(number("PROBE_TIMEOUT_SECS", 10)?),
            receipt_timeout: Duration::from_secs(number("RECEIPT_TIMEOUT_SECS", 120)?),
            receipt_poll: Duration::from_millis(nonzero("RECEIPT_POLL_MILLIS", 1000)?),
        })
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CONTRACT_ADDRESS, SIGNER_ADDRESS, SIGNER_KEY, TEST_ABI};
    use cropchain_rpc_core::TransportKind;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("CONTRACT_ADDRESS", CONTRACT_ADDRESS.to_string()),
            ("ABI", TEST_ABI.to_string()),
            ("WSS_PROVIDER_1", "wss://one.example".to_string()),
            ("WSS_PROVIDER_2", "wss://two.example".to_string()),
            ("HTTP_PROVIDER_1", "https://rpc.example".to_string()),
            ("PRIVATE_KEY", format!("0x{SIGNER_KEY}")),
            ("ADDRESS", SIGNER_ADDRESS.to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<WorkerConfig, ConfigError> {
        WorkerConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn loads_with_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.contract_address, CONTRACT_ADDRESS);
        assert_eq!(config.signer.address(), SIGNER_ADDRESS);
        assert_eq!(config.notification_url, DEFAULT_NOTIFICATION_URL);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.receipt_poll, Duration::from_millis(1000));

        let names: Vec<_> = config.endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["wss_provider_1", "wss_provider_2", "http_provider_1"]);
        assert_eq!(config.endpoints[2].transport, TransportKind::RequestResponse);
    }

    #[test]
    fn missing_required_var() {
        let mut env = base_env();
        env.remove("ABI");
        assert!(matches!(load(&env), Err(ConfigError::Missing("ABI"))));

        let mut env = base_env();
        env.insert("HTTP_PROVIDER_1", "   ".into());
        assert!(matches!(load(&env), Err(ConfigError::Missing("HTTP_PROVIDER_1"))));
    }

    #[test]
    fn address_must_match_key() {
        let mut env = base_env();
        env.insert("ADDRESS", CONTRACT_ADDRESS.to_string());
        assert!(matches!(load(&env), Err(ConfigError::SignerMismatch { .. })));
    }

    #[test]
    fn rejects_bad_values() {
        let mut env = base_env();
        env.insert("WSS_PROVIDER_2", "ftp://two.example".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "WSS_PROVIDER_2", .. })));

        let mut env = base_env();
        env.insert("RETRY_BASE_SECS", "ten".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "RETRY_BASE_SECS", .. })));

        let mut env = base_env();
        env.insert("RETRY_MAX_ATTEMPTS", "0".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "RETRY_MAX_ATTEMPTS", .. })));
    }

    #[test]
    fn zero_periods_are_rejected() {
        for name in ["RECEIPT_POLL_MILLIS", "POLL_INTERVAL_SECS"] {
            let mut env = base_env();
            env.insert(name, "0".into());
            assert!(
                matches!(load(&env), Err(ConfigError::Invalid { name: n, .. }) if n == name),
                "{name}"
            );
        }

        let mut env = base_env();
        env.insert("RECEIPT_POLL_MILLIS", "250".into());
        assert_eq!(load(&env).unwrap().receipt_poll, Duration::from_millis(250));
    }

    #[test]
    fn overrides_are_applied() {
        let mut env = base_env();
        env.insert("RETRY_MAX_ATTEMPTS", "3".into());
        env.insert("RETRY_BASE_SECS", "2".into());
        env.insert("NOTIFICATION_URL", "http://localhost:9000/notify".into());
        let config = load(&env).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff, Duration::from_secs(2));
        assert_eq!(config.notification_url, "http://localhost:9000/notify");
    }

    #[test]
    fn debug_never_shows_key() {
        let config = load(&base_env()).unwrap();
        assert!(!format!("{config:?}").contains(SIGNER_KEY));
    }
}
