use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::store::firestore::FirestoreSettings;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Which `StoreClient` implementation backs both store instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(()),
        }
    }
}

/// Credentials and endpoint identifiers of one store project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreProfile {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub database_url: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub measurement_id: Option<String>,
}

impl StoreProfile {
    /// Read `{prefix}_API_KEY`, `{prefix}_PROJECT_ID`, ...
    fn from_lookup<F>(prefix: &str, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(format!("{}_{}", prefix, suffix).as_str()).filter(|v| !v.is_empty());
        Self {
            api_key: get("API_KEY"),
            auth_domain: get("AUTH_DOMAIN"),
            database_url: get("DATABASE_URL"),
            project_id: get("PROJECT_ID"),
            storage_bucket: get("STORAGE_BUCKET"),
            messaging_sender_id: get("MESSAGING_SENDER_ID"),
            app_id: get("APP_ID"),
            measurement_id: get("MEASUREMENT_ID"),
        }
    }
}

pub struct Config {
    pub listen_addr: SocketAddr,
    pub backend: StoreBackend,
    /// Store holding team balances and items
    pub primary: StoreProfile,
    /// Store holding hangman scores
    pub hangman: StoreProfile,
    pub firestore: FirestoreSettings,
    /// Outbound queue length per push connection
    pub connection_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind: IpAddr = parse_or(&lookup, "RELAY_BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let backend = match lookup("RELAY_STORE_BACKEND") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "RELAY_STORE_BACKEND".to_string(),
                value: raw,
            })?,
            None => StoreBackend::Firestore,
        };
        let poll_ms: u64 = parse_or(&lookup, "RELAY_POLL_INTERVAL_MS", 1000)?;
        let timeout_ms: u64 = parse_or(&lookup, "RELAY_REQUEST_TIMEOUT_MS", 10_000)?;
        let connection_buffer: usize = parse_or(&lookup, "RELAY_CONNECTION_BUFFER", 64)?;

        Ok(Self {
            listen_addr: SocketAddr::new(bind, port),
            backend,
            primary: StoreProfile::from_lookup("FIREBASE", &lookup),
            hangman: StoreProfile::from_lookup("HANG", &lookup),
            firestore: FirestoreSettings {
                base_url: lookup("RELAY_FIRESTORE_URL")
                    .unwrap_or_else(|| DEFAULT_FIRESTORE_URL.to_string()),
                poll_interval: Duration::from_millis(poll_ms.max(1)),
                request_timeout: Duration::from_millis(timeout_ms),
            },
            connection_buffer: connection_buffer.max(1),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.backend, StoreBackend::Firestore);
        assert_eq!(config.firestore.poll_interval, Duration::from_secs(1));
        assert_eq!(config.connection_buffer, 64);
        assert_eq!(config.primary, StoreProfile::default());
    }

    #[test]
    fn test_two_independent_profiles() {
        let config = Config::from_lookup(lookup_from(&[
            ("FIREBASE_PROJECT_ID", "market"),
            ("FIREBASE_API_KEY", "primary-key"),
            ("FIREBASE_MEASUREMENT_ID", "G-1"),
            ("HANG_PROJECT_ID", "hangman"),
            ("HANG_API_KEY", ""),
        ]))
        .unwrap();

        assert_eq!(config.primary.project_id.as_deref(), Some("market"));
        assert_eq!(config.primary.api_key.as_deref(), Some("primary-key"));
        assert_eq!(config.primary.measurement_id.as_deref(), Some("G-1"));
        assert_eq!(config.hangman.project_id.as_deref(), Some("hangman"));
        // Empty values count as unset
        assert!(config.hangman.api_key.is_none());
    }

    #[test]
    fn test_port_and_backend() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "8081"),
            ("RELAY_STORE_BACKEND", "Memory"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr.port(), 8081);
        assert_eq!(config.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")]))
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT".to_string(),
                value: "eighty".to_string()
            }
        );

        assert!(Config::from_lookup(lookup_from(&[("RELAY_STORE_BACKEND", "redis")])).is_err());
    }
}
