// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`ClientConfig`] they load
//! into.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ID` | Application id; namespaces session keys | `relational-wallet` |
//! | `APP_NAME` | Display name of the application | `Relational Wallet` |
//! | `REQUIRED_PERMISSIONS` | Comma-separated permission names | `EXECUTE,EXECUTE_BATCH` |
//! | `SESSION_DURATION_SECS` | Session length, clamped to 30 days | `86400` |
//! | `AUTO_LOCK_MINUTES` | Vault auto-lock delay | `15` |
//! | `AUTO_RECONNECT` | Reconnect when the authority switches account | `true` |
//! | `RPC_URL` | JSON-RPC endpoint | Fuji public RPC |
//! | `CHAIN_ID` | Expected chain id | `43113` |
//! | `WALLET_REGISTRY_ADDRESS` | Owner → smart wallet registry | zero address |
//! | `SESSION_REGISTRY_ADDRESS` | Session key registry | zero address |
//! | `EIP712_DOMAIN_NAME` | Wallet contract EIP-712 name | `SmartWallet` |
//! | `DATA_DIR` | Root directory of local profiles | `./relational-data` |
//! | `PROFILE` | Profile namespace under `DATA_DIR` | `default` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::chain::{ContractAddresses, NetworkConfig};
use crate::error::{parse_address, WalletError, WalletResult};
use crate::session::manager::DEFAULT_SESSION_SECS;
use crate::session::{permissions, Permission, MAX_SESSION_SECS};
use crate::storage::paths::DATA_ROOT;
use crate::storage::{FileStore, KeyValueStore, ScopedStore, StoragePaths};

pub const APP_ID_ENV: &str = "APP_ID";
pub const APP_NAME_ENV: &str = "APP_NAME";
pub const REQUIRED_PERMISSIONS_ENV: &str = "REQUIRED_PERMISSIONS";
pub const SESSION_DURATION_ENV: &str = "SESSION_DURATION_SECS";
pub const AUTO_LOCK_MINUTES_ENV: &str = "AUTO_LOCK_MINUTES";
pub const AUTO_RECONNECT_ENV: &str = "AUTO_RECONNECT";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const WALLET_REGISTRY_ENV: &str = "WALLET_REGISTRY_ADDRESS";
pub const SESSION_REGISTRY_ENV: &str = "SESSION_REGISTRY_ADDRESS";
pub const DOMAIN_NAME_ENV: &str = "EIP712_DOMAIN_NAME";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const PROFILE_ENV: &str = "PROFILE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_APP_ID: &str = "relational-wallet";
pub const DEFAULT_APP_NAME: &str = "Relational Wallet";
pub const DEFAULT_DOMAIN_NAME: &str = "SmartWallet";
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_AUTO_LOCK_MINUTES: u64 = 15;
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Longest accepted `APP_ID`. With [`MAX_PROFILE_LEN`] this keeps every
/// session key within the file store's key limit.
pub const MAX_APP_ID_LEN: usize = 32;
pub const MAX_PROFILE_LEN: usize = 12;

/// Configuration of one wallet client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub app_id: String,
    pub app_name: String,
    /// Permissions a session must grant to be created or reused.
    pub required_permissions: Vec<Permission>,
    /// Clamped to 30 days; zero selects the 24 h default.
    pub session_duration_secs: u64,
    pub auto_lock_minutes: u64,
    /// Reconnect automatically when the authority switches account.
    pub auto_reconnect: bool,
    pub network: NetworkConfig,
    pub contracts: ContractAddresses,
    /// EIP-712 domain name of the wallet contract.
    pub domain_name: String,
    pub data_dir: PathBuf,
    pub profile: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            required_permissions: vec![Permission::Execute, Permission::ExecuteBatch],
            session_duration_secs: DEFAULT_SESSION_SECS,
            auto_lock_minutes: DEFAULT_AUTO_LOCK_MINUTES,
            auto_reconnect: true,
            network: NetworkConfig::default(),
            contracts: ContractAddresses::default(),
            domain_name: DEFAULT_DOMAIN_NAME.to_string(),
            data_dir: PathBuf::from(DATA_ROOT),
            profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from the process environment.
    pub fn from_env() -> WalletResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> WalletResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(v) = get(APP_ID_ENV) {
            config.app_id = v;
        }
        if let Some(v) = get(APP_NAME_ENV) {
            config.app_name = v;
        }
        if let Some(v) = get(REQUIRED_PERMISSIONS_ENV) {
            config.required_permissions = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect::<WalletResult<_>>()?;
        }
        if let Some(v) = get(SESSION_DURATION_ENV) {
            config.session_duration_secs = parse_number(SESSION_DURATION_ENV, &v)?;
        }
        if let Some(v) = get(AUTO_LOCK_MINUTES_ENV) {
            config.auto_lock_minutes = parse_number(AUTO_LOCK_MINUTES_ENV, &v)?;
        }
        if let Some(v) = get(AUTO_RECONNECT_ENV) {
            config.auto_reconnect = parse_bool(AUTO_RECONNECT_ENV, &v)?;
        }
        if let Some(v) = get(CHAIN_ID_ENV) {
            config.network.chain_id = parse_number(CHAIN_ID_ENV, &v)?;
            if config.network.chain_id == NetworkConfig::avalanche_mainnet().chain_id {
                config.network = NetworkConfig::avalanche_mainnet();
            }
        }
        if let Some(v) = get(RPC_URL_ENV) {
            config.network.rpc_url = v;
        }
        if let Some(v) = get(WALLET_REGISTRY_ENV) {
            config.contracts.wallet_registry = parse_address(&v)?;
        }
        if let Some(v) = get(SESSION_REGISTRY_ENV) {
            config.contracts.session_registry = parse_address(&v)?;
        }
        if let Some(v) = get(DOMAIN_NAME_ENV) {
            config.domain_name = v;
        }
        if let Some(v) = get(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get(PROFILE_ENV) {
            config.profile = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.app_id.is_empty() || self.app_id.contains(':') || self.app_id.len() > MAX_APP_ID_LEN {
            return Err(WalletError::validation(format!(
                "{APP_ID_ENV} must be 1 to {MAX_APP_ID_LEN} bytes and contain no ':'"
            )));
        }
        if self.profile.is_empty() || self.profile.contains('/') || self.profile.len() > MAX_PROFILE_LEN {
            return Err(WalletError::validation(format!(
                "{PROFILE_ENV} must be 1 to {MAX_PROFILE_LEN} bytes and contain no '/'"
            )));
        }
        if self.required_permissions.is_empty() {
            return Err(WalletError::validation(format!(
                "{REQUIRED_PERMISSIONS_ENV} must name at least one permission"
            )));
        }
        if self.auto_lock_minutes == 0 {
            return Err(WalletError::validation(format!(
                "{AUTO_LOCK_MINUTES_ENV} must be at least 1"
            )));
        }
        url::Url::parse(&self.network.rpc_url)
            .map_err(|e| WalletError::validation(format!("{RPC_URL_ENV}: {e}")))?;
        Ok(())
    }

    /// Bitmask of [`Self::required_permissions`].
    pub fn required_mask(&self) -> u32 {
        permissions::encode(&self.required_permissions)
    }

    /// Session length actually requested, after clamping.
    pub fn session_duration(&self) -> Duration {
        let secs = match self.session_duration_secs {
            0 => DEFAULT_SESSION_SECS,
            secs => secs.min(MAX_SESSION_SECS as u64),
        };
        Duration::from_secs(secs)
    }

    pub fn auto_lock(&self) -> Duration {
        Duration::from_secs(self.auto_lock_minutes * 60)
    }

    /// On-disk store under `data_dir`, scoped to this profile.
    pub fn open_profile_store(&self) -> WalletResult<ScopedStore> {
        let backing: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(StoragePaths::new(&self.data_dir))?);
        Ok(ScopedStore::new(backing, &self.profile))
    }
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> WalletResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| WalletError::validation(format!("{name}={raw}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> WalletResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(WalletError::validation(format!("{name}={raw}: expected a boolean"))),
    }
}

/// Install the global `tracing` subscriber.
///
/// Honours `RUST_LOG` (default `info`) and `LOG_FORMAT=json|pretty`. A second
/// call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> WalletResult<ClientConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_target_fuji() {
        let config = load(&[]).unwrap();
        assert_eq!(config.network.chain_id, 43113);
        assert_eq!(config.domain_name, "SmartWallet");
        assert_eq!(config.session_duration(), Duration::from_secs(86_400));
        assert_eq!(config.auto_lock(), Duration::from_secs(15 * 60));
        assert!(config.auto_reconnect);
        assert_eq!(config.required_mask(), 3);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("APP_ID", "dapp-one"),
            ("REQUIRED_PERMISSIONS", "execute, transfer_erc20"),
            ("SESSION_DURATION_SECS", "3600"),
            ("AUTO_RECONNECT", "false"),
            ("SESSION_REGISTRY_ADDRESS", "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e"),
            ("PROFILE", "alice"),
            ("DATA_DIR", "/tmp/wallets"),
        ])
        .unwrap();

        assert_eq!(config.app_id, "dapp-one");
        assert_eq!(config.required_mask(), 1 | 8);
        assert_eq!(config.session_duration(), Duration::from_secs(3_600));
        assert!(!config.auto_reconnect);
        assert_eq!(config.contracts.session_registry, alloy::primitives::Address::repeat_byte(0x5e));
        assert_eq!(config.profile, "alice");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/wallets"));
    }

    #[test]
    fn profile_store_is_namespaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&[
            ("DATA_DIR", dir.path().to_str().unwrap()),
            ("PROFILE", "bob"),
        ])
        .unwrap();

        config.open_profile_store().unwrap().set("k", "v").unwrap();
        let reopened = config.open_profile_store().unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(reopened.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn mainnet_chain_id_selects_mainnet_network() {
        let config = load(&[("CHAIN_ID", "43114")]).unwrap();
        assert_eq!(config.network, NetworkConfig::avalanche_mainnet());
    }

    #[test]
    fn session_duration_is_clamped() {
        let config = load(&[("SESSION_DURATION_SECS", "99999999")]).unwrap();
        assert_eq!(config.session_duration(), Duration::from_secs(2_592_000));
    }

    #[test]
    fn malformed_values_are_validation_errors() {
        for vars in [
            vec![("CHAIN_ID", "fuji")],
            vec![("AUTO_RECONNECT", "maybe")],
            vec![("REQUIRED_PERMISSIONS", "EXECUTE,ROOT")],
            vec![("RPC_URL", "not a url")],
            vec![("APP_ID", "a:b")],
            vec![("AUTO_LOCK_MINUTES", "0")],
        ] {
            let err = load(&vars).unwrap_err();
            assert!(
                matches!(err, WalletError::Validation(_) | WalletError::UnknownPermission(_)),
                "{vars:?} gave {err:?}"
            );
        }
        let long_app = "a".repeat(MAX_APP_ID_LEN + 1);
        let long_profile = "p".repeat(MAX_PROFILE_LEN + 1);
        for vars in [
            vec![("APP_ID", long_app.as_str())],
            vec![("PROFILE", long_profile.as_str())],
            vec![("PROFILE", "a/b")],
        ] {
            assert!(matches!(load(&vars), Err(WalletError::Validation(_))), "{vars:?}");
        }
        assert!(load(&[("APP_ID", "a".repeat(MAX_APP_ID_LEN).as_str())]).is_ok());

        assert!(matches!(
            load(&[("WALLET_REGISTRY_ADDRESS", "0x12")]),
            Err(WalletError::InvalidAddress(_))
        ));
    }
}
