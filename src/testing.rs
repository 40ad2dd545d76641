// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted in-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, TxHash, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::authority::{AuthorityNotification, SigningAuthority};
use crate::chain::{format_amount, CallRequest, ChainGateway, GatewayError, TokenBalance, WalletState};
use crate::error::{WalletError, WalletResult};
use crate::session::digest::domain_separator;

pub const TEST_CHAIN_ID: u64 = 43113;
pub const TEST_DOMAIN: &str = "SmartWallet";

#[derive(Default)]
struct GatewayState {
    wallets: HashMap<Address, Address>,
    nonces: HashMap<Address, U256>,
    balances: HashMap<Address, U256>,
    token_balances: HashMap<(Address, Address), U256>,
    sent: Vec<CallRequest>,
    signed: Vec<bool>,
    signers: HashSet<Address>,
    gas_estimate: Option<u64>,
    fail_sends: bool,
}

/// Chain fake: owner→wallet registry, nonces, balances, recorded sends.
pub struct MockGateway {
    chain_id: u64,
    state: Mutex<GatewayState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            chain_id: TEST_CHAIN_ID,
            state: Mutex::new(GatewayState {
                gas_estimate: Some(90_000),
                ..GatewayState::default()
            }),
        }
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Self::new()
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap()
    }

    pub fn register_wallet(&self, owner: Address, wallet: Address) {
        self.state().wallets.insert(owner, wallet);
    }

    pub fn set_nonce(&self, wallet: Address, nonce: u64) {
        self.state().nonces.insert(wallet, U256::from(nonce));
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.state().balances.insert(address, wei);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, raw: U256) {
        self.state().token_balances.insert((token, owner), raw);
    }

    /// `None` makes `estimate_gas` fail.
    pub fn set_gas_estimate(&self, gas: Option<u64>) {
        self.state().gas_estimate = gas;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.state().fail_sends = fail;
    }

    pub fn sent(&self) -> Vec<CallRequest> {
        self.state().sent.clone()
    }

    /// Per sent call, whether a local signer for its sender was registered.
    pub fn signed(&self) -> Vec<bool> {
        self.state().signed.clone()
    }

    pub fn has_signer(&self, address: Address) -> bool {
        self.state().signers.contains(&address)
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn chain_id(&self) -> Result<u64, GatewayError> {
        Ok(self.chain_id)
    }

    async fn resolve_smart_wallet(&self, owner: Address) -> Result<Option<Address>, GatewayError> {
        Ok(self.state().wallets.get(&owner).copied())
    }

    async fn wallet_state(&self, wallet: Address) -> Result<WalletState, GatewayError> {
        let state = self.state();
        let owner = state
            .wallets
            .iter()
            .find(|(_, w)| **w == wallet)
            .map(|(o, _)| *o);
        Ok(WalletState {
            address: wallet,
            owner: owner.unwrap_or(Address::ZERO),
            nonce: state.nonces.get(&wallet).copied().unwrap_or_default(),
            deployed: owner.is_some(),
        })
    }

    async fn nonce(&self, wallet: Address) -> Result<U256, GatewayError> {
        Ok(self.state().nonces.get(&wallet).copied().unwrap_or_default())
    }

    async fn domain_separator(&self, wallet: Address) -> Result<B256, GatewayError> {
        Ok(domain_separator(TEST_DOMAIN, wallet, self.chain_id))
    }

    async fn native_balance(&self, address: Address) -> Result<U256, GatewayError> {
        Ok(self.state().balances.get(&address).copied().unwrap_or_default())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<TokenBalance, GatewayError> {
        let raw = self
            .state()
            .token_balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default();
        Ok(TokenBalance {
            symbol: "USDC".to_string(),
            name: "USD Coin".to_string(),
            balance_raw: raw,
            balance_formatted: format_amount(raw, 6),
            decimals: 6,
            contract_address: Some(token),
        })
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> Result<u64, GatewayError> {
        self.state()
            .gas_estimate
            .ok_or_else(|| GatewayError::RpcError("execution reverted".to_string()))
    }

    async fn send_transaction(&self, call: &CallRequest) -> Result<TxHash, GatewayError> {
        let mut state = self.state();
        if state.fail_sends {
            return Err(GatewayError::TransactionFailed("rejected".to_string()));
        }
        let signed = state.signers.contains(&call.from);
        state.signed.push(signed);
        state.sent.push(call.clone());
        Ok(keccak256((state.sent.len() as u64).to_be_bytes()))
    }

    fn register_signer(&self, signer: PrivateKeySigner) {
        self.state().signers.insert(signer.address());
    }

    fn remove_signer(&self, address: Address) {
        self.state().signers.remove(&address);
    }
}

/// Injected-provider fake with scripted accounts and chain.
pub struct MockAuthority {
    accounts: Mutex<Vec<Address>>,
    chain_id: AtomicU64,
    notifications: broadcast::Sender<AuthorityNotification>,
}

impl MockAuthority {
    pub fn new(accounts: Vec<Address>) -> Self {
        let (notifications, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(accounts),
            chain_id: AtomicU64::new(TEST_CHAIN_ID),
            notifications,
        }
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts.clone();
        let _ = self.notifications.send(AuthorityNotification::AccountsChanged(accounts));
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.chain_id.store(chain_id, Ordering::SeqCst);
        let _ = self.notifications.send(AuthorityNotification::ChainChanged(chain_id));
    }
}

#[async_trait]
impl SigningAuthority for MockAuthority {
    async fn request(&self, method: &str, _params: Value) -> WalletResult<Value> {
        match method {
            "eth_requestAccounts" | "eth_accounts" => {
                let accounts = self.accounts.lock().unwrap().clone();
                Ok(json!(accounts
                    .iter()
                    .map(|a| format!("{a:#x}"))
                    .collect::<Vec<_>>()))
            }
            "eth_chainId" => Ok(json!(format!("{:#x}", self.chain_id.load(Ordering::SeqCst)))),
            other => Err(WalletError::Provider(format!("unsupported method: {other}"))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthorityNotification> {
        self.notifications.subscribe()
    }
}
