// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The chain collaborator seam.

use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use super::types::{CallRequest, TokenBalance, WalletState};

/// Reads from and submits to the platform contracts.
///
/// `send_transaction` is fire-and-forget: it returns once the node has
/// accepted the transaction and does not poll for a receipt. Calls from an
/// address with a registered signer are signed locally.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn chain_id(&self) -> Result<u64, GatewayError>;

    /// Smart wallet registered for `owner`, if provisioning has completed.
    async fn resolve_smart_wallet(&self, owner: Address) -> Result<Option<Address>, GatewayError>;

    async fn wallet_state(&self, wallet: Address) -> Result<WalletState, GatewayError>;

    async fn nonce(&self, wallet: Address) -> Result<U256, GatewayError>;

    async fn domain_separator(&self, wallet: Address) -> Result<B256, GatewayError>;

    async fn native_balance(&self, address: Address) -> Result<U256, GatewayError>;

    async fn token_balance(&self, token: Address, owner: Address)
        -> Result<TokenBalance, GatewayError>;

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, GatewayError>;

    async fn send_transaction(&self, call: &CallRequest) -> Result<TxHash, GatewayError>;

    /// Sign later transactions from the signer's address with it.
    fn register_signer(&self, signer: PrivateKeySigner);

    fn remove_signer(&self, address: Address);
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}
