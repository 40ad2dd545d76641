// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Alloy HTTP implementation of [`ChainGateway`].

use std::collections::HashMap;
use std::sync::RwLock;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, TxHash, B256, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use super::contracts::{ISmartWallet, IWalletRegistry};
use super::erc20::Erc20Contract;
use super::gateway::{ChainGateway, GatewayError};
use super::types::*;

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Chain gateway backed by a JSON-RPC endpoint.
///
/// Transactions from an address with a registered local signer are signed
/// in-process. Transactions from any other address are handed to the node
/// via `eth_sendTransaction`, which only succeeds for node-managed accounts.
pub struct AlloyChainGateway {
    network: NetworkConfig,
    contracts: ContractAddresses,
    rpc_url: url::Url,
    provider: HttpProvider,
    signers: RwLock<HashMap<Address, PrivateKeySigner>>,
}

impl AlloyChainGateway {
    /// Create a new gateway for the specified network.
    pub fn new(network: NetworkConfig, contracts: ContractAddresses) -> Result<Self, GatewayError> {
        let rpc_url: url::Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| GatewayError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());

        Ok(Self {
            network,
            contracts,
            rpc_url,
            provider,
            signers: RwLock::new(HashMap::new()),
        })
    }

    fn local_signer(&self, address: Address) -> Option<PrivateKeySigner> {
        self.signers
            .read()
            .ok()
            .and_then(|signers| signers.get(&address).cloned())
    }

    fn to_tx_request(call: &CallRequest) -> TransactionRequest {
        TransactionRequest::default()
            .from(call.from)
            .to(call.to)
            .value(call.value)
            .input(call.data.clone().into())
    }
}

#[async_trait]
impl ChainGateway for AlloyChainGateway {
    async fn chain_id(&self) -> Result<u64, GatewayError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| GatewayError::RpcError(e.to_string()))
    }

    async fn resolve_smart_wallet(&self, owner: Address) -> Result<Option<Address>, GatewayError> {
        let registry = IWalletRegistry::new(self.contracts.wallet_registry, self.provider.clone());
        let wallet: Address = registry
            .walletOf(owner)
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))?;

        Ok((!wallet.is_zero()).then_some(wallet))
    }

    async fn wallet_state(&self, wallet: Address) -> Result<WalletState, GatewayError> {
        let code = self
            .provider
            .get_code_at(wallet)
            .await
            .map_err(|e| GatewayError::RpcError(e.to_string()))?;

        if code.is_empty() {
            return Ok(WalletState {
                address: wallet,
                owner: Address::ZERO,
                nonce: U256::ZERO,
                deployed: false,
            });
        }

        let contract = ISmartWallet::new(wallet, self.provider.clone());
        let owner: Address = contract
            .owner()
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))?;
        let nonce = self.nonce(wallet).await?;

        Ok(WalletState {
            address: wallet,
            owner,
            nonce,
            deployed: true,
        })
    }

    async fn nonce(&self, wallet: Address) -> Result<U256, GatewayError> {
        ISmartWallet::new(wallet, self.provider.clone())
            .nonce()
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))
    }

    async fn domain_separator(&self, wallet: Address) -> Result<B256, GatewayError> {
        ISmartWallet::new(wallet, self.provider.clone())
            .DOMAIN_SEPARATOR()
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))
    }

    async fn native_balance(&self, address: Address) -> Result<U256, GatewayError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| GatewayError::RpcError(e.to_string()))
    }

    async fn token_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<TokenBalance, GatewayError> {
        Erc20Contract::new(&self.provider, token)
            .balance_of(owner)
            .await
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, GatewayError> {
        self.provider
            .estimate_gas(Self::to_tx_request(call))
            .await
            .map_err(|e| GatewayError::RpcError(format!("Gas estimation failed: {}", e)))
    }

    async fn send_transaction(&self, call: &CallRequest) -> Result<TxHash, GatewayError> {
        let tx = Self::to_tx_request(call);

        let pending = match self.local_signer(call.from) {
            Some(signer) => {
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(self.rpc_url.clone());
                provider.send_transaction(tx).await
            }
            None => self.provider.send_transaction(tx).await,
        }
        .map_err(|e| GatewayError::TransactionFailed(format!("Failed to send: {}", e)))?;

        let tx_hash = *pending.tx_hash();
        tracing::info!(
            from = %call.from,
            to = %call.to,
            tx_hash = %tx_hash,
            explorer = %self.network.tx_url(&tx_hash.to_string()),
            "Transaction submitted"
        );
        Ok(tx_hash)
    }

    fn register_signer(&self, signer: PrivateKeySigner) {
        let address = signer.address();
        if let Ok(mut signers) = self.signers.write() {
            signers.insert(address, signer);
            tracing::debug!(address = %address, "Registered local signer");
        }
    }

    fn remove_signer(&self, address: Address) {
        if let Ok(mut signers) = self.signers.write() {
            if signers.remove(&address).is_some() {
                tracing::debug!(address = %address, "Removed local signer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;

    #[test]
    fn rejects_malformed_rpc_url() {
        let network = NetworkConfig {
            rpc_url: "not a url".to_string(),
            ..NetworkConfig::default()
        };
        let result = AlloyChainGateway::new(network, ContractAddresses::default());
        assert!(matches!(result, Err(GatewayError::InvalidRpcUrl(_))));
    }

    #[test]
    fn registered_signer_is_looked_up_by_address() {
        let gateway =
            AlloyChainGateway::new(NetworkConfig::default(), ContractAddresses::default()).unwrap();
        let signer = PrivateKeySigner::random();
        let address = signer.address();

        assert!(gateway.local_signer(address).is_none());
        gateway.register_signer(signer);
        assert!(gateway.local_signer(address).is_some());
        gateway.remove_signer(address);
        assert!(gateway.local_signer(address).is_none());
    }

    #[test]
    fn tx_request_carries_call_fields() {
        let call = CallRequest {
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            data: Bytes::from(vec![0xde, 0xad]),
            value: U256::from(7),
        };
        let tx = AlloyChainGateway::to_tx_request(&call);
        assert_eq!(tx.from, Some(Address::repeat_byte(1)));
        assert_eq!(tx.value, Some(U256::from(7)));
        assert_eq!(tx.input.input().map(|b| b.len()), Some(2));
    }
}
