// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 token contract reads.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::amounts::format_amount;
use super::gateway::GatewayError;
use super::types::TokenBalance;

// Define the ERC-20 interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
    address: Address,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    pub fn new(provider: &P, address: Address) -> Self {
        let contract = IERC20::new(address, provider.clone());
        Self { contract, address }
    }

    /// Get the token name.
    pub async fn name(&self) -> Result<String, GatewayError> {
        self.contract
            .name()
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))
    }

    /// Get the token symbol.
    pub async fn symbol(&self) -> Result<String, GatewayError> {
        self.contract
            .symbol()
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))
    }

    /// Get the token decimals.
    pub async fn decimals(&self) -> Result<u8, GatewayError> {
        self.contract
            .decimals()
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))
    }

    /// Get the balance of an address.
    ///
    /// Metadata reads are best-effort; only the balance call itself can fail.
    pub async fn balance_of(&self, owner: Address) -> Result<TokenBalance, GatewayError> {
        let name: String = self.name().await.unwrap_or_else(|_| "Unknown".to_string());
        let symbol: String = self.symbol().await.unwrap_or_else(|_| "???".to_string());
        let decimals: u8 = self.decimals().await.unwrap_or(18);

        let balance: U256 = self
            .contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| GatewayError::ContractError(e.to_string()))?;

        Ok(TokenBalance {
            symbol,
            name,
            balance_raw: balance,
            balance_formatted: format_amount(balance, decimals),
            decimals,
            contract_address: Some(self.address),
        })
    }
}
