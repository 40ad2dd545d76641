// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Native balance checks made before submitting wallet calls.
//!
//! A call whose value plus gas cannot be covered would revert on-chain, so
//! the shortfall is reported locally as [`WalletError::InsufficientBalance`].

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde::Serialize;
use tracing::{debug, warn};

use crate::chain::{format_amount, CallRequest, ChainGateway};
use crate::error::{WalletError, WalletResult};

/// Gas units assumed when estimation fails.
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Gas price used for the local cost buffer (25 gwei).
pub const BUFFER_GAS_PRICE_WEI: u64 = 25_000_000_000;

/// At or below this balance (0.01 native unit) funding is reported low.
pub const LOW_BALANCE_THRESHOLD_WEI: u64 = 10_000_000_000_000_000;

const NATIVE_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingLevel {
    Sufficient,
    Low,
    Zero,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingStatus {
    pub address: Address,
    pub balance_wei: U256,
    pub balance_formatted: String,
    pub level: FundingLevel,
}

impl FundingStatus {
    pub fn needs_funding(&self) -> bool {
        self.level != FundingLevel::Sufficient
    }
}

/// Classify a balance against [`LOW_BALANCE_THRESHOLD_WEI`].
pub fn funding_level(balance: U256) -> FundingLevel {
    if balance.is_zero() {
        FundingLevel::Zero
    } else if balance <= U256::from(LOW_BALANCE_THRESHOLD_WEI) {
        FundingLevel::Low
    } else {
        FundingLevel::Sufficient
    }
}

/// Fixed gas cost added on top of a call's value.
pub fn gas_buffer() -> U256 {
    U256::from(DEFAULT_GAS_LIMIT) * U256::from(BUFFER_GAS_PRICE_WEI)
}

pub struct GasFundingMonitor {
    gateway: Arc<dyn ChainGateway>,
}

impl GasFundingMonitor {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }

    pub async fn check_funding(&self, address: Address) -> WalletResult<FundingStatus> {
        let balance = self.gateway.native_balance(address).await?;
        let level = funding_level(balance);
        debug!(address = %address, balance = %balance, ?level, "Funding checked");

        Ok(FundingStatus {
            address,
            balance_wei: balance,
            balance_formatted: format_amount(balance, NATIVE_DECIMALS),
            level,
        })
    }

    /// Fail if `address` cannot cover `value` plus the gas buffer.
    pub async fn assert_sufficient_balance(&self, address: Address, value: U256) -> WalletResult<()> {
        let available = self.gateway.native_balance(address).await?;
        let required = value.saturating_add(gas_buffer());
        if available < required {
            return Err(WalletError::InsufficientBalance { required, available });
        }
        Ok(())
    }

    /// Gas estimate for `call`, or [`DEFAULT_GAS_LIMIT`] when estimation fails.
    pub async fn estimate_gas(&self, call: &CallRequest) -> u64 {
        match self.gateway.estimate_gas(call).await {
            Ok(gas) => gas,
            Err(e) => {
                warn!(to = %call.to, error = %e, fallback = DEFAULT_GAS_LIMIT, "Gas estimation failed, using fallback");
                DEFAULT_GAS_LIMIT
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;

    const WALLET: Address = Address::repeat_byte(0x11);

    fn monitor() -> (GasFundingMonitor, Arc<MockGateway>) {
        let gateway = Arc::new(MockGateway::new());
        (GasFundingMonitor::new(gateway.clone()), gateway)
    }

    #[test]
    fn levels_around_threshold() {
        let threshold = U256::from(LOW_BALANCE_THRESHOLD_WEI);
        assert_eq!(funding_level(U256::ZERO), FundingLevel::Zero);
        assert_eq!(funding_level(U256::from(1)), FundingLevel::Low);
        assert_eq!(funding_level(threshold), FundingLevel::Low);
        assert_eq!(funding_level(threshold + U256::from(1)), FundingLevel::Sufficient);
    }

    #[test]
    fn buffer_is_five_thousandths() {
        // 200_000 gas * 25 gwei
        assert_eq!(gas_buffer(), U256::from(5_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn check_funding_reports_formatted_balance() {
        let (monitor, gateway) = monitor();
        gateway.set_balance(WALLET, U256::from(1_500_000_000_000_000_000u64));

        let status = monitor.check_funding(WALLET).await.unwrap();
        assert_eq!(status.level, FundingLevel::Sufficient);
        assert_eq!(status.balance_formatted, "1.5");
        assert!(!status.needs_funding());

        let empty = monitor.check_funding(Address::repeat_byte(0x99)).await.unwrap();
        assert_eq!(empty.level, FundingLevel::Zero);
        assert!(empty.needs_funding());
    }

    #[tokio::test]
    async fn balance_must_cover_value_and_buffer() {
        let (monitor, gateway) = monitor();
        let value = U256::from(1_000_000_000_000_000u64);
        gateway.set_balance(WALLET, value + gas_buffer());
        monitor.assert_sufficient_balance(WALLET, value).await.unwrap();

        gateway.set_balance(WALLET, value + gas_buffer() - U256::from(1));
        match monitor.assert_sufficient_balance(WALLET, value).await {
            Err(WalletError::InsufficientBalance { required, available }) => {
                assert_eq!(required, value + gas_buffer());
                assert_eq!(available, required - U256::from(1));
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn estimate_falls_back_on_failure() {
        let (monitor, gateway) = monitor();
        let call = CallRequest::new(Address::repeat_byte(0xaa), WALLET, vec![]);
        assert_eq!(monitor.estimate_gas(&call).await, 90_000);

        gateway.set_gas_estimate(None);
        assert_eq!(monitor.estimate_gas(&call).await, DEFAULT_GAS_LIMIT);
    }
}
