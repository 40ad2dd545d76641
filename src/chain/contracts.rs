// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ABIs of the platform contracts.
//!
//! The contracts themselves are deployed and immutable; these definitions
//! only encode calls and decode returns.

use alloy::sol;

sol! {
    /// Owner EOA -> smart wallet lookup, populated by the provisioning worker.
    #[sol(rpc)]
    interface IWalletRegistry {
        function walletOf(address owner) external view returns (address);
    }

    /// Session-key registration, keyed by (wallet, signer).
    #[sol(rpc)]
    interface ISessionRegistry {
        function registerSession(
            address wallet,
            address signer,
            uint256 validAfter,
            uint256 validUntil,
            uint256 permissions
        ) external;
        function revokeSession(address wallet, address signer) external;
    }

    /// The smart wallet. `executeWithSignature` verifies an EIP-712
    /// `Execute` digest signed by a registered session key.
    #[sol(rpc)]
    interface ISmartWallet {
        function owner() external view returns (address);
        function nonce() external view returns (uint256);
        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function execute(address to, uint256 value, bytes data) external returns (bytes);
        function executeBatch(address[] targets, uint256[] values, bytes[] datas) external;
        function executeWithSignature(
            address to,
            uint256 value,
            bytes data,
            uint256 deadline,
            bytes signature
        ) external returns (bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn selectors_match_signatures() {
        assert_eq!(
            ISmartWallet::executeCall::SIGNATURE,
            "execute(address,uint256,bytes)"
        );
        assert_eq!(
            ISmartWallet::executeBatchCall::SIGNATURE,
            "executeBatch(address[],uint256[],bytes[])"
        );
        assert_eq!(
            ISessionRegistry::registerSessionCall::SIGNATURE,
            "registerSession(address,address,uint256,uint256,uint256)"
        );
    }

    #[test]
    fn register_call_round_trips() {
        let call = ISessionRegistry::registerSessionCall {
            wallet: Address::repeat_byte(0x11),
            signer: Address::repeat_byte(0x22),
            validAfter: U256::from(100),
            validUntil: U256::from(200),
            permissions: U256::from(31),
        };
        let encoded = call.abi_encode();
        assert_eq!(&encoded[..4], ISessionRegistry::registerSessionCall::SELECTOR.as_slice());

        let decoded = ISessionRegistry::registerSessionCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.signer, Address::repeat_byte(0x22));
        assert_eq!(decoded.validUntil, U256::from(200));
    }
}
