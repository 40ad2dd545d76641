// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-712 `Execute` digest, byte-compatible with the smart wallet's
//! `executeWithSignature` verifier.
//!
//! ```text
//! domainSeparator = keccak256(abi.encode(DOMAIN_TYPEHASH, keccak256(name),
//!                             keccak256("1"), chainId, wallet))
//! structHash      = keccak256(abi.encode(EXECUTE_TYPEHASH, to, value,
//!                             keccak256(data), nonce, deadline))
//! digest          = keccak256(0x19 0x01 || domainSeparator || structHash)
//! ```
//!
//! All functions here are pure.

use alloy::primitives::{b256, keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;

/// keccak256("EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)")
pub const DOMAIN_TYPEHASH: B256 =
    b256!("8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f");

/// keccak256("Execute(address to,uint256 value,bytes data,uint256 nonce,uint256 deadline)")
pub const EXECUTE_TYPEHASH: B256 =
    b256!("c7bebd14569681206f6c231f5fc7f6cf73a72dd47bc5b7bea3d21ad0080a2ff7");

/// EIP-712 domain version of the wallet contract.
pub const DOMAIN_VERSION: &str = "1";

/// The typed `Execute` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub nonce: U256,
    pub deadline: U256,
}

pub fn domain_separator(name: &str, wallet: Address, chain_id: u64) -> B256 {
    keccak256(
        (
            DOMAIN_TYPEHASH,
            keccak256(name.as_bytes()),
            keccak256(DOMAIN_VERSION.as_bytes()),
            U256::from(chain_id),
            wallet,
        )
            .abi_encode(),
    )
}

pub fn struct_hash(request: &ExecuteRequest) -> B256 {
    keccak256(
        (
            EXECUTE_TYPEHASH,
            request.to,
            request.value,
            keccak256(&request.data),
            request.nonce,
            request.deadline,
        )
            .abi_encode(),
    )
}

pub fn execute_digest(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut preimage = [0u8; 66];
    preimage[0] = 0x19;
    preimage[1] = 0x01;
    preimage[2..34].copy_from_slice(domain_separator.as_slice());
    preimage[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(preimage)
}

/// Digest for `request` under an already known domain separator.
pub fn digest_for(domain_separator: B256, request: &ExecuteRequest) -> B256 {
    execute_digest(domain_separator, struct_hash(request))
}
