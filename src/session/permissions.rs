// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session permission bitmask.
//!
//! Bit values are fixed by the session registry contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// One grantable session capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Execute,
    ExecuteBatch,
    TransferEth,
    TransferErc20,
    CallContract,
}

/// Every permission bit set.
pub const ALL_PERMISSIONS: u32 = 0b1_1111;

impl Permission {
    /// All permissions in bit order.
    pub const ALL: [Permission; 5] = [
        Permission::Execute,
        Permission::ExecuteBatch,
        Permission::TransferEth,
        Permission::TransferErc20,
        Permission::CallContract,
    ];

    pub const fn bit(self) -> u32 {
        match self {
            Permission::Execute => 1,
            Permission::ExecuteBatch => 2,
            Permission::TransferEth => 4,
            Permission::TransferErc20 => 8,
            Permission::CallContract => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Permission::Execute => "EXECUTE",
            Permission::ExecuteBatch => "EXECUTE_BATCH",
            Permission::TransferEth => "TRANSFER_ETH",
            Permission::TransferErc20 => "TRANSFER_ERC20",
            Permission::CallContract => "CALL_CONTRACT",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Permission {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Permission::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| WalletError::UnknownPermission(wanted.to_string()))
    }
}

/// OR together the bits of `flags`.
pub fn encode(flags: &[Permission]) -> u32 {
    flags.iter().fold(0, |mask, p| mask | p.bit())
}

/// Encode permission names, failing on the first unknown one.
pub fn encode_names<S: AsRef<str>>(names: &[S]) -> Result<u32, WalletError> {
    names.iter().try_fold(0, |mask, name| {
        Ok(mask | name.as_ref().parse::<Permission>()?.bit())
    })
}

/// Flags whose bit is set in `mask`, in bit order. Unknown bits are ignored.
pub fn decode(mask: u32) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| mask & p.bit() == p.bit())
        .collect()
}

/// `true` when `actual` grants every bit of `required`.
pub fn satisfies(actual: u32, required: u32) -> bool {
    actual & required == required
}

/// A mask is registrable when it is non-empty and uses only known bits.
pub fn is_valid_mask(mask: u32) -> bool {
    (1..=ALL_PERMISSIONS).contains(&mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_match_registry_layout() {
        assert_eq!(encode(&Permission::ALL), ALL_PERMISSIONS);
        assert_eq!(encode(&[Permission::Execute, Permission::TransferEth]), 5);
        assert_eq!(encode(&[]), 0);
    }

    #[test]
    fn decode_returns_fixed_order() {
        assert_eq!(
            decode(16 | 1 | 4),
            vec![
                Permission::Execute,
                Permission::TransferEth,
                Permission::CallContract
            ]
        );
        assert_eq!(decode(ALL_PERMISSIONS), Permission::ALL.to_vec());
        assert!(decode(0).is_empty());
        // High bits outside the layout are ignored
        assert_eq!(decode(1 << 10 | 2), vec![Permission::ExecuteBatch]);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(
            encode_names(&["execute", "EXECUTE_BATCH"]).unwrap(),
            3
        );
        assert!(matches!(
            encode_names(&["EXECUTE", "MINT"]),
            Err(WalletError::UnknownPermission(name)) if name == "MINT"
        ));
    }

    #[test]
    fn satisfies_is_reflexive() {
        for mask in 0..=ALL_PERMISSIONS {
            assert!(satisfies(mask, mask));
            assert!(satisfies(mask, 0));
        }
    }

    #[test]
    fn satisfies_distributes_over_union() {
        for x in 0..=ALL_PERMISSIONS {
            for y in 0..=ALL_PERMISSIONS {
                for z in [0, 1, 6, 17, ALL_PERMISSIONS] {
                    assert_eq!(
                        satisfies(x, y | z),
                        satisfies(x, y) && satisfies(x, z),
                        "x={x} y={y} z={z}"
                    );
                }
            }
        }
    }

    #[test]
    fn mask_validity_bounds() {
        assert!(!is_valid_mask(0));
        assert!(is_valid_mask(1));
        assert!(is_valid_mask(ALL_PERMISSIONS));
        assert!(!is_valid_mask(ALL_PERMISSIONS + 1));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Permission::TransferErc20).unwrap();
        assert_eq!(json, "\"TRANSFER_ERC20\"");
        let back: Permission = serde_json::from_str("\"CALL_CONTRACT\"").unwrap();
        assert_eq!(back, Permission::CallContract);
    }
}
