// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Display formatting of base-unit amounts.

use alloy::primitives::U256;

const FRACTION_DIGITS: usize = 6;

/// Format wei (or token units) to a human-readable amount.
///
/// The fractional part is truncated to six places; an amount below that
/// resolution shows its whole part only.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        return whole.to_string();
    }

    let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
    let shown = &decimal_str[..decimal_str.len().min(FRACTION_DIGITS)];
    let trimmed = shown.trim_end_matches('0');
    if trimmed.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{trimmed}")
    }
}
