// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for the smart-wallet contracts.
//!
//! This module provides:
//! - The [`ChainGateway`] seam every higher layer talks to
//! - Contract ABIs for the wallet registry, session registry and wallets
//! - An alloy HTTP implementation of the gateway
//! - ERC-20 reads and amount formatting

pub mod amounts;
pub mod client;
pub mod contracts;
pub mod erc20;
pub mod gateway;
pub mod types;

pub use amounts::format_amount;
pub use client::AlloyChainGateway;
pub use gateway::{ChainGateway, GatewayError};
pub use types::*;
