// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only inspection of an owner's smart wallet.
//!
//! Usage: `relational-wallet-inspect [OWNER_ADDRESS]`. The owner may also be
//! given through `OWNER_ADDRESS`; otherwise the active account of the local
//! vault profile is used.

use std::env;
use std::sync::Arc;

use alloy::primitives::Address;
use serde_json::json;
use tracing::info;

use relational_smart_wallet::chain::{AlloyChainGateway, ChainGateway};
use relational_smart_wallet::config::{init_tracing, ClientConfig};
use relational_smart_wallet::error::{parse_address, WalletError, WalletResult};
use relational_smart_wallet::funding::GasFundingMonitor;
use relational_smart_wallet::session::SessionStore;
use relational_smart_wallet::vault::KeyVault;

const OWNER_ENV: &str = "OWNER_ADDRESS";

fn owner_argument() -> Option<String> {
    env::args().nth(1).or_else(|| env::var(OWNER_ENV).ok())
}

#[tokio::main]
async fn main() -> WalletResult<()> {
    init_tracing();

    let config = ClientConfig::from_env()?;
    let profile = config.open_profile_store()?;
    let vault = KeyVault::new(profile.scope("vault"));

    let owner: Address = match owner_argument() {
        Some(raw) => parse_address(&raw)?,
        None => vault
            .active_account()?
            .map(|account| account.address)
            .ok_or_else(|| WalletError::validation(format!("no owner given and no vault account; pass an address or set {OWNER_ENV}")))?,
    };

    let gateway: Arc<dyn ChainGateway> =
        Arc::new(AlloyChainGateway::new(config.network.clone(), config.contracts.clone())?);
    let chain_id = gateway.chain_id().await?;
    if chain_id != config.network.chain_id {
        return Err(WalletError::ChainMismatch {
            expected: config.network.chain_id,
            actual: chain_id,
        });
    }
    info!(owner = %owner, chain_id, rpc = %config.network.rpc_url, "Inspecting smart wallet");

    let funding = GasFundingMonitor::new(gateway.clone());
    let owner_funding = funding.check_funding(owner).await?;

    let Some(wallet) = gateway.resolve_smart_wallet(owner).await? else {
        println!(
            "{}",
            json!({ "owner": owner, "smart_wallet": null, "owner_funding": owner_funding })
        );
        return Ok(());
    };

    let state = gateway.wallet_state(wallet).await?;
    let wallet_funding = funding.check_funding(wallet).await?;
    let sessions: Vec<_> = SessionStore::new(profile.scope("sessions"))
        .find_all(wallet, chrono::Utc::now().timestamp())?
        .into_iter()
        .map(|credential| {
            json!({
                "app_id": credential.app_id,
                "signer": credential.signer_address,
                "valid_until": credential.valid_until,
            })
        })
        .collect();

    println!(
        "{}",
        json!({
            "owner": owner,
            "smart_wallet": wallet,
            "state": state,
            "owner_funding": owner_funding,
            "wallet_funding": wallet_funding,
            "local_sessions": sessions,
        })
    );
    Ok(())
}
