// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Router
//!
//! Picks how a call reaches the smart wallet:
//!
//! - **Meta-transaction**: with an active session, the call is authorized by
//!   a session-key signature over the EIP-712 `Execute` digest and submitted
//!   as `executeWithSignature` without prompting the owner.
//! - **Direct**: without a session, `execute(to, value, data)` is submitted
//!   from the owner and needs the owner's approval.
//! - **Batch**: always direct. There is no signed batch variant.
//!
//! Submission is fire-and-forget: `success` means the node accepted the
//! transaction, and `return_data` is empty because no receipt is awaited.
//!
//! Two concurrent `execute` calls may read the same nonce; callers serialize.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chain::contracts::ISmartWallet;
use crate::chain::{CallRequest, ChainGateway};
use crate::clock::Clock;
use crate::error::{WalletError, WalletResult};
use crate::session::digest::ExecuteRequest;
use crate::session::SessionKeyManager;

/// Lifetime of a meta-transaction signature, in seconds.
pub const META_TX_DEADLINE_SECS: u64 = 300;

/// A call to make from the smart wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
}

impl TxRequest {
    pub fn new(to: Address, value: U256, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value,
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    MetaTransaction,
    Direct,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxResult {
    pub hash: TxHash,
    /// Wallet nonce the call consumes.
    pub nonce: U256,
    pub success: bool,
    pub return_data: Bytes,
    pub path: ExecutionPath,
}

/// Owner EOA and smart wallet a call is routed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub owner: Address,
    pub wallet: Address,
}

pub struct TransactionRouter {
    gateway: Arc<dyn ChainGateway>,
    clock: Arc<dyn Clock>,
}

impl TransactionRouter {
    pub fn new(gateway: Arc<dyn ChainGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { gateway, clock }
    }

    /// Submit one call, through the session key when it is active.
    pub async fn execute(
        &self,
        session: &SessionKeyManager,
        route: Route,
        request: &TxRequest,
    ) -> WalletResult<TxResult> {
        if session.is_active() {
            self.execute_meta(session, route, request).await
        } else {
            self.execute_direct(route, request).await
        }
    }

    async fn execute_meta(
        &self,
        session: &SessionKeyManager,
        route: Route,
        request: &TxRequest,
    ) -> WalletResult<TxResult> {
        let (nonce, domain_separator) = tokio::try_join!(
            self.gateway.nonce(route.wallet),
            self.gateway.domain_separator(route.wallet),
        )?;
        let deadline = U256::from(self.clock.now().max(0) as u64) + U256::from(META_TX_DEADLINE_SECS);

        let typed = ExecuteRequest {
            to: request.to,
            value: request.value,
            data: request.data.clone(),
            nonce,
            deadline,
        };
        let signature = session.sign_execute_digest(domain_separator, &typed)?;
        debug!(wallet = %route.wallet, nonce = %nonce, "Routing via session key");

        let call = ISmartWallet::executeWithSignatureCall {
            to: request.to,
            value: request.value,
            data: request.data.clone(),
            deadline,
            signature,
        };
        let hash = self.submit(route, call.abi_encode()).await?;

        info!(wallet = %route.wallet, tx_hash = %hash, nonce = %nonce, "Meta-transaction submitted");
        Ok(TxResult {
            hash,
            nonce,
            success: true,
            return_data: Bytes::new(),
            path: ExecutionPath::MetaTransaction,
        })
    }

    async fn execute_direct(&self, route: Route, request: &TxRequest) -> WalletResult<TxResult> {
        let nonce = self.gateway.nonce(route.wallet).await?;
        debug!(wallet = %route.wallet, nonce = %nonce, "Routing via owner approval");

        let call = ISmartWallet::executeCall {
            to: request.to,
            value: request.value,
            data: request.data.clone(),
        };
        let hash = self.submit(route, call.abi_encode()).await?;

        info!(wallet = %route.wallet, tx_hash = %hash, nonce = %nonce, "Direct execution submitted");
        Ok(TxResult {
            hash,
            nonce,
            success: true,
            return_data: Bytes::new(),
            path: ExecutionPath::Direct,
        })
    }

    /// Submit several calls in one `executeBatch` transaction.
    ///
    /// Returns one result per request, all sharing the transaction hash, with
    /// nonces `nonce_before..nonce_before + N`.
    pub async fn execute_batch(&self, route: Route, requests: &[TxRequest]) -> WalletResult<Vec<TxResult>> {
        if requests.is_empty() {
            return Err(WalletError::validation("batch must contain at least one call"));
        }

        let nonce = self.gateway.nonce(route.wallet).await?;
        let call = ISmartWallet::executeBatchCall {
            targets: requests.iter().map(|r| r.to).collect(),
            values: requests.iter().map(|r| r.value).collect(),
            datas: requests.iter().map(|r| r.data.clone()).collect(),
        };
        let hash = self.submit(route, call.abi_encode()).await?;

        info!(
            wallet = %route.wallet,
            tx_hash = %hash,
            calls = requests.len(),
            "Batch submitted"
        );
        Ok((0..requests.len())
            .map(|i| TxResult {
                hash,
                nonce: nonce + U256::from(i),
                success: true,
                return_data: Bytes::new(),
                path: ExecutionPath::Batch,
            })
            .collect())
    }

    /// Calls are sent from the owner to the wallet with no attached value;
    /// transferred value comes out of the wallet's own balance.
    async fn submit(&self, route: Route, data: Vec<u8>) -> WalletResult<TxHash> {
        let call = CallRequest::new(route.owner, route.wallet, data);
        Ok(self.gateway.send_transaction(&call).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::digest::{digest_for, domain_separator};
    use crate::session::SessionStore;
    use crate::storage::{KeyValueStore, MemoryStore, ScopedStore};
    use crate::testing::{MockGateway, TEST_CHAIN_ID, TEST_DOMAIN};
    use alloy::primitives::{bytes, Signature};

    const T0: i64 = 1_700_000_000;
    const ROUTE: Route = Route {
        owner: Address::repeat_byte(0xaa),
        wallet: Address::repeat_byte(0x11),
    };

    struct Fixture {
        gateway: Arc<MockGateway>,
        router: TransactionRouter,
        session: SessionKeyManager,
    }

    fn fixture() -> Fixture {
        let backing: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        let clock = Arc::new(ManualClock::new(T0));
        gateway.set_nonce(ROUTE.wallet, 7);

        let session = SessionKeyManager::new(
            "app",
            3,
            0,
            Address::repeat_byte(0x5e),
            SessionStore::new(ScopedStore::new(backing, "sessions")),
            gateway.clone(),
            clock.clone(),
        )
        .unwrap();
        Fixture {
            router: TransactionRouter::new(gateway.clone(), clock),
            gateway,
            session,
        }
    }

    fn transfer() -> TxRequest {
        TxRequest::new(Address::repeat_byte(0x22), U256::from(1_000), bytes!("a9059cbb"))
    }

    #[tokio::test]
    async fn without_session_routes_direct() {
        let fx = fixture();
        let result = fx.router.execute(&fx.session, ROUTE, &transfer()).await.unwrap();
        assert_eq!(result.path, ExecutionPath::Direct);
        assert_eq!(result.nonce, U256::from(7));

        let sent = fx.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, ROUTE.owner);
        assert_eq!(sent[0].to, ROUTE.wallet);
        assert_eq!(sent[0].value, U256::ZERO);
        let call = ISmartWallet::executeCall::abi_decode(&sent[0].data).unwrap();
        assert_eq!(call.to, transfer().to);
        assert_eq!(call.value, U256::from(1_000));
    }

    #[tokio::test]
    async fn with_session_routes_meta_transaction() {
        let mut fx = fixture();
        let created = fx.session.create_session(ROUTE.owner, ROUTE.wallet).await.unwrap();

        let result = fx.router.execute(&fx.session, ROUTE, &transfer()).await.unwrap();
        assert_eq!(result.path, ExecutionPath::MetaTransaction);
        assert_eq!(result.nonce, U256::from(7));

        let sent = fx.gateway.sent();
        assert_eq!(sent.len(), 2);
        let call = ISmartWallet::executeWithSignatureCall::abi_decode(&sent[1].data).unwrap();
        assert_eq!(call.deadline, U256::from(T0 as u64 + META_TX_DEADLINE_SECS));

        let digest = digest_for(
            domain_separator(TEST_DOMAIN, ROUTE.wallet, TEST_CHAIN_ID),
            &ExecuteRequest {
                to: call.to,
                value: call.value,
                data: call.data.clone(),
                nonce: U256::from(7),
                deadline: call.deadline,
            },
        );
        let signature = Signature::try_from(call.signature.as_ref()).unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&digest).unwrap(),
            created.info.signer_address
        );
    }

    #[tokio::test]
    async fn batch_shares_hash_and_numbers_nonces() {
        let mut fx = fixture();
        let calls = vec![transfer(), transfer(), transfer()];

        let without = fx.router.execute_batch(ROUTE, &calls).await.unwrap();
        fx.session.create_session(ROUTE.owner, ROUTE.wallet).await.unwrap();
        let with = fx.router.execute_batch(ROUTE, &calls).await.unwrap();

        for results in [&without, &with] {
            assert_eq!(results.len(), 3);
            assert!(results.iter().all(|r| r.hash == results[0].hash));
            assert!(results.iter().all(|r| r.path == ExecutionPath::Batch));
            let nonces: Vec<_> = results.iter().map(|r| r.nonce).collect();
            assert_eq!(nonces, vec![U256::from(7), U256::from(8), U256::from(9)]);
        }

        let batch = ISmartWallet::executeBatchCall::abi_decode(&fx.gateway.sent()[0].data).unwrap();
        assert_eq!(batch.targets.len(), 3);
        assert_eq!(batch.datas[2], bytes!("a9059cbb"));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let fx = fixture();
        assert!(matches!(
            fx.router.execute_batch(ROUTE, &[]).await,
            Err(WalletError::Validation(_))
        ));
        assert!(fx.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_surfaces() {
        let fx = fixture();
        fx.gateway.fail_sends(true);
        assert!(matches!(
            fx.router.execute(&fx.session, ROUTE, &transfer()).await,
            Err(WalletError::Rpc(_))
        ));
    }
}
