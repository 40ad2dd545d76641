// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Client
//!
//! Entry point for applications: connects through a [`SigningAuthority`],
//! resolves the owner's smart wallet, establishes a session key and routes
//! calls.
//!
//! ## Connect Flow
//!
//! 1. `eth_requestAccounts` on the authority; the first account is the owner
//! 2. `eth_chainId` must equal the configured chain exactly
//! 3. Owner → smart wallet through the wallet registry
//! 4. Wallet state (owner, nonce, deployment)
//! 5. Restore a stored session (own, then cross-app), else create one. Creating
//!    a session is the only owner approval the flow asks for.
//!
//! Authorities holding the owner key locally (the vault) hand it to the
//! gateway for the lifetime of the connection, so registration and direct
//! calls are signed in-process. Injected providers sign on their side.
//!
//! ## Authority Notifications
//!
//! - Empty account list: disconnect
//! - Different account: reconnect as that account (`auto_reconnect`), else
//!   disconnect
//! - Chain drift: disconnect and emit an error event

use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::authority::{request_accounts, request_chain_id, AuthorityNotification, SigningAuthority};
use crate::chain::{format_amount, ChainGateway, TokenBalance, WalletState};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::{WalletError, WalletResult};
use crate::events::{ClientEvent, EventBus};
use crate::funding::{FundingStatus, GasFundingMonitor};
use crate::router::{Route, TransactionRouter, TxRequest, TxResult};
use crate::session::digest::domain_separator;
use crate::session::{DigestSigner, SessionInfo, SessionKeyManager, SessionStore};
use crate::storage::ScopedStore;

const NATIVE_SYMBOL: &str = "AVAX";
const NATIVE_NAME: &str = "Avalanche";
const NATIVE_DECIMALS: u8 = 18;

/// Summary returned by [`WalletClient::connect`].
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub owner: Address,
    pub smart_wallet: Address,
    pub chain_id: u64,
    pub wallet_state: WalletState,
    pub session: Option<SessionInfo>,
    /// `true` when a new session was registered during this connect.
    pub session_created: bool,
}

#[derive(Clone)]
struct Connection {
    authority: Arc<dyn SigningAuthority>,
    owner: Address,
    smart_wallet: Address,
    chain_id: u64,
    wallet_state: WalletState,
}

impl Connection {
    fn route(&self) -> Route {
        Route {
            owner: self.owner,
            wallet: self.smart_wallet,
        }
    }
}

pub struct WalletClient {
    config: ClientConfig,
    gateway: Arc<dyn ChainGateway>,
    router: TransactionRouter,
    funding: GasFundingMonitor,
    events: EventBus,
    session: Mutex<SessionKeyManager>,
    connection: RwLock<Option<Connection>>,
}

impl WalletClient {
    /// Client over `profile`, with sessions under its `sessions` namespace.
    pub fn new(
        config: ClientConfig,
        gateway: Arc<dyn ChainGateway>,
        profile: ScopedStore,
    ) -> WalletResult<Self> {
        Self::with_clock(config, gateway, profile, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ClientConfig,
        gateway: Arc<dyn ChainGateway>,
        profile: ScopedStore,
        clock: Arc<dyn Clock>,
    ) -> WalletResult<Self> {
        config.validate()?;
        let session = SessionKeyManager::new(
            config.app_id.clone(),
            config.required_mask(),
            config.session_duration_secs,
            config.contracts.session_registry,
            SessionStore::new(profile.scope("sessions")),
            gateway.clone(),
            clock.clone(),
        )?;

        Ok(Self {
            router: TransactionRouter::new(gateway.clone(), clock),
            funding: GasFundingMonitor::new(gateway.clone()),
            events: EventBus::new(),
            session: Mutex::new(session),
            connection: RwLock::new(None),
            gateway,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    async fn current(&self) -> WalletResult<Connection> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(WalletError::WalletNotConnected)
    }

    /// Emit an error event for a failed operation and pass the result on.
    fn report<T>(&self, result: WalletResult<T>) -> WalletResult<T> {
        if let Err(e) = &result {
            self.events.emit(ClientEvent::Error {
                kind: e.kind(),
                message: e.to_string(),
            });
        }
        result
    }

    /// Connect through `authority`. Fails with
    /// [`WalletError::AlreadyInitialized`] while connected.
    pub async fn connect(&self, authority: Arc<dyn SigningAuthority>) -> WalletResult<ConnectionInfo> {
        let result = self.establish(authority).await;
        self.report(result)
    }

    async fn establish(&self, authority: Arc<dyn SigningAuthority>) -> WalletResult<ConnectionInfo> {
        let mut connection = self.connection.write().await;
        if connection.is_some() {
            return Err(WalletError::AlreadyInitialized);
        }

        let owner = request_accounts(authority.as_ref())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::Provider("authority returned no accounts".to_string()))?;

        let chain_id = request_chain_id(authority.as_ref()).await?;
        let expected = self.config.network.chain_id;
        if chain_id != expected {
            return Err(WalletError::ChainMismatch {
                expected,
                actual: chain_id,
            });
        }

        let installed = self.install_owner_key(authority.as_ref(), owner).await?;
        let info = match self.bind(&mut connection, authority, owner, chain_id).await {
            Ok(info) => info,
            Err(e) => {
                if installed {
                    self.gateway.remove_signer(owner);
                }
                return Err(e);
            }
        };
        drop(connection);

        info!(
            owner = %owner,
            smart_wallet = %info.smart_wallet,
            chain_id,
            session_created = info.session_created,
            local_signer = installed,
            "Wallet connected"
        );
        self.events.emit(ClientEvent::Connected {
            owner,
            smart_wallet: info.smart_wallet,
            chain_id,
        });
        Ok(info)
    }

    /// Hand the authority's local owner key, if it has one, to the gateway so
    /// owner transactions are signed with it.
    async fn install_owner_key(&self, authority: &dyn SigningAuthority, owner: Address) -> WalletResult<bool> {
        let Some(key) = authority
            .account_signer()
            .await?
            .and_then(DigestSigner::into_account_key)
        else {
            return Ok(false);
        };
        if key.address() != owner {
            return Err(WalletError::Provider(format!(
                "authority signer {} does not match account {owner}",
                key.address()
            )));
        }
        self.gateway.register_signer(key);
        Ok(true)
    }

    /// Resolve the wallet, adopt or register a session and record the
    /// connection in `slot`.
    async fn bind(
        &self,
        slot: &mut Option<Connection>,
        authority: Arc<dyn SigningAuthority>,
        owner: Address,
        chain_id: u64,
    ) -> WalletResult<ConnectionInfo> {
        let smart_wallet = self
            .gateway
            .resolve_smart_wallet(owner)
            .await?
            .ok_or(WalletError::SmartWalletNotFound(owner))?;
        let wallet_state = self.gateway.wallet_state(smart_wallet).await?;
        self.check_domain(smart_wallet).await;

        let mut session = self.session.lock().await;
        let mut session_created = false;
        if !session.restore_session(smart_wallet)? {
            let created = session.create_session(owner, smart_wallet).await?;
            self.events.emit(ClientEvent::SessionCreated {
                signer: created.info.signer_address,
                valid_until: created.info.valid_until,
                tx_hash: created.tx_hash,
            });
            session_created = true;
        }
        let session_info = session.session_info();
        drop(session);

        *slot = Some(Connection {
            authority,
            owner,
            smart_wallet,
            chain_id,
            wallet_state: wallet_state.clone(),
        });

        Ok(ConnectionInfo {
            owner,
            smart_wallet,
            chain_id,
            wallet_state,
            session: session_info,
            session_created,
        })
    }

    /// Warn when the wallet's domain separator differs from the configured
    /// domain; session signatures would not verify.
    async fn check_domain(&self, wallet: Address) {
        let expected = domain_separator(&self.config.domain_name, wallet, self.config.network.chain_id);
        match self.gateway.domain_separator(wallet).await {
            Ok(actual) if actual == expected => {}
            Ok(actual) => warn!(
                wallet = %wallet,
                expected = %expected,
                actual = %actual,
                domain = %self.config.domain_name,
                "Wallet domain separator differs from configured domain"
            ),
            Err(e) => debug!(wallet = %wallet, error = %e, "Domain separator check skipped"),
        }
    }

    /// Clear the session for the connected wallet and drop the connection.
    pub async fn disconnect(&self) -> WalletResult<()> {
        let Some(previous) = self.connection.write().await.take() else {
            return Ok(());
        };
        self.gateway.remove_signer(previous.owner);
        self.session.lock().await.clear_session(previous.smart_wallet)?;

        info!(owner = %previous.owner, smart_wallet = %previous.smart_wallet, "Wallet disconnected");
        self.events.emit(ClientEvent::Disconnected);
        Ok(())
    }

    /// Drop the connection but keep stored sessions for later restoration.
    async fn detach(&self) -> Option<Connection> {
        let previous = self.connection.write().await.take();
        if let Some(previous) = &previous {
            self.gateway.remove_signer(previous.owner);
        }
        self.session.lock().await.detach();
        if previous.is_some() {
            self.events.emit(ClientEvent::Disconnected);
        }
        previous
    }

    /// Route one call from the connected smart wallet.
    pub async fn execute(&self, request: TxRequest) -> WalletResult<TxResult> {
        let result = self.execute_inner(request).await;
        self.report(result)
    }

    async fn execute_inner(&self, request: TxRequest) -> WalletResult<TxResult> {
        let connection = self.current().await?;
        self.funding
            .assert_sufficient_balance(connection.smart_wallet, request.value)
            .await?;

        let session = self.session.lock().await;
        let result = self.router.execute(&session, connection.route(), &request).await?;
        drop(session);

        self.events.emit(ClientEvent::TxSubmitted {
            hash: result.hash,
            nonce: result.nonce,
            path: result.path,
        });
        Ok(result)
    }

    /// Route several calls as one `executeBatch` transaction.
    pub async fn execute_batch(&self, requests: Vec<TxRequest>) -> WalletResult<Vec<TxResult>> {
        let result = self.execute_batch_inner(requests).await;
        self.report(result)
    }

    async fn execute_batch_inner(&self, requests: Vec<TxRequest>) -> WalletResult<Vec<TxResult>> {
        let connection = self.current().await?;
        let total = requests
            .iter()
            .fold(U256::ZERO, |sum, r| sum.saturating_add(r.value));
        self.funding
            .assert_sufficient_balance(connection.smart_wallet, total)
            .await?;

        let results = self.router.execute_batch(connection.route(), &requests).await?;
        for result in &results {
            self.events.emit(ClientEvent::TxSubmitted {
                hash: result.hash,
                nonce: result.nonce,
                path: result.path,
            });
        }
        Ok(results)
    }

    /// Native balance of the connected smart wallet.
    pub async fn get_balance(&self) -> WalletResult<TokenBalance> {
        let connection = self.current().await?;
        let balance = self.gateway.native_balance(connection.smart_wallet).await?;
        Ok(TokenBalance {
            symbol: NATIVE_SYMBOL.to_string(),
            name: NATIVE_NAME.to_string(),
            balance_raw: balance,
            balance_formatted: format_amount(balance, NATIVE_DECIMALS),
            decimals: NATIVE_DECIMALS,
            contract_address: None,
        })
    }

    pub async fn get_token_balance(&self, token: Address) -> WalletResult<TokenBalance> {
        let connection = self.current().await?;
        Ok(self.gateway.token_balance(token, connection.smart_wallet).await?)
    }

    pub async fn get_nonce(&self) -> WalletResult<U256> {
        let connection = self.current().await?;
        Ok(self.gateway.nonce(connection.smart_wallet).await?)
    }

    /// Funding of the owner account, which pays gas for every submission.
    pub async fn check_gas(&self) -> WalletResult<FundingStatus> {
        let connection = self.current().await?;
        self.funding.check_funding(connection.owner).await
    }

    /// Re-read and cache the wallet state.
    pub async fn wallet_state(&self) -> WalletResult<WalletState> {
        let connection = self.current().await?;
        let state = self.gateway.wallet_state(connection.smart_wallet).await?;
        if let Some(current) = self.connection.write().await.as_mut() {
            if current.smart_wallet == state.address {
                current.wallet_state = state.clone();
            }
        }
        Ok(state)
    }

    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.session.lock().await.session_info()
    }

    /// Revoke the current session key on-chain. The connection stays up and
    /// later calls take the direct path.
    pub async fn revoke_session(&self) -> WalletResult<TxHash> {
        let result: WalletResult<TxHash> = async {
            let connection = self.current().await?;
            self.session.lock().await.revoke_session(connection.owner).await
        }
        .await;
        self.report(result)
    }

    /// React to an authority notification.
    pub async fn handle_notification(&self, notification: AuthorityNotification) -> WalletResult<()> {
        let Some(connection) = self.connection.read().await.clone() else {
            debug!(?notification, "Notification ignored while disconnected");
            return Ok(());
        };

        match notification {
            AuthorityNotification::AccountsChanged(accounts) => match accounts.first() {
                None => self.disconnect().await,
                Some(account) if *account == connection.owner => Ok(()),
                Some(account) if self.config.auto_reconnect => {
                    info!(from = %connection.owner, to = %account, "Account switched, reconnecting");
                    self.detach().await;
                    self.connect(connection.authority).await.map(|_| ())
                }
                Some(_) => self.disconnect().await,
            },
            AuthorityNotification::ChainChanged(chain_id) if chain_id != connection.chain_id => {
                warn!(expected = connection.chain_id, actual = chain_id, "Chain changed, disconnecting");
                self.disconnect().await?;
                let _ = self.report::<()>(Err(WalletError::ChainMismatch {
                    expected: self.config.network.chain_id,
                    actual: chain_id,
                }));
                Ok(())
            }
            AuthorityNotification::ChainChanged(_) => Ok(()),
            AuthorityNotification::Disconnected => self.disconnect().await,
        }
    }

    /// Drive [`Self::handle_notification`] from `notifications` until
    /// `shutdown` is cancelled or the channel closes.
    pub fn spawn_notification_pump(
        self: &Arc<Self>,
        mut notifications: broadcast::Receiver<AuthorityNotification>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    received = notifications.recv() => received,
                };

                match notification {
                    Ok(notification) => {
                        if let Err(e) = client.handle_notification(notification).await {
                            warn!(error = %e, "Failed to handle authority notification");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Authority notifications dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Authority notification channel closed");
                        return;
                    }
                }
            }
        })
    }
}
