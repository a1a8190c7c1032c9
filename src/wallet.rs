//! Wallet facade
//!
//! The operation surface callers use. Wires the store, ledger, rate
//! provider and auth service into one engine; every money-movement call
//! takes an [`OperationContext`] that is re-verified by the core. Outer
//! layers obtain that context from a login token via [`Wallet::authenticate`].

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    AuthService, InMemorySessionStore, PasswordService, PgSessionStore, Registration, Session,
    SessionStore,
};
use crate::domain::{OperationContext, Role, WalletResult};
use crate::engine::{
    BillPaymentCommand, DepositCommand, EngineSettings, ExchangeCommand, TransactionEngine,
    TransactionReceipt, TransferCommand, WithdrawCommand,
};
use crate::ledger::{InMemoryLedger, PgLedger, TransactionHistory, TransactionLedger};
use crate::rates::{ExchangeRateProvider, StaticRateProvider};
use crate::store::{
    AccountNumber, AccountStore, BalanceRecord, InMemoryAccountStore, PgAccountStore,
};

pub struct Wallet {
    store: Arc<dyn AccountStore>,
    auth: Arc<AuthService>,
    engine: TransactionEngine,
}

impl Wallet {
    /// Sessions are kept in process memory
    pub fn new(
        store: Arc<dyn AccountStore>,
        ledger: Arc<dyn TransactionLedger>,
        rates: Arc<dyn ExchangeRateProvider>,
        passwords: PasswordService,
        settings: EngineSettings,
    ) -> Self {
        Self::with_sessions(
            store,
            ledger,
            rates,
            Arc::new(InMemorySessionStore::new()),
            passwords,
            settings,
        )
    }

    pub fn with_sessions(
        store: Arc<dyn AccountStore>,
        ledger: Arc<dyn TransactionLedger>,
        rates: Arc<dyn ExchangeRateProvider>,
        sessions: Arc<dyn SessionStore>,
        passwords: PasswordService,
        settings: EngineSettings,
    ) -> Self {
        let auth = Arc::new(AuthService::new(
            Arc::clone(&store),
            sessions,
            passwords,
            settings.session_ttl,
        ));
        let engine = TransactionEngine::new(
            Arc::clone(&store),
            ledger,
            rates,
            Arc::clone(&auth),
            settings,
        );
        Self {
            store,
            auth,
            engine,
        }
    }

    /// Process-local backends
    pub fn in_memory(settings: EngineSettings, passwords: PasswordService) -> Self {
        Self::new(
            Arc::new(InMemoryAccountStore::new(
                settings.lock_timeout,
                settings.retry_policy(),
            )),
            Arc::new(InMemoryLedger::new()),
            Arc::new(StaticRateProvider::new(settings.exchange_commission_rate)),
            passwords,
            settings,
        )
    }

    /// Postgres-backed store, ledger and sessions
    pub fn postgres(pool: PgPool, settings: EngineSettings) -> Self {
        Self::with_sessions(
            Arc::new(PgAccountStore::with_settings(
                pool.clone(),
                settings.lock_timeout,
                settings.retry_policy(),
            )),
            Arc::new(PgLedger::new(pool.clone())),
            Arc::new(StaticRateProvider::new(settings.exchange_commission_rate)),
            Arc::new(PgSessionStore::new(pool)),
            PasswordService::default(),
            settings,
        )
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    // =========================================================================
    // Identity
    // =========================================================================

    pub async fn register_user(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> WalletResult<Registration> {
        self.auth.register_user(full_name, email, password, role).await
    }

    pub async fn login(&self, email: &str, password: &str) -> WalletResult<Session> {
        self.auth.login(email, password).await
    }

    /// Context for the user behind a login token
    pub async fn authenticate(&self, token: &str) -> WalletResult<OperationContext> {
        self.auth.authenticate(token).await
    }

    pub async fn logout(&self, token: &str) -> WalletResult<()> {
        self.auth.logout(token).await
    }

    pub async fn get_account_number(&self, user_id: Uuid) -> WalletResult<AccountNumber> {
        Ok(self.store.account_number_for(user_id).await?)
    }

    pub async fn get_balance(&self, user_id: Uuid) -> WalletResult<BalanceRecord> {
        let account = self.store.account_number_for(user_id).await?;
        Ok(self.store.get_balances(&account).await?)
    }

    /// [`Self::get_account_number`] on behalf of a verified viewer
    pub async fn view_account_number(
        &self,
        context: &OperationContext,
        user_id: Uuid,
    ) -> WalletResult<AccountNumber> {
        self.auth.authorize_view(context, user_id).await?;
        self.get_account_number(user_id).await
    }

    /// [`Self::get_balance`] on behalf of a verified viewer
    pub async fn view_balance(
        &self,
        context: &OperationContext,
        user_id: Uuid,
    ) -> WalletResult<BalanceRecord> {
        self.auth.authorize_view(context, user_id).await?;
        self.get_balance(user_id).await
    }

    // =========================================================================
    // Money movement
    // =========================================================================

    pub async fn deposit_into_user_by_account(
        &self,
        context: &OperationContext,
        account_number: &str,
        currency: &str,
        amount: &str,
    ) -> WalletResult<TransactionReceipt> {
        self.engine
            .deposit(context, DepositCommand::new(account_number, currency, amount))
            .await
    }

    pub async fn withdraw_funds(
        &self,
        context: &OperationContext,
        account_number: &str,
        currency: &str,
        amount: &str,
    ) -> WalletResult<TransactionReceipt> {
        self.engine
            .withdraw(context, WithdrawCommand::new(account_number, currency, amount))
            .await
    }

    /// Transfer out of the actor's own account
    pub async fn transfer_funds(
        &self,
        context: &OperationContext,
        recipient_account_number: &str,
        currency: &str,
        amount: &str,
    ) -> WalletResult<TransactionReceipt> {
        self.engine
            .transfer(
                context,
                TransferCommand::from_own_account(recipient_account_number, currency, amount),
            )
            .await
    }

    /// Transfer between two named accounts (Admin and Agent)
    pub async fn transfer_between(
        &self,
        context: &OperationContext,
        source_account_number: &str,
        recipient_account_number: &str,
        currency: &str,
        amount: &str,
    ) -> WalletResult<TransactionReceipt> {
        let command = TransferCommand::from_own_account(recipient_account_number, currency, amount)
            .with_source(source_account_number);
        self.engine.transfer(context, command).await
    }

    pub async fn exchange_currency(
        &self,
        context: &OperationContext,
        account_number: &str,
        from_currency: &str,
        to_currency: &str,
        amount: &str,
    ) -> WalletResult<TransactionReceipt> {
        self.engine
            .exchange(
                context,
                ExchangeCommand::new(account_number, from_currency, to_currency, amount),
            )
            .await
    }

    pub async fn pay_bill(
        &self,
        context: &OperationContext,
        account_number: &str,
        bill_type: &str,
        currency: &str,
        amount: &str,
    ) -> WalletResult<TransactionReceipt> {
        self.engine
            .pay_bill(
                context,
                BillPaymentCommand::new(account_number, bill_type, currency, amount),
            )
            .await
    }

    pub async fn transaction_history(
        &self,
        context: &OperationContext,
        account_number: &str,
    ) -> WalletResult<TransactionHistory> {
        self.engine.history(context, account_number).await
    }
}
