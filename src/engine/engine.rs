//! Transaction Engine
//!
//! Drives each request through authorize, parse and resolve, apply, record.
//! Every terminal outcome, success or rejection, produces exactly one ledger
//! record. Rejections never touch a balance: all mutations for a request go
//! to the store as one atomic batch together with the completed record, and
//! nothing is sent until every check has passed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::auth::{AuthService, DEFAULT_SESSION_TTL};
use crate::domain::{
    Amount, AmountError, BillType, Currency, DomainError, OperationContext, OperationKind, Role,
    WalletResult,
};
use crate::ledger::{TransactionHistory, TransactionLedger, TransactionRecord, TransactionStatus};
use crate::rates::ExchangeRateProvider;
use crate::store::{
    AccountNumber, AccountRef, AccountStore, BalanceAdjustment, BalanceSlot, RetryPolicy,
    UserRecord, DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_RETRIES,
};

use super::{
    BillPaymentCommand, DepositCommand, ExchangeCommand, TransactionReceipt, TransferCommand,
    WithdrawCommand,
};

/// Tunables for the engine, the stores it drives and login sessions
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Flat amount credited to an Agent's commission balance
    pub agent_commission: Decimal,
    /// Fraction withheld on exchange
    pub exchange_commission_rate: Decimal,
    pub lock_timeout: Duration,
    pub store_max_retries: u32,
    pub session_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            agent_commission: Decimal::ONE,
            exchange_commission_rate: Decimal::ZERO,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            store_max_retries: DEFAULT_MAX_RETRIES,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl EngineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.store_max_retries)
    }
}

/// What is known about a request so far. Becomes its ledger record.
#[derive(Clone)]
struct Attempt {
    id: Uuid,
    kind: OperationKind,
    actor_user_id: Uuid,
    correlation_id: Option<Uuid>,
    source_account: String,
    destination_account: Option<String>,
    currency: Option<Currency>,
    amount: Option<Decimal>,
    secondary_currency: Option<Currency>,
    bill_type: Option<BillType>,
    destination_amount: Option<Decimal>,
    commission_applied: Option<Decimal>,
}

impl Attempt {
    fn new(kind: OperationKind, context: &OperationContext, source_account: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            actor_user_id: context.actor_user_id,
            correlation_id: context.correlation_id,
            source_account: source_account.trim().to_string(),
            destination_account: None,
            currency: None,
            amount: None,
            secondary_currency: None,
            bill_type: None,
            destination_amount: None,
            commission_applied: None,
        }
    }

    fn parse_currency(&mut self, raw: &str) -> WalletResult<Currency> {
        let currency: Currency = raw.parse()?;
        self.currency = Some(currency);
        Ok(currency)
    }

    fn parse_amount(&mut self, raw: &str) -> WalletResult<Amount> {
        let amount: Amount = raw
            .parse()
            .map_err(|e: AmountError| DomainError::InvalidAmount(e.to_string()))?;
        self.amount = Some(amount.value());
        Ok(amount)
    }

    fn into_record(self, status: TransactionStatus) -> TransactionRecord {
        let completed = status.is_completed();
        TransactionRecord {
            id: self.id,
            timestamp: Utc::now(),
            kind: self.kind,
            actor_user_id: self.actor_user_id,
            source_account: self.source_account,
            destination_account: self.destination_account,
            currency: self.currency,
            amount: self.amount,
            secondary_currency: self.secondary_currency,
            bill_type: self.bill_type,
            destination_amount: self.destination_amount.filter(|_| completed),
            status,
            commission_applied: self.commission_applied.filter(|_| completed),
            correlation_id: self.correlation_id,
        }
    }
}

pub struct TransactionEngine {
    store: Arc<dyn AccountStore>,
    ledger: Arc<dyn TransactionLedger>,
    rates: Arc<dyn ExchangeRateProvider>,
    auth: Arc<AuthService>,
    settings: EngineSettings,
}

impl TransactionEngine {
    pub fn new(
        store: Arc<dyn AccountStore>,
        ledger: Arc<dyn TransactionLedger>,
        rates: Arc<dyn ExchangeRateProvider>,
        auth: Arc<AuthService>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            ledger,
            rates,
            auth,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // =========================================================================
    // Deposit
    // =========================================================================

    pub async fn deposit(
        &self,
        context: &OperationContext,
        command: DepositCommand,
    ) -> WalletResult<TransactionReceipt> {
        let mut attempt = Attempt::new(OperationKind::Deposit, context, &command.account_number);
        let outcome = self.run_deposit(context, &command, &mut attempt).await;
        self.finish(attempt, outcome).await
    }

    async fn run_deposit(
        &self,
        context: &OperationContext,
        command: &DepositCommand,
        attempt: &mut Attempt,
    ) -> WalletResult<TransactionReceipt> {
        let actor = self
            .auth
            .authorize(context, OperationKind::Deposit, &command.account_number)
            .await?;
        let currency = attempt.parse_currency(&command.currency)?;
        let amount = attempt.parse_amount(&command.amount)?;
        let account = self.store.resolve_account(&command.account_number).await?;

        let adjustments = vec![BalanceAdjustment::credit(
            &account.account_number,
            BalanceSlot::Currency(currency),
            amount.value(),
        )];
        self.commit(&actor, &account, adjustments, attempt).await
    }

    // =========================================================================
    // Withdraw
    // =========================================================================

    pub async fn withdraw(
        &self,
        context: &OperationContext,
        command: WithdrawCommand,
    ) -> WalletResult<TransactionReceipt> {
        let mut attempt = Attempt::new(OperationKind::Withdraw, context, &command.account_number);
        let outcome = self.run_withdraw(context, &command, &mut attempt).await;
        self.finish(attempt, outcome).await
    }

    async fn run_withdraw(
        &self,
        context: &OperationContext,
        command: &WithdrawCommand,
        attempt: &mut Attempt,
    ) -> WalletResult<TransactionReceipt> {
        let actor = self
            .auth
            .authorize(context, OperationKind::Withdraw, &command.account_number)
            .await?;
        let currency = attempt.parse_currency(&command.currency)?;
        let amount = attempt.parse_amount(&command.amount)?;
        let account = self.store.resolve_account(&command.account_number).await?;

        let adjustments = vec![BalanceAdjustment::debit(
            &account.account_number,
            BalanceSlot::Currency(currency),
            amount.value(),
        )];
        self.commit(&actor, &account, adjustments, attempt).await
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    pub async fn transfer(
        &self,
        context: &OperationContext,
        command: TransferCommand,
    ) -> WalletResult<TransactionReceipt> {
        let source = command.source_account.clone().unwrap_or_default();
        let mut attempt = Attempt::new(OperationKind::Transfer, context, &source);
        attempt.destination_account = Some(command.destination_account.trim().to_string());
        let outcome = self.run_transfer(context, &command, &mut attempt).await;
        self.finish(attempt, outcome).await
    }

    async fn run_transfer(
        &self,
        context: &OperationContext,
        command: &TransferCommand,
        attempt: &mut Attempt,
    ) -> WalletResult<TransactionReceipt> {
        let source = match &command.source_account {
            Some(source) => AccountNumber::from(source.as_str()),
            None => self.auth.verify_actor(context).await?.account_number,
        };
        attempt.source_account = source.to_string();

        let actor = self
            .auth
            .authorize(context, OperationKind::Transfer, source.as_str())
            .await?;
        let currency = attempt.parse_currency(&command.currency)?;
        let amount = attempt.parse_amount(&command.amount)?;

        let destination = AccountNumber::from(command.destination_account.as_str());
        if source == destination {
            return Err(DomainError::SameAccountTransfer);
        }

        let from = self.store.resolve_account(source.as_str()).await?;
        let to = self.store.resolve_account(destination.as_str()).await?;

        let slot = BalanceSlot::Currency(currency);
        let adjustments = vec![
            BalanceAdjustment::debit(&from.account_number, slot, amount.value()),
            BalanceAdjustment::credit(&to.account_number, slot, amount.value()),
        ];
        self.commit(&actor, &from, adjustments, attempt).await
    }

    // =========================================================================
    // Exchange
    // =========================================================================

    pub async fn exchange(
        &self,
        context: &OperationContext,
        command: ExchangeCommand,
    ) -> WalletResult<TransactionReceipt> {
        let mut attempt = Attempt::new(OperationKind::Exchange, context, &command.account_number);
        let outcome = self.run_exchange(context, &command, &mut attempt).await;
        self.finish(attempt, outcome).await
    }

    async fn run_exchange(
        &self,
        context: &OperationContext,
        command: &ExchangeCommand,
        attempt: &mut Attempt,
    ) -> WalletResult<TransactionReceipt> {
        let actor = self
            .auth
            .authorize(context, OperationKind::Exchange, &command.account_number)
            .await?;
        let from = attempt.parse_currency(&command.from_currency)?;
        let to: Currency = command.to_currency.parse()?;
        attempt.secondary_currency = Some(to);
        let amount = attempt.parse_amount(&command.amount)?;

        let quote = self.rates.rate(from, to).await?;
        let credited = quote
            .destination_amount(amount.value())
            .filter(|credited| *credited > Decimal::ZERO)
            .ok_or_else(|| {
                DomainError::InvalidAmount(format!(
                    "{} {} converts to nothing in {}",
                    amount, from, to
                ))
            })?;
        attempt.destination_amount = Some(credited);

        let account = self.store.resolve_account(&command.account_number).await?;
        let adjustments = vec![
            BalanceAdjustment::debit(
                &account.account_number,
                BalanceSlot::Currency(from),
                amount.value(),
            ),
            BalanceAdjustment::credit(&account.account_number, BalanceSlot::Currency(to), credited),
        ];
        self.commit(&actor, &account, adjustments, attempt).await
    }

    // =========================================================================
    // Bill payment
    // =========================================================================

    pub async fn pay_bill(
        &self,
        context: &OperationContext,
        command: BillPaymentCommand,
    ) -> WalletResult<TransactionReceipt> {
        let mut attempt =
            Attempt::new(OperationKind::BillPayment, context, &command.account_number);
        let outcome = self.run_pay_bill(context, &command, &mut attempt).await;
        self.finish(attempt, outcome).await
    }

    async fn run_pay_bill(
        &self,
        context: &OperationContext,
        command: &BillPaymentCommand,
        attempt: &mut Attempt,
    ) -> WalletResult<TransactionReceipt> {
        let actor = self
            .auth
            .authorize(context, OperationKind::BillPayment, &command.account_number)
            .await?;
        let bill_type: BillType = command.bill_type.parse()?;
        attempt.bill_type = Some(bill_type);
        let currency = attempt.parse_currency(&command.currency)?;
        let amount = attempt.parse_amount(&command.amount)?;
        let account = self.store.resolve_account(&command.account_number).await?;

        let adjustments = vec![BalanceAdjustment::debit(
            &account.account_number,
            BalanceSlot::Currency(currency),
            amount.value(),
        )];
        self.commit(&actor, &account, adjustments, attempt).await
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Ledger entries for an account, under the same scope as a withdrawal
    pub async fn history(
        &self,
        context: &OperationContext,
        account_number: &str,
    ) -> WalletResult<TransactionHistory> {
        self.auth
            .authorize(context, OperationKind::Withdraw, account_number)
            .await?;
        let account = self.store.resolve_account(account_number).await?;
        Ok(self.ledger.list_by_account(&account.account_number).await?)
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    /// Credit owed to an Agent processing this request for someone else
    fn agent_commission(
        &self,
        actor: &UserRecord,
        kind: OperationKind,
        primary: &AccountRef,
    ) -> Option<BalanceAdjustment> {
        let commission = self.settings.agent_commission;
        let eligible = actor.role == Role::Agent
            && kind.earns_agent_commission()
            && primary.account_number != actor.account_number
            && commission > Decimal::ZERO;

        eligible.then(|| {
            BalanceAdjustment::credit(&actor.account_number, BalanceSlot::Commission, commission)
        })
    }

    /// Send the batch, plus any commission and the completed record, to the
    /// store as one unit
    async fn commit(
        &self,
        actor: &UserRecord,
        primary: &AccountRef,
        mut adjustments: Vec<BalanceAdjustment>,
        attempt: &mut Attempt,
    ) -> WalletResult<TransactionReceipt> {
        let commission = self.agent_commission(actor, attempt.kind, primary);
        attempt.commission_applied = commission.as_ref().map(|c| c.delta);
        adjustments.extend(commission);

        let record = attempt.clone().into_record(TransactionStatus::Completed);
        let receipt = TransactionReceipt::try_from(&record)?;

        self.store
            .apply_recorded(&adjustments, &record, self.ledger.as_ref())
            .await?;

        tracing::info!(
            transaction_id = %record.id,
            kind = %record.kind,
            account = %record.source_account,
            actor = %record.actor_user_id,
            "Transaction applied"
        );
        Ok(receipt)
    }

    /// Record a rejection; completed records were written by [`Self::commit`]
    async fn finish(
        &self,
        attempt: Attempt,
        outcome: WalletResult<TransactionReceipt>,
    ) -> WalletResult<TransactionReceipt> {
        let error = match outcome {
            Ok(receipt) => return Ok(receipt),
            Err(e) => e,
        };
        let record = attempt.into_record(TransactionStatus::rejected(&error));

        if error.is_client_error() {
            tracing::warn!(
                transaction_id = %record.id,
                kind = %record.kind,
                account = %record.source_account,
                actor = %record.actor_user_id,
                error = %error,
                "Transaction rejected"
            );
        } else {
            tracing::error!(
                transaction_id = %record.id,
                kind = %record.kind,
                account = %record.source_account,
                error = %error,
                "Transaction failed"
            );
        }

        if let Err(e) = self.ledger.append(record).await {
            tracing::error!(error = %e, "Failed to append ledger record");
        }

        Err(error)
    }
}
