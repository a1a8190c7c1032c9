//! PostgreSQL ledger

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::{BillType, Currency, OperationKind};
use crate::store::AccountNumber;

use super::{
    LedgerError, RejectionReason, TransactionHistory, TransactionLedger, TransactionRecord,
    TransactionStatus,
};

const SELECT_RECORD: &str = r#"
    SELECT id, recorded_at, kind, actor_user_id, source_account, destination_account,
           currency, amount, secondary_currency, bill_type, destination_amount, status,
           rejection_reason, message, commission_applied, correlation_id
    FROM transactions
"#;

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    recorded_at: DateTime<Utc>,
    kind: String,
    actor_user_id: Uuid,
    source_account: String,
    destination_account: Option<String>,
    currency: Option<String>,
    amount: Option<Decimal>,
    secondary_currency: Option<String>,
    bill_type: Option<String>,
    destination_amount: Option<Decimal>,
    status: String,
    rejection_reason: Option<String>,
    message: Option<String>,
    commission_applied: Option<Decimal>,
    correlation_id: Option<Uuid>,
}

fn parse_currency(value: Option<String>) -> Result<Option<Currency>, LedgerError> {
    value
        .map(|code| {
            Currency::from_str(&code)
                .map_err(|_| LedgerError::Corrupt(format!("unknown currency {}", code)))
        })
        .transpose()
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = OperationKind::from_str(&row.kind)
            .map_err(|_| LedgerError::Corrupt(format!("unknown kind {}", row.kind)))?;

        let status = match row.status.as_str() {
            "completed" => TransactionStatus::Completed,
            "rejected" => {
                let reason = row
                    .rejection_reason
                    .as_deref()
                    .ok_or_else(|| LedgerError::Corrupt(format!("{} has no reason", row.id)))
                    .and_then(|r| RejectionReason::from_str(r).map_err(LedgerError::Corrupt))?;
                TransactionStatus::Rejected {
                    reason,
                    message: row.message.unwrap_or_default(),
                }
            }
            other => return Err(LedgerError::Corrupt(format!("unknown status {}", other))),
        };

        Ok(TransactionRecord {
            id: row.id,
            timestamp: row.recorded_at,
            kind,
            actor_user_id: row.actor_user_id,
            source_account: row.source_account,
            destination_account: row.destination_account,
            currency: parse_currency(row.currency)?,
            amount: row.amount,
            secondary_currency: parse_currency(row.secondary_currency)?,
            bill_type: row
                .bill_type
                .map(|tag| {
                    BillType::from_str(&tag)
                        .map_err(|_| LedgerError::Corrupt(format!("unknown bill type {}", tag)))
                })
                .transpose()?,
            destination_amount: row.destination_amount,
            status,
            commission_applied: row.commission_applied,
            correlation_id: row.correlation_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_record<'e>(
    executor: impl PgExecutor<'e>,
    record: &TransactionRecord,
) -> Result<(), LedgerError> {
    let (reason, message) = match &record.status {
        TransactionStatus::Completed => (None, None),
        TransactionStatus::Rejected { reason, message } => {
            (Some(reason.as_str()), Some(message.as_str()))
        }
    };

    let result = sqlx::query(
        r#"
        INSERT INTO transactions (
            id, recorded_at, kind, actor_user_id, source_account, destination_account,
            currency, amount, secondary_currency, bill_type, destination_amount, status,
            rejection_reason, message, commission_applied, correlation_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(record.timestamp)
    .bind(record.kind.as_str())
    .bind(record.actor_user_id)
    .bind(&record.source_account)
    .bind(&record.destination_account)
    .bind(record.currency.map(|c| c.code()))
    .bind(record.amount)
    .bind(record.secondary_currency.map(|c| c.code()))
    .bind(record.bill_type.map(|b| b.tag()))
    .bind(record.destination_amount)
    .bind(record.status.as_str())
    .bind(reason)
    .bind(message)
    .bind(record.commission_applied)
    .bind(record.correlation_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::DuplicateRecord(record.id));
    }

    tracing::debug!(transaction_id = %record.id, kind = %record.kind, "Ledger entry written");
    Ok(())
}

#[async_trait]
impl TransactionLedger for PgLedger {
    async fn append(&self, record: TransactionRecord) -> Result<(), LedgerError> {
        insert_record(&self.pool, &record).await
    }

    async fn append_within(
        &self,
        conn: &mut PgConnection,
        record: TransactionRecord,
    ) -> Result<(), LedgerError> {
        insert_record(conn, &record).await
    }

    async fn list_by_account(
        &self,
        account: &AccountNumber,
    ) -> Result<TransactionHistory, LedgerError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "{} WHERE source_account = $1 OR destination_account = $1 \
             ORDER BY recorded_at ASC, seq ASC",
            SELECT_RECORD
        ))
        .bind(account.as_str())
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(TransactionRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TransactionHistory::new(records))
    }

    async fn get(&self, id: Uuid) -> Result<Option<TransactionRecord>, LedgerError> {
        let row: Option<TransactionRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_RECORD))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TransactionRecord::try_from).transpose()
    }
}
