//! Database module
//!
//! Connection pool and schema checks. The schema itself lives in raw SQL
//! files under migrations/.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Tables the Postgres store and ledger depend on
pub const REQUIRED_TABLES: &[&str] =
    &["users", "accounts", "account_balances", "sessions", "transactions"];

/// Open a pool and verify connectivity
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    verify_connection(&pool).await?;
    Ok(pool)
}

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables and the account number sequence exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let sequence_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.sequences
            WHERE sequence_schema = 'public' AND sequence_name = 'account_number_seq'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !sequence_exists {
        tracing::error!("Required sequence 'account_number_seq' does not exist");
        return Ok(false);
    }

    tracing::debug!("Schema verified");
    Ok(true)
}
