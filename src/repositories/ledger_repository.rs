use crate::error::{AppError, Result};
use crate::models::LedgerEntry;
use sqlx::postgres::PgExecutor;

/// SQL for the append-only `ledger_entries` table.
pub struct LedgerRepository;

impl LedgerRepository {
    /// Appends an entry. Entries are never updated or deleted.
    pub async fn append<'e, E: PgExecutor<'e>>(executor: E, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, owner_id, delta, resulting_balance, kind, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.owner_id)
        .bind(entry.delta)
        .bind(entry.resulting_balance)
        .bind(entry.kind)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Lists entries for an owner, newest first.
    pub async fn find_by_owner<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, owner_id, delta, resulting_balance, kind, reason, created_at
            FROM ledger_entries
            WHERE owner_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Sums every delta recorded for an owner.
    pub async fn sum_deltas<'e, E: PgExecutor<'e>>(executor: E, owner_id: i64) -> Result<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(delta), 0)::BIGINT
            FROM ledger_entries
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(sum)
    }
}
