use crate::error::{AppError, Result};
use crate::models::OwnershipRecord;
use sqlx::postgres::PgExecutor;

/// SQL for the `ownership_records` table.
pub struct OwnershipRepository;

impl OwnershipRepository {
    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, record: &OwnershipRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ownership_records (id, owner_id, item_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id)
        .bind(record.owner_id)
        .bind(record.item_id)
        .bind(record.created_at)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn find_by_owner<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: i64,
    ) -> Result<Vec<OwnershipRecord>> {
        let rows = sqlx::query_as::<_, OwnershipRecord>(
            r#"
            SELECT id, owner_id, item_id, created_at
            FROM ownership_records
            WHERE owner_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
