use crate::error::{AppError, Result};
use crate::models::Wallet;
use sqlx::postgres::PgExecutor;

/// SQL for the `wallets` table.
pub struct WalletRepository;

impl WalletRepository {
    /// Finds a wallet without locking it.
    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, owner_id: i64) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT owner_id, balance, frozen, created_at, updated_at
            FROM wallets
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Finds a wallet and takes its row lock for the rest of the transaction.
    pub async fn lock<'e, E: PgExecutor<'e>>(executor: E, owner_id: i64) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT owner_id, balance, frozen, created_at, updated_at
            FROM wallets
            WHERE owner_id = $1
            FOR UPDATE
            "#,
        )
        .bind(owner_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Inserts an empty wallet unless one already exists.
    /// A concurrent insert for the same owner blocks until the other
    /// transaction ends.
    pub async fn insert_if_absent<'e, E: PgExecutor<'e>>(executor: E, owner_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (owner_id, balance, frozen, created_at, updated_at)
            VALUES ($1, 0, FALSE, NOW(), NOW())
            ON CONFLICT (owner_id) DO NOTHING
            "#,
        )
        .bind(owner_id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Overwrites the balance of a locked wallet.
    pub async fn update_balance<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: i64,
        balance: i64,
    ) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = $2,
                updated_at = NOW()
            WHERE owner_id = $1
            RETURNING owner_id, balance, frozen, created_at, updated_at
            "#,
        )
        .bind(owner_id)
        .bind(balance)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        row.ok_or(AppError::WalletNotFound(owner_id))
    }

    /// Sets the frozen flag. Returns false if the wallet does not exist.
    pub async fn set_frozen<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: i64,
        frozen: bool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET frozen = $2,
                updated_at = NOW()
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .bind(frozen)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
