use crate::error::{AppError, Result};
use crate::models::{Order, OrderStatus, OrderTransition};
use sqlx::postgres::PgExecutor;

/// SQL for the `orders` table.
pub struct OrderRepository;

impl OrderRepository {
    /// Inserts a new order.
    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, order: &Order) -> Result<Order> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (order_no, owner_id, total_amount, status, transaction_id, paid_at, remark, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING order_no, owner_id, total_amount, status, transaction_id, paid_at, remark, created_at, updated_at
            "#,
        )
        .bind(&order.order_no)
        .bind(order.owner_id)
        .bind(order.total_amount)
        .bind(order.status)
        .bind(&order.transaction_id)
        .bind(order.paid_at)
        .bind(&order.remark)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Finds an order by business order number.
    pub async fn find_by_order_no<'e, E: PgExecutor<'e>>(
        executor: E,
        order_no: &str,
    ) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_no, owner_id, total_amount, status, transaction_id, paid_at, remark, created_at, updated_at
            FROM orders
            WHERE order_no = $1
            "#,
        )
        .bind(order_no)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Finds an order and takes its row lock for the rest of the transaction.
    pub async fn lock<'e, E: PgExecutor<'e>>(executor: E, order_no: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_no, owner_id, total_amount, status, transaction_id, paid_at, remark, created_at, updated_at
            FROM orders
            WHERE order_no = $1
            FOR UPDATE
            "#,
        )
        .bind(order_no)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Moves a pending order to a terminal status. The `status = 'PENDING'`
    /// guard makes the transition happen at most once.
    pub async fn transition_from_pending<'e, E: PgExecutor<'e>>(
        executor: E,
        order_no: &str,
        transition: &OrderTransition,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                transaction_id = COALESCE($3, transaction_id),
                paid_at = COALESCE($4, paid_at),
                remark = $5,
                updated_at = NOW()
            WHERE order_no = $1 AND status = $6
            "#,
        )
        .bind(order_no)
        .bind(transition.status)
        .bind(&transition.transaction_id)
        .bind(transition.paid_at)
        .bind(&transition.remark)
        .bind(OrderStatus::Pending)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }
}
