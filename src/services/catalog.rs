use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::CatalogItem;

/// Read-only view of the content catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_item(&self, item_id: i64) -> Result<Option<CatalogItem>>;
}

/// Catalog backed by the `catalog_items` table.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn get_item(&self, item_id: i64) -> Result<Option<CatalogItem>> {
        let row = sqlx::query_as::<_, CatalogItem>(
            r#"
            SELECT id, title, price, payable
            FROM catalog_items
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }
}

/// Catalog held in memory. Items are plain values, so a writer that
/// panicked cannot leave the map half-updated and a poisoned lock is
/// recovered rather than reported.
#[derive(Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<i64, CatalogItem>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.insert(item);
        }
        catalog
    }

    pub fn insert(&self, item: CatalogItem) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id, item);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_item(&self, item_id: i64) -> Result<Option<CatalogItem>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(&item_id).cloned())
    }
}
