use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Price and payability of a catalog item, as supplied by the content catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CatalogItem {
    pub id: i64,
    pub title: String,
    pub price: i64,
    pub payable: bool,
}

impl CatalogItem {
    pub fn new(id: i64, title: impl Into<String>, price: i64, payable: bool) -> Self {
        Self {
            id,
            title: title.into(),
            price,
            payable,
        }
    }
}
