use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Grants an owner a purchased catalog item. Written only together with the
/// debit that paid for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OwnershipRecord {
    pub id: Uuid,
    pub owner_id: i64,
    pub item_id: i64,
    pub created_at: DateTime<Utc>,
}

impl OwnershipRecord {
    pub fn new(owner_id: i64, item_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            item_id,
            created_at: Utc::now(),
        }
    }
}
