use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Balance increased.
    Credit,
    /// Balance decreased.
    Debit,
}

/// Immutable record of one balance change.
///
/// `delta` is signed (positive for credits, negative for debits) and
/// `resulting_balance` is the wallet balance right after this entry. For every
/// owner the deltas sum to the current wallet balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: i64,
    pub delta: i64,
    pub resulting_balance: i64,
    pub kind: EntryKind,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates a credit entry for a positive amount.
    pub fn credit(
        owner_id: i64,
        amount: i64,
        resulting_balance: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            delta: amount,
            resulting_balance,
            kind: EntryKind::Credit,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a debit entry for a positive amount; the stored delta is negative.
    pub fn debit(
        owner_id: i64,
        amount: i64,
        resulting_balance: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            delta: -amount,
            resulting_balance,
            kind: EntryKind::Debit,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }

    /// Absolute amount moved by this entry.
    pub fn amount(&self) -> i64 {
        self.delta.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_entry() {
        let entry = LedgerEntry::credit(7, 500, 500, "recharge +500");
        assert_eq!(entry.kind, EntryKind::Credit);
        assert_eq!(entry.delta, 500);
        assert_eq!(entry.resulting_balance, 500);
        assert_eq!(entry.amount(), 500);
    }

    #[test]
    fn test_debit_entry_has_negative_delta() {
        let entry = LedgerEntry::debit(7, 300, 200, "deduct");
        assert_eq!(entry.kind, EntryKind::Debit);
        assert_eq!(entry.delta, -300);
        assert_eq!(entry.resulting_balance, 200);
        assert_eq!(entry.amount(), 300);
    }

    #[test]
    fn test_serialization() {
        let entry = LedgerEntry::debit(7, 300, 200, "deduct");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"kind\":\"DEBIT\""));

        let decoded: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, entry);
    }
}
