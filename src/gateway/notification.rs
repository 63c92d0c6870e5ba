use chrono::{DateTime, FixedOffset, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::OrderStatus;

/// Outer JSON body posted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub resource: EncryptedResource,
}

impl WebhookNotification {
    /// Parses the raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| AppError::DecryptionError(format!("malformed notification body: {}", e)))
    }
}

/// Encrypted `resource` envelope of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    #[serde(default)]
    pub algorithm: Option<String>,
    /// Base64 of ciphertext followed by the 16-byte authentication tag.
    pub ciphertext: String,
    #[serde(default)]
    pub associated_data: Option<String>,
    /// Per-message nonce, sent as a 12-character string.
    pub nonce: String,
    #[serde(default)]
    pub original_type: Option<String>,
}

/// Trade state reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeState {
    Success,
    Refund,
    NotPay,
    Closed,
    Revoked,
    UserPaying,
    PayError,
    #[serde(other)]
    Unknown,
}

impl TradeState {
    /// Order status this trade state settles to, or None when the state
    /// does not end the order.
    pub fn terminal_status(&self) -> Option<OrderStatus> {
        match self {
            TradeState::Success => Some(OrderStatus::Success),
            TradeState::Closed => Some(OrderStatus::Closed),
            TradeState::Revoked => Some(OrderStatus::Revoked),
            TradeState::PayError => Some(OrderStatus::PayError),
            _ => None,
        }
    }
}

/// Amount block of a decrypted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAmount {
    pub total: i64,
    #[serde(default)]
    pub payer_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Decrypted notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub out_trade_no: String,
    pub trade_state: TradeState,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub success_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub amount: Option<TransactionAmount>,
}

impl GatewayTransaction {
    /// Amount paid in the smallest currency unit; 0 when the gateway omitted it.
    pub fn paid_amount(&self) -> i64 {
        self.amount.as_ref().map(|amount| amount.total).unwrap_or(0)
    }

    /// Payment time, falling back to now when the gateway omitted it.
    pub fn paid_at(&self) -> DateTime<Utc> {
        self.success_time
            .map(|time| time.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

/// Signature-related headers of a notification request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationHeaders {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub serial: Option<String>,
}

impl NotificationHeaders {
    pub fn new(
        signature: impl Into<String>,
        timestamp: impl Into<String>,
        nonce: impl Into<String>,
        serial: impl Into<String>,
    ) -> Self {
        Self {
            signature: Some(signature.into()),
            timestamp: Some(timestamp.into()),
            nonce: Some(nonce.into()),
            serial: Some(serial.into()),
        }
    }

    /// Reads the `Wechatpay-*` headers, falling back to the bare names.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let read = |names: &[&str]| {
            names.iter().find_map(|name| {
                headers
                    .get(*name)
                    .and_then(|value| value.to_str().ok())
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        };
        Self {
            signature: read(&["wechatpay-signature", "signature"]),
            timestamp: read(&["wechatpay-timestamp", "timestamp"]),
            nonce: read(&["wechatpay-nonce", "nonce"]),
            serial: read(&["wechatpay-serial", "key-serial"]),
        }
    }

    /// Fails with `MissingSignature` naming the first absent header.
    pub fn require(&self) -> Result<()> {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        if !present(&self.signature) {
            return Err(AppError::MissingSignature("signature"));
        }
        if !present(&self.timestamp) {
            return Err(AppError::MissingSignature("timestamp"));
        }
        if !present(&self.nonce) {
            return Err(AppError::MissingSignature("nonce"));
        }
        if !present(&self.serial) {
            return Err(AppError::MissingSignature("key-serial"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_trade_state_parsing() {
        let state: TradeState = serde_json::from_str("\"PAYERROR\"").unwrap();
        assert_eq!(state, TradeState::PayError);
        let state: TradeState = serde_json::from_str("\"NOTPAY\"").unwrap();
        assert_eq!(state, TradeState::NotPay);
        let state: TradeState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(state, TradeState::Unknown);
    }

    #[test]
    fn test_terminal_status_mapping() {
        assert_eq!(TradeState::Success.terminal_status(), Some(OrderStatus::Success));
        assert_eq!(TradeState::Closed.terminal_status(), Some(OrderStatus::Closed));
        assert_eq!(TradeState::Revoked.terminal_status(), Some(OrderStatus::Revoked));
        assert_eq!(TradeState::PayError.terminal_status(), Some(OrderStatus::PayError));
        assert_eq!(TradeState::UserPaying.terminal_status(), None);
        assert_eq!(TradeState::Refund.terminal_status(), None);
    }

    #[test]
    fn test_transaction_parsing() {
        let json = r#"{
            "out_trade_no": "O-1",
            "trade_state": "SUCCESS",
            "transaction_id": "4200000001",
            "success_time": "2026-01-16T10:34:56+08:00",
            "amount": {"total": 1999, "payer_total": 1999, "currency": "CNY"}
        }"#;
        let txn: GatewayTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.out_trade_no, "O-1");
        assert_eq!(txn.paid_amount(), 1999);
        assert_eq!(txn.paid_at().to_rfc3339(), "2026-01-16T02:34:56+00:00");
    }

    #[test]
    fn test_missing_amount_is_zero() {
        let json = r#"{"out_trade_no": "O-1", "trade_state": "CLOSED"}"#;
        let txn: GatewayTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.paid_amount(), 0);
    }

    #[test]
    fn test_headers_from_map() {
        let mut map = HeaderMap::new();
        map.insert("wechatpay-signature", HeaderValue::from_static("sig"));
        map.insert("wechatpay-timestamp", HeaderValue::from_static("1700000000"));
        map.insert("nonce", HeaderValue::from_static("abc"));
        map.insert("key-serial", HeaderValue::from_static("SERIAL"));

        let headers = NotificationHeaders::from_header_map(&map);
        assert_eq!(headers.signature.as_deref(), Some("sig"));
        assert_eq!(headers.nonce.as_deref(), Some("abc"));
        assert!(headers.require().is_ok());
    }

    #[test]
    fn test_require_names_missing_header() {
        let mut headers = NotificationHeaders::new("sig", "1700000000", "abc", "SERIAL");
        headers.serial = None;
        assert!(matches!(
            headers.require(),
            Err(AppError::MissingSignature("key-serial"))
        ));

        let empty = NotificationHeaders::default();
        assert!(matches!(
            empty.require(),
            Err(AppError::MissingSignature("signature"))
        ));
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            WebhookNotification::from_slice(b"not json"),
            Err(AppError::DecryptionError(_))
        ));
    }
}
