//! Inbound payment-gateway notifications: header checks, envelope parsing
//! and AEAD decryption. Nothing in here touches storage.

pub mod notification;
pub mod wechat_pay;

pub use notification::{
    EncryptedResource, GatewayTransaction, NotificationHeaders, TradeState, TransactionAmount,
    WebhookNotification,
};
pub use wechat_pay::WechatPayAdapter;

use crate::error::Result;

/// Turns an encrypted notification resource into a gateway transaction.
#[cfg_attr(test, mockall::automock)]
pub trait GatewayAdapter: Send + Sync {
    fn decrypt(&self, resource: &EncryptedResource) -> Result<GatewayTransaction>;
}
