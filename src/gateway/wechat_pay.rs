use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::{EncryptedResource, GatewayAdapter, GatewayTransaction};
use crate::error::{AppError, Result};

const AEAD_ALGORITHM: &str = "AEAD_AES_256_GCM";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// WeChat Pay APIv3 notification adapter.
///
/// Resources are sealed with AEAD_AES_256_GCM under the merchant's APIv3 key,
/// which comes from process configuration only.
#[derive(Clone)]
pub struct WechatPayAdapter {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for WechatPayAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatPayAdapter").finish_non_exhaustive()
    }
}

impl WechatPayAdapter {
    /// Builds the adapter from the 32-byte APIv3 key.
    pub fn new(api_v3_key: &str) -> Result<Self> {
        if api_v3_key.len() != KEY_LEN {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "gateway.api_v3_key must be {} bytes, got {}",
                KEY_LEN,
                api_v3_key.len()
            ))));
        }
        let cipher = Aes256Gcm::new_from_slice(api_v3_key.as_bytes())
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Seals a plaintext payload the way the gateway does. Used by sandbox
    /// tooling to produce notifications.
    pub fn seal(
        &self,
        plaintext: &[u8],
        associated_data: &str,
        nonce: &str,
    ) -> Result<EncryptedResource> {
        let nonce_bytes = nonce_bytes(nonce)?;
        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data.as_bytes(),
                },
            )
            .map_err(|e| AppError::Internal(format!("seal failed: {}", e)))?;

        Ok(EncryptedResource {
            algorithm: Some(AEAD_ALGORITHM.to_string()),
            ciphertext: BASE64.encode(sealed),
            associated_data: Some(associated_data.to_string()),
            nonce: nonce.to_string(),
            original_type: Some("transaction".to_string()),
        })
    }

    fn open(&self, resource: &EncryptedResource) -> Result<Vec<u8>> {
        if let Some(algorithm) = resource.algorithm.as_deref() {
            if algorithm != AEAD_ALGORITHM {
                return Err(AppError::DecryptionError(format!(
                    "unsupported algorithm {}",
                    algorithm
                )));
            }
        }
        let nonce = nonce_bytes(&resource.nonce)?;
        let ciphertext = BASE64
            .decode(resource.ciphertext.as_bytes())
            .map_err(|e| AppError::DecryptionError(format!("invalid base64: {}", e)))?;
        let aad = resource.associated_data.as_deref().unwrap_or("");

        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: &ciphertext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| AppError::DecryptionError("authentication failed".to_string()))
    }
}

fn nonce_bytes(nonce: &str) -> Result<&[u8]> {
    let bytes = nonce.as_bytes();
    if bytes.len() != NONCE_LEN {
        return Err(AppError::DecryptionError(format!(
            "nonce must be {} bytes, got {}",
            NONCE_LEN,
            bytes.len()
        )));
    }
    Ok(bytes)
}

impl GatewayAdapter for WechatPayAdapter {
    fn decrypt(&self, resource: &EncryptedResource) -> Result<GatewayTransaction> {
        let plaintext = self.open(resource)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| AppError::DecryptionError(format!("invalid payload: {}", e)))
    }
}
