//! WeCom callback message crypto.
//!
//! Callback payloads are AES-256-CBC encrypted with the application's
//! EncodingAESKey (IV = first 16 key bytes, PKCS#7 padding to 32 bytes) and
//! signed with `sha1(sort([token, timestamp, nonce, ciphertext]))`. The
//! plaintext is `random(16) | len(u32 BE) | message | receive_id`.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    base64::{
        Engine, alphabet,
        engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD},
    },
    cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding},
    rand::{Rng, distr::Alphanumeric},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    sha1::{Digest, Sha1},
    tracing::{debug, warn},
};

use homegate_config::WecomConfig;

use crate::error::{CryptoError, Error, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK_SIZE: usize = 32;
const RANDOM_PREFIX_LEN: usize = 16;

/// EncodingAESKey is unpadded base64 whose last character carries two
/// unused bits, which the strict engine would reject.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// The three callback operations the webhook needs.
pub trait MessageCrypto: Send + Sync {
    /// Check a URL-verification request and return the decrypted echo string.
    fn verify_url(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> std::result::Result<String, CryptoError>;

    /// Check and decrypt a posted callback envelope into the inner XML.
    fn decrypt_msg(
        &self,
        post_data: &str,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
    ) -> std::result::Result<String, CryptoError>;

    /// Encrypt and sign a reply into the XML envelope WeCom expects.
    fn encrypt_msg(
        &self,
        reply: &str,
        nonce: &str,
        timestamp: &str,
    ) -> std::result::Result<String, CryptoError>;
}

/// [`MessageCrypto`] for one WeCom application.
pub struct WxCrypt {
    token: Secret<String>,
    key: [u8; 32],
    receive_id: String,
}

impl std::fmt::Debug for WxCrypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WxCrypt")
            .field("token", &"[REDACTED]")
            .field("key", &"[REDACTED]")
            .field("receive_id", &self.receive_id)
            .finish()
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Encrypt")]
    encrypt: String,
}

impl WxCrypt {
    pub fn new(
        token: &str,
        encoding_aes_key: &str,
        receive_id: &str,
    ) -> std::result::Result<Self, CryptoError> {
        let key: [u8; 32] = KEY_ENGINE
            .decode(format!("{encoding_aes_key}="))
            .map_err(|_| CryptoError::IllegalAesKey)?
            .try_into()
            .map_err(|_| CryptoError::IllegalAesKey)?;
        Ok(Self {
            token: Secret::new(token.to_string()),
            key,
            receive_id: receive_id.to_string(),
        })
    }

    /// Build from the `[wecom]` section. Fails when any of token, key or corp
    /// id is missing.
    pub fn from_config(config: &WecomConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(Error::config(
                "wecom.token, wecom.encoding_aes_key and wecom.corp_id are required",
            ));
        }
        let (Some(token), Some(key)) = (&config.token, &config.encoding_aes_key) else {
            return Err(Error::config("wecom credentials missing"));
        };
        Ok(Self::new(
            token.expose_secret(),
            key.expose_secret(),
            &config.corp_id,
        )?)
    }

    fn signature(&self, timestamp: &str, nonce: &str, encrypted: &str) -> String {
        let mut parts = [self.token.expose_secret().as_str(), timestamp, nonce, encrypted];
        parts.sort_unstable();
        let mut hasher = Sha1::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn check_signature(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        encrypted: &str,
    ) -> std::result::Result<(), CryptoError> {
        let computed = self.signature(timestamp, nonce, encrypted);
        if constant_time_eq(&computed, msg_signature) {
            Ok(())
        } else {
            warn!("wecom callback signature mismatch");
            Err(CryptoError::ValidateSignature)
        }
    }

    fn encrypt(&self, message: &str) -> std::result::Result<String, CryptoError> {
        let len = u32::try_from(message.len()).map_err(|_| CryptoError::EncryptAes)?;
        let mut buf: Vec<u8> = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_PREFIX_LEN)
            .collect();
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(message.as_bytes());
        buf.extend_from_slice(self.receive_id.as_bytes());
        pkcs7_pad(&mut buf);

        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| CryptoError::EncryptAes)?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<NoPadding>(&buf);
        Ok(STANDARD.encode(ciphertext))
    }

    fn decrypt(&self, encrypted: &str) -> std::result::Result<String, CryptoError> {
        let ciphertext = STANDARD
            .decode(encrypted.trim())
            .map_err(|_| CryptoError::DecryptAes)?;
        let cipher = Aes256CbcDec::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| CryptoError::DecryptAes)?;
        let padded = cipher
            .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
            .map_err(|_| CryptoError::DecryptAes)?;
        let plain = pkcs7_unpad(&padded)?;

        let header = RANDOM_PREFIX_LEN + 4;
        if plain.len() < header {
            return Err(CryptoError::IllegalBuffer);
        }
        let len_bytes: [u8; 4] = plain[RANDOM_PREFIX_LEN..header]
            .try_into()
            .map_err(|_| CryptoError::IllegalBuffer)?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        let body_end = header
            .checked_add(len)
            .filter(|end| *end <= plain.len())
            .ok_or(CryptoError::IllegalBuffer)?;

        if &plain[body_end..] != self.receive_id.as_bytes() {
            warn!(
                expected = %self.receive_id,
                "wecom message addressed to another receive id"
            );
            return Err(CryptoError::ValidateCorpid);
        }
        String::from_utf8(plain[header..body_end].to_vec()).map_err(|_| CryptoError::IllegalBuffer)
    }
}

impl MessageCrypto for WxCrypt {
    fn verify_url(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> std::result::Result<String, CryptoError> {
        self.check_signature(msg_signature, timestamp, nonce, echostr)?;
        self.decrypt(echostr)
    }

    fn decrypt_msg(
        &self,
        post_data: &str,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
    ) -> std::result::Result<String, CryptoError> {
        let envelope: Envelope =
            quick_xml::de::from_str(post_data).map_err(|_| CryptoError::ParseXml)?;
        self.check_signature(msg_signature, timestamp, nonce, &envelope.encrypt)?;
        let xml = self.decrypt(&envelope.encrypt)?;
        debug!(len = xml.len(), "wecom callback decrypted");
        Ok(xml)
    }

    fn encrypt_msg(
        &self,
        reply: &str,
        nonce: &str,
        timestamp: &str,
    ) -> std::result::Result<String, CryptoError> {
        let timestamp = if timestamp.is_empty() {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
                .to_string()
        } else {
            timestamp.to_string()
        };
        let encrypted = self.encrypt(reply)?;
        let signature = self.signature(&timestamp, nonce, &encrypted);
        Ok(format!(
            "<xml><Encrypt><![CDATA[{encrypted}]]></Encrypt>\
             <MsgSignature><![CDATA[{signature}]]></MsgSignature>\
             <TimeStamp>{timestamp}</TimeStamp>\
             <Nonce><![CDATA[{nonce}]]></Nonce></xml>"
        ))
    }
}

fn pkcs7_pad(buf: &mut Vec<u8>) {
    let pad = BLOCK_SIZE - buf.len() % BLOCK_SIZE;
    buf.resize(buf.len() + pad, pad as u8);
}

fn pkcs7_unpad(buf: &[u8]) -> std::result::Result<&[u8], CryptoError> {
    let pad = usize::from(*buf.last().ok_or(CryptoError::IllegalBuffer)?);
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return Err(CryptoError::IllegalBuffer);
    }
    Ok(&buf[..buf.len() - pad])
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
