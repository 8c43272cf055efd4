//! Publish signing and payload encryption.
//!
//! # Signature
//!
//! Lowercase hex HMAC-SHA256, keyed by the secret key, over
//! `publish_key/subscribe_key/secret_key/channel/serialized_message`.
//! Without a secret key the signature is the literal `"0"`.
//!
//! # Cipher
//!
//! AES-256-CBC with PKCS#7 padding and the fixed IV `0123456789012345`.
//! The AES key is the first 32 characters of the hex SHA-256 of the cipher
//! key. Ciphertext travels as standard base64.
//!
//! Encryption preserves the payload's shape:
//!
//! | Payload | Encrypted form                                   |
//! |---------|--------------------------------------------------|
//! | object  | same keys, each value's JSON text encrypted      |
//! | array   | same length, each element's JSON text encrypted  |
//! | string  | the raw text encrypted                           |

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use ps_domain::error::{Error, Result};
use ps_protocol::UNSIGNED;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV: &[u8; 16] = b"0123456789012345";

/// Sign a publish request.
pub fn sign(
    secret_key: Option<&str>,
    publish_key: &str,
    subscribe_key: &str,
    channel: &str,
    serialized_message: &str,
) -> Result<String> {
    let Some(secret) = secret_key.filter(|s| !s.is_empty()) else {
        return Ok(UNSIGNED.to_owned());
    };

    let string_to_sign =
        format!("{publish_key}/{subscribe_key}/{secret}/{channel}/{serialized_message}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Crypto(format!("invalid secret key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Symmetric payload cipher derived from a cipher key.
#[derive(Clone)]
pub struct Cipher {
    key: [u8; 32],
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    pub fn new(cipher_key: &str) -> Self {
        let digest = hex::encode(Sha256::digest(cipher_key.as_bytes()));
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest.as_bytes()[..32]);
        Self { key }
    }

    /// Encrypt text to base64 ciphertext.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String> {
        let enc = Aes256CbcEnc::new_from_slices(&self.key, IV)
            .map_err(|e| Error::Crypto(e.to_string()))?;
        let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(BASE64.encode(ciphertext))
    }

    /// Decrypt base64 ciphertext back to text.
    pub fn decrypt_str(&self, ciphertext: &str) -> Result<String> {
        let raw = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| Error::Crypto(format!("invalid base64: {e}")))?;
        let dec = Aes256CbcDec::new_from_slices(&self.key, IV)
            .map_err(|e| Error::Crypto(e.to_string()))?;
        let plaintext = dec
            .decrypt_padded_vec_mut::<Pkcs7>(&raw)
            .map_err(|_| Error::Crypto("bad padding or wrong key".into()))?;
        String::from_utf8(plaintext).map_err(|e| Error::Crypto(format!("plaintext is not UTF-8: {e}")))
    }

    /// Encrypt a payload, keeping its shape.
    pub fn encrypt(&self, payload: &Value) -> Result<Value> {
        match payload {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), Value::String(self.encrypt_str(&v.to_string())?));
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| self.encrypt_str(&v.to_string()).map(Value::String))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::String(s) => Ok(Value::String(self.encrypt_str(s)?)),
            other => Err(Error::Crypto(format!(
                "cannot encrypt a bare {} payload",
                json_type(other)
            ))),
        }
    }

    /// Reverse [`encrypt`](Self::encrypt). Fails as a whole if any member
    /// fails, so the caller can isolate the bad payload.
    pub fn decrypt(&self, payload: &Value) -> Result<Value> {
        match payload {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.decrypt_member(v)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| self.decrypt_member(v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::String(s) => Ok(Value::String(self.decrypt_str(s)?)),
            other => Err(Error::Crypto(format!(
                "cannot decrypt a bare {} payload",
                json_type(other)
            ))),
        }
    }

    /// A member of an object or array: ciphertext of some JSON text.
    fn decrypt_member(&self, v: &Value) -> Result<Value> {
        let Value::String(ciphertext) = v else {
            return Err(Error::Crypto(format!(
                "expected ciphertext string, found {}",
                json_type(v)
            )));
        };
        let plaintext = self.decrypt_str(ciphertext)?;
        Ok(serde_json::from_str(&plaintext).unwrap_or(Value::String(plaintext)))
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
