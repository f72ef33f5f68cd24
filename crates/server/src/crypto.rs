// crates/server/src/crypto.rs
//! Token cryptography: AES-256-GCM for stored GitHub tokens, HS256 JWTs
//! for access tokens, SHA-256 hashes for refresh tokens at rest.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

const NONCE_LEN: usize = 12;
const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const JWT_ISSUER: &str = "gitscout";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key must be 32 hex-encoded bytes: {0}")]
    BadKey(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// AES-256-GCM encryptor. Output layout: 12-byte nonce || ciphertext.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = hex::decode(hex_key).map_err(|e| CryptoError::BadKey(e.to_string()))?;
        if key_bytes.len() != 32 {
            return Err(CryptoError::BadKey(format!(
                "got {} bytes, want 32",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<String, CryptoError> {
        if data.len() < NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    uid: Uuid,
    sub: String,
    iss: String,
    exp: i64,
    iat: i64,
}

/// Signs and validates short-lived access tokens.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate(&self, user_id: Uuid) -> Result<String, CryptoError> {
        let now = Utc::now();
        let claims = Claims {
            uid: user_id,
            sub: user_id.to_string(),
            iss: JWT_ISSUER.into(),
            exp: (now + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES)).timestamp(),
            iat: now.timestamp(),
        };
        Ok(jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Validate signature, expiry, and issuer; return the user id.
    pub fn validate(&self, token: &str) -> Result<Uuid, CryptoError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[JWT_ISSUER]);
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims.uid)
    }
}

/// Generate an opaque refresh token and the SHA-256 hash stored for it.
pub fn generate_refresh_token() -> (String, Vec<u8>) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_refresh_token(&token);
    (token, hash)
}

pub fn hash_refresh_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> Encryptor {
        Encryptor::from_hex_key(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn test_encrypt_round_trip() {
        let enc = encryptor();
        let ciphertext = enc.encrypt("gho_secret_token").unwrap();
        assert_ne!(ciphertext, b"gho_secret_token");
        assert_eq!(enc.decrypt(&ciphertext).unwrap(), "gho_secret_token");
    }

    #[test]
    fn test_encrypt_uses_fresh_nonces() {
        let enc = encryptor();
        let a = enc.encrypt("same").unwrap();
        let b = enc.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_rejects_tampered_data() {
        let enc = encryptor();
        let mut ciphertext = enc.encrypt("payload").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xff;
        assert!(matches!(enc.decrypt(&ciphertext), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_decrypt_rejects_short_input() {
        assert!(encryptor().decrypt(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_bad_key_lengths_rejected() {
        assert!(Encryptor::from_hex_key("abcd").is_err());
        assert!(Encryptor::from_hex_key("zz").is_err());
    }

    #[test]
    fn test_jwt_round_trip() {
        let jwt = JwtManager::new("test-secret");
        let user_id = Uuid::new_v4();
        let token = jwt.generate(user_id).unwrap();
        assert_eq!(jwt.validate(&token).unwrap(), user_id);
    }

    #[test]
    fn test_jwt_rejects_wrong_secret() {
        let token = JwtManager::new("secret-a").generate(Uuid::new_v4()).unwrap();
        assert!(JwtManager::new("secret-b").validate(&token).is_err());
    }

    #[test]
    fn test_jwt_rejects_garbage() {
        assert!(JwtManager::new("secret").validate("not.a.jwt").is_err());
    }

    #[test]
    fn test_refresh_token_hash_is_deterministic() {
        let (token, hash) = generate_refresh_token();
        assert_eq!(hash_refresh_token(&token), hash);
        assert_eq!(hash.len(), 32);

        let (other, _) = generate_refresh_token();
        assert_ne!(token, other);
    }
}
