use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use thiserror::Error;

// AES-GCM standard nonce size; the nonce is prepended to the ciphertext.
const NONCE_SIZE: usize = 12;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid hex key: {0}")]
    InvalidKeyHex(hex::FromHexError),
    #[error("encryption key must be 32 bytes (256 bits) long")]
    BadKeyLength,
    #[error("invalid hex ciphertext: {0}")]
    InvalidCipherHex(hex::FromHexError),
    #[error("ciphertext is too short to contain a nonce")]
    TooShort,
    #[error("cipher operation failed")]
    Cipher,
    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,
}

fn cipher_from_hex_key(key_hex: &str) -> Result<Aes256Gcm, CryptoError> {
    let key_bytes = hex::decode(key_hex).map_err(CryptoError::InvalidKeyHex)?;
    if key_bytes.len() != 32 {
        return Err(CryptoError::BadKeyLength);
    }
    Ok(Aes256Gcm::new(key_bytes.as_slice().into()))
}

/// Encrypts `plain_text` with AES-256-GCM under the hex-encoded 32-byte key,
/// returning hex(nonce || ciphertext).
pub fn encrypt(plain_text: &str, key_hex: &str) -> Result<String, CryptoError> {
    let cipher = cipher_from_hex_key(key_hex)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plain_text.as_bytes())
        .map_err(|_| CryptoError::Cipher)?;

    let mut envelope = nonce.to_vec();
    envelope.extend_from_slice(&ciphertext);
    Ok(hex::encode(envelope))
}

/// Reverses [`encrypt`].
pub fn decrypt(cipher_hex: &str, key_hex: &str) -> Result<String, CryptoError> {
    let cipher = cipher_from_hex_key(key_hex)?;
    let envelope = hex::decode(cipher_hex).map_err(CryptoError::InvalidCipherHex)?;
    if envelope.len() < NONCE_SIZE {
        return Err(CryptoError::TooShort);
    }

    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let plain = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Cipher)?;

    String::from_utf8(plain).map_err(|_| CryptoError::NotUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn round_trips() {
        let sealed = encrypt("{\"type\":\"slack\"}", KEY).unwrap();
        assert_ne!(sealed, "{\"type\":\"slack\"}");
        assert_eq!(decrypt(&sealed, KEY).unwrap(), "{\"type\":\"slack\"}");
    }

    #[test]
    fn wrong_key_fails() {
        let other = "f1e1d1c1b1a191817161514131211101f0e0d0c0b0a090807060504030201000";
        let sealed = encrypt("secret", KEY).unwrap();
        assert!(matches!(decrypt(&sealed, other), Err(CryptoError::Cipher)));
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(matches!(encrypt("x", "1234"), Err(CryptoError::BadKeyLength)));
    }
}
