//! Per-session key exchange and encryption, distinct from
//! [`crate::datastore::crypto`]'s fixed-key archive obfuscation: every
//! connection negotiates its own symmetric key via an ephemeral
//! Diffie-Hellman exchange.

use aes_gcm::aead::{generic_array::GenericArray, Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey};

#[derive(Debug, Error)]
pub enum SessionCryptoError {
    #[error("failed to decrypt frame, session key may be desynced")]
    Decrypt,
}

/// The server side of the key-exchange handshake state (`KEY_EXCHANGE`):
/// an ephemeral secret waiting to be consumed by the client's public key.
pub struct KeyExchange {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl KeyExchange {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public key to send to the client as part of the server-hello.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Consumes the exchange with the client's public key, deriving the
    /// per-session [`SessionCipher`] via HKDF-SHA256 over the raw shared
    /// secret.
    pub fn derive(self, client_public: [u8; 32]) -> SessionCipher {
        let shared = self.secret.diffie_hellman(&PublicKey::from(client_public));
        let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(b"channel-server-session-key", &mut key)
            .expect("32 bytes is a valid HKDF output length");
        SessionCipher::new(key)
    }
}

/// Symmetric encryption for one session's frames after the handshake
/// completes. Each frame carries its own nonce so the cipher can be
/// reused for the connection's lifetime without nonce exhaustion.
pub struct SessionCipher {
    key: [u8; 32],
}

impl SessionCipher {
    fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(&self.key))
    }

    pub fn encrypt(&self, nonce: &[u8; 12], plaintext: &[u8]) -> Vec<u8> {
        self.cipher()
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .expect("session key encryption cannot fail")
    }

    pub fn decrypt(&self, nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, SessionCryptoError> {
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SessionCryptoError::Decrypt)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn handshake_derives_matching_keys_on_both_sides() {
        let server = KeyExchange::generate();
        let client = KeyExchange::generate();

        let server_public = server.public_key_bytes();
        let client_public = client.public_key_bytes();

        let server_cipher = server.derive(client_public);
        let client_cipher = client.derive(server_public);

        let nonce = [7u8; 12];
        let ciphertext = server_cipher.encrypt(&nonce, b"hello client");
        let plaintext = client_cipher.decrypt(&nonce, &ciphertext).unwrap();
        assert_eq!(plaintext, b"hello client");
    }

    #[test]
    fn decrypt_rejects_tampered_frame() {
        let a = KeyExchange::generate();
        let b = KeyExchange::generate();
        let a_public = a.public_key_bytes();
        let b_public = b.public_key_bytes();
        let cipher_a = a.derive(b_public);
        let cipher_b = b.derive(a_public);

        let nonce = [1u8; 12];
        let mut ciphertext = cipher_a.encrypt(&nonce, b"payload");
        *ciphertext.last_mut().unwrap() ^= 0xFF;
        assert!(cipher_b.decrypt(&nonce, &ciphertext).is_err());
    }
}
