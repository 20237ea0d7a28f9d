//! Fixed-key obfuscation for archived data files. This is not meant to
//! resist a motivated attacker — it only keeps the shipped game-data
//! archive from being trivially readable — so a single static key and
//! nonce are adequate.

use aes_gcm::aead::{generic_array::GenericArray, Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use thiserror::Error;

const FIXED_KEY: [u8; 32] = *b"channel-server-datastore-key!!!!";
const FIXED_NONCE: [u8; 12] = *b"chan-fixed12";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to decrypt file contents, data may be corrupt")]
    Decrypt,
}

fn cipher() -> Aes256Gcm {
    Aes256Gcm::new(GenericArray::from_slice(&FIXED_KEY))
}

pub fn encrypt(data: &[u8]) -> Vec<u8> {
    cipher()
        .encrypt(Nonce::from_slice(&FIXED_NONCE), data)
        .expect("fixed-key encryption cannot fail")
}

pub fn decrypt(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    cipher()
        .decrypt(Nonce::from_slice(&FIXED_NONCE), data)
        .map_err(|_| CryptoError::Decrypt)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let plain = b"some binary table bytes";
        let enc = encrypt(plain);
        assert_ne!(enc, plain);
        let dec = decrypt(&enc).unwrap();
        assert_eq!(dec, plain);
    }

    #[test]
    fn rejects_corrupt_data() {
        let mut enc = encrypt(b"table bytes");
        *enc.last_mut().unwrap() ^= 0xFF;
        assert!(decrypt(&enc).is_err());
    }
}
