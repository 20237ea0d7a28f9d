//! Pre-encryption handshake state machine:
//! `PRE_HANDSHAKE -> KEY_EXCHANGE -> ENCRYPTED -> CLOSED`.

use crate::net::crypto::{KeyExchange, SessionCipher};

/// Protocol version the handshake's client-hello must match; mismatches
/// are rejected rather than negotiated down.
pub const PROTOCOL_VERSION: u16 = 1666;

pub enum HandshakeEvent {
    ServerHello { public_key: [u8; 32] },
    Reject { reason: String },
    EncryptedStart,
}

#[derive(Default)]
pub enum HandshakeState {
    #[default]
    PreHandshake,
    KeyExchange {
        exchange: KeyExchange,
    },
    Encrypted {
        cipher: SessionCipher,
    },
    Closed,
}

impl HandshakeState {
    pub fn new() -> Self {
        Self::PreHandshake
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted { .. })
    }

    pub fn cipher(&self) -> Option<&SessionCipher> {
        match self {
            Self::Encrypted { cipher } => Some(cipher),
            _ => None,
        }
    }

    /// Handles a client-hello. Only valid from `PRE_HANDSHAKE`; anything
    /// else (a replayed hello, an out-of-order message) is a protocol
    /// error and closes the session.
    pub fn on_client_hello(&mut self, client_version: u16) -> HandshakeEvent {
        match self {
            Self::PreHandshake => {
                if client_version == PROTOCOL_VERSION {
                    let exchange = KeyExchange::generate();
                    let public_key = exchange.public_key_bytes();
                    *self = Self::KeyExchange { exchange };
                    HandshakeEvent::ServerHello { public_key }
                } else {
                    *self = Self::Closed;
                    HandshakeEvent::Reject {
                        reason: format!(
                            "protocol version mismatch: expected {PROTOCOL_VERSION}, got {client_version}"
                        ),
                    }
                }
            }
            _ => {
                *self = Self::Closed;
                HandshakeEvent::Reject {
                    reason: "client hello received out of order".to_string(),
                }
            }
        }
    }

    /// Handles the client's public key, completing the exchange. Returns
    /// `None` if called out of order, leaving state untouched.
    pub fn on_client_public_key(&mut self, client_public: [u8; 32]) -> Option<HandshakeEvent> {
        let state = std::mem::take(self);
        match state {
            Self::KeyExchange { exchange } => {
                let cipher = exchange.derive(client_public);
                *self = Self::Encrypted { cipher };
                Some(HandshakeEvent::EncryptedStart)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matching_version_advances_to_key_exchange() {
        let mut state = HandshakeState::new();
        let event = state.on_client_hello(PROTOCOL_VERSION);
        assert!(matches!(event, HandshakeEvent::ServerHello { .. }));
        assert!(matches!(state, HandshakeState::KeyExchange { .. }));
    }

    #[test]
    fn mismatched_version_rejects_and_closes() {
        let mut state = HandshakeState::new();
        let event = state.on_client_hello(PROTOCOL_VERSION - 1);
        assert!(matches!(event, HandshakeEvent::Reject { .. }));
        assert!(state.is_closed());
    }

    #[test]
    fn full_handshake_reaches_encrypted_state() {
        let mut server = HandshakeState::new();
        server.on_client_hello(PROTOCOL_VERSION);

        let mut client = HandshakeState::new();
        client.on_client_hello(PROTOCOL_VERSION);

        let server_public = match &server {
            HandshakeState::KeyExchange { exchange } => exchange.public_key_bytes(),
            _ => panic!("expected key exchange state"),
        };
        let client_public = match &client {
            HandshakeState::KeyExchange { exchange } => exchange.public_key_bytes(),
            _ => panic!("expected key exchange state"),
        };

        let event = server.on_client_public_key(client_public);
        assert!(matches!(event, Some(HandshakeEvent::EncryptedStart)));
        assert!(server.is_encrypted());

        client.on_client_public_key(server_public);
        assert!(client.is_encrypted());

        let nonce = [3u8; 12];
        let ciphertext = server.cipher().unwrap().encrypt(&nonce, b"ping");
        let plaintext = client.cipher().unwrap().decrypt(&nonce, &ciphertext).unwrap();
        assert_eq!(plaintext, b"ping");
    }
}
