//! Packet framing and the crypto handshake.

pub mod crypto;
pub mod frame;
pub mod handshake;
