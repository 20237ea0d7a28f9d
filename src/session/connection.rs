//! Connection state: the TCP socket's write half, the handshake/encryption
//! state, and the last-activity clock the keep-alive sweep reads.

use crate::net::handshake::HandshakeState;
use crate::session::keepalive::ActivityClock;
use bytes::BytesMut;
use futures_util::{Sink, SinkExt};
use rand::RngCore;
use std::io;
use std::pin::Pin;

pub struct Connection {
    writer: Pin<Box<dyn Sink<BytesMut, Error = io::Error> + Send>>,
    pub handshake: HandshakeState,
    pub session_key: u32,
    pub name: String,
    activity: ActivityClock,
}

impl Connection {
    pub fn new(writer: impl Sink<BytesMut, Error = io::Error> + Send + 'static, session_key: u32) -> Self {
        Self {
            writer: Box::pin(writer),
            handshake: HandshakeState::new(),
            session_key,
            name: String::new(),
            activity: ActivityClock::new(),
        }
    }

    pub fn activity(&self) -> ActivityClock {
        self.activity.clone()
    }

    pub fn touch(&self) {
        self.activity.touch();
    }

    /// Sends a frame, transparently encrypting it once the handshake has
    /// reached `ENCRYPTED`. Each frame gets its own random nonce, prefixed
    /// to the ciphertext so the peer can decrypt without any extra
    /// negotiation. Frames sent before encryption is established
    /// (handshake control messages) go out as-is.
    pub async fn send_frame(&mut self, bytes: BytesMut) -> io::Result<()> {
        let outgoing = match self.handshake.cipher() {
            Some(cipher) => {
                let mut nonce = [0u8; 12];
                rand::thread_rng().fill_bytes(&mut nonce);
                let ciphertext = cipher.encrypt(&nonce, &bytes);
                let mut framed = BytesMut::with_capacity(12 + ciphertext.len());
                framed.extend_from_slice(&nonce);
                framed.extend_from_slice(&ciphertext);
                framed
            }
            None => bytes,
        };
        self.writer.send(outgoing).await
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.handshake.close();
        self.writer.close().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_util::sink;

    fn sink_counting(count: std::sync::Arc<std::sync::atomic::AtomicUsize>) -> impl Sink<BytesMut, Error = io::Error> {
        sink::unfold((), move |_, _item: BytesMut| {
            let count = count.clone();
            async move {
                count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, io::Error>(())
            }
        })
    }

    #[tokio::test]
    async fn send_frame_reaches_the_writer() {
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut connection = Connection::new(sink_counting(count.clone()), 42);
        connection.send_frame(BytesMut::from(&b"hi"[..])).await.unwrap();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
