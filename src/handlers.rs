//! The three representative handlers that fix the dispatch contract:
//! `LOGIN`, `AUTH`, `KEEP_ALIVE`. Registered once into the process-wide
//! [`Dispatcher`] at boot; each handler is handed the session its packet
//! arrived on by the caller, so one shared table still replies on the
//! right connection without needing a table per connection.

use crate::codec::{Packet, ReadOnlyPacket, StringEncoding};
use crate::dispatch::{Dispatcher, DispatcherBuilder, HandlerOutcome};
use crate::session::{ClientState, Session};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

pub const COMMAND_LOGIN: u16 = 0x0003;
pub const COMMAND_AUTH: u16 = 0x0004;
pub const COMMAND_KEEP_ALIVE: u16 = 0x0009;

const STATUS_SUCCESS: u16 = 0;

/// Builds the single dispatcher shared by every connection for the
/// lifetime of the process.
pub fn build() -> Dispatcher {
    DispatcherBuilder::new()
        .register(
            COMMAND_LOGIN,
            Arc::new(
                |session: Arc<AsyncMutex<Session>>, packet: ReadOnlyPacket| -> BoxFuture<'static, HandlerOutcome> {
                    Box::pin(async move { handle_login(session, packet).await })
                },
            ),
        )
        .register(
            COMMAND_AUTH,
            Arc::new(
                |session: Arc<AsyncMutex<Session>>, packet: ReadOnlyPacket| -> BoxFuture<'static, HandlerOutcome> {
                    Box::pin(async move { handle_auth(session, packet).await })
                },
            ),
        )
        .register(
            COMMAND_KEEP_ALIVE,
            Arc::new(
                |session: Arc<AsyncMutex<Session>>, packet: ReadOnlyPacket| -> BoxFuture<'static, HandlerOutcome> {
                    Box::pin(async move { handle_keep_alive(session, packet).await })
                },
            ),
        )
        .build()
}

/// Inbound packets carry the same `u16` length + `u16` command code header
/// outbound ones do ([`Packet::write_header`]); handlers skip both before
/// reading their body.
const HEADER_LEN: usize = 4;

async fn handle_login(session: Arc<AsyncMutex<Session>>, packet: ReadOnlyPacket) -> HandlerOutcome {
    let mut reader = packet.reader();
    if reader.skip(HEADER_LEN).is_err() {
        return HandlerOutcome::DomainError { code: 1, message: "truncated LOGIN header".to_string() };
    }
    let (version, session_key, username) = match (
        reader.read_u16(),
        reader.read_u32(),
        reader.read_string(StringEncoding::Utf8, true),
    ) {
        (Ok(version), Ok(session_key), Ok(username)) => (version, session_key, username),
        _ => return HandlerOutcome::DomainError { code: 1, message: "malformed LOGIN body".to_string() },
    };

    let mut session = session.lock().await;
    session.authenticate(ClientState::new(Uuid::new_v4(), Uuid::new_v4()));
    session.connection.session_key = session_key;
    session.connection.name = username;
    log::debug!("LOGIN version={version} session_key={session_key}");

    let mut reply = Packet::new();
    reply.write_header(COMMAND_LOGIN);
    reply.write_u16(STATUS_SUCCESS);
    reply.finalize();

    match session.send_packet(reply).await {
        Ok(()) => HandlerOutcome::Ok,
        Err(err) => {
            log::warn!("failed to send LOGIN reply: {err}");
            HandlerOutcome::Fatal
        }
    }
}

async fn handle_auth(session: Arc<AsyncMutex<Session>>, packet: ReadOnlyPacket) -> HandlerOutcome {
    let mut reader = packet.reader();
    if reader.skip(HEADER_LEN).is_err() || reader.read_string(StringEncoding::Utf8, true).is_err() {
        return HandlerOutcome::DomainError { code: 1, message: "malformed AUTH body".to_string() };
    }

    let mut reply = Packet::new();
    reply.write_header(COMMAND_AUTH);
    reply.write_u16(STATUS_SUCCESS);
    reply.finalize();

    match session.lock().await.send_packet(reply).await {
        Ok(()) => HandlerOutcome::Ok,
        Err(err) => {
            log::warn!("failed to send AUTH reply: {err}");
            HandlerOutcome::Fatal
        }
    }
}

async fn handle_keep_alive(session: Arc<AsyncMutex<Session>>, packet: ReadOnlyPacket) -> HandlerOutcome {
    let mut reader = packet.reader();
    if reader.skip(HEADER_LEN).is_err() {
        return HandlerOutcome::DomainError { code: 1, message: "truncated KEEP_ALIVE header".to_string() };
    }
    let nonce = match reader.read_u32() {
        Ok(nonce) => nonce,
        Err(_) => return HandlerOutcome::DomainError { code: 1, message: "malformed KEEP_ALIVE body".to_string() },
    };

    let mut reply = Packet::new();
    reply.write_header(COMMAND_KEEP_ALIVE);
    reply.write_u32(nonce);
    reply.finalize();

    let mut session = session.lock().await;
    session.connection.touch();
    match session.send_packet(reply).await {
        Ok(()) => HandlerOutcome::Ok,
        Err(err) => {
            log::warn!("failed to send KEEP_ALIVE reply: {err}");
            HandlerOutcome::Fatal
        }
    }
}
