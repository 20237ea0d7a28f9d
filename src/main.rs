#![warn(unused_crate_dependencies)]

mod codec;
mod config;
mod datastore;
mod definitions;
mod dispatch;
mod error;
mod handlers;
mod logging;
mod net;
mod objects;
mod persistence;
mod serverdata;
mod session;
mod state;

use crate::codec::{Packet, ReadOnlyPacket};
use crate::config::load_config;
use crate::dispatch::{Dispatcher, HandlerOutcome};
use crate::error::BootError;
use crate::net::frame::FrameCodec;
use crate::net::handshake::HandshakeEvent;
use crate::persistence::InMemoryPersistence;
use crate::session::connection::Connection;
use crate::session::queue::{self, Message};
use crate::session::{Session, SessionState};
use crate::state::GlobalState;
use bytes::BytesMut;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::codec::Framed;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    let config = load_config();
    logging::setup(config.logging, config.log_file.as_deref());

    let dispatcher = handlers::build();
    let persistence = InMemoryPersistence::new();
    let port = config.port;

    let state = match GlobalState::boot(config, persistence, dispatcher) {
        Ok(state) => state,
        Err(err) => {
            error!("boot failed: {err}");
            std::process::exit(1);
        }
    };

    info!("channel server v{} starting on port {port}", crate::config::VERSION);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            error!("{}", BootError::Bind { port, source });
            std::process::exit(1);
        }
    };

    let mut shutdown = Box::pin(signal::ctrl_c());
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            handle_connection(state, stream, peer).await;
                        });
                    }
                    Err(err) => warn!("failed to accept connection: {err}"),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, no longer accepting connections");
                break;
            }
        }
    }
}

/// Drives one client connection end to end: frames in, handshake/decrypt,
/// dispatch through the worker pool, keep-alive sweep, graceful close.
async fn handle_connection(state: Arc<GlobalState>, stream: TcpStream, peer: SocketAddr) {
    debug!("accepted connection from {peer}");

    let framed = Framed::new(stream, FrameCodec);
    let (sink, mut incoming) = framed.split();

    let connection = Connection::new(sink, 0);
    let activity = connection.activity();
    let session = Arc::new(AsyncMutex::new(Session::new(connection, state.persistence.clone())));
    let session_id = Uuid::new_v4();

    let (timeout_queue, mut timeout_events) = queue::channel();
    let keep_alive = tokio::spawn(crate::session::keepalive::run(
        activity,
        Duration::from_secs(state.config.keep_alive_interval_secs),
        Duration::from_secs(state.config.keep_alive_timeout_secs),
        timeout_queue,
    ));

    loop {
        tokio::select! {
            frame = incoming.next() => {
                match frame {
                    Some(Ok(bytes)) => {
                        process_frame(&state, &session, &state.dispatcher, session_id, bytes).await;
                        if session.lock().await.connection.handshake.is_closed() {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        debug!("frame decode error from {peer}: {err}");
                        break;
                    }
                    None => break,
                }
            }
            message = timeout_events.recv() => {
                if let Some(Message::Timeout) = message {
                    debug!("session {session_id} ({peer}) timed out");
                    let _ = session.lock().await.kill().await;
                    break;
                }
            }
        }
    }

    keep_alive.abort();
    state.worker_pool.remove_session(session_id);
    if !session.lock().await.connection.handshake.is_closed() {
        let _ = session.lock().await.close().await;
    }
    debug!("connection from {peer} closed");
}

/// Handles a single decoded frame: pre-handshake control messages are
/// handled inline, post-handshake frames are decrypted and their inner
/// packet dispatched onto the session's worker-pool lane.
async fn process_frame(
    state: &Arc<GlobalState>,
    session: &Arc<AsyncMutex<Session>>,
    dispatcher: &Dispatcher,
    session_id: Uuid,
    bytes: BytesMut,
) {
    let mut guard = session.lock().await;
    guard.connection.touch();

    if !guard.connection.handshake.is_encrypted() {
        if guard.connection.handshake.is_closed() {
            return;
        }

        if bytes.len() == 2 {
            let version = u16::from_le_bytes([bytes[0], bytes[1]]);
            match guard.connection.handshake.on_client_hello(version) {
                HandshakeEvent::ServerHello { public_key } => {
                    let _ = guard.connection.send_frame(BytesMut::from(&public_key[..])).await;
                }
                HandshakeEvent::Reject { reason } => warn!("handshake rejected: {reason}"),
                HandshakeEvent::EncryptedStart => unreachable!("client-hello never yields EncryptedStart"),
            }
        } else if bytes.len() == 32 {
            let mut client_public = [0u8; 32];
            client_public.copy_from_slice(&bytes);
            if let Some(HandshakeEvent::EncryptedStart) = guard.connection.handshake.on_client_public_key(client_public) {
                guard.state = SessionState::Authenticating;
                let _ = guard.connection.send_frame(BytesMut::new()).await;
            }
        } else {
            debug!("unexpected pre-handshake frame of length {}", bytes.len());
        }
        return;
    }

    let plaintext = {
        let Some(cipher) = guard.connection.handshake.cipher() else {
            return;
        };
        if bytes.len() < 12 {
            debug!("encrypted frame too short to carry a nonce");
            return;
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(12);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(nonce_bytes);
        match cipher.decrypt(&nonce, ciphertext) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                warn!("dropping frame that failed to decrypt, session may be desynced");
                return;
            }
        }
    };
    drop(guard);

    let packet: ReadOnlyPacket = Packet::from_bytes(BytesMut::from(&plaintext[..])).into();
    let command_code = match packet.reader().command_code() {
        Ok(code) => code,
        Err(_) => {
            debug!("dropping frame too short to carry a command code");
            return;
        }
    };

    match dispatcher.handler_for(command_code) {
        Some(handler) => {
            let session = session.clone();
            let handler_session = session.clone();
            state.worker_pool.queue_work(
                session_id,
                Box::pin(async move {
                    match handler(handler_session, packet).await {
                        HandlerOutcome::Ok => {}
                        HandlerOutcome::DomainError { code, message } => {
                            debug!("handler for command {command_code:#06x} returned domain error {code}: {message}");
                        }
                        HandlerOutcome::Fatal => {
                            warn!("handler for command {command_code:#06x} failed fatally, killing session");
                            let _ = session.lock().await.kill().await;
                        }
                    }
                }),
            );
        }
        None => debug!("unknown command code {command_code:#06x}, dropping packet"),
    }
}
