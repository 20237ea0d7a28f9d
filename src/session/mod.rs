//! Session runtime: per-connection message queue, lifecycle state
//! machine, and graceful/emergency close.

pub mod connection;
pub mod keepalive;
pub mod queue;

use crate::codec::{Packet, StringEncoding};
use crate::objects::ObjectIdRegistry;
use crate::persistence::{ChangeSet, Persistence};
use crate::serverdata::zone::ServerZone;
use crate::session::connection::Connection;
use bytes::BytesMut;
use std::sync::{Arc, Weak};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Active,
    Draining,
    Closed,
}

/// The logged-in character, as far as the session layer cares. Stats and
/// inventory live in the persistence layer; this is just enough identity
/// for handlers to address the right save data.
#[derive(Debug, Clone)]
pub struct CharacterEntity {
    pub character_id: Uuid,
    pub name: String,
}

/// The character's currently-summoned partner demon, if any.
#[derive(Debug, Clone)]
pub struct PartnerDemonEntity {
    pub demon_id: Uuid,
    pub base_demon_id: u32,
}

/// An in-progress trade with another session, keyed by the other side's
/// account id. Torn down on disconnect or completion.
#[derive(Debug, Clone)]
pub struct ExchangeSession {
    pub partner_account_id: Uuid,
}

/// Event/quest progress flags carried for the lifetime of the session.
#[derive(Debug, Clone, Default)]
pub struct EventState {
    pub active_event_id: Option<u32>,
}

/// Per-session state created after successful authentication.
pub struct ClientState {
    pub account_id: Uuid,
    pub world_character_id: Uuid,
    pub character: Option<CharacterEntity>,
    pub partner_demon: Option<PartnerDemonEntity>,
    pub exchange: Option<ExchangeSession>,
    pub zone: Option<Weak<ServerZone>>,
    pub event_state: EventState,
    pub objects: ObjectIdRegistry,
    pub encoding: StringEncoding,
}

impl ClientState {
    pub fn new(account_id: Uuid, world_character_id: Uuid) -> Self {
        Self {
            account_id,
            world_character_id,
            character: None,
            partner_demon: None,
            exchange: None,
            zone: None,
            event_state: EventState::default(),
            objects: ObjectIdRegistry::new(),
            encoding: StringEncoding::Cp932,
        }
    }
}

pub struct Session {
    pub state: SessionState,
    pub connection: Connection,
    pub client: Option<ClientState>,
    outgoing: Vec<BytesMut>,
    logout_save: bool,
    persistence: Arc<dyn Persistence>,
}

impl Session {
    pub fn new(connection: Connection, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            state: SessionState::Connecting,
            connection,
            client: None,
            outgoing: Vec::new(),
            logout_save: true,
            persistence,
        }
    }

    pub fn authenticate(&mut self, client: ClientState) {
        self.client = Some(client);
        self.state = SessionState::Active;
    }

    pub fn set_logout_save(&mut self, value: bool) {
        self.logout_save = value;
    }

    /// Buffers a packet; it goes out on the wire at the next
    /// `flush_outgoing` or handler return.
    pub fn queue_packet(&mut self, packet: Packet) {
        self.outgoing.push(packet.into_bytes());
    }

    /// Queues then immediately flushes a single packet.
    pub async fn send_packet(&mut self, packet: Packet) -> std::io::Result<()> {
        self.queue_packet(packet);
        self.flush_outgoing().await
    }

    pub async fn flush_outgoing(&mut self) -> std::io::Result<()> {
        for frame in self.outgoing.drain(..) {
            self.connection.send_frame(frame).await?;
        }
        Ok(())
    }

    /// Graceful close: drains the outgoing queue, runs a single
    /// logout-save transaction if `logout_save` is set, then transitions
    /// to `CLOSED`.
    pub async fn close(&mut self) -> std::io::Result<()> {
        self.state = SessionState::Draining;
        self.flush_outgoing().await?;

        if self.logout_save {
            if let Some(client) = &self.client {
                let mut change_set = ChangeSet::new(None);
                change_set.update(client.account_id);
                if let Err(err) = self.persistence.commit(change_set) {
                    log::warn!("logout-save failed: {err}");
                }
            }
        }

        self.state = SessionState::Closed;
        self.connection.close().await
    }

    /// Emergency close: skips logout-save entirely.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.state = SessionState::Closed;
        self.connection.close().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use futures_util::sink;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_connection() -> (Connection, Arc<Mutex<Vec<BytesMut>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let recorded = frames.clone();
        let writer = sink::unfold((), move |_, item: BytesMut| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().push(item);
                Ok::<_, std::io::Error>(())
            }
        });
        (Connection::new(writer, 1), frames)
    }

    #[tokio::test]
    async fn close_flushes_queued_packets_in_order_then_commits_once() {
        let (connection, frames) = recording_connection();
        let persistence = InMemoryPersistence::new();
        let mut session = Session::new(connection, persistence.clone());
        session.authenticate(ClientState::new(Uuid::new_v4(), Uuid::new_v4()));

        let mut first = Packet::new();
        first.write_header(1);
        first.finalize();
        let mut second = Packet::new();
        second.write_header(2);
        second.finalize();
        let mut third = Packet::new();
        third.write_header(3);
        third.finalize();

        session.queue_packet(first);
        session.queue_packet(second);
        session.queue_packet(third);

        session.close().await.unwrap();

        assert_eq!(session.state, SessionState::Closed);
        assert_eq!(frames.lock().len(), 3);
        assert_eq!(persistence.committed().len(), 1);
    }

    #[tokio::test]
    async fn kill_skips_logout_save() {
        let (connection, _frames) = recording_connection();
        let persistence = InMemoryPersistence::new();
        let mut session = Session::new(connection, persistence.clone());
        session.authenticate(ClientState::new(Uuid::new_v4(), Uuid::new_v4()));

        session.kill().await.unwrap();

        assert_eq!(session.state, SessionState::Closed);
        assert!(persistence.committed().is_empty());
    }
}
