//! # Server Dispatch Engine
//!
//! Routes decoded datagrams by command to session-table operations and
//! queues replies on the outbound channel.
//!
//! The per-session state machine is implicit: sessions absent from the
//! table are in an "unknown" state, and any DATA/GOODBYE/ALIVE referencing
//! one is a wild message: logged and dropped with no reply and no mutation.
//! Nothing in this module can return an error to the receive loop; every
//! protocol violation is absorbed at the point of detection.

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::message::{Command, Header, Message};
use crate::error::ProtocolError;
use crate::protocol::session::{Outbound, SequenceOutcome, SessionTable};

/// Stateless router over a shared [`SessionTable`]. Cheap to clone; the
/// receive loop spawns one handler task per datagram.
#[derive(Clone)]
pub struct DispatchEngine {
    table: SessionTable,
    outbound: mpsc::Sender<Outbound>,
}

impl DispatchEngine {
    pub fn new(table: SessionTable, outbound: mpsc::Sender<Outbound>) -> Self {
        Self { table, outbound }
    }

    /// Handle one decoded datagram from `peer`.
    pub async fn handle_message(&self, message: Message, peer: SocketAddr) {
        match message.header.command {
            Command::Hello => self.on_hello(message.header, peer).await,
            Command::Data => self.on_data(message, peer).await,
            Command::Goodbye => self.on_goodbye(message.header, peer).await,
            Command::Alive => {
                // The server never expects ALIVE.
                warn!(
                    session_id = message.header.session_id,
                    peer = %peer,
                    "wild ALIVE dropped"
                );
            }
        }
    }

    async fn on_hello(&self, header: Header, peer: SocketAddr) {
        match self.table.create(header.session_id, peer, header.clock).await {
            Ok(record) => {
                self.send(
                    Message::hello(header.session_id, 0, record.clock.value()),
                    peer,
                )
                .await;
            }
            Err(ProtocolError::DuplicateSession(session_id)) => {
                // Self-healing against colliding or stale ids: force-close
                // the existing session and create nothing for this HELLO.
                warn!(session_id, peer = %peer, "HELLO for an active session, closing it");
                if let Some(old) = self.table.close(session_id, header.clock).await {
                    self.send(
                        Message::goodbye(
                            session_id,
                            old.last_accepted_sequence,
                            old.clock.value(),
                        ),
                        old.peer,
                    )
                    .await;
                }
            }
            Err(e) => warn!(error = %e, peer = %peer, "HELLO rejected"),
        }
    }

    async fn on_data(&self, message: Message, peer: SocketAddr) {
        let header = message.header;
        let Some((outcome, record)) = self
            .table
            .apply_data(header.session_id, header.sequence, header.clock)
            .await
        else {
            warn!(
                session_id = header.session_id,
                peer = %peer,
                "wild DATA dropped"
            );
            return;
        };

        match outcome {
            SequenceOutcome::InOrder => {
                info!(
                    session_id = header.session_id,
                    sequence = header.sequence,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "data received"
                );
            }
            SequenceOutcome::Duplicate => {
                info!(
                    session_id = header.session_id,
                    sequence = header.sequence,
                    "duplicate DATA, counter not advanced"
                );
            }
            SequenceOutcome::Gap { expected } => {
                warn!(
                    session_id = header.session_id,
                    expected,
                    received = header.sequence,
                    "sequence gap, packet loss detected"
                );
            }
            SequenceOutcome::Stale => {
                warn!(
                    session_id = header.session_id,
                    sequence = header.sequence,
                    "out-of-order DATA beyond tolerance, dropped"
                );
                return;
            }
        }

        self.send(
            Message::alive(
                header.session_id,
                record.last_accepted_sequence,
                record.clock.value(),
            ),
            peer,
        )
        .await;
    }

    async fn on_goodbye(&self, header: Header, peer: SocketAddr) {
        match self.table.close(header.session_id, header.clock).await {
            Some(record) => {
                info!(session_id = header.session_id, peer = %peer, "GOODBYE received");
                self.send(
                    Message::goodbye(
                        header.session_id,
                        record.last_accepted_sequence,
                        record.clock.value(),
                    ),
                    peer,
                )
                .await;
            }
            None => {
                warn!(
                    session_id = header.session_id,
                    peer = %peer,
                    "wild GOODBYE dropped"
                );
            }
        }
    }

    async fn send(&self, message: Message, peer: SocketAddr) {
        debug!(command = %message.header.command, peer = %peer, "reply queued");
        if self.outbound.send((message, peer)).await.is_err() {
            debug!("outbound channel closed, reply dropped");
        }
    }
}
