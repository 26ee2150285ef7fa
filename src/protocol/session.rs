//! # Server Session Table
//!
//! Thread-safe store of all active sessions, keyed by session id, with one
//! inactivity timer per session.
//!
//! ## Locking discipline
//! A single `tokio::sync::Mutex` guards the map. Every mutation (message
//! bookkeeping, timer rearm/cancel, removal, and the expiry decision itself)
//! happens under that lock, so a fired timer and a concurrent `touch()` or
//! `remove()` can never both win. Timers carry a per-slot generation number:
//! rearming bumps the generation, and a timer that wakes with a stale
//! generation does nothing.
//!
//! Replies are built from data copied out of the record while locked and
//! sent through the outbound channel afterwards; no network I/O happens
//! under the lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::clock::LamportClock;
use crate::core::message::Message;
use crate::error::{ProtocolError, Result};

/// Outbound datagram queued for the single socket writer task.
pub type Outbound = (Message, SocketAddr);

/// Outcome of validating a DATA sequence number against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// `received == expected`: accepted, counter advanced.
    InOrder,
    /// `received == expected - 1`: counter not advanced, reply still sent.
    Duplicate,
    /// `received > expected`: at least one packet lost; counter not advanced.
    Gap { expected: u32 },
    /// `received < expected - 1`: out of order beyond tolerance; dropped
    /// silently with no reply, no timer rearm, no clock merge.
    Stale,
}

/// Per-session state owned exclusively by the [`SessionTable`].
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: u32,
    pub peer: SocketAddr,
    pub last_accepted_sequence: u32,
    pub clock: LamportClock,
}

impl SessionRecord {
    fn new(session_id: u32, peer: SocketAddr) -> Self {
        Self {
            session_id,
            peer,
            last_accepted_sequence: 0,
            clock: LamportClock::new(),
        }
    }

    /// Apply the sequence-validation policy for one inbound DATA message and
    /// merge the remote clock. `Stale` leaves the record untouched.
    pub fn observe_data(&mut self, sequence: u32, remote_clock: u64) -> SequenceOutcome {
        let expected = self.last_accepted_sequence.wrapping_add(1);
        let outcome = if sequence == expected {
            self.last_accepted_sequence = sequence;
            SequenceOutcome::InOrder
        } else if sequence == self.last_accepted_sequence {
            SequenceOutcome::Duplicate
        } else if sequence > expected {
            SequenceOutcome::Gap { expected }
        } else {
            return SequenceOutcome::Stale;
        };
        self.clock.observe(remote_clock);
        outcome
    }
}

struct Slot {
    record: SessionRecord,
    /// Bumped on every rearm; a timer only fires while its generation matches.
    timer_generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Concurrency-safe mapping of session id to [`SessionRecord`] with an
/// inactivity timer per entry. Cloning shares the underlying table.
#[derive(Clone)]
pub struct SessionTable {
    sessions: Arc<Mutex<HashMap<u32, Slot>>>,
    inactivity_timeout: Duration,
    outbound: mpsc::Sender<Outbound>,
}

impl SessionTable {
    /// Create an empty table. Timer-expiry GOODBYEs are queued on `outbound`.
    pub fn new(inactivity_timeout: Duration, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            inactivity_timeout,
            outbound,
        }
    }

    /// Insert a new session and arm its inactivity timer.
    ///
    /// The record's clock merges `remote_clock` and is then advanced once
    /// for the HELLO reply, so the returned snapshot carries the value to
    /// stamp on that reply.
    ///
    /// # Errors
    /// `DuplicateSession` if an active entry for `session_id` exists.
    pub async fn create(
        &self,
        session_id: u32,
        peer: SocketAddr,
        remote_clock: u64,
    ) -> Result<SessionRecord> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session_id) {
            return Err(ProtocolError::DuplicateSession(session_id));
        }

        let mut record = SessionRecord::new(session_id, peer);
        record.clock.observe(remote_clock);
        record.clock.tick();

        let slot = Slot {
            record: record.clone(),
            timer_generation: 0,
            timer: Some(self.spawn_timer(session_id, 0)),
        };
        sessions.insert(session_id, slot);
        info!(session_id, peer = %peer, "session created");
        Ok(record)
    }

    /// Snapshot of a session, if active.
    pub async fn get(&self, session_id: u32) -> Option<SessionRecord> {
        let sessions = self.sessions.lock().await;
        sessions.get(&session_id).map(|slot| slot.record.clone())
    }

    /// Reset the inactivity timer to the full timeout. Returns false if the
    /// session is not active.
    pub async fn touch(&self, session_id: u32) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&session_id) {
            Some(slot) => {
                let generation = slot.timer_generation.wrapping_add(1);
                slot.timer_generation = generation;
                if let Some(old) = slot.timer.take() {
                    old.abort();
                }
                slot.timer = Some(self.spawn_timer(session_id, generation));
                true
            }
            None => false,
        }
    }

    /// Validate one inbound DATA message under the table lock: apply the
    /// sequence policy, merge the clock, rearm the timer (except for the
    /// `Stale` case), and advance the clock for the ALIVE reply.
    ///
    /// Returns `None` when the session does not exist (wild DATA).
    pub async fn apply_data(
        &self,
        session_id: u32,
        sequence: u32,
        remote_clock: u64,
    ) -> Option<(SequenceOutcome, SessionRecord)> {
        let mut sessions = self.sessions.lock().await;
        let slot = sessions.get_mut(&session_id)?;

        let outcome = slot.record.observe_data(sequence, remote_clock);
        if outcome != SequenceOutcome::Stale {
            slot.record.clock.tick();
            let generation = slot.timer_generation.wrapping_add(1);
            slot.timer_generation = generation;
            if let Some(old) = slot.timer.take() {
                old.abort();
            }
            slot.timer = Some(self.spawn_timer(session_id, generation));
        }
        Some((outcome, slot.record.clone()))
    }

    /// Remove a session, merging `remote_clock` and stamping the clock for
    /// the final GOODBYE reply. Cancels the timer. Returns the final
    /// snapshot, or `None` if the session was not active.
    pub async fn close(&self, session_id: u32, remote_clock: u64) -> Option<SessionRecord> {
        let mut sessions = self.sessions.lock().await;
        let mut slot = sessions.remove(&session_id)?;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.record.clock.observe(remote_clock);
        slot.record.clock.tick();
        info!(session_id, peer = %slot.record.peer, "session closed");
        Some(slot.record)
    }

    /// Cancel the timer and delete the entry. Idempotent.
    pub async fn remove(&self, session_id: u32) -> Option<SessionRecord> {
        let mut sessions = self.sessions.lock().await;
        let mut slot = sessions.remove(&session_id)?;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        debug!(session_id, "session removed");
        Some(slot.record)
    }

    /// Number of active sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Spawn the expiry task for one arm cycle. On wake it re-checks the
    /// generation under the table lock; removal and building the GOODBYE are
    /// one atomic step, the send happens outside the lock.
    fn spawn_timer(&self, session_id: u32, generation: u64) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let outbound = self.outbound.clone();
        let timeout = self.inactivity_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let expired = {
                let mut sessions = sessions.lock().await;
                let fired = matches!(
                    sessions.get(&session_id),
                    Some(slot) if slot.timer_generation == generation
                );
                if fired {
                    sessions.remove(&session_id).map(|mut slot| {
                        // This task *is* the slot's timer; drop the handle
                        // without aborting so the send below still runs.
                        slot.timer.take();
                        slot.record.clock.tick();
                        slot.record
                    })
                } else {
                    None
                }
            };

            if let Some(record) = expired {
                warn!(
                    session_id,
                    peer = %record.peer,
                    "session timed out due to inactivity, sending GOODBYE"
                );
                let goodbye = Message::goodbye(
                    session_id,
                    record.last_accepted_sequence,
                    record.clock.value(),
                );
                if outbound.send((goodbye, record.peer)).await.is_err() {
                    debug!(session_id, "outbound channel closed, GOODBYE dropped");
                }
            }
        })
    }
}
