//! # Client State Machine
//!
//! Drives a single session's lifecycle from the initiating side: handshake,
//! data transmission with liveness wait, retry on timeout, graceful or
//! forced close.
//!
//! ```text
//! HELLO_SEND -> HELLO_WAIT -> DATA_SEND <-> ALIVE_WAIT -> GOODBYE_SEND -> CLOSED
//! ```
//!
//! A single task multiplexes the socket, the input source, and the response
//! timer with `tokio::select!`, so at most one state transition is in
//! flight at any time. A reply only causes a transition if it arrives while
//! the machine is in the state that expects it; anything late or misdirected
//! is logged and ignored. A server GOODBYE closes the session from any
//! state.

use std::io;

use futures::{SinkExt, Stream, StreamExt};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::udp::UdpFramed;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::core::clock::LamportClock;
use crate::core::codec::DatagramCodec;
use crate::core::message::{Command, Message};
use crate::error::{ProtocolError, Result};

/// Input line that ends the session, same as end-of-input.
pub const QUIT_TOKEN: &str = "q";

/// Client FSM states. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    HelloSend,
    HelloWait,
    DataSend,
    AliveWait,
    GoodbyeSend,
    Closed,
}

enum Event {
    Inbound(Option<std::result::Result<(Message, std::net::SocketAddr), ProtocolError>>),
    Line(Option<io::Result<String>>),
    Timeout,
}

/// One client session over its own UDP socket.
///
/// `I` is the external input source: a lazy sequence of text lines ending
/// at EOF or at the quit token, both of which close the session gracefully.
pub struct Client<I> {
    framed: UdpFramed<DatagramCodec>,
    server: std::net::SocketAddr,
    input: I,
    config: ClientConfig,
    session_id: u32,
    state: ClientState,
    next_sequence: u32,
    clock: LamportClock,
    retries: u32,
    deadline: Instant,
}

impl<I> Client<I>
where
    I: Stream<Item = io::Result<String>> + Unpin,
{
    /// Bind a local socket and resolve the server address from the config.
    pub async fn connect(session_id: u32, input: I, config: ClientConfig) -> Result<Self> {
        let server = tokio::net::lookup_host(config.address.as_str())
            .await?
            .next()
            .ok_or_else(|| {
                ProtocolError::ConfigError(format!("cannot resolve '{}'", config.address))
            })?;

        let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        info!(session_id, server = %server, "client socket bound");

        Ok(Self {
            framed: UdpFramed::new(socket, DatagramCodec),
            server,
            input,
            config,
            session_id,
            state: ClientState::HelloSend,
            next_sequence: 0,
            clock: LamportClock::new(),
            retries: 0,
            deadline: Instant::now(),
        })
    }

    /// Run the session to completion. Returns once the machine reaches
    /// `Closed`, whether by graceful GOODBYE, server-initiated close, or
    /// retry exhaustion.
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.state {
                ClientState::HelloSend => {
                    self.send_message(Command::Hello, Vec::new()).await?;
                    self.state = ClientState::HelloWait;
                    self.arm_timer();
                }
                ClientState::HelloWait | ClientState::AliveWait => {
                    let deadline = self.deadline;
                    let event = tokio::select! {
                        inbound = self.framed.next() => Event::Inbound(inbound),
                        () = tokio::time::sleep_until(deadline) => Event::Timeout,
                    };
                    match event {
                        Event::Inbound(inbound) => self.on_inbound(inbound),
                        Event::Timeout => self.on_timeout().await?,
                        Event::Line(_) => unreachable!("no input source polled in wait states"),
                    }
                }
                ClientState::DataSend => {
                    let event = tokio::select! {
                        line = self.input.next() => Event::Line(line),
                        inbound = self.framed.next() => Event::Inbound(inbound),
                    };
                    match event {
                        Event::Line(line) => self.on_line(line).await?,
                        Event::Inbound(inbound) => self.on_inbound(inbound),
                        Event::Timeout => unreachable!("no timer armed while sending"),
                    }
                }
                ClientState::GoodbyeSend => {
                    self.send_message(Command::Goodbye, Vec::new()).await?;
                    self.state = ClientState::Closed;
                }
                ClientState::Closed => break,
            }
        }
        info!(session_id = self.session_id, "session closed");
        Ok(())
    }

    async fn on_line(&mut self, line: Option<io::Result<String>>) -> Result<()> {
        match line {
            None => {
                info!("end of input, closing session");
                self.state = ClientState::GoodbyeSend;
            }
            Some(Err(e)) => {
                warn!(error = %e, "input source failed, closing session");
                self.state = ClientState::GoodbyeSend;
            }
            Some(Ok(line)) if line == QUIT_TOKEN => {
                info!("quit token received, closing session");
                self.state = ClientState::GoodbyeSend;
            }
            Some(Ok(line)) => {
                self.send_message(Command::Data, line.into_bytes()).await?;
                self.state = ClientState::AliveWait;
                self.arm_timer();
            }
        }
        Ok(())
    }

    fn on_inbound(
        &mut self,
        inbound: Option<std::result::Result<(Message, std::net::SocketAddr), ProtocolError>>,
    ) {
        match inbound {
            None => {
                warn!("socket stream ended, closing session");
                self.state = ClientState::Closed;
            }
            Some(Err(e)) => {
                warn!(error = %e, "invalid datagram ignored");
            }
            Some(Ok((message, _peer))) => {
                let header = message.header;
                if header.session_id != self.session_id {
                    warn!(
                        received = header.session_id,
                        expected = self.session_id,
                        "datagram for another session ignored"
                    );
                    return;
                }

                let clock = self.clock.observe(header.clock);
                debug!(command = %header.command, clock, "reply received");

                match (header.command, self.state) {
                    (Command::Goodbye, _) => {
                        info!("server closed the session");
                        self.state = ClientState::Closed;
                    }
                    (Command::Hello, ClientState::HelloWait) => {
                        info!(session_id = self.session_id, "session established");
                        self.retries = 0;
                        self.state = ClientState::DataSend;
                    }
                    (Command::Alive, ClientState::AliveWait) => {
                        debug!("server is alive");
                        self.retries = 0;
                        self.state = ClientState::DataSend;
                    }
                    (command, state) => {
                        debug!(command = %command, state = ?state, "reply ignored in current state");
                    }
                }
            }
        }
    }

    async fn on_timeout(&mut self) -> Result<()> {
        self.retries += 1;
        if self.retries > self.config.max_retries {
            warn!(
                state = ?self.state,
                retries = self.config.max_retries,
                "no reply after retries, sending GOODBYE and terminating"
            );
            self.send_message(Command::Goodbye, Vec::new()).await?;
            self.state = ClientState::Closed;
            return Ok(());
        }

        match self.state {
            ClientState::HelloWait => {
                debug!(attempt = self.retries, "HELLO reply timed out, resending HELLO");
                self.send_message(Command::Hello, Vec::new()).await?;
            }
            ClientState::AliveWait => {
                // No DATA retransmission; keep waiting another window.
                debug!(attempt = self.retries, "ALIVE reply timed out, still waiting");
            }
            _ => {}
        }
        self.arm_timer();
        Ok(())
    }

    fn arm_timer(&mut self) {
        self.deadline = Instant::now() + self.config.response_timeout;
    }

    /// Encode and send one message. HELLO is always sequence 0, including
    /// resends; DATA and GOODBYE consume the session sequence counter.
    async fn send_message(&mut self, command: Command, payload: Vec<u8>) -> Result<()> {
        let sequence = match command {
            Command::Hello => 0,
            _ => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                sequence
            }
        };
        let clock = self.clock.tick();

        let message = match command {
            Command::Data => Message::data(self.session_id, sequence, clock, payload),
            _ => Message::new(command, self.session_id, sequence, clock),
        };
        debug!(command = %command, sequence, clock, "sending");
        self.framed.send((message, self.server)).await
    }
}
