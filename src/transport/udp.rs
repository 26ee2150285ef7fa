//! UDP server loop.
//!
//! One logical worker per inbound datagram: the receive loop decodes each
//! datagram off the shared socket and spawns a handler task against the
//! shared session table. All replies, dispatch responses and timer-expiry
//! GOODBYEs alike, funnel through one mpsc channel drained by a single
//! writer task, so the socket has exactly one sender.

use futures::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::codec::DatagramCodec;
use crate::error::Result;
use crate::protocol::dispatch::DispatchEngine;
use crate::protocol::session::{Outbound, SessionTable};
use tokio_util::udp::UdpFramed;

/// Bind the configured address and serve until CTRL+C.
#[instrument(skip(config), fields(address = %config.address))]
pub async fn serve(config: ServerConfig) -> Result<()> {
    // Internal shutdown channel fed by the ctrl-c handler.
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let socket = UdpSocket::bind(&config.address).await?;
    serve_socket(socket, config, shutdown_rx).await
}

/// Serve on an already-bound socket with an external shutdown channel.
///
/// Exposed separately so callers (and tests) can bind an ephemeral port and
/// control shutdown themselves.
pub async fn serve_socket(
    socket: UdpSocket,
    config: ServerConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let local = socket.local_addr()?;
    info!(address = %local, "UAP server listening");

    let (mut sink, mut stream) = UdpFramed::new(socket, DatagramCodec).split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(config.backpressure_limit);
    let writer = tokio::spawn(async move {
        while let Some((message, peer)) = outbound_rx.recv().await {
            if let Err(e) = sink.send((message, peer)).await {
                warn!(error = %e, peer = %peer, "failed to send datagram");
            }
        }
    });

    let table = SessionTable::new(config.inactivity_timeout, outbound_tx.clone());
    let engine = DispatchEngine::new(table, outbound_tx);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("shutting down server");
                writer.abort();
                return Ok(());
            }

            next = stream.next() => match next {
                Some(Ok((message, peer))) => {
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        engine.handle_message(message, peer).await;
                    });
                }
                // A bad datagram is logged and never affects other
                // sessions or the loop itself.
                Some(Err(e)) => warn!(error = %e, "undecodable datagram dropped"),
                None => {
                    error!("socket stream ended unexpectedly");
                    writer.abort();
                    return Ok(());
                }
            }
        }
    }
}
