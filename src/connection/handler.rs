//! Per-client request loop.
//!
//! ```text
//!   ┌──────────────┐  complete frames  ┌────────────────┐
//!   │ input buffer │──────────────────>│ CommandHandler │──┐
//!   └──────▲───────┘                   └────────────────┘  │ replies
//!          │ read                                          ▼
//!   ┌──────┴───────┐       one write per batch     ┌──────────────┐
//!   │    socket    │<──────────────────────────────│  RespReply   │
//!   └──────────────┘                               └──────────────┘
//! ```
//!
//! Every complete request in the input buffer is executed before anything is
//! written, so a pipelined batch is answered with one write. Partial requests
//! stay buffered until the next read completes them.
//!
//! A framing error is answered with `-ERR Protocol error: <reason>`, queued
//! behind the replies of the requests that preceded it, and then the
//! connection is closed.

use crate::commands::CommandHandler;
use crate::protocol::{ParseError, RequestParser, RespReply};
use bytes::{Buf, BytesMut};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace, warn};

/// Upper bound on unparsed input held for one client.
const MAX_PENDING_INPUT: usize = 1024 * 1024 * 1024;

const READ_CHUNK: usize = 16 * 1024;

/// Server-wide connection counters, shared by every connection task.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    accepted: AtomicU64,
    active: AtomicU64,
    commands: AtomicU64,
    protocol_errors: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

/// A point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub active: u64,
    pub commands: u64,
    pub protocol_errors: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Why a connection stopped.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Parse(#[from] ParseError),

    /// Peer closed the socket between requests
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Peer closed the socket with a request half sent
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Pending input limit exceeded")]
    BufferFull,
}

impl ConnectionError {
    /// Endings caused by the peer going away rather than by a fault.
    pub fn is_benign(&self) -> bool {
        match self {
            ConnectionError::ClientDisconnected => true,
            ConnectionError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Serves one client over any byte stream.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,
    peer: SocketAddr,
    input: BytesMut,
    pending: RespReply,
    parser: RequestParser,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        ConnectionStats::add(&stats.accepted, 1);
        ConnectionStats::add(&stats.active, 1);

        Self {
            stream: BufWriter::new(stream),
            peer,
            input: BytesMut::with_capacity(READ_CHUNK),
            pending: RespReply::new(),
            parser: RequestParser::new(),
            commands,
            stats,
        }
    }

    /// Serves requests until the peer leaves or the connection fails.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.peer, "Client connected");

        let outcome = self.serve().await;

        match &outcome {
            Err(e) if e.is_benign() => debug!(client = %self.peer, "Client disconnected"),
            Err(e) => warn!(client = %self.peer, error = %e, "Connection closed with error"),
            Ok(()) => info!(client = %self.peer, "Connection closed"),
        }
        outcome
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            let drained = self.drain_input();
            if let Err(e) = &drained {
                warn!(client = %self.peer, error = %e, "Protocol error");
                ConnectionStats::add(&self.stats.protocol_errors, 1);
                self.pending
                    .append_error(&format!("ERR Protocol error: {}", e));
            }

            self.write_pending().await?;
            drained?;

            self.fill_input().await?;
        }
    }

    /// Runs every complete request in the input buffer.
    fn drain_input(&mut self) -> Result<(), ParseError> {
        while !self.input.is_empty() {
            let Some((argv, consumed)) = self.parser.parse(&self.input)? else {
                trace!(
                    client = %self.peer,
                    buffered = self.input.len(),
                    "Waiting for the rest of a request"
                );
                return Ok(());
            };
            self.input.advance(consumed);

            // `*0` and blank inline lines carry no command.
            if argv.is_empty() {
                continue;
            }
            self.commands.execute(&argv, &mut self.pending);
            ConnectionStats::add(&self.stats.commands, 1);
        }
        Ok(())
    }

    async fn fill_input(&mut self) -> Result<(), ConnectionError> {
        if self.input.len() >= MAX_PENDING_INPUT {
            error!(
                client = %self.peer,
                pending = self.input.len(),
                "Client exceeded the pending input limit"
            );
            return Err(ConnectionError::BufferFull);
        }

        self.input.reserve(READ_CHUNK);
        let n = self.stream.get_mut().read_buf(&mut self.input).await?;
        if n == 0 {
            return Err(if self.input.is_empty() {
                ConnectionError::ClientDisconnected
            } else {
                ConnectionError::UnexpectedEof
            });
        }

        ConnectionStats::add(&self.stats.bytes_in, n as u64);
        trace!(client = %self.peer, bytes = n, "Read");
        Ok(())
    }

    async fn write_pending(&mut self) -> Result<(), ConnectionError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let out = self.pending.take();
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;

        ConnectionStats::add(&self.stats.bytes_out, out.len() as u64);
        trace!(client = %self.peer, bytes = out.len(), "Wrote replies");
        Ok(())
    }
}

/// Serves `stream` to completion, logging unexpected failures.
pub async fn handle_connection<S>(
    stream: S,
    peer: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = ConnectionHandler::new(stream, peer, commands, stats)
        .run()
        .await
    {
        if !e.is_benign() {
            debug!(client = %peer, error = %e, "Connection task finished with error");
        }
    }
}

impl<S> Drop for ConnectionHandler<S> {
    // Also runs when the task is cancelled mid-await.
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}
