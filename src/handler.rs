//! Connection read and write loops
//!
//! The read loop frames inbound bytes into lines and hands each one to the
//! dispatcher. The write loop drains the session's outbound queue onto the
//! stream. Both stop when the session's shutdown token is cancelled.

use std::io;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead, FramedWrite, LinesCodec,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::dispatcher;
use crate::error::RelayError;
use crate::idle::Liveness;
use crate::message::ServerNotice;
use crate::session::Session;

/// How long queued lines may take to reach the peer once the session ends
pub const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Why the read loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// EOF or a closed-connection error from the peer
    PeerClosed,
    /// Unexpected failure
    Failed,
    /// The shutdown token was cancelled elsewhere
    Cancelled,
}

/// Inbound framing: raw `\n`-delimited chunks, decoded lossily per line
pub type LineReader<R> = FramedRead<R, AnyDelimiterCodec>;

/// Frame `reader` into lines of at most `max_line_length` bytes
///
/// Bytes are not required to be UTF-8; clients in legacy encodings still
/// get their lines through, with invalid sequences replaced.
pub fn line_reader<R: AsyncRead>(reader: R, max_line_length: usize) -> LineReader<R> {
    FramedRead::new(
        reader,
        AnyDelimiterCodec::new_with_max_length(vec![b'\n'], Vec::new(), max_line_length),
    )
}

/// I/O error kinds that just mean the peer went away
fn is_closed_kind(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

/// Read lines and dispatch them until the session ends
pub async fn read_loop<R>(
    session: &mut Session,
    lines: &mut LineReader<R>,
    liveness: &Liveness,
    shutdown: &CancellationToken,
) -> ReadEnd
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return ReadEnd::Cancelled,
            frame = lines.next() => frame,
        };

        match frame {
            None => {
                debug!("Session {} reached EOF", session.id());
                return ReadEnd::PeerClosed;
            }
            Some(Ok(chunk)) => {
                liveness.touch();
                let line = String::from_utf8_lossy(&chunk);
                match dispatcher::dispatch(session, &line).await {
                    Ok(()) => {}
                    Err(RelayError::ConnectionClosed) => return ReadEnd::PeerClosed,
                    Err(e) => {
                        error!("Dispatch failed for {}: {}", session.id(), e);
                        return ReadEnd::Failed;
                    }
                }
            }
            Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                warn!("Session {} sent an oversized line", session.id());
                let _ = session.notify(ServerNotice::LineTooLong).await;
                return ReadEnd::PeerClosed;
            }
            Some(Err(AnyDelimiterCodecError::Io(e))) if is_closed_kind(&e) => {
                debug!("Session {} closed by peer: {}", session.id(), e);
                return ReadEnd::PeerClosed;
            }
            Some(Err(e)) => {
                error!("Read error for {}: {}", session.id(), RelayError::from(e));
                return ReadEnd::Failed;
            }
        }
    }
}

/// Drain the outbound queue onto the stream
///
/// Every write races the shutdown token, so a peer that stops reading can
/// not pin the writer. On shutdown, lines already queued get `FLUSH_GRACE`
/// to go out before the write half is dropped. A write failure cancels the
/// session.
pub async fn write_loop<W>(
    mut sink: FramedWrite<W, LinesCodec>,
    mut outbound: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            line = outbound.recv() => line,
        };
        let Some(line) = line else {
            break;
        };

        let written = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            written = sink.send(line) => written,
        };
        if let Err(e) = written {
            debug!("Write failed, ending write loop: {}", e);
            shutdown.cancel();
            return;
        }
    }

    outbound.close();
    let flush = async {
        while let Ok(line) = outbound.try_recv() {
            if sink.send(line).await.is_err() {
                return;
            }
        }
        let _ = SinkExt::<String>::close(&mut sink).await;
    };
    if timeout(FLUSH_GRACE, flush).await.is_err() {
        debug!("Peer not reading, dropping unflushed lines");
    }

    shutdown.cancel();
    debug!("Write loop ended");
}
