//! The per-connection I/O loop.
//!
//! [`pump`] wires an [`Engine`] to a network stream: read a batch of
//! peer bytes, run the tokenizer over it, drain whatever the engine
//! queued in the daemon's [`NetSide`], repeat. The listener, the pty
//! process, and TLS (if any) all stay outside; anything that speaks
//! `AsyncRead + AsyncWrite` works.
//!
//! TCP urgent cannot be expressed through `tokio`, so urgent-marked
//! bytes go out in-band; peers treat the data mark itself as the synch
//! point, which is what matters in practice.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::bytes::BytesMut;
use tracing::{instrument, trace, Level};

use crate::daemon::Daemon;
use crate::engine::Engine;
use crate::error::Error;
use crate::net::NetSide;

/// Read size per batch; negotiation traffic is tiny, session paste
/// bursts are not.
const READ_CAPACITY: usize = 4096;

/// Drive one connection until the peer disconnects or LOGOUT tears the
/// session down.
///
/// # Errors
///
/// Returns any I/O error from the underlying stream.
#[instrument(level = Level::TRACE, skip_all)]
pub async fn pump<S, D>(mut stream: S, engine: &mut Engine, daemon: &mut D) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: Daemon + AsMut<NetSide>,
{
    let mut input = BytesMut::with_capacity(READ_CAPACITY);
    loop {
        engine.receive(&mut input, daemon);

        let net = daemon.as_mut();
        let flush = net.flush_requested();
        let pending = net.take_pending();
        if !pending.is_empty() {
            stream.write_all(&pending).await?;
        }
        if flush {
            stream.flush().await?;
        }

        if engine.closed() {
            trace!("session closed, shutting stream down");
            let _ = stream.shutdown().await;
            return Ok(());
        }

        if !input.is_empty() {
            // The tokenizer stopped on pty backpressure. Nudge the pty
            // side and let other tasks run before retrying.
            daemon.ptyflush();
            tokio::task::yield_now().await;
            continue;
        }

        let n = stream.read_buf(&mut input).await?;
        if n == 0 {
            trace!("peer closed the stream");
            return Ok(());
        }
    }
}
