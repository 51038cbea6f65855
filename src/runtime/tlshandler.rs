use std::{io, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    time::timeout,
};
use tokio_rustls::{TlsAcceptor, server::TlsStream};

/// Performs the server side of the TLS handshake via rustls.
///
/// Nothing is read from the stream before the handshake starts, so no plaintext ever reaches the request parser.
///
/// # Errors
///
/// Returns an `io::Error` when the handshake fails (malformed `ClientHello`, no common protocol
/// or cipher suite, client abort) or does not finish within `limit`.
pub async fn handle_tls<S>(
    acceptor: &TlsAcceptor,
    stream: S,
    limit: Duration,
) -> io::Result<TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(limit, acceptor.accept(stream)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "tls handshake timed out",
        )),
    }
}
