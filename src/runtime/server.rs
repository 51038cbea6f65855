use std::{
    fmt, io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Notify,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ConfigError, ListenerConfig},
    credentials::{CredentialError, load_credentials},
    http::{
        request::{DEFAULT_MAX_HEADER_BYTES, HttpError, read_request},
        response::write_response,
    },
    runtime::{handler::Handler, tlshandler::handle_tls},
};

/// Pause after a failed `accept` so a persistent error (e.g. out of file descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Coarse classification of a [`ListenerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerErrorKind {
    /// The configuration was rejected before anything else happened.
    ConfigError,
    /// The certificate / key pair could not be loaded.
    CredentialError,
    /// The socket could not be bound.
    BindError,
}

/// Represents the startup failures of the listener. All of them are fatal.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Loading the credentials failed.
    #[error("failed to load credentials: {0}")]
    Credential(#[from] CredentialError),

    /// The address could not be bound (in use, insufficient privilege, invalid address).
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address as configured.
        address: String,
        /// The underlying IO error.
        source: io::Error,
    },
}

impl ListenerError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ListenerErrorKind {
        match self {
            Self::Config(_) => ListenerErrorKind::ConfigError,
            Self::Credential(_) => ListenerErrorKind::CredentialError,
            Self::Bind { .. } => ListenerErrorKind::BindError,
        }
    }
}

/// Per-connection bounds on how long and how much a client may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Time allowed for the TLS handshake.
    pub handshake_timeout: Duration,
    /// Time allowed for the request line and headers to arrive.
    pub request_timeout: Duration,
    /// Maximum size of request line plus headers.
    pub max_header_bytes: usize,
}

impl ConnectionLimits {
    /// Takes the limits from a listener configuration.
    #[must_use]
    pub const fn from_config(config: &ListenerConfig) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout(),
            request_timeout: config.request_timeout(),
            max_header_bytes: config.max_header_bytes,
        }
    }
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

/// A bound socket plus everything needed to serve it. Nothing is accepted until [`SecureListener::spawn`].
pub struct SecureListener<H: Handler> {
    listener: TcpListener,
    local_addr: SocketAddr,
    acceptor: TlsAcceptor,
    handler: Arc<H>,
    limits: ConnectionLimits,
}

impl<H: Handler> fmt::Debug for SecureListener<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureListener")
            .field("local_addr", &self.local_addr)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Shutdown flag shared between the accept loop and its [`Server`] handle.
#[derive(Debug, Default)]
struct Shutdown {
    closed: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // a stored permit also wakes a loop that is not waiting yet
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A handle to a running accept loop.
#[derive(Debug)]
pub struct Server {
    shutdown: Arc<Shutdown>,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Server {
    /// The address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections. Connections already accepted are served to completion.
    pub fn close(&self) {
        info!(address = %self.local_addr, "closing listener");
        self.shutdown.close();
    }

    /// Whether [`Server::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_closed()
    }

    /// Waits until the accept loop has exited and the listening socket is released.
    pub async fn stopped(self) {
        if let Err(error) = self.task.await {
            error!(%error, "accept loop terminated abnormally");
        }
    }
}

impl<H: Handler + 'static> SecureListener<H> {
    /// Validates the configuration, loads the credentials and binds the socket.
    ///
    /// # Errors
    ///
    /// Returns a `ListenerError` if any of the three steps fails.
    pub async fn bind(config: &ListenerConfig, handler: Arc<H>) -> Result<Self, ListenerError> {
        config.validate()?;

        let bundle = load_credentials(&config.cert_path, &config.key_path)?;
        let acceptor = TlsAcceptor::from(bundle.into_server_config()?);

        let address = config.address();
        let bind_error = |source: io::Error| ListenerError::Bind {
            address: address.clone(),
            source,
        };
        let listener = TcpListener::bind((config.bind_address.as_str(), config.bind_port))
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        info!(address = %local_addr, "listener bound");

        Ok(Self {
            listener,
            local_addr,
            acceptor,
            handler,
            limits: ConnectionLimits::from_config(config),
        })
    }

    /// The address the socket is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on its own task.
    #[must_use]
    pub fn spawn(self) -> Server {
        let shutdown = Arc::new(Shutdown::default());
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.listen(Arc::clone(&shutdown)));
        Server {
            shutdown,
            local_addr,
            task,
        }
    }

    /// Accepts connections until shut down, handing each one to its own task.
    async fn listen(self, shutdown: Arc<Shutdown>) {
        info!(address = %self.local_addr, "accepting connections");
        loop {
            if shutdown.is_closed() {
                break;
            }
            tokio::select! {
                () = shutdown.notify.notified() => {}
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.dispatch(stream, peer),
                    Err(error) => {
                        warn!(%error, "failed to accept connection");
                        sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
        info!(address = %self.local_addr, "listener stopped");
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        debug!(%peer, "accepted connection");
        let acceptor = self.acceptor.clone();
        let handler = Arc::clone(&self.handler);
        let limits = self.limits;
        tokio::spawn(async move {
            serve_connection(stream, peer, &acceptor, handler.as_ref(), limits).await;
        });
    }
}

/// Binds according to `config` and starts accepting.
///
/// # Errors
///
/// Returns a `ListenerError` if the configuration is invalid, the credentials cannot be loaded
/// or the socket cannot be bound.
pub async fn serve<H: Handler + 'static>(
    config: &ListenerConfig,
    handler: Arc<H>,
) -> Result<Server, ListenerError> {
    Ok(SecureListener::bind(config, handler).await?.spawn())
}

/// Upgrades one accepted connection to TLS and answers its request.
///
/// Every failure ends here with the connection closed; nothing reaches the accept loop.
async fn serve_connection<H: Handler>(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: &TlsAcceptor,
    handler: &H,
    limits: ConnectionLimits,
) {
    let tls_stream = match handle_tls(acceptor, stream, limits.handshake_timeout).await {
        Ok(tls_stream) => tls_stream,
        Err(error) => {
            debug!(%peer, %error, "connection closed during tls handshake");
            return;
        }
    };

    match handle(tls_stream, handler, limits).await {
        Ok(()) => debug!(%peer, "response sent"),
        Err(error) => debug!(%peer, %error, "connection closed without response"),
    }
}

/// Handles a negotiated connection: reads one request, writes one response, closes the stream.
///
/// Malformed, oversized, incomplete or late requests get no response. The stream is shut down in every case.
///
/// # Errors
///
/// Returns the `HttpError` that ended the exchange early.
pub async fn handle<S, H>(mut stream: S, handler: &H, limits: ConnectionLimits) -> Result<(), HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
{
    let result = process_request(&mut stream, handler, limits).await;

    // the peer may already be gone, closing is best effort
    if let Ok(Err(error)) = timeout(limits.request_timeout, stream.shutdown()).await {
        debug!(%error, "failed to shut down connection");
    }

    result
}

/// Reads the request and writes the handler's response, forcing `connection: close`.
async fn process_request<S, H>(
    stream: &mut S,
    handler: &H,
    limits: ConnectionLimits,
) -> Result<(), HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
{
    let request = timeout(
        limits.request_timeout,
        read_request(stream, limits.max_header_bytes),
    )
    .await
    .map_err(|_| HttpError::Timeout)??;

    debug!(
        method = %request.request_line.method,
        target = %request.request_line.request_target,
        "request received"
    );

    let mut response = handler.call(&request).await?;
    response.headers.insert("connection", "close");
    write_response(stream, &response).await?;
    Ok(())
}
