//! TCP/TLS implementation of the transport capability.
//!
//! [`TcpTransport`] connects a plain or TLS socket to a chat endpoint and
//! adapts it to the callback contract the engine expects: one I/O thread
//! reads from the socket and hands received text to the registered handler,
//! while [`send`](crate::connection::Connection::send) queues bytes the same
//! thread flushes between reads. TLS uses rustls with the webpki root set,
//! and is switched on automatically for the standard TLS chat port (6697).
//!
//! One transport drives one connection; the engine's factory builds a fresh
//! instance per log-in.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use thiserror::Error;

use crate::connection::{Connection, DisconnectHandler, ReceiveHandler};

/// Twitch's production chat endpoint (TLS).
pub const TWITCH_CHAT_ENDPOINT: &str = "irc.chat.twitch.tv:6697";

/// How long a blocking read waits before the I/O thread checks the write
/// queue and the shutdown flag again.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a connection attempt failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server name in address {0:?}")]
    InvalidServerName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Tls(#[from] rustls::Error),
}

struct Shared {
    receive: Mutex<Option<ReceiveHandler>>,
    disconnected: Mutex<Option<DisconnectHandler>>,
    outbound: Mutex<Vec<u8>>,
    /// Clone of the underlying socket, kept so `disconnect` can unblock the
    /// I/O thread with a shutdown.
    socket: Mutex<Option<TcpStream>>,
    /// Set when the client side initiated the teardown, so the I/O thread
    /// does not report it as a server disconnect.
    closing: AtomicBool,
}

/// A [`Connection`] over TCP, optionally wrapped in TLS.
pub struct TcpTransport {
    address: String,
    tls: bool,
    shared: Arc<Shared>,
}

impl TcpTransport {
    /// Transport to the given `host:port` address. TLS is enabled when the
    /// port is the standard TLS chat port (6697); use [`with_tls`] to
    /// override.
    ///
    /// [`with_tls`]: TcpTransport::with_tls
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        let tls = address.ends_with(":6697");
        Self {
            address,
            tls,
            shared: Arc::new(Shared {
                receive: Mutex::new(None),
                disconnected: Mutex::new(None),
                outbound: Mutex::new(Vec::new()),
                socket: Mutex::new(None),
                closing: AtomicBool::new(false),
            }),
        }
    }

    /// Transport to Twitch's production chat endpoint.
    pub fn twitch() -> Self {
        Self::new(TWITCH_CHAT_ENDPOINT)
    }

    /// Force TLS on or off regardless of the port.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    fn open(&self) -> Result<IoStream, TransportError> {
        let mut tcp = TcpStream::connect(&self.address)?;
        *lock(&self.shared.socket) = Some(tcp.try_clone()?);
        if !self.tls {
            tcp.set_read_timeout(Some(READ_POLL_INTERVAL))?;
            return Ok(IoStream::Plain(tcp));
        }
        let host = self.address.split(':').next().unwrap_or(&self.address);
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| TransportError::InvalidServerName(host.to_string()))?;
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let mut tls = ClientConnection::new(Arc::new(config), server_name)?;
        // Finish the handshake on the blocking socket before the polling
        // read timeout is installed.
        while tls.is_handshaking() {
            tls.complete_io(&mut tcp)?;
        }
        tcp.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        Ok(IoStream::Tls(StreamOwned::new(tls, tcp)))
    }
}

impl Connection for TcpTransport {
    fn set_receive_handler(&self, handler: ReceiveHandler) {
        *lock(&self.shared.receive) = Some(handler);
    }

    fn set_disconnect_handler(&self, handler: DisconnectHandler) {
        *lock(&self.shared.disconnected) = Some(handler);
    }

    fn connect(&self) -> bool {
        let stream = match self.open() {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(address = %self.address, %error, "connect failed");
                return false;
            }
        };
        tracing::debug!(address = %self.address, tls = self.tls, "connected");
        self.shared.closing.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || io_loop(stream, shared));
        true
    }

    fn send(&self, text: &str) {
        lock(&self.shared.outbound).extend_from_slice(text.as_bytes());
    }

    fn disconnect(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        if let Some(socket) = lock(&self.shared.socket).take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }
}

enum IoStream {
    Plain(TcpStream),
    Tls(StreamOwned<ClientConnection, TcpStream>),
}

impl Read for IoStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            IoStream::Plain(stream) => stream.read(buf),
            IoStream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for IoStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            IoStream::Plain(stream) => stream.write(buf),
            IoStream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            IoStream::Plain(stream) => stream.flush(),
            IoStream::Tls(stream) => stream.flush(),
        }
    }
}

fn io_loop(mut stream: IoStream, shared: Arc<Shared>) {
    let mut buffer = [0u8; 4096];
    loop {
        if shared.closing.load(Ordering::SeqCst) {
            return;
        }
        let pending = std::mem::take(&mut *lock(&shared.outbound));
        if !pending.is_empty() {
            if stream.write_all(&pending).and_then(|()| stream.flush()).is_err() {
                notify_disconnected(&shared);
                return;
            }
        }
        match stream.read(&mut buffer) {
            Ok(0) => {
                notify_disconnected(&shared);
                return;
            }
            Ok(count) => {
                let text = String::from_utf8_lossy(&buffer[..count]).into_owned();
                if let Some(handler) = lock(&shared.receive).as_ref() {
                    handler(&text);
                }
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(error) => {
                tracing::debug!(%error, "socket read failed");
                notify_disconnected(&shared);
                return;
            }
        }
    }
}

fn notify_disconnected(shared: &Shared) {
    if shared.closing.load(Ordering::SeqCst) {
        return;
    }
    if let Some(handler) = lock(&shared.disconnected).as_ref() {
        handler();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
