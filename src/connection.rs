//! The transport capability consumed by the session engine.
//!
//! The engine never opens sockets itself; the host supplies a factory that
//! produces one [`Connection`] per log-in attempt. A production TCP/TLS
//! implementation lives in [`crate::transport`], and tests drive the engine
//! with scripted in-memory connections.

/// Callback invoked with each chunk of text received from the server.
pub type ReceiveHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Callback invoked when the server closes its end of the connection.
pub type DisconnectHandler = Box<dyn Fn() + Send + Sync>;

/// A duplex text connection to the Twitch server.
///
/// The engine registers its handlers before calling [`connect`], sends
/// complete CRLF-terminated lines through [`send`], and tears the
/// connection down with [`disconnect`]. Received text may be delivered in
/// arbitrary chunks; the engine reassembles lines itself.
///
/// [`connect`]: Connection::connect
/// [`send`]: Connection::send
/// [`disconnect`]: Connection::disconnect
pub trait Connection: Send + Sync {
    /// Register the callback for received text.
    fn set_receive_handler(&self, handler: ReceiveHandler);

    /// Register the callback for a server-initiated disconnect.
    fn set_disconnect_handler(&self, handler: DisconnectHandler);

    /// Establish the connection. Synchronous: the connection has either
    /// succeeded or failed by the time this returns.
    fn connect(&self) -> bool;

    /// Queue text to be sent to the server. Fire-and-forget; the text may
    /// or may not have been written by the time this returns.
    fn send(&self, text: &str);

    /// Break the connection.
    fn disconnect(&self);
}
