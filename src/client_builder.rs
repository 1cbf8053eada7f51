use crate::conn::{Conn, Connection};
use crate::error::ProtocolError;
use std::io::{Read, Write};
use std::net::TcpStream;

#[cfg(feature = "native-tls")]
use native_tls::TlsConnector;
#[cfg(all(feature = "rustls-tls", not(feature = "native-tls")))]
use rustls_connector::RustlsConnector;

/// The default plaintext IMAP port.
pub const DEFAULT_PORT: u16 = 143;

/// The default IMAP-over-TLS port.
pub const DEFAULT_TLS_PORT: u16 = 993;

/// Opens transports for a [`Client`](crate::Client).
///
/// A connector dials `host:port`, performs whatever handshake the transport needs and consumes
/// the server greeting, so that the returned stream is ready for the first command.
///
/// Any `FnMut(&str, u16) -> Result<S, ProtocolError>` is a connector, which makes it easy to plug
/// in a custom TLS setup or a scripted stream.
pub trait Connector {
    /// The transport this connector yields.
    type Stream: Read + Write;

    /// Opens a transport to `host:port`, positioned right after the server greeting.
    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Stream, ProtocolError>;
}

impl<F, S> Connector for F
where
    F: FnMut(&str, u16) -> Result<S, ProtocolError>,
    S: Read + Write,
{
    type Stream = S;

    fn connect(&mut self, host: &str, port: u16) -> Result<S, ProtocolError> {
        self(host, port)
    }
}

/// The connection mode we use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionMode {
    /// Unencrypted connection, the default for port 143.
    #[default]
    Plaintext,
    /// Use TLS from the first byte, usually on port 993.
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    Tls,
    /// Upgrade a plaintext connection with `STARTTLS` before anything else is sent.
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    StartTls,
}

/// The default [`Connector`]: plain TCP, optionally wrapped in TLS.
///
/// Dialling in plaintext is the default:
/// ```no_run
/// # use imap_session::{Client, ClientBuilder};
/// let client = Client::new(ClientBuilder::new());
/// ```
///
/// With the `native-tls` or `rustls-tls` feature, TLS or `STARTTLS` can be requested:
/// ```no_run
/// # use imap_session::{Client, ClientBuilder, ConnectionMode};
/// # #[cfg(feature = "native-tls")]
/// let client = Client::new(ClientBuilder::new().mode(ConnectionMode::Tls));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    mode: ConnectionMode,
    #[cfg(feature = "native-tls")]
    skip_tls_verify: bool,
}

impl ClientBuilder {
    /// Make a new `ClientBuilder` for plaintext connections.
    pub fn new() -> Self {
        ClientBuilder::default()
    }

    /// Sets the connection mode.
    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Controls the use of certificate validation.
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// You should only use this as a last resort as it allows another server to impersonate the
    /// server you think you're talking to, which would include being able to receive your
    /// credentials.
    #[cfg(feature = "native-tls")]
    pub fn danger_skip_tls_verify(mut self, skip_tls_verify: bool) -> Self {
        self.skip_tls_verify = skip_tls_verify;
        self
    }

    #[cfg(feature = "native-tls")]
    fn handshake(&self, host: &str, tcp: TcpStream) -> Result<Connection, ProtocolError> {
        let mut builder = TlsConnector::builder();
        if self.skip_tls_verify {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let ssl_conn = builder.build()?;
        Ok(Box::new(ssl_conn.connect(host, tcp)?))
    }

    #[cfg(all(feature = "rustls-tls", not(feature = "native-tls")))]
    fn handshake(&self, host: &str, tcp: TcpStream) -> Result<Connection, ProtocolError> {
        let ssl_conn = RustlsConnector::new_with_native_certs()?;
        Ok(Box::new(ssl_conn.connect(host, tcp)?))
    }
}

/// Reads the greeting off `stream` and hands the stream back.
fn greeted<T: Read + Write>(stream: T) -> Result<T, ProtocolError> {
    let mut conn = Conn::new(stream);
    conn.read_greeting()?;
    conn.into_inner()
}

impl Connector for ClientBuilder {
    type Stream = Connection;

    fn connect(&mut self, host: &str, port: u16) -> Result<Connection, ProtocolError> {
        tracing::debug!(host, port, mode = ?self.mode, "dialling");
        let tcp = TcpStream::connect((host, port))?;
        match self.mode {
            ConnectionMode::Plaintext => Ok(Box::new(greeted(tcp)?)),
            #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
            ConnectionMode::Tls => greeted(self.handshake(host, tcp)?),
            #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
            ConnectionMode::StartTls => {
                let mut conn = Conn::new(tcp);
                conn.read_greeting()?;
                conn.run_command_and_check_ok("STARTTLS")?;
                self.handshake(host, conn.into_inner()?)
            }
        }
    }
}
