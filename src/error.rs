//! IMAP error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
use std::net::TcpStream;
use std::result;

use bufstream::IntoInnerError as BufError;
#[cfg(feature = "native-tls")]
use native_tls::Error as TlsError;
#[cfg(feature = "native-tls")]
use native_tls::HandshakeError as TlsHandshakeError;
#[cfg(feature = "rustls-tls")]
use rustls_connector::HandshakeError as RustlsHandshakeError;

use crate::session::State;
use crate::types::Uid;

/// A convenience wrapper around `Result` for [`Error`].
pub type Result<T> = result::Result<T, Error>;

/// Errors produced by a [`Session`](crate::Session).
///
/// Every variant that stems from a protocol round trip carries the identifier the operation was
/// aimed at (server, mailbox name or UID) and the [`ProtocolError`] returned by the protocol
/// client, whose [`code`](ProtocolError::code) is the raw numeric status.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The transport to `server:port` could not be established.
    Connection {
        /// Host name that was dialled.
        server: String,
        /// Port that was dialled.
        port: u16,
        /// Underlying failure.
        source: ProtocolError,
    },
    /// The server refused the credentials of `user`.
    Authentication {
        /// User name that was sent.
        user: String,
        /// Underlying failure.
        source: ProtocolError,
    },
    /// The mailbox does not exist or could not be selected.
    Mailbox {
        /// Name of the mailbox.
        name: String,
        /// Underlying failure.
        source: ProtocolError,
    },
    /// The `STATUS` query for a mailbox failed.
    StatusQuery {
        /// Name of the queried mailbox.
        mailbox: String,
        /// Underlying failure.
        source: ProtocolError,
    },
    /// A `FETCH` or `UID FETCH` failed.
    Fetch {
        /// What was being fetched.
        target: FetchTarget,
        /// Underlying failure.
        source: ProtocolError,
    },
    /// Flagging a message as `\Deleted` failed.
    Store {
        /// UID of the message.
        uid: Uid,
        /// Underlying failure.
        source: ProtocolError,
    },
    /// `EXPUNGE` failed.
    Expunge {
        /// Mailbox that was being expunged.
        mailbox: String,
        /// Underlying failure.
        source: ProtocolError,
    },
    /// `LOGOUT` failed.
    Logout {
        /// Underlying failure.
        source: ProtocolError,
    },
    /// An operation was attempted in a session state that does not allow it. No command was sent.
    State {
        /// The attempted operation.
        operation: &'static str,
        /// The state the session was in.
        state: State,
    },
}

/// The object of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    /// The UID listing of a whole mailbox.
    Mailbox(String),
    /// The envelope and body of a single message.
    Uid(Uid),
}

impl Error {
    /// The protocol error behind this error, if any.
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            Error::Connection { source, .. }
            | Error::Authentication { source, .. }
            | Error::Mailbox { source, .. }
            | Error::StatusQuery { source, .. }
            | Error::Fetch { source, .. }
            | Error::Store { source, .. }
            | Error::Expunge { source, .. }
            | Error::Logout { source } => Some(source),
            Error::State { .. } => None,
        }
    }

    /// The raw numeric status code of the failed protocol call.
    ///
    /// Returns `None` for [`Error::State`], which is raised before anything reaches the protocol
    /// client.
    pub fn code(&self) -> Option<u32> {
        self.protocol_error().map(ProtocolError::code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection {
                server,
                port,
                source,
            } => write!(
                f,
                "Connection Error: Unable to connect to {}:{} ({})",
                server,
                port,
                Coded(source)
            ),
            Error::Authentication { user, source } => write!(
                f,
                "Login Error: Unable to log in {} ({})",
                user,
                Coded(source)
            ),
            Error::Mailbox { name, source } => write!(
                f,
                "Mailbox Error: Unable to select mailbox {} ({})",
                name,
                Coded(source)
            ),
            Error::StatusQuery { mailbox, source } => write!(
                f,
                "Status Error: Unable to query the message count of mailbox {} ({})",
                mailbox,
                Coded(source)
            ),
            Error::Fetch {
                target: FetchTarget::Mailbox(mailbox),
                source,
            } => write!(
                f,
                "Message Retrieval Error: Unable to retrieve all messages from mailbox {} ({})",
                mailbox,
                Coded(source)
            ),
            Error::Fetch {
                target: FetchTarget::Uid(uid),
                source,
            } => write!(
                f,
                "UID Fetch Error: Unable to fetch message attributes for message with UID {} ({})",
                uid,
                Coded(source)
            ),
            Error::Store { uid, source } => write!(
                f,
                "Store Error: Unable to flag message with UID {} as deleted ({})",
                uid,
                Coded(source)
            ),
            Error::Expunge { mailbox, source } => write!(
                f,
                "Expunge Error: Unable to expunge mailbox {} ({})",
                mailbox,
                Coded(source)
            ),
            Error::Logout { source } => {
                write!(f, "Logout Error: Unable to log out ({})", Coded(source))
            }
            Error::State { operation, state } => write!(
                f,
                "State Error: Cannot {} while the session is {}",
                operation, state
            ),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.protocol_error().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Renders a protocol error prefixed with its numeric code.
struct Coded<'a>(&'a ProtocolError);

impl fmt::Display for Coded<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error code {}: {}", self.0.code(), self.0)
    }
}

/// A set of errors that can occur while talking to the IMAP server.
#[derive(Debug)]
#[non_exhaustive]
pub enum ProtocolError {
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    Io(IoError),
    /// An error from the `native_tls` library during the TLS handshake.
    #[cfg(feature = "native-tls")]
    TlsHandshake(TlsHandshakeError<TcpStream>),
    /// An error from the `native_tls` library while managing the socket.
    #[cfg(feature = "native-tls")]
    Tls(TlsError),
    /// An error from the `rustls` library during the TLS handshake.
    #[cfg(feature = "rustls-tls")]
    RustlsHandshake(RustlsHandshakeError<TcpStream>),
    /// A BAD response from the IMAP server.
    Bad(String),
    /// A NO response from the IMAP server.
    No(String),
    /// A BYE response from the IMAP server.
    Bye(String),
    /// The connection was terminated unexpectedly.
    ConnectionLost,
    /// Error parsing a server response.
    Parse(ParseError),
    /// Command inputs were not valid [IMAP
    /// strings](https://tools.ietf.org/html/rfc3501#section-4.3).
    Validate(ValidateError),
    /// A command was issued before a transport was established.
    NotConnected,
}

impl ProtocolError {
    /// The numeric status code of this error. Always nonzero; zero is reserved for success.
    pub fn code(&self) -> u32 {
        match self {
            ProtocolError::NotConnected => 1,
            ProtocolError::Io(_) => 2,
            ProtocolError::ConnectionLost => 3,
            ProtocolError::Bye(_) => 4,
            ProtocolError::No(_) => 5,
            ProtocolError::Bad(_) => 6,
            ProtocolError::Parse(_) => 7,
            ProtocolError::Validate(_) => 8,
            #[cfg(feature = "native-tls")]
            ProtocolError::TlsHandshake(_) | ProtocolError::Tls(_) => 9,
            #[cfg(feature = "rustls-tls")]
            ProtocolError::RustlsHandshake(_) => 9,
        }
    }
}

impl From<IoError> for ProtocolError {
    fn from(err: IoError) -> ProtocolError {
        ProtocolError::Io(err)
    }
}

impl<T> From<BufError<T>> for ProtocolError {
    fn from(err: BufError<T>) -> ProtocolError {
        ProtocolError::Io(err.into())
    }
}

#[cfg(feature = "native-tls")]
impl From<TlsHandshakeError<TcpStream>> for ProtocolError {
    fn from(err: TlsHandshakeError<TcpStream>) -> ProtocolError {
        ProtocolError::TlsHandshake(err)
    }
}

#[cfg(feature = "native-tls")]
impl From<TlsError> for ProtocolError {
    fn from(err: TlsError) -> ProtocolError {
        ProtocolError::Tls(err)
    }
}

#[cfg(feature = "rustls-tls")]
impl From<RustlsHandshakeError<TcpStream>> for ProtocolError {
    fn from(err: RustlsHandshakeError<TcpStream>) -> ProtocolError {
        ProtocolError::RustlsHandshake(err)
    }
}

impl From<ParseError> for ProtocolError {
    fn from(err: ParseError) -> ProtocolError {
        ProtocolError::Parse(err)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(e) => fmt::Display::fmt(e, f),
            #[cfg(feature = "native-tls")]
            ProtocolError::Tls(e) => fmt::Display::fmt(e, f),
            #[cfg(feature = "native-tls")]
            ProtocolError::TlsHandshake(e) => fmt::Display::fmt(e, f),
            #[cfg(feature = "rustls-tls")]
            ProtocolError::RustlsHandshake(e) => fmt::Display::fmt(e, f),
            ProtocolError::Validate(e) => fmt::Display::fmt(e, f),
            ProtocolError::Parse(e) => fmt::Display::fmt(e, f),
            ProtocolError::No(data) => write!(f, "No Response: {}", data),
            ProtocolError::Bad(data) => write!(f, "Bad Response: {}", data),
            ProtocolError::Bye(data) => write!(f, "Bye Response: {}", data),
            ProtocolError::ConnectionLost => f.write_str("Connection Lost"),
            ProtocolError::NotConnected => f.write_str("Not connected"),
        }
    }
}

impl StdError for ProtocolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ProtocolError::Io(e) => Some(e),
            #[cfg(feature = "native-tls")]
            ProtocolError::Tls(e) => Some(e),
            #[cfg(feature = "native-tls")]
            ProtocolError::TlsHandshake(e) => Some(e),
            #[cfg(feature = "rustls-tls")]
            ProtocolError::RustlsHandshake(e) => Some(e),
            ProtocolError::Parse(e) => Some(e),
            ProtocolError::Validate(e) => Some(e),
            _ => None,
        }
    }
}

/// An error occured while trying to parse a server response.
#[derive(Debug)]
pub enum ParseError {
    /// Indicates an error parsing the status response. Such as OK, NO, and BAD.
    Invalid(Vec<u8>),
    /// The client received an unexpected response that is not known to the client.
    Unexpected(String),
    /// A tagged completion carried a tag other than the one of the pending command.
    Tag(String),
    /// The response completed successfully but lacked the data the command asked for.
    Missing(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Invalid(_) => f.write_str("Unable to parse status response"),
            ParseError::Unexpected(r) => write!(f, "Unexpected response: {}", r),
            ParseError::Tag(t) => write!(f, "Response for unknown tag {}", t),
            ParseError::Missing(what) => write!(f, "Response did not contain {}", what),
        }
    }
}

impl StdError for ParseError {}

/// An [invalid character](https://tools.ietf.org/html/rfc3501#section-4.3) was found in an input
/// string.
#[derive(Debug)]
pub struct ValidateError(pub char);

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // print character in debug form because invalid ones are often whitespaces
        write!(f, "Invalid character in input: {:?}", self.0)
    }
}

impl StdError for ValidateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_nonzero() {
        let errors = vec![
            ProtocolError::NotConnected,
            ProtocolError::Io(IoError::new(std::io::ErrorKind::Other, "boom")),
            ProtocolError::ConnectionLost,
            ProtocolError::Bye("bye".to_string()),
            ProtocolError::No("no".to_string()),
            ProtocolError::Bad("bad".to_string()),
            ProtocolError::Parse(ParseError::Missing("UID")),
            ProtocolError::Validate(ValidateError('\n')),
        ];
        for e in errors {
            assert_ne!(e.code(), 0, "{:?} has a zero code", e);
        }
    }

    #[test]
    fn display_carries_target_and_code() {
        let e = Error::Store {
            uid: 11,
            source: ProtocolError::No("STORE failed".to_string()),
        };
        assert_eq!(
            e.to_string(),
            "Store Error: Unable to flag message with UID 11 as deleted \
             (error code 5: No Response: STORE failed)"
        );
        assert_eq!(e.code(), Some(5));

        let e = Error::Mailbox {
            name: "Archive".to_string(),
            source: ProtocolError::ConnectionLost,
        };
        assert!(e.to_string().contains("Archive"));
        assert!(e.to_string().contains("error code 3"));
    }

    #[test]
    fn state_errors_have_no_code() {
        let e = Error::State {
            operation: "select a mailbox",
            state: State::Connected,
        };
        assert_eq!(e.code(), None);
        assert!(e.source().is_none());
        assert_eq!(
            e.to_string(),
            "State Error: Cannot select a mailbox while the session is connected"
        );
    }

    #[test]
    fn source_chains_to_protocol_error() {
        let e = Error::Logout {
            source: ProtocolError::Parse(ParseError::Missing("BYE")),
        };
        let source = e.source().unwrap();
        assert_eq!(source.to_string(), "Response did not contain BYE");
        assert!(source.source().is_some());
    }
}
