//! A mailbox session on top of a blocking IMAP client.
//!
//! The [`Session`] walks an IMAP connection through its lifecycle (connect, log in, select a
//! mailbox), lists the messages of the selected mailbox and deletes them again. It talks to the
//! server through a [`Protocol`] client; [`Client`] is the one that speaks
//! [RFC 3501](https://tools.ietf.org/html/rfc3501) over TCP, optionally wrapped in TLS.
//!
//! # Usage
//!
//! ```no_run
//! use imap_session::{Client, ClientBuilder, Session};
//!
//! fn main() -> imap_session::Result<()> {
//!     let client = Client::new(ClientBuilder::new());
//!     let mut session = Session::new(client, || println!("the mailbox changed"));
//!
//!     session.connect("imap.example.com", 143)?;
//!     session.login("username", "password")?;
//!     let mailbox = session.select_mailbox("INBOX")?;
//!     println!("{}", mailbox);
//!
//!     for message in session.get_messages()? {
//!         println!("{} from {}: {}", message.uid(), message.from(), message.subject());
//!     }
//!     for e in session.fetch_errors() {
//!         eprintln!("{}", e);
//!     }
//!
//!     // Deleting a message expunges it and drops the cached listing.
//!     if let Some(message) = session.message_mut(42) {
//!         message.delete_from_mailbox()?;
//!         assert!(session.messages().is_empty());
//!     }
//!
//!     session.logout()
//! }
//! ```
//!
//! ## Opting out of `native_tls`
//!
//! For situations where using openssl becomes problematic, you can disable the
//! default feature which provides integration with the `native_tls` crate. One major
//! reason you might want to do this is cross-compiling. To opt out of native_tls, add
//! this to your Cargo.toml file:
//!
//! ```toml
//! [dependencies.imap-session]
//! version = "<some version>"
//! default-features = false
//! ```
//!
//! The `rustls-tls` feature provides TLS through `rustls` instead.
//!
//! # Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events: commands and responses at `trace`
//! level (with `LOGIN` credentials redacted), state changes and round trips at `debug`, and
//! recoverable failures at `warn`. No subscriber is installed.

mod parse;

pub mod types;

mod client;
mod client_builder;
mod conn;
pub mod error;
mod message;
mod protocol;
mod session;

pub use crate::client::Client;
pub use crate::client_builder::{
    ClientBuilder, ConnectionMode, Connector, DEFAULT_PORT, DEFAULT_TLS_PORT,
};
pub use crate::conn::{Connection, ImapConnection};
pub use crate::error::{Error, FetchTarget, ProtocolError, Result};
pub use crate::message::{format_address_list, Field, Message, MessageHandle, UnknownField};
pub use crate::protocol::Protocol;
pub use crate::session::{Session, State, DEFAULT_MAILBOX};
pub use crate::types::*;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

#[cfg(test)]
mod mock_stream;
