//! The protocol client seam the [`Session`](crate::Session) is built on.

use crate::error::ProtocolError;
use crate::types::{Fetch, Mailbox, Seq, SequenceRange, Summary, Uid};

/// A blocking IMAP protocol client that issues one command at a time.
///
/// Each method is a single request/response round trip. `Ok` corresponds to a zero status; every
/// failure is a [`ProtocolError`], whose [`code`](ProtocolError::code) is the nonzero numeric
/// status. Implementations do not track session state; the [`Session`](crate::Session) does.
///
/// [`Client`](crate::Client) implements this trait over a real transport. With the
/// `test_helpers` feature, [`MockProtocol`](crate::testing::MockProtocol) provides a scripted
/// in-memory server.
pub trait Protocol {
    /// Opens the transport to `host:port` and consumes the server greeting.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), ProtocolError>;

    /// Authenticates with a plaintext `LOGIN`.
    fn login(&mut self, user: &str, password: &str) -> Result<(), ProtocolError>;

    /// Selects `mailbox` for subsequent message commands.
    fn select(&mut self, mailbox: &str) -> Result<Mailbox, ProtocolError>;

    /// Asks for the `MESSAGES` status attribute of `mailbox` and returns it.
    fn status_message_count(&mut self, mailbox: &str) -> Result<u32, ProtocolError>;

    /// Fetches only the `UID` attribute of every message in `range`, in server order.
    fn fetch_uids(&mut self, range: SequenceRange) -> Result<Vec<Fetch>, ProtocolError>;

    /// Fetches the envelope and the undivided body section of the message with `uid`, in one
    /// round trip.
    fn fetch_summary(&mut self, uid: Uid) -> Result<Summary, ProtocolError>;

    /// Adds the `\Deleted` flag to the message with `uid`.
    fn store_deleted(&mut self, uid: Uid) -> Result<(), ProtocolError>;

    /// Permanently removes every `\Deleted` message from the selected mailbox and returns the
    /// sequence numbers the server reported as expunged.
    fn expunge(&mut self) -> Result<Vec<Seq>, ProtocolError>;

    /// Ends the IMAP session.
    fn logout(&mut self) -> Result<(), ProtocolError>;
}

impl<P: Protocol + ?Sized> Protocol for Box<P> {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), ProtocolError> {
        (**self).connect(host, port)
    }

    fn login(&mut self, user: &str, password: &str) -> Result<(), ProtocolError> {
        (**self).login(user, password)
    }

    fn select(&mut self, mailbox: &str) -> Result<Mailbox, ProtocolError> {
        (**self).select(mailbox)
    }

    fn status_message_count(&mut self, mailbox: &str) -> Result<u32, ProtocolError> {
        (**self).status_message_count(mailbox)
    }

    fn fetch_uids(&mut self, range: SequenceRange) -> Result<Vec<Fetch>, ProtocolError> {
        (**self).fetch_uids(range)
    }

    fn fetch_summary(&mut self, uid: Uid) -> Result<Summary, ProtocolError> {
        (**self).fetch_summary(uid)
    }

    fn store_deleted(&mut self, uid: Uid) -> Result<(), ProtocolError> {
        (**self).store_deleted(uid)
    }

    fn expunge(&mut self) -> Result<Vec<Seq>, ProtocolError> {
        (**self).expunge()
    }

    fn logout(&mut self) -> Result<(), ProtocolError> {
        (**self).logout()
    }
}
