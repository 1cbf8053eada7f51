//! Messages of the selected mailbox and the operations performed through them.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::error::{Error, FetchTarget, Result};
use crate::protocol::Protocol;
use crate::session::{Session, State};
use crate::types::{Address, Summary, Uid};

/// One mail item of the selected mailbox, addressed by its UID.
///
/// The summary fields stay empty until the message has been populated, which
/// [`Session::get_messages`] does for every message it lists. Population is all-or-nothing: a
/// failed fetch leaves every field empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    uid: Uid,
    from: String,
    subject: String,
    body: String,
    populated: bool,
}

/// The closed set of summary fields that can be looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// The envelope subject.
    Subject,
    /// The formatted envelope sender list.
    From,
}

impl Field {
    /// The name of this field as accepted by [`Message::field`].
    pub fn name(self) -> &'static str {
        match self {
            Field::Subject => "Subject",
            Field::From => "From",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The name given to [`Field::from_str`] is not a known field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown message field: {:?}", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Subject" => Ok(Field::Subject),
            "From" => Ok(Field::From),
            _ => Err(UnknownField(s.to_string())),
        }
    }
}

impl Message {
    pub(crate) fn new(uid: Uid) -> Message {
        Message {
            uid,
            from: String::new(),
            subject: String::new(),
            body: String::new(),
            populated: false,
        }
    }

    /// The server-assigned unique identifier of this message.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// The formatted sender list, see [`format_address_list`].
    pub fn from(&self) -> &str {
        &self.from
    }

    /// The subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The text of the undivided body section.
    ///
    /// No MIME structure is interpreted: for a multipart message this is the whole top-level
    /// section, boundaries and part headers included.
    ///
    /// The section is decoded as UTF-8; bytes that are not valid UTF-8 (for instance in an 8-bit
    /// body in another charset) are replaced with `U+FFFD`.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether the summary fields have been fetched.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// The value of `field`.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Subject => &self.subject,
            Field::From => &self.from,
        }
    }

    /// The value of the field called `name` (`"Subject"` or `"From"`), or an empty string for
    /// any other name.
    pub fn field(&self, name: &str) -> &str {
        name.parse().map(|f| self.get(f)).unwrap_or("")
    }

    /// Fetches the envelope and body of this message in a single `UID FETCH` and fills in the
    /// summary fields.
    ///
    /// A message is populated at most once; calling this on a populated message does nothing.
    pub fn populate<P: Protocol + ?Sized>(&mut self, protocol: &mut P) -> Result<()> {
        if self.populated {
            return Ok(());
        }
        let summary = protocol.fetch_summary(self.uid).map_err(|source| Error::Fetch {
            target: FetchTarget::Uid(self.uid),
            source,
        })?;
        self.apply(summary);
        Ok(())
    }

    fn apply(&mut self, summary: Summary) {
        if let Some(subject) = summary.subject {
            self.subject = subject;
        }
        if !summary.from.is_empty() {
            self.from = format_address_list(&summary.from);
        }
        if let Some(body) = summary.body {
            self.body = body;
        }
        self.populated = true;
    }
}

/// Formats an envelope address list the way it is shown to users.
///
/// Each address contributes `"<name>, "` if it has a display name, followed by
/// `"<<mailbox>@<host>>; "` if it has both a mailbox and a host. Contributions are concatenated
/// in list order and the trailing separator is kept.
///
/// ```
/// # use imap_session::{format_address_list, Address};
/// let alice = Address::new(Some("Alice"), Some("alice"), Some("example.com"));
/// assert_eq!(format_address_list(&[alice]), "Alice, <alice@example.com>; ");
/// ```
pub fn format_address_list(addresses: &[Address]) -> String {
    let mut from = String::new();
    for address in addresses {
        if let Some(name) = &address.name {
            from.push_str(name);
            from.push_str(", ");
        }
        if let (Some(mailbox), Some(host)) = (&address.mailbox, &address.host) {
            from.push('<');
            from.push_str(mailbox);
            from.push('@');
            from.push_str(host);
            from.push_str(">; ");
        }
    }
    from
}

/// A cached message together with exclusive access to the [`Session`] that owns it.
///
/// Obtained from [`Session::message_mut`]. Dereferences to the [`Message`]. Deleting the message
/// consumes the handle, so a deleted message can no longer be reached.
pub struct MessageHandle<'s, P: Protocol> {
    session: &'s mut Session<P>,
    index: usize,
}

impl<'s, P: Protocol> MessageHandle<'s, P> {
    pub(crate) fn new(session: &'s mut Session<P>, index: usize) -> Self {
        MessageHandle { session, index }
    }

    /// Populates the message if an earlier attempt failed. See [`Message::populate`].
    pub fn populate(&mut self) -> Result<()> {
        let session = &mut *self.session;
        let message = &mut session.messages[self.index];
        let uid = message.uid;
        message.populate(&mut session.protocol)?;
        session.fetch_errors.retain(|e| {
            !matches!(e, Error::Fetch { target: FetchTarget::Uid(u), .. } if *u == uid)
        });
        Ok(())
    }

    /// Permanently deletes this message from the selected mailbox.
    ///
    /// Flags the message `\Deleted` with a `UID STORE`, then `EXPUNGE`s the mailbox. Once the
    /// server has removed the message, every other cached message is discarded too (sequence
    /// numbers have shifted, so the cache is considered stale), the session's change callback is
    /// invoked once and the message itself is dropped.
    ///
    /// If either command fails, the error is returned and the cache is left as it was.
    pub fn delete_from_mailbox(self) -> Result<()> {
        let MessageHandle { session, index } = self;
        session.require("delete a message", &[State::Selected])?;
        let uid = session.messages[index].uid;

        session
            .protocol
            .store_deleted(uid)
            .map_err(|source| Error::Store { uid, source })?;
        let expunged = session
            .protocol
            .expunge()
            .map_err(|source| Error::Expunge {
                mailbox: session.mailbox.clone(),
                source,
            })?;
        tracing::debug!(uid, ?expunged, mailbox = %session.mailbox, "message expunged");

        session.delete_all_messages_except(uid);
        (session.on_change)();
        session.messages.retain(|m| m.uid != uid);
        session.prune_fetch_errors();
        Ok(())
    }
}

impl<P: Protocol> Deref for MessageHandle<'_, P> {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.session.messages[self.index]
    }
}

impl<P: Protocol> fmt::Debug for MessageHandle<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageHandle").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::testing::{MockProtocol, Operation};

    fn alice() -> Address {
        Address::new(Some("Alice"), Some("alice"), Some("example.com"))
    }

    #[test]
    fn format_name_and_address() {
        assert_eq!(format_address_list(&[alice()]), "Alice, <alice@example.com>; ");
    }

    #[test]
    fn format_address_only() {
        let a = Address::new(None, Some("alice"), Some("example.com"));
        assert_eq!(format_address_list(&[a]), "<alice@example.com>; ");
    }

    #[test]
    fn format_name_only() {
        let a = Address::new(Some("Alice"), None, None);
        assert_eq!(format_address_list(&[a]), "Alice, ");
    }

    #[test]
    fn format_needs_mailbox_and_host() {
        let a = Address::new(Some("Alice"), Some("alice"), None);
        assert_eq!(format_address_list(&[a]), "Alice, ");
        let b = Address::new(None, None, Some("example.com"));
        assert_eq!(format_address_list(&[b]), "");
    }

    #[test]
    fn format_keeps_list_order() {
        let bob = Address::new(None, Some("bob"), Some("example.org"));
        assert_eq!(
            format_address_list(&[alice(), bob]),
            "Alice, <alice@example.com>; <bob@example.org>; "
        );
        assert_eq!(format_address_list(&[]), "");
    }

    #[test]
    fn field_lookup() {
        let mut message = Message::new(10);
        message.apply(Summary {
            subject: Some("Lunch".to_string()),
            from: vec![alice()],
            body: Some("noon?".to_string()),
        });
        assert_eq!(message.field("Subject"), "Lunch");
        assert_eq!(message.field("From"), "Alice, <alice@example.com>; ");
        assert_eq!(message.field("Unknown"), "");
        assert_eq!(message.field("subject"), "");
        assert_eq!(message.get(Field::Subject), "Lunch");
        assert_eq!(message.body(), "noon?");
    }

    #[test]
    fn field_names_round_trip() {
        for field in [Field::Subject, Field::From] {
            assert_eq!(field.name().parse::<Field>(), Ok(field));
        }
        assert_eq!(
            "Date".parse::<Field>(),
            Err(UnknownField("Date".to_string()))
        );
    }

    #[test]
    fn populate_fetches_envelope_and_body_once() {
        let mut protocol = MockProtocol::new().with_message(
            "INBOX",
            10,
            Summary {
                subject: Some("Lunch".to_string()),
                from: vec![alice()],
                body: Some("noon?".to_string()),
            },
        );
        protocol.connect("localhost", 143).unwrap();
        protocol.select("INBOX").unwrap();

        let mut message = Message::new(10);
        assert!(!message.is_populated());
        message.populate(&mut protocol).unwrap();
        assert!(message.is_populated());
        assert_eq!(message.subject(), "Lunch");
        assert_eq!(message.from(), "Alice, <alice@example.com>; ");
        assert_eq!(message.body(), "noon?");

        message.populate(&mut protocol).unwrap();
        assert_eq!(protocol.count(Operation::FetchSummary), 1);
    }

    #[test]
    fn populate_leaves_missing_parts_empty() {
        let mut protocol = MockProtocol::new().with_message("INBOX", 10, Summary::default());
        protocol.connect("localhost", 143).unwrap();
        protocol.select("INBOX").unwrap();

        let mut message = Message::new(10);
        message.populate(&mut protocol).unwrap();
        assert!(message.is_populated());
        assert_eq!(message.subject(), "");
        assert_eq!(message.from(), "");
        assert_eq!(message.body(), "");
    }

    #[test]
    fn failed_populate_leaves_fields_untouched() {
        let mut protocol = MockProtocol::new().with_message(
            "INBOX",
            10,
            Summary {
                subject: Some("Lunch".to_string()),
                ..Summary::default()
            },
        );
        protocol.connect("localhost", 143).unwrap();
        protocol.select("INBOX").unwrap();
        protocol.fail_next(Operation::FetchSummary, ProtocolError::No("busy".to_string()));

        let mut message = Message::new(10);
        match message.populate(&mut protocol) {
            Err(Error::Fetch {
                target: FetchTarget::Uid(10),
                source: ProtocolError::No(_),
            }) => {}
            other => panic!("Wrong result: {:?}", other),
        }
        assert_eq!(message, Message::new(10));

        message.populate(&mut protocol).unwrap();
        assert_eq!(message.subject(), "Lunch");
    }
}
