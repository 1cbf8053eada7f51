//! Enable the test_helpers feature to get [`MockProtocol`], an in-memory IMAP server for testing
//! code built on [`Session`](crate::Session) without a network.
//!
//! To use it, add a dev-dependency on this crate with the feature "test_helpers", e.g.
//!
//! ```toml
//! [dependencies]
//! imap-session = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! imap-session = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
//! ```
//! use imap_session::testing::{Command, MockProtocol};
//! use imap_session::{Session, Summary};
//!
//! let server = MockProtocol::new()
//!     .with_user("alice", "secret")
//!     .with_message("INBOX", 10, Summary::default());
//! let mut session = Session::new(server, || {});
//! session.connect_default("localhost").unwrap();
//! session.login("alice", "secret").unwrap();
//! session.select_mailbox("INBOX").unwrap();
//! assert_eq!(session.get_messages().unwrap().len(), 1);
//! assert_eq!(session.protocol().commands().last(), Some(&Command::FetchSummary(10)));
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use crate::error::{ParseError, ProtocolError};
use crate::protocol::Protocol;
use crate::types::{Fetch, Mailbox, Seq, SequenceRange, Summary, Uid};

/// A command received by a [`MockProtocol`], in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A connection to host and port.
    Connect(String, u16),
    /// A `LOGIN` as the given user. The password is not recorded.
    Login(String),
    /// A `SELECT` of the named mailbox.
    Select(String),
    /// A `STATUS (MESSAGES)` query of the named mailbox.
    Status(String),
    /// A `FETCH (UID)` over the range.
    FetchUids(SequenceRange),
    /// A `UID FETCH (ENVELOPE BODY[])` of one message.
    FetchSummary(Uid),
    /// A `UID STORE +FLAGS.SILENT (\Deleted)` of one message.
    StoreDeleted(Uid),
    /// An `EXPUNGE` of the selected mailbox.
    Expunge,
    /// A `LOGOUT`.
    Logout,
}

impl Command {
    /// The protocol operation this command belongs to.
    pub fn operation(&self) -> Operation {
        match self {
            Command::Connect(..) => Operation::Connect,
            Command::Login(_) => Operation::Login,
            Command::Select(_) => Operation::Select,
            Command::Status(_) => Operation::Status,
            Command::FetchUids(_) => Operation::FetchUids,
            Command::FetchSummary(_) => Operation::FetchSummary,
            Command::StoreDeleted(_) => Operation::Store,
            Command::Expunge => Operation::Expunge,
            Command::Logout => Operation::Logout,
        }
    }
}

/// The [`Protocol`] operations, used to inject failures and count commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`Protocol::connect`]
    Connect,
    /// [`Protocol::login`]
    Login,
    /// [`Protocol::select`]
    Select,
    /// [`Protocol::status_message_count`]
    Status,
    /// [`Protocol::fetch_uids`]
    FetchUids,
    /// [`Protocol::fetch_summary`]
    FetchSummary,
    /// [`Protocol::store_deleted`]
    Store,
    /// [`Protocol::expunge`]
    Expunge,
    /// [`Protocol::logout`]
    Logout,
}

/// A command log that outlives the [`MockProtocol`] writing to it.
pub type SharedLog = Rc<RefCell<Vec<Command>>>;

#[derive(Debug)]
struct StoredMessage {
    uid: Uid,
    summary: Summary,
    deleted: bool,
}

#[derive(Debug, Default)]
struct StoredMailbox {
    messages: Vec<StoredMessage>,
    uid_next: Uid,
}

/// A scripted in-memory IMAP server.
///
/// Mailboxes hold messages in insertion order, which is the order UIDs are listed in. `STORE`
/// flags messages and `EXPUNGE` removes the flagged ones, so deletions are visible to later
/// listings. Failures can be injected per operation, and every command is logged.
#[derive(Debug, Default)]
pub struct MockProtocol {
    mailboxes: BTreeMap<String, StoredMailbox>,
    credentials: Option<(String, String)>,
    connected: bool,
    selected: Option<String>,
    failures: HashMap<Operation, VecDeque<ProtocolError>>,
    summary_failures: HashMap<Uid, ProtocolError>,
    scripted_uids: Option<Vec<Option<Uid>>>,
    log: SharedLog,
}

impl MockProtocol {
    /// A server without mailboxes that accepts any login.
    pub fn new() -> Self {
        MockProtocol::default()
    }

    /// A fresh log to pass to [`with_log`](MockProtocol::with_log).
    pub fn shared_log() -> SharedLog {
        Rc::new(RefCell::new(Vec::new()))
    }

    /// Records commands into `log` instead of a private log.
    pub fn with_log(mut self, log: SharedLog) -> Self {
        self.log = log;
        self
    }

    /// Only accepts `user` with `password`.
    pub fn with_user(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some((user.to_string(), password.to_string()));
        self
    }

    /// Creates the empty mailbox `name`, if it does not exist.
    pub fn with_mailbox(mut self, name: &str) -> Self {
        self.mailbox_entry(name);
        self
    }

    /// Appends a message with `uid` to mailbox `name`, creating the mailbox if needed.
    pub fn with_message(mut self, name: &str, uid: Uid, summary: Summary) -> Self {
        let mailbox = self.mailbox_entry(name);
        mailbox.uid_next = mailbox.uid_next.max(uid + 1);
        mailbox.messages.push(StoredMessage {
            uid,
            summary,
            deleted: false,
        });
        self
    }

    fn mailbox_entry(&mut self, name: &str) -> &mut StoredMailbox {
        self.mailboxes
            .entry(name.to_string())
            .or_insert_with(|| StoredMailbox {
                messages: Vec::new(),
                uid_next: 1,
            })
    }

    /// Makes the next command of `operation` fail with `error`.
    ///
    /// Failures queue up: each one is used for exactly one command.
    pub fn fail_next(&mut self, operation: Operation, error: ProtocolError) {
        self.failures.entry(operation).or_default().push_back(error);
    }

    /// Makes the next summary fetch of `uid` fail with `error`.
    pub fn fail_summary(&mut self, uid: Uid, error: ProtocolError) {
        self.summary_failures.insert(uid, error);
    }

    /// Makes the next UID listing answer with `uids` instead of the mailbox contents.
    pub fn script_fetch_uids(&mut self, uids: Vec<Option<Uid>>) {
        self.scripted_uids = Some(uids);
    }

    /// Every command received so far.
    pub fn commands(&self) -> Vec<Command> {
        self.log.borrow().clone()
    }

    /// How many commands of `operation` were received.
    pub fn count(&self, operation: Operation) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// The UIDs currently stored in mailbox `name`, deleted or not.
    pub fn uids(&self, name: &str) -> Vec<Uid> {
        self.mailboxes
            .get(name)
            .map(|m| m.messages.iter().map(|s| s.uid).collect())
            .unwrap_or_default()
    }

    fn receive(&mut self, command: Command) -> Result<(), ProtocolError> {
        let operation = command.operation();
        tracing::trace!(?command, "mock received");
        self.log.borrow_mut().push(command);
        if operation != Operation::Connect && !self.connected {
            return Err(ProtocolError::NotConnected);
        }
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn selected_mut(&mut self) -> Result<&mut StoredMailbox, ProtocolError> {
        let name = self
            .selected
            .as_ref()
            .ok_or_else(|| ProtocolError::Bad("No mailbox selected".to_string()))?;
        self.mailboxes
            .get_mut(name)
            .ok_or_else(|| ProtocolError::No("Mailbox has been deleted".to_string()))
    }
}

impl Protocol for MockProtocol {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), ProtocolError> {
        self.receive(Command::Connect(host.to_string(), port))?;
        self.connected = true;
        Ok(())
    }

    fn login(&mut self, user: &str, password: &str) -> Result<(), ProtocolError> {
        self.receive(Command::Login(user.to_string()))?;
        match &self.credentials {
            Some((u, p)) if u != user || p != password => {
                Err(ProtocolError::No("Invalid credentials".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn select(&mut self, mailbox: &str) -> Result<Mailbox, ProtocolError> {
        self.selected = None;
        self.receive(Command::Select(mailbox.to_string()))?;
        let stored = self
            .mailboxes
            .get(mailbox)
            .ok_or_else(|| ProtocolError::No(format!("Mailbox doesn't exist: {}", mailbox)))?;
        let info = Mailbox {
            exists: stored.messages.len() as u32,
            uid_next: Some(stored.uid_next),
            uid_validity: Some(1),
            ..Mailbox::default()
        };
        self.selected = Some(mailbox.to_string());
        Ok(info)
    }

    fn status_message_count(&mut self, mailbox: &str) -> Result<u32, ProtocolError> {
        self.receive(Command::Status(mailbox.to_string()))?;
        self.mailboxes
            .get(mailbox)
            .map(|m| m.messages.len() as u32)
            .ok_or_else(|| ProtocolError::No(format!("Mailbox doesn't exist: {}", mailbox)))
    }

    fn fetch_uids(&mut self, range: SequenceRange) -> Result<Vec<Fetch>, ProtocolError> {
        self.receive(Command::FetchUids(range))?;
        let scripted = self.scripted_uids.take();
        let mailbox = self.selected_mut()?;
        let uids: Vec<Option<Uid>> = match scripted {
            Some(uids) => uids,
            None => mailbox.messages.iter().map(|m| Some(m.uid)).collect(),
        };
        let last = uids.len() as Seq;
        let end = range.end.unwrap_or(last);
        if uids.is_empty() || range.start == 0 || range.start > end || end > last {
            return Err(ProtocolError::Bad("Invalid messageset".to_string()));
        }
        Ok((range.start..=end)
            .map(|message| Fetch {
                message,
                uid: uids[message as usize - 1],
            })
            .collect())
    }

    fn fetch_summary(&mut self, uid: Uid) -> Result<Summary, ProtocolError> {
        self.receive(Command::FetchSummary(uid))?;
        if let Some(e) = self.summary_failures.remove(&uid) {
            return Err(e);
        }
        let mailbox = self.selected_mut()?;
        mailbox
            .messages
            .iter()
            .find(|m| m.uid == uid)
            .map(|m| m.summary.clone())
            .ok_or_else(|| ParseError::Missing("a FETCH response for the requested UID").into())
    }

    fn store_deleted(&mut self, uid: Uid) -> Result<(), ProtocolError> {
        self.receive(Command::StoreDeleted(uid))?;
        let mailbox = self.selected_mut()?;
        for message in mailbox.messages.iter_mut().filter(|m| m.uid == uid) {
            message.deleted = true;
        }
        Ok(())
    }

    fn expunge(&mut self) -> Result<Vec<Seq>, ProtocolError> {
        self.receive(Command::Expunge)?;
        let mailbox = self.selected_mut()?;
        let mut expunged = Vec::new();
        let mut i = 0;
        while i < mailbox.messages.len() {
            if mailbox.messages[i].deleted {
                mailbox.messages.remove(i);
                expunged.push(i as Seq + 1);
            } else {
                i += 1;
            }
        }
        Ok(expunged)
    }

    fn logout(&mut self) -> Result<(), ProtocolError> {
        let received = self.receive(Command::Logout);
        self.connected = false;
        self.selected = None;
        received
    }
}
