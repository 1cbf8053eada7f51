use std::collections::HashSet;
use std::fmt;

use crate::client::Client;
use crate::client_builder::DEFAULT_PORT;
use crate::error::{Error, FetchTarget, Result};
use crate::message::{Message, MessageHandle};
use crate::protocol::Protocol;
use crate::types::{Mailbox, SequenceRange, Uid};

/// The mailbox a new [`Session`] works on until another one is selected.
pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Where a [`Session`] stands in the IMAP connection lifecycle.
///
/// States are only ever entered in order, except that a failed `SELECT` falls back from
/// [`State::Selected`] to [`State::Authenticated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// No transport is open.
    Disconnected,
    /// The server has greeted us, but we have not logged in.
    Connected,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// Logged in with a mailbox selected.
    Selected,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Disconnected => "disconnected",
            State::Connected => "connected",
            State::Authenticated => "authenticated",
            State::Selected => "selected",
        })
    }
}

/// A logged-in view of one mailbox, with a cache of its messages.
///
/// A `Session` owns its [`Protocol`] client for its whole lifetime and walks it through
/// connect, login and select. [`get_messages`](Session::get_messages) lists and populates the
/// messages of the selected mailbox; they stay cached until the next listing, a mailbox change or
/// a deletion. Every operation checks the session [`State`] before touching the network.
///
/// Dropping an authenticated session logs out; a failing `LOGOUT` is only logged. Use
/// [`logout`](Session::logout) to observe its outcome.
///
/// ```no_run
/// # use imap_session::{Client, Session};
/// # fn main() -> imap_session::Result<()> {
/// let mut session = Session::new(Client::plaintext(), || println!("mailbox changed"));
/// session.connect_default("imap.example.com")?;
/// session.login("alice", "secret")?;
/// session.select_mailbox("INBOX")?;
/// for message in session.get_messages()? {
///     println!("{}: {}", message.uid(), message.subject());
/// }
/// session.delete_message(11)?;
/// # Ok(())
/// # }
/// ```
pub struct Session<P: Protocol = Client> {
    pub(crate) protocol: P,
    pub(crate) mailbox: String,
    state: State,
    pub(crate) messages: Vec<Message>,
    pub(crate) fetch_errors: Vec<Error>,
    pub(crate) on_change: Box<dyn FnMut()>,
}

impl<P: Protocol> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("mailbox", &self.mailbox)
            .field("state", &self.state)
            .field("messages", &self.messages.len())
            .finish()
    }
}

impl<P: Protocol> Session<P> {
    /// Creates a disconnected session around `protocol`.
    ///
    /// `on_change` is called every time the set of messages visible in the mailbox changed
    /// because of this session.
    pub fn new<F>(protocol: P, on_change: F) -> Session<P>
    where
        F: FnMut() + 'static,
    {
        Session {
            protocol,
            mailbox: DEFAULT_MAILBOX.to_string(),
            state: State::Disconnected,
            messages: Vec::new(),
            fetch_errors: Vec::new(),
            on_change: Box::new(on_change),
        }
    }

    pub(crate) fn require(&self, operation: &'static str, allowed: &[State]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::State {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, state: State) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "session state changed");
            self.state = state;
        }
    }

    /// Opens the connection to `server:port`.
    pub fn connect(&mut self, server: &str, port: u16) -> Result<()> {
        self.require("connect", &[State::Disconnected])?;
        self.protocol
            .connect(server, port)
            .map_err(|source| Error::Connection {
                server: server.to_string(),
                port,
                source,
            })?;
        self.transition(State::Connected);
        Ok(())
    }

    /// Opens the connection to `server` on [`DEFAULT_PORT`].
    pub fn connect_default(&mut self, server: &str) -> Result<()> {
        self.connect(server, DEFAULT_PORT)
    }

    /// Logs in with a plaintext password.
    ///
    /// A rejected login leaves the session connected, so it can be retried.
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        self.require("log in", &[State::Connected])?;
        self.protocol
            .login(user, password)
            .map_err(|source| Error::Authentication {
                user: user.to_string(),
                source,
            })?;
        self.transition(State::Authenticated);
        Ok(())
    }

    /// Selects `name` as the mailbox the session works on, discarding the cached messages of the
    /// previous one.
    ///
    /// If the server refuses the mailbox, no mailbox is selected afterwards.
    pub fn select_mailbox(&mut self, name: &str) -> Result<Mailbox> {
        self.require("select a mailbox", &[State::Authenticated, State::Selected])?;
        self.mailbox = name.to_string();
        self.delete_all_messages();
        match self.protocol.select(name) {
            Ok(mailbox) => {
                self.transition(State::Selected);
                Ok(mailbox)
            }
            Err(source) => {
                self.transition(State::Authenticated);
                Err(Error::Mailbox {
                    name: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Asks the server how many messages `mailbox` holds.
    pub fn fetch_message_count(&mut self, mailbox: &str) -> Result<u32> {
        self.require(
            "query the message count",
            &[State::Authenticated, State::Selected],
        )?;
        self.protocol
            .status_message_count(mailbox)
            .map_err(|source| Error::StatusQuery {
                mailbox: mailbox.to_string(),
                source,
            })
    }

    /// Lists every message of the selected mailbox, populated, in server order.
    ///
    /// The previous listing is discarded. A message that fails to populate is kept with empty
    /// fields and its error is available from [`fetch_errors`](Session::fetch_errors).
    pub fn get_messages(&mut self) -> Result<&[Message]> {
        self.require("fetch messages", &[State::Selected])?;
        let mailbox = self.mailbox.clone();
        let count = self.fetch_message_count(&mailbox)?;
        if count == 0 {
            // FETCH 1:* is an error on an empty mailbox
            self.messages.clear();
            self.fetch_errors.clear();
            return Ok(&self.messages);
        }

        let fetches = self
            .protocol
            .fetch_uids(SequenceRange::all())
            .map_err(|source| Error::Fetch {
                target: FetchTarget::Mailbox(mailbox.clone()),
                source,
            })?;

        let mut seen = HashSet::with_capacity(fetches.len());
        let mut messages = Vec::with_capacity(fetches.len());
        for fetch in fetches {
            match fetch.uid {
                Some(uid) if seen.insert(uid) => messages.push(Message::new(uid)),
                Some(uid) => tracing::warn!(uid, seq = fetch.message, "duplicate UID skipped"),
                None => tracing::warn!(seq = fetch.message, "FETCH response without UID skipped"),
            }
        }

        let mut errors = Vec::new();
        for message in &mut messages {
            if let Err(e) = message.populate(&mut self.protocol) {
                tracing::warn!(uid = message.uid(), error = %e, "could not populate message");
                errors.push(e);
            }
        }
        tracing::debug!(
            mailbox = %mailbox,
            count,
            listed = messages.len(),
            failed = errors.len(),
            "messages fetched"
        );

        self.messages = messages;
        self.fetch_errors = errors;
        Ok(&self.messages)
    }

    /// The messages cached by the last [`get_messages`](Session::get_messages).
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The cached message with `uid`.
    pub fn message(&self, uid: Uid) -> Option<&Message> {
        self.messages.iter().find(|m| m.uid() == uid)
    }

    /// A handle to the cached message with `uid`, through which it can be deleted.
    pub fn message_mut(&mut self, uid: Uid) -> Option<MessageHandle<'_, P>> {
        let index = self.messages.iter().position(|m| m.uid() == uid)?;
        Some(MessageHandle::new(self, index))
    }

    /// Deletes the cached message with `uid` from the mailbox. See
    /// [`MessageHandle::delete_from_mailbox`].
    ///
    /// Does nothing if no message with `uid` is cached.
    pub fn delete_message(&mut self, uid: Uid) -> Result<()> {
        match self.message_mut(uid) {
            Some(message) => message.delete_from_mailbox(),
            None => {
                tracing::debug!(uid, "no cached message to delete");
                Ok(())
            }
        }
    }

    /// Drops every cached message except the one with `uid`. No command is sent to the server.
    pub fn delete_all_messages_except(&mut self, uid: Uid) {
        self.messages.retain(|m| m.uid() == uid);
        self.prune_fetch_errors();
    }

    /// Drops every cached message. No command is sent to the server.
    pub fn delete_all_messages(&mut self) {
        self.messages.clear();
        self.fetch_errors.clear();
    }

    /// Forgets population errors of messages that are no longer cached.
    pub(crate) fn prune_fetch_errors(&mut self) {
        let messages = &self.messages;
        self.fetch_errors.retain(|e| match e {
            Error::Fetch {
                target: FetchTarget::Uid(uid),
                ..
            } => messages.iter().any(|m| m.uid() == *uid),
            _ => true,
        });
    }

    /// Population errors of the last [`get_messages`](Session::get_messages), one per message
    /// left unpopulated.
    pub fn fetch_errors(&self) -> &[Error] {
        &self.fetch_errors
    }

    /// The name of the mailbox this session works on.
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Where the session stands in the connection lifecycle.
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the session has logged in.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, State::Authenticated | State::Selected)
    }

    /// The underlying protocol client.
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Logs out and closes the session.
    pub fn logout(mut self) -> Result<()> {
        self.require(
            "log out",
            &[State::Connected, State::Authenticated, State::Selected],
        )?;
        self.delete_all_messages();
        self.transition(State::Disconnected);
        self.protocol
            .logout()
            .map_err(|source| Error::Logout { source })
    }
}

impl<P: Protocol> Drop for Session<P> {
    fn drop(&mut self) {
        if !self.is_authenticated() {
            return;
        }
        self.delete_all_messages();
        if let Err(source) = self.protocol.logout() {
            let e = Error::Logout { source };
            tracing::warn!(error = %e, "logout on teardown failed");
        }
        self.transition(State::Disconnected);
    }
}
