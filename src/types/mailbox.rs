use std::fmt;

/// Meta-information about an IMAP mailbox, as returned by
/// [`SELECT`](https://tools.ietf.org/html/rfc3501#section-6.3.1).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
#[non_exhaustive]
pub struct Mailbox {
    /// The number of messages in the mailbox.
    pub exists: u32,
    /// The number of messages with the \Recent flag set.
    pub recent: u32,
    /// The message sequence number of the first unseen message in the mailbox.
    pub unseen: Option<u32>,
    /// The next unique identifier value.
    pub uid_next: Option<u32>,
    /// The unique identifier validity value.
    pub uid_validity: Option<u32>,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exists: {}, recent: {}, unseen: {:?}, uid_next: {:?}, uid_validity: {:?}",
            self.exists, self.recent, self.unseen, self.uid_next, self.uid_validity
        )
    }
}
