//! This module contains the protocol-level types exchanged with the IMAP server.

use std::fmt;

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message which, together with the mailbox's `UIDVALIDITY`, does
/// not refer to any other message in the mailbox. Unique identifiers are assigned in a strictly
/// ascending fashion and are not necessarily contiguous. Unlike message sequence numbers they do
/// not shift when other messages are expunged.
pub type Uid = u32;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox, ordered by ascending
/// unique identifier. Sequence numbers are reassigned during the session: when a message is
/// expunged, the sequence number of every subsequent message is decremented.
pub type Seq = u32;

/// A contiguous interval of message sequence numbers, as used in a `FETCH` sequence set.
///
/// An open upper bound is rendered as `*`, the number of the last message in the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    /// First sequence number of the interval.
    pub start: Seq,
    /// Last sequence number of the interval, or `None` for "up to the last message".
    pub end: Option<Seq>,
}

impl SequenceRange {
    /// The interval `1:*`, covering every message of the selected mailbox.
    pub fn all() -> Self {
        SequenceRange {
            start: 1,
            end: None,
        }
    }

    /// The interval `start:end`.
    pub fn new(start: Seq, end: Seq) -> Self {
        SequenceRange {
            start,
            end: Some(end),
        }
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) if end == self.start => write!(f, "{}", self.start),
            Some(end) => write!(f, "{}:{}", self.start, end),
            None => write!(f, "{}:*", self.start),
        }
    }
}

mod mailbox;
pub use self::mailbox::Mailbox;

mod fetch;
pub use self::fetch::{Address, Fetch, Summary};
