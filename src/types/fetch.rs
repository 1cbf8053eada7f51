use super::{Seq, Uid};

/// One entry of an IMAP [`FETCH` response](https://tools.ietf.org/html/rfc3501#section-7.4.2)
/// to a UID listing: the ordinal position of a message and, if the server reported it, its UID.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Fetch {
    /// The ordinal number of this message in its containing mailbox.
    pub message: Seq,

    /// A number expressing the unique identifier of the message.
    pub uid: Option<Uid>,
}

/// A single address of an [envelope](https://tools.ietf.org/html/rfc3501#section-7.4.2) address
/// list, with its parts decoded lossily to UTF-8.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Address {
    /// The personal display name, e.g. `Alice`.
    pub name: Option<String>,
    /// The local part of the address, e.g. `alice`.
    pub mailbox: Option<String>,
    /// The domain of the address, e.g. `example.com`.
    pub host: Option<String>,
}

impl Address {
    /// An address with a display name and both address parts.
    pub fn new(name: Option<&str>, mailbox: Option<&str>, host: Option<&str>) -> Self {
        Address {
            name: name.map(String::from),
            mailbox: mailbox.map(String::from),
            host: host.map(String::from),
        }
    }
}

impl<'a> From<&imap_proto::Address<'a>> for Address {
    fn from(a: &imap_proto::Address<'a>) -> Self {
        let text = |part: &Option<std::borrow::Cow<'a, [u8]>>| {
            part.as_ref().map(|b| String::from_utf8_lossy(b).into_owned())
        };
        Address {
            name: text(&a.name),
            mailbox: text(&a.mailbox),
            host: text(&a.host),
        }
    }
}

/// The summary of a message returned by a combined `ENVELOPE` and `BODY[]` fetch.
///
/// Only the undivided top-level body section is carried; no MIME structure is interpreted.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Summary {
    /// The envelope subject, if the message has one.
    pub subject: Option<String>,
    /// The envelope `From` address list, in server order.
    pub from: Vec<Address>,
    /// The content of the body section, if the server returned one, decoded as UTF-8 with invalid
    /// sequences replaced by `U+FFFD`.
    pub body: Option<String>,
}
