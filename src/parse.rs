use imap_proto::{AttributeValue, MailboxDatum, Response, ResponseCode, StatusAttribute};

use super::error::{ParseError, ProtocolError};
use super::types::*;

type Result<T> = std::result::Result<T, ProtocolError>;

pub(crate) enum MapOrNot<'a, T> {
    Map(T),
    Not(Response<'a>),
    Ignore,
}

/// Parses every response in `lines`, collecting what `map` accepts. Responses `map` rejects must
/// be unilateral server data, anything else is an error.
pub(crate) fn parse_many<'a, T, F>(mut lines: &'a [u8], mut map: F) -> Result<Vec<T>>
where
    F: FnMut(Response<'a>) -> Result<MapOrNot<'a, T>>,
{
    let mut things = Vec::new();
    loop {
        if lines.is_empty() {
            break Ok(things);
        }

        match imap_proto::parser::parse_response(lines) {
            Ok((rest, resp)) => {
                lines = rest;

                match map(resp)? {
                    MapOrNot::Map(t) => things.push(t),
                    MapOrNot::Not(resp) => {
                        if let Some(resp) = handle_unilateral(resp) {
                            break Err(unexpected(resp));
                        }
                    }
                    MapOrNot::Ignore => continue,
                }
            }
            _ => {
                break Err(ParseError::Invalid(lines.to_vec()).into());
            }
        }
    }
}

/// Parses the untagged data of a `FETCH 1:* (UID)` into one entry per message, in server order.
pub(crate) fn parse_fetches(lines: &[u8]) -> Result<Vec<Fetch>> {
    parse_many(lines, |resp| match resp {
        Response::Fetch(num, attrs) => {
            let uid = attrs.iter().find_map(|attr| match attr {
                AttributeValue::Uid(uid) => Some(*uid),
                _ => None,
            });
            Ok(MapOrNot::Map(Fetch { message: num, uid }))
        }
        resp => Ok(MapOrNot::Not(resp)),
    })
}

/// Parses the untagged data of a `UID FETCH <uid> (ENVELOPE BODY[])`.
///
/// Servers may interleave unsolicited `FETCH` responses for other messages (flag updates); only
/// responses carrying `uid`, or carrying no UID at all, are considered. The envelope and the body
/// section may arrive in separate responses and are merged.
pub(crate) fn parse_summary(lines: &[u8], uid: Uid) -> Result<Summary> {
    let parts = parse_many(lines, |resp| match resp {
        Response::Fetch(_, attrs) => {
            let for_us = attrs.iter().all(|attr| match attr {
                AttributeValue::Uid(u) => *u == uid,
                _ => true,
            });
            if !for_us {
                return Ok(MapOrNot::Ignore);
            }

            let mut envelope = None;
            let mut body = None;
            for attr in attrs {
                match attr {
                    AttributeValue::Envelope(env) => {
                        let subject = env
                            .subject
                            .as_ref()
                            .map(|s| String::from_utf8_lossy(s).into_owned());
                        let from = env
                            .from
                            .as_ref()
                            .map(|from| from.iter().map(Address::from).collect::<Vec<_>>())
                            .unwrap_or_default();
                        envelope = Some((subject, from));
                    }
                    AttributeValue::BodySection { data, .. } => {
                        body = Some(data.map(|d| String::from_utf8_lossy(&d).into_owned()));
                    }
                    _ => {}
                }
            }
            if envelope.is_none() && body.is_none() {
                return Ok(MapOrNot::Ignore);
            }
            Ok(MapOrNot::Map((envelope, body)))
        }
        resp => Ok(MapOrNot::Not(resp)),
    })?;

    if parts.is_empty() {
        return Err(ParseError::Missing("a FETCH response for the requested UID").into());
    }
    let mut summary = Summary::default();
    for (envelope, body) in parts {
        if let Some((subject, from)) = envelope {
            summary.subject = subject;
            summary.from = from;
        }
        if let Some(Some(body)) = body {
            summary.body = Some(body);
        }
    }
    Ok(summary)
}

/// Parses the untagged data of `STATUS <mailbox> (MESSAGES)`.
pub(crate) fn parse_status_messages(lines: &[u8]) -> Result<u32> {
    let counts = parse_many(lines, |resp| match resp {
        Response::MailboxData(MailboxDatum::Status { status, .. }) => {
            match status.iter().find_map(|attr| match attr {
                StatusAttribute::Messages(n) => Some(*n),
                _ => None,
            }) {
                Some(n) => Ok(MapOrNot::Map(n)),
                None => Ok(MapOrNot::Ignore),
            }
        }
        resp => Ok(MapOrNot::Not(resp)),
    })?;

    counts
        .last()
        .copied()
        .ok_or_else(|| ParseError::Missing("a STATUS MESSAGES attribute").into())
}

/// Parses the untagged data of a `SELECT`.
pub(crate) fn parse_mailbox(lines: &[u8]) -> Result<Mailbox> {
    let mut mailbox = Mailbox::default();

    parse_many::<(), _>(lines, |resp| {
        match resp {
            Response::Data {
                status: imap_proto::Status::Ok,
                code: Some(code),
                ..
            } => {
                match code {
                    ResponseCode::UidValidity(uid) => mailbox.uid_validity = Some(uid),
                    ResponseCode::UidNext(unext) => mailbox.uid_next = Some(unext),
                    ResponseCode::Unseen(n) => mailbox.unseen = Some(n),
                    _ => {}
                }
                Ok(MapOrNot::Ignore)
            }
            Response::MailboxData(MailboxDatum::Exists(e)) => {
                mailbox.exists = e;
                Ok(MapOrNot::Ignore)
            }
            Response::MailboxData(MailboxDatum::Recent(r)) => {
                mailbox.recent = r;
                Ok(MapOrNot::Ignore)
            }
            Response::MailboxData(MailboxDatum::Flags(_)) => Ok(MapOrNot::Ignore),
            resp => Ok(MapOrNot::Not(resp)),
        }
    })?;

    Ok(mailbox)
}

/// Parses the untagged data of an `EXPUNGE` into the expunged sequence numbers.
pub(crate) fn parse_expunge(lines: &[u8]) -> Result<Vec<Seq>> {
    parse_many(lines, |resp| match resp {
        Response::Expunge(id) => Ok(MapOrNot::Map(id)),
        resp => Ok(MapOrNot::Not(resp)),
    })
}

/// Accepts any unilateral server data and nothing else.
pub(crate) fn parse_noop(lines: &[u8]) -> Result<()> {
    parse_many::<(), _>(lines, |resp| Ok(MapOrNot::Not(resp))).map(|_| ())
}

fn unexpected(resp: Response<'_>) -> ProtocolError {
    ParseError::Unexpected(format!("{:?}", resp)).into()
}

// check if this is simply a unilateral server response
// (see Section 7 of RFC 3501):
fn handle_unilateral(res: Response<'_>) -> Option<Response<'_>> {
    match res {
        Response::MailboxData(MailboxDatum::Status { mailbox, status }) => {
            tracing::debug!(%mailbox, ?status, "unsolicited STATUS");
        }
        Response::MailboxData(MailboxDatum::Recent(n)) => {
            tracing::debug!(count = n, "RECENT");
        }
        Response::MailboxData(MailboxDatum::Exists(n)) => {
            tracing::debug!(count = n, "EXISTS");
        }
        Response::Expunge(n) => {
            tracing::debug!(seq = n, "EXPUNGE");
        }
        Response::Fetch(n, _) => {
            tracing::debug!(seq = n, "unsolicited FETCH");
        }
        Response::Data {
            status,
            information,
            ..
        } => {
            tracing::debug!(?status, ?information, "untagged status");
        }
        res => {
            return Some(res);
        }
    }
    None
}
