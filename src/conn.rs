use bufstream::BufStream;
use imap_proto::{Response, Status};
use std::fmt::{Debug, Formatter};
use std::io::{BufRead, Read, Write};

use super::error::{ParseError, ProtocolError, ValidateError};

static TAG_PREFIX: &str = "a";
const INITIAL_TAG: u32 = 0;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

macro_rules! quote {
    ($x:expr) => {
        format!("\"{}\"", $x.replace(r"\", r"\\").replace("\"", "\\\""))
    };
}

pub(crate) fn validate_str(value: &str) -> Result<String, ProtocolError> {
    let quoted = quote!(value);
    if quoted.find('\n').is_some() {
        return Err(ProtocolError::Validate(ValidateError('\n')));
    }
    if quoted.find('\r').is_some() {
        return Err(ProtocolError::Validate(ValidateError('\r')));
    }
    Ok(quoted)
}

/// Imap connection trait of a read/write stream
pub trait ImapConnection: Read + Write + Send + private::Sealed {}

impl<T> ImapConnection for T where T: Read + Write + Send {}

impl Debug for dyn ImapConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Imap connection")
    }
}

/// A boxed connection type
pub type Connection = Box<dyn ImapConnection>;

mod private {
    use super::{Read, Write};

    pub trait Sealed {}

    impl<T> Sealed for T where T: Read + Write {}
}

/// A tagged command stream over a single transport.
///
/// Exactly one command is outstanding at any time: every command is written, then its response
/// is read up to and including the tagged completion before the next command can be issued.
#[derive(Debug)]
pub(crate) struct Conn<T: Read + Write> {
    pub(crate) stream: BufStream<T>,
    tag: u32,
}

impl<T: Read + Write> Conn<T> {
    pub(crate) fn new(stream: T) -> Conn<T> {
        Conn {
            stream: BufStream::new(stream),
            tag: INITIAL_TAG,
        }
    }

    /// Gives back the transport, e.g. to wrap it in TLS after `STARTTLS`.
    pub(crate) fn into_inner(self) -> Result<T, ProtocolError> {
        Ok(self.stream.into_inner()?)
    }

    /// Consumes the untagged server greeting. A `BYE` greeting means the server refuses us.
    pub(crate) fn read_greeting(&mut self) -> Result<(), ProtocolError> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        match imap_proto::parser::parse_response(&v) {
            Ok((
                _,
                Response::Data {
                    status: Status::Bye,
                    information,
                    ..
                },
            )) => Err(ProtocolError::Bye(
                information
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|| "no explanation given".to_string()),
            )),
            Ok(_) => Ok(()),
            Err(_) => Err(ParseError::Invalid(v).into()),
        }
    }

    /// Runs a command and checks if it returns OK.
    pub(crate) fn run_command_and_check_ok(&mut self, command: &str) -> Result<(), ProtocolError> {
        self.run_command_and_read_response(command).map(|_| ())
    }

    /// Runs any command passed to it.
    pub(crate) fn run_command(&mut self, untagged_command: &str) -> Result<(), ProtocolError> {
        let command = self.create_command(untagged_command);
        self.write_line(command.as_bytes())
    }

    /// Runs a command and returns every untagged line the server sent before the tagged `OK`.
    pub(crate) fn run_command_and_read_response(
        &mut self,
        untagged_command: &str,
    ) -> Result<Vec<u8>, ProtocolError> {
        self.run_command(untagged_command)?;
        self.read_response()
    }

    pub(crate) fn read_response(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut v = Vec::new();
        self.read_response_onto(&mut v)?;
        Ok(v)
    }

    fn read_response_onto(&mut self, data: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let mut continue_from = None;
        let match_tag = format!("{}{}", TAG_PREFIX, self.tag);
        loop {
            let line_start = {
                let start_new = data.len();
                self.readline(data)?;
                continue_from.take().unwrap_or(start_new)
            };

            let break_with = {
                let line = &data[line_start..];

                match imap_proto::parser::parse_response(line) {
                    Ok((
                        _,
                        Response::Done {
                            tag,
                            status,
                            information,
                            ..
                        },
                    )) => {
                        if tag.as_bytes() != match_tag.as_bytes() {
                            Some(Err(ProtocolError::Parse(ParseError::Tag(
                                String::from_utf8_lossy(tag.as_bytes()).into_owned(),
                            ))))
                        } else {
                            let expl = || {
                                information
                                    .map(|s| s.into_owned())
                                    .unwrap_or_else(|| "no explanation given".to_string())
                            };
                            Some(match status {
                                Status::Ok => Ok(()),
                                Status::Bad => Err(ProtocolError::Bad(expl())),
                                Status::No => Err(ProtocolError::No(expl())),
                                Status::Bye => Err(ProtocolError::Bye(expl())),
                                _ => Err(ProtocolError::Parse(ParseError::Invalid(
                                    line.to_vec(),
                                ))),
                            })
                        }
                    }
                    Ok(..) => None,
                    Err(nom::Err::Incomplete(..)) => {
                        continue_from = Some(line_start);
                        None
                    }
                    _ => Some(Err(ProtocolError::Parse(ParseError::Invalid(
                        line.to_vec(),
                    )))),
                }
            };

            match break_with {
                Some(Ok(())) => {
                    data.truncate(line_start);
                    break Ok(());
                }
                Some(Err(e)) => break Err(e),
                None => {}
            }
        }
    }

    pub(crate) fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize, ProtocolError> {
        let read = self.stream.read_until(LF, into)?;
        if read == 0 {
            return Err(ProtocolError::ConnectionLost);
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            let line = &into[(into.len() - read)..];
            tracing::trace!(
                "S: {}",
                String::from_utf8_lossy(line).trim_end_matches(['\r', '\n'])
            );
        }

        Ok(read)
    }

    fn create_command(&mut self, command: &str) -> String {
        self.tag += 1;
        format!("{}{} {}", TAG_PREFIX, self.tag, command)
    }

    pub(crate) fn write_line(&mut self, buf: &[u8]) -> Result<(), ProtocolError> {
        self.stream.write_all(buf)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        if tracing::enabled!(tracing::Level::TRACE) {
            let line = String::from_utf8_lossy(buf);
            // never log credentials
            match line.split(' ').nth(1) {
                Some(cmd) if cmd.eq_ignore_ascii_case("LOGIN") => {
                    tracing::trace!("C: {} {} <redacted>", self.tag_str(), cmd)
                }
                _ => tracing::trace!("C: {}", line),
            }
        }
        Ok(())
    }

    fn tag_str(&self) -> String {
        format!("{}{}", TAG_PREFIX, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_stream::MockStream;

    #[test]
    fn read_response() {
        let response = "a0 OK Logged in.\r\n";
        let mock_stream = MockStream::new(response);
        let mut conn = Conn::new(mock_stream);
        let actual_response = conn.read_response().unwrap();
        assert_eq!(Vec::<u8>::new(), actual_response);
    }

    #[test]
    fn read_response_keeps_untagged_lines() {
        let response = "* 3 EXISTS\r\n\
                        a0 OK done\r\n";
        let mut conn = Conn::new(MockStream::new(response));
        let lines = conn.read_response().unwrap();
        assert_eq!(lines, b"* 3 EXISTS\r\n".to_vec());
    }

    #[test]
    fn fetch_body() {
        let response = "a0 OK Logged in.\r\n\
                        * 2 FETCH (BODY[TEXT] {3}\r\nfoo)\r\n\
                        a0 OK FETCH completed\r\n";
        let mock_stream = MockStream::new(response);
        let mut conn = Conn::new(mock_stream);
        conn.read_response().unwrap();
        let lines = conn.read_response().unwrap();
        assert_eq!(lines, b"* 2 FETCH (BODY[TEXT] {3}\r\nfoo)\r\n".to_vec());
    }

    #[test]
    fn read_response_no() {
        let response = "a0 NO [TRYCREATE] Mailbox doesn't exist\r\n";
        let mut conn = Conn::new(MockStream::new(response));
        match conn.read_response() {
            Err(ProtocolError::No(expl)) => assert_eq!(expl, "Mailbox doesn't exist"),
            other => panic!("Wrong result: {:?}", other),
        }
    }

    #[test]
    fn read_response_bad() {
        let response = "a0 BAD Unknown command\r\n";
        let mut conn = Conn::new(MockStream::new(response));
        match conn.read_response() {
            Err(ProtocolError::Bad(expl)) => assert_eq!(expl, "Unknown command"),
            other => panic!("Wrong result: {:?}", other),
        }
    }

    #[test]
    fn read_response_wrong_tag() {
        let response = "a7 OK done\r\n";
        let mut conn = Conn::new(MockStream::new(response));
        match conn.read_response() {
            Err(ProtocolError::Parse(ParseError::Tag(tag))) => assert_eq!(tag, "a7"),
            other => panic!("Wrong result: {:?}", other),
        }
    }

    #[test]
    fn read_greeting() {
        let greeting = "* OK Dovecot ready.\r\n";
        let mock_stream = MockStream::new(greeting);
        let mut conn = Conn::new(mock_stream);
        conn.read_greeting().unwrap();
    }

    #[test]
    fn read_greeting_bye() {
        let greeting = "* BYE Too many connections\r\n";
        let mut conn = Conn::new(MockStream::new(greeting));
        match conn.read_greeting() {
            Err(ProtocolError::Bye(expl)) => assert_eq!(expl, "Too many connections"),
            other => panic!("Wrong result: {:?}", other),
        }
    }

    #[test]
    fn readline_delay_read() {
        let greeting = "* OK Dovecot ready.\r\n";
        let expected_response: String = greeting.to_string();
        let mock_stream = MockStream::new(greeting).trickle(4);
        let mut conn = Conn::new(mock_stream);
        let mut v = Vec::new();
        conn.readline(&mut v).unwrap();
        let actual_response = String::from_utf8(v).unwrap();
        assert_eq!(expected_response, actual_response);
    }

    #[test]
    fn readline_eof() {
        let mock_stream = MockStream::hung_up();
        let mut conn = Conn::new(mock_stream);
        let mut v = Vec::new();
        if let Err(ProtocolError::ConnectionLost) = conn.readline(&mut v) {
        } else {
            unreachable!("EOF read did not return connection lost");
        }
    }

    #[test]
    fn readline_err() {
        let mock_stream = MockStream::broken();
        let mut conn = Conn::new(mock_stream);
        let mut v = Vec::new();
        match conn.readline(&mut v) {
            Err(ProtocolError::Io(_)) => {}
            other => panic!("Wrong result: {:?}", other),
        }
    }

    #[test]
    fn create_command() {
        let base_command = "CHECK";
        let mut conn = Conn::new(MockStream::default());

        let command = conn.create_command(base_command);
        assert_eq!(command, format!("a1 {}", base_command));

        let command2 = conn.create_command(base_command);
        assert_eq!(command2, format!("a2 {}", base_command));
    }

    #[test]
    fn quote_backslash() {
        assert_eq!("\"test\\\\text\"", quote!(r"test\text"));
    }

    #[test]
    fn quote_dquote() {
        assert_eq!("\"test\\\"text\"", quote!("test\"text"));
    }

    #[test]
    fn validate_random() {
        assert_eq!(
            "\"~iCQ_k;>[&\\\"sVCvUW`e<<P!wJ\"",
            &validate_str("~iCQ_k;>[&\"sVCvUW`e<<P!wJ").unwrap()
        );
    }

    #[test]
    fn validate_newline() {
        match validate_str("test\nstring") {
            Err(ProtocolError::Validate(ValidateError('\n'))) => {}
            other => panic!("Wrong result: {:?}", other),
        }
    }

    #[test]
    fn validate_carriage_return() {
        match validate_str("test\rstring") {
            Err(ProtocolError::Validate(ValidateError('\r'))) => {}
            other => panic!("Wrong result: {:?}", other),
        }
    }
}
