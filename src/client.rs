use std::fmt;

use super::client_builder::{ClientBuilder, Connector};
use super::conn::{validate_str, Conn};
use super::error::ProtocolError;
use super::parse::{
    parse_expunge, parse_fetches, parse_mailbox, parse_noop, parse_status_messages, parse_summary,
};
use super::protocol::Protocol;
use super::types::*;

/// A blocking IMAP client speaking [RFC 3501](https://tools.ietf.org/html/rfc3501) over the
/// transport opened by its [`Connector`].
///
/// The client starts out without a transport; [`Protocol::connect`] dials one and
/// [`Protocol::logout`] releases it. Any command issued without a transport fails with
/// [`ProtocolError::NotConnected`].
pub struct Client<C: Connector = ClientBuilder> {
    connector: C,
    conn: Option<Conn<C::Stream>>,
}

impl Client<ClientBuilder> {
    /// A client dialling plaintext connections.
    pub fn plaintext() -> Self {
        Client::new(ClientBuilder::new())
    }
}

impl Default for Client<ClientBuilder> {
    fn default() -> Self {
        Client::plaintext()
    }
}

impl<C: Connector> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl<C: Connector> Client<C> {
    /// Creates a new, unconnected client that opens its transport through `connector`.
    pub fn new(connector: C) -> Client<C> {
        Client {
            connector,
            conn: None,
        }
    }

    /// Whether a transport is currently open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&mut self) -> Result<&mut Conn<C::Stream>, ProtocolError> {
        self.conn.as_mut().ok_or(ProtocolError::NotConnected)
    }

    fn run_command_and_read_response(&mut self, command: &str) -> Result<Vec<u8>, ProtocolError> {
        self.conn()?.run_command_and_read_response(command)
    }
}

impl<C: Connector> Protocol for Client<C> {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), ProtocolError> {
        let stream = self.connector.connect(host, port)?;
        self.conn = Some(Conn::new(stream));
        Ok(())
    }

    fn login(&mut self, user: &str, password: &str) -> Result<(), ProtocolError> {
        let command = format!("LOGIN {} {}", validate_str(user)?, validate_str(password)?);
        self.conn()?.run_command_and_check_ok(&command)
    }

    fn select(&mut self, mailbox: &str) -> Result<Mailbox, ProtocolError> {
        let lines =
            self.run_command_and_read_response(&format!("SELECT {}", validate_str(mailbox)?))?;
        parse_mailbox(&lines)
    }

    fn status_message_count(&mut self, mailbox: &str) -> Result<u32, ProtocolError> {
        let lines = self.run_command_and_read_response(&format!(
            "STATUS {} (MESSAGES)",
            validate_str(mailbox)?
        ))?;
        parse_status_messages(&lines)
    }

    fn fetch_uids(&mut self, range: SequenceRange) -> Result<Vec<Fetch>, ProtocolError> {
        let lines = self.run_command_and_read_response(&format!("FETCH {} (UID)", range))?;
        parse_fetches(&lines)
    }

    fn fetch_summary(&mut self, uid: Uid) -> Result<Summary, ProtocolError> {
        let lines =
            self.run_command_and_read_response(&format!("UID FETCH {} (ENVELOPE BODY[])", uid))?;
        parse_summary(&lines, uid)
    }

    fn store_deleted(&mut self, uid: Uid) -> Result<(), ProtocolError> {
        let lines = self.run_command_and_read_response(&format!(
            "UID STORE {} +FLAGS.SILENT (\\Deleted)",
            uid
        ))?;
        parse_noop(&lines)
    }

    fn expunge(&mut self) -> Result<Vec<Seq>, ProtocolError> {
        let lines = self.run_command_and_read_response("EXPUNGE")?;
        parse_expunge(&lines)
    }

    fn logout(&mut self) -> Result<(), ProtocolError> {
        // the transport is released whatever the server answers
        let mut conn = self.conn.take().ok_or(ProtocolError::NotConnected)?;
        let lines = conn.run_command_and_read_response("LOGOUT")?;
        parse_noop(&lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_stream::MockStream;

    struct Scripted(Option<MockStream>);

    impl Connector for Scripted {
        type Stream = MockStream;

        fn connect(&mut self, _host: &str, _port: u16) -> Result<MockStream, ProtocolError> {
            self.0.take().ok_or(ProtocolError::ConnectionLost)
        }
    }

    fn connected(response: &[u8]) -> Client<Scripted> {
        let mut client = Client::new(Scripted(Some(MockStream::new(response.to_vec()))));
        client.connect("imap.example.com", 143).unwrap();
        client
    }

    fn written(client: &Client<Scripted>) -> String {
        client.conn.as_ref().unwrap().stream.get_ref().written()
    }

    #[test]
    fn commands_need_a_transport() {
        let mut client = Client::new(Scripted(None));
        assert!(!client.is_connected());
        match client.expunge() {
            Err(ProtocolError::NotConnected) => {}
            other => panic!("Wrong result: {:?}", other),
        }
        match client.connect("imap.example.com", 143) {
            Err(ProtocolError::ConnectionLost) => {}
            other => panic!("Wrong result: {:?}", other),
        }
        assert!(!client.is_connected());
    }

    #[test]
    fn login() {
        let mut client = connected(b"a1 OK Logged in\r\n");
        client.login("username", "password").unwrap();
        assert_eq!(written(&client), "a1 LOGIN \"username\" \"password\"\r\n");
    }

    #[test]
    fn login_refused() {
        let mut client = connected(b"a1 NO Invalid credentials\r\n");
        match client.login("username", "wrong") {
            Err(ProtocolError::No(expl)) => assert_eq!(expl, "Invalid credentials"),
            other => panic!("Wrong result: {:?}", other),
        }
        assert!(client.is_connected());
    }

    #[test]
    fn login_validates_credentials() {
        let mut client = connected(b"");
        match client.login("user\r\nA2 DELETE INBOX", "password") {
            Err(ProtocolError::Validate(_)) => {}
            other => panic!("Wrong result: {:?}", other),
        }
        assert_eq!(written(&client), "");
    }

    #[test]
    fn select() {
        let response = b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
            * OK [PERMANENTFLAGS (\\* \\Answered \\Flagged \\Deleted \\Draft \\Seen)] \
              Limited\r\n\
            * 3 EXISTS\r\n\
            * 0 RECENT\r\n\
            * OK [UIDVALIDITY 1257842737] UIDs valid\r\n\
            * OK [UIDNEXT 13] Predicted next UID\r\n\
            a1 OK [READ-WRITE] Select completed.\r\n";
        let mut client = connected(response);
        let mailbox = client.select("INBOX").unwrap();
        assert_eq!(written(&client), "a1 SELECT \"INBOX\"\r\n");
        assert_eq!(mailbox.exists, 3);
        assert_eq!(mailbox.uid_next, Some(13));
        assert_eq!(mailbox.uid_validity, Some(1257842737));
    }

    #[test]
    fn select_missing_mailbox() {
        let mut client = connected(b"a1 NO Mailbox doesn't exist: Nope\r\n");
        match client.select("Nope") {
            Err(ProtocolError::No(_)) => {}
            other => panic!("Wrong result: {:?}", other),
        }
    }

    #[test]
    fn status_message_count() {
        let response = b"* STATUS \"INBOX\" (MESSAGES 3)\r\n\
            a1 OK STATUS completed\r\n";
        let mut client = connected(response);
        assert_eq!(client.status_message_count("INBOX").unwrap(), 3);
        assert_eq!(written(&client), "a1 STATUS \"INBOX\" (MESSAGES)\r\n");
    }

    #[test]
    fn fetch_uids() {
        let response = b"* 1 FETCH (UID 10)\r\n\
            * 2 FETCH (UID 11)\r\n\
            * 3 FETCH (UID 12)\r\n\
            a1 OK FETCH completed\r\n";
        let mut client = connected(response);
        let fetches = client.fetch_uids(SequenceRange::all()).unwrap();
        assert_eq!(written(&client), "a1 FETCH 1:* (UID)\r\n");
        let uids: Vec<_> = fetches.iter().map(|f| f.uid).collect();
        assert_eq!(uids, vec![Some(10), Some(11), Some(12)]);
    }

    #[test]
    fn fetch_summary() {
        let response = b"* 2 FETCH (UID 11 ENVELOPE (NIL \"Lunch\" \
            ((\"Alice\" NIL \"alice\" \"example.com\")) NIL NIL NIL NIL NIL NIL NIL) \
            BODY[] {6}\r\nnoon?\n)\r\n\
            a1 OK FETCH completed\r\n";
        let mut client = connected(response);
        let summary = client.fetch_summary(11).unwrap();
        assert_eq!(written(&client), "a1 UID FETCH 11 (ENVELOPE BODY[])\r\n");
        assert_eq!(summary.subject.as_deref(), Some("Lunch"));
        assert_eq!(summary.from.len(), 1);
        assert_eq!(summary.body.as_deref(), Some("noon?\n"));
    }

    #[test]
    fn store_deleted() {
        let mut client = connected(b"a1 OK STORE completed\r\n");
        client.store_deleted(11).unwrap();
        assert_eq!(
            written(&client),
            "a1 UID STORE 11 +FLAGS.SILENT (\\Deleted)\r\n"
        );
    }

    #[test]
    fn expunge() {
        let response = b"* 2 EXPUNGE\r\n\
            * 2 EXISTS\r\n\
            a1 OK EXPUNGE completed\r\n";
        let mut client = connected(response);
        assert_eq!(client.expunge().unwrap(), vec![2]);
        assert_eq!(written(&client), "a1 EXPUNGE\r\n");
    }

    #[test]
    fn commands_are_tagged_in_sequence() {
        let response = b"a1 OK Logged in\r\n\
            a2 OK EXPUNGE completed\r\n";
        let mut client = connected(response);
        client.login("username", "password").unwrap();
        client.expunge().unwrap();
        assert_eq!(
            written(&client),
            "a1 LOGIN \"username\" \"password\"\r\na2 EXPUNGE\r\n"
        );
    }

    #[test]
    fn logout_releases_transport() {
        let mut client = connected(b"* BYE Logging out\r\na1 OK Logout completed.\r\n");
        client.logout().unwrap();
        assert!(!client.is_connected());
    }

    #[test]
    fn failed_logout_releases_transport() {
        let mut client = connected(b"a1 BAD Unexpected\r\n");
        match client.logout() {
            Err(ProtocolError::Bad(_)) => {}
            other => panic!("Wrong result: {:?}", other),
        }
        assert!(!client.is_connected());
    }
}
