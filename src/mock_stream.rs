use std::io::{Cursor, Error, ErrorKind, Read, Result, Write};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Peer {
    #[default]
    Replay,
    HungUp,
    Broken,
}

/// A scripted server end of a transport.
///
/// Reads replay the script given to [`MockStream::new`]; reading past its end is an error so that
/// a test waiting for more server output fails instead of hanging. Everything written is kept
/// for inspection.
#[derive(Debug, Default)]
pub struct MockStream {
    script: Cursor<Vec<u8>>,
    sent: Vec<u8>,
    peer: Peer,
    trickle: usize,
}

impl MockStream {
    pub fn new(script: impl Into<Vec<u8>>) -> MockStream {
        MockStream {
            script: Cursor::new(script.into()),
            ..MockStream::default()
        }
    }

    /// A peer that has closed the connection: every read returns 0 bytes.
    pub fn hung_up() -> MockStream {
        MockStream {
            peer: Peer::HungUp,
            ..MockStream::default()
        }
    }

    /// A transport whose reads fail.
    pub fn broken() -> MockStream {
        MockStream {
            peer: Peer::Broken,
            ..MockStream::default()
        }
    }

    /// Makes the next `reads` reads yield a single byte each.
    pub fn trickle(mut self, reads: usize) -> MockStream {
        self.trickle = reads;
        self
    }

    /// Everything the client wrote, lossily decoded.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.peer {
            Peer::HungUp => return Ok(0),
            Peer::Broken => return Err(Error::new(ErrorKind::ConnectionReset, "peer reset")),
            Peer::Replay => {}
        }
        if self.script.position() as usize >= self.script.get_ref().len() {
            return Err(Error::new(ErrorKind::UnexpectedEof, "script exhausted"));
        }
        let len = if self.trickle > 0 {
            self.trickle -= 1;
            buf.len().min(1)
        } else {
            buf.len()
        };
        self.script.read(&mut buf[..len])
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.sent.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
