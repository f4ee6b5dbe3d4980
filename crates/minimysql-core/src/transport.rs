//! Byte-stream transport abstraction.
//!
//! The protocol client never touches sockets directly. Anything that can
//! connect to `host:port`, push bytes, pull single bytes and report how many
//! bytes are ready to read can carry a MySQL session: a TCP stream, a serial
//! bridge on a small device, or a scripted buffer in tests.

use std::io;

/// A blocking, half-duplex byte stream.
pub trait Transport {
    /// Open a session to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Write the whole buffer.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read one byte.
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] once the peer has closed the
    /// stream and nothing is left to read.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> io::Result<usize>;

    /// Tear down the session. Closing a closed transport is a no-op.
    fn close(&mut self);

    /// Whether a session is currently open.
    fn is_connected(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        (**self).connect(host, port)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
