use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::session::ScpiSession;

/// The byte that terminates every command and response line.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Configuration for a [`TcpLineClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for the connect attempt.
    pub connect_timeout: Duration,
    /// Read deadline per query round trip.
    pub read_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Blocking TCP client speaking newline-terminated ASCII lines.
///
/// One `write + flush` per command, one buffered read up to the terminator
/// per query. The socket read deadline is the only timeout: a query that
/// outlives it fails with [`TransportError::Timeout`].
pub struct TcpLineClient {
    reader: BufReader<TcpStream>,
    peer: SocketAddr,
    read_timeout: Duration,
}

impl TcpLineClient {
    /// Connect with default configuration.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_config(addr, ClientConfig::default())
    }

    /// Connect with explicit configuration.
    pub fn connect_with_config(addr: impl ToSocketAddrs, config: ClientConfig) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address"))?;

        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
            .map_err(|source| TransportError::Connect { addr, source })?;
        stream.set_read_timeout(Some(config.read_timeout))?;
        stream.set_nodelay(true)?;

        debug!(%addr, "connected to instrument");

        Ok(Self {
            reader: BufReader::new(stream),
            peer: addr,
            read_timeout: config.read_timeout,
        })
    }

    /// The instrument address this client is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn write_line(&mut self, cmd: &str) -> Result<()> {
        trace!(%cmd, "tx");
        let stream = self.reader.get_mut();
        stream.write_all(cmd.as_bytes())?;
        stream.write_all(&[LINE_TERMINATOR])?;
        stream.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        match self.reader.read_until(LINE_TERMINATOR, &mut buf) {
            Ok(0) => return Err(TransportError::ConnectionClosed),
            Ok(_) => {}
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                return Err(TransportError::Timeout(self.read_timeout));
            }
            Err(e) => return Err(e.into()),
        }
        if buf.last() != Some(&LINE_TERMINATOR) {
            return Err(TransportError::ConnectionClosed);
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        let line = String::from_utf8(buf).map_err(|_| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "response line is not valid UTF-8",
            ))
        })?;
        trace!(line = %line, "rx");
        Ok(line)
    }
}

impl ScpiSession for TcpLineClient {
    fn send_command(&mut self, cmd: &str) -> Result<()> {
        self.write_line(cmd)
    }

    fn query_text(&mut self, cmd: &str) -> Result<String> {
        self.write_line(cmd)?;
        self.read_line()
    }
}
