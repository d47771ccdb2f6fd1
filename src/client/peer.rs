use futures::{SinkExt, StreamExt};
use log::debug;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use super::message::Message;
use crate::error::Error;

const MAX_LINE_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub io: Duration,
}

impl Default for Timeouts {
    fn default() -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(5),
            io: Duration::from_secs(10),
        }
    }
}

/// A line-framed connection to another peer. Every send and receive is bounded
/// by the io timeout.
pub struct PeerConnection {
    framed: Framed<TcpStream, LinesCodec>,
    addr: String,
    io_timeout: Duration,
}

impl PeerConnection {
    pub async fn connect(addr: &str, timeouts: Timeouts) -> Result<PeerConnection, Error> {
        let stream = timeout(timeouts.connect, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::unreachable(addr, "connect timed out"))?
            .map_err(|e| Error::unreachable(addr, e))?;
        debug!("Connected to peer {}", addr);
        Ok(PeerConnection::new(stream, addr.to_string(), timeouts.io))
    }

    pub fn new(stream: TcpStream, addr: String, io_timeout: Duration) -> PeerConnection {
        PeerConnection {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            addr,
            io_timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn send(&mut self, message: Message) -> Result<(), Error> {
        debug!("-> {} {}", self.addr, message);
        match timeout(self.io_timeout, self.framed.send(message.to_string())).await {
            Ok(result) => result.map_err(|e| codec_error(&self.addr, e)),
            Err(_) => Err(Error::unreachable(&self.addr, "send timed out")),
        }
    }

    /// Next message, or `None` once the remote side has closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Message>, Error> {
        let line = match timeout(self.io_timeout, self.framed.next()).await {
            Err(_) => return Err(Error::unreachable(&self.addr, "read timed out")),
            Ok(None) => return Ok(None),
            Ok(Some(line)) => line.map_err(|e| codec_error(&self.addr, e))?,
        };
        debug!("<- {} {}", self.addr, line);
        line.parse().map(Some)
    }

    /// Flushes and shuts down the write side.
    pub async fn close(mut self) {
        let _ = timeout(self.io_timeout, SinkExt::<String>::close(&mut self.framed)).await;
    }
}

fn codec_error(addr: &str, error: LinesCodecError) -> Error {
    match error {
        LinesCodecError::MaxLineLengthExceeded => {
            Error::PeerProtocol(format!("line from {} exceeds {} bytes", addr, MAX_LINE_LENGTH))
        }
        LinesCodecError::Io(e) => Error::unreachable(addr, e),
    }
}
