use log::{debug, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};

use super::message::Message;
use super::peer::PeerConnection;
use super::piece_store::PieceStore;
use crate::error::Error;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Serves piece queries from other peers, one task per inbound connection.
pub struct PieceServer {
    listener: TcpListener,
    store: PieceStore,
    idle_timeout: Duration,
}

impl PieceServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        store: PieceStore,
        idle_timeout: Duration,
    ) -> Result<PieceServer, Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening for peers on {}", listener.local_addr()?);
        Ok(PieceServer {
            listener,
            store,
            idle_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is dropped or aborted.
    pub async fn run(self) {
        let listener = &self.listener;
        loop {
            let (stream, addr) = accept_with_backoff(|| listener.accept()).await;
            debug!("{} connected to our server", addr);
            let conn = PeerConnection::new(stream, addr.to_string(), self.idle_timeout);
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(conn, store).await {
                    warn!("Closing connection from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Retries `accept` until it yields a connection, pausing after each failure
/// since errors such as EMFILE persist across immediate retries.
async fn accept_with_backoff<T, F, Fut>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!("Failed to accept peer connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

async fn serve_connection(mut conn: PeerConnection, store: PieceStore) -> Result<(), Error> {
    while let Some(message) = conn.recv().await? {
        match message {
            Message::RequestPiece(index) => {
                // out of range requests are simply not available
                let reply = if store.has(index).unwrap_or(false) {
                    Message::PieceData(index)
                } else {
                    Message::PieceNotAvailable
                };
                conn.send(reply).await?;
            }
            Message::HavePiece(index) => {
                debug!("{} announced piece {}", conn.addr(), index);
            }
            other => {
                return Err(Error::PeerProtocol(format!("unexpected {}", other)));
            }
        }
    }
    debug!("{} closed the connection", conn.addr());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::peer::Timeouts;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn spawn_server(owned: &[u32]) -> String {
        let store = PieceStore::new(4);
        for index in owned {
            store.mark_owned(*index).unwrap();
        }
        let server = PieceServer::bind("127.0.0.1:0", store, Duration::from_secs(5))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.run());
        addr
    }

    #[tokio::test]
    async fn answers_piece_requests() {
        let addr = spawn_server(&[1]).await;
        let mut conn = PeerConnection::connect(&addr, Timeouts::default()).await.unwrap();

        conn.send(Message::RequestPiece(1)).await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(Message::PieceData(1)));
        conn.send(Message::RequestPiece(0)).await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(Message::PieceNotAvailable));
        conn.send(Message::RequestPiece(9)).await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(Message::PieceNotAvailable));
    }

    #[tokio::test]
    async fn have_piece_gets_no_reply() {
        let addr = spawn_server(&[2]).await;
        let mut conn = PeerConnection::connect(&addr, Timeouts::default()).await.unwrap();

        conn.send(Message::HavePiece(0)).await.unwrap();
        conn.send(Message::RequestPiece(2)).await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(Message::PieceData(2)));
    }

    #[tokio::test]
    async fn accept_failures_back_off() {
        let mut attempts = 0;
        let started = tokio::time::Instant::now();
        let accepted = accept_with_backoff(|| {
            attempts += 1;
            let result = if attempts < 3 {
                Err(io::Error::new(io::ErrorKind::Other, "too many open files"))
            } else {
                Ok(attempts)
            };
            async move { result }
        })
        .await;

        assert_eq!(accepted, 3);
        assert!(started.elapsed() >= ACCEPT_RETRY_DELAY * 2);
    }

    #[tokio::test]
    async fn malformed_message_closes_only_that_connection() {
        let addr = spawn_server(&[0]).await;

        let mut raw = TcpStream::connect(&addr).await.unwrap();
        raw.write_all(b"GARBAGE\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = raw.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        let mut conn = PeerConnection::connect(&addr, Timeouts::default()).await.unwrap();
        conn.send(Message::RequestPiece(0)).await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(Message::PieceData(0)));
    }
}
