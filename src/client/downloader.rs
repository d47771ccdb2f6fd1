use log::{debug, info, warn};

use super::message::Message;
use super::peer::{PeerConnection, Timeouts};
use super::piece_store::PieceStore;
use crate::announce::PeerIdentity;
use crate::error::Error;

/// What one downloader task achieved against its peer.
#[derive(Debug)]
pub struct DownloadReport {
    pub peer: String,
    pub obtained: Vec<u32>,
    pub missed: Vec<u32>,
    pub error: Option<Error>,
}

impl DownloadReport {
    fn new(peer: String) -> DownloadReport {
        DownloadReport {
            peer,
            obtained: Vec::new(),
            missed: Vec::new(),
            error: None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self.error, Some(Error::PeerUnreachable { .. }))
    }
}

/// Fetches the pieces we are missing from exactly one remote peer, one request
/// in flight at a time.
pub struct SwarmDownloader {
    local_peer_id: String,
    peer: PeerIdentity,
    store: PieceStore,
    timeouts: Timeouts,
}

impl SwarmDownloader {
    pub fn new(
        local_peer_id: String,
        peer: PeerIdentity,
        store: PieceStore,
        timeouts: Timeouts,
    ) -> SwarmDownloader {
        SwarmDownloader {
            local_peer_id,
            peer,
            store,
            timeouts,
        }
    }

    /// Never fails: errors end up in the report and only affect this peer.
    pub async fn run(self) -> DownloadReport {
        let addr = self.peer.addr();
        let mut report = DownloadReport::new(addr.clone());
        if self.peer.peer_id == self.local_peer_id {
            debug!("Skipping ourselves at {}", addr);
            return report;
        }

        // snapshot once; pieces arriving from other peers meanwhile are re-marked harmlessly
        let missing = self.store.missing();
        if missing.is_empty() {
            return report;
        }

        if let Err(e) = self.exchange(&addr, &missing, &mut report).await {
            warn!("Giving up on peer {}: {}", addr, e);
            report.error = Some(e);
        }
        report
    }

    async fn exchange(
        &self,
        addr: &str,
        missing: &[u32],
        report: &mut DownloadReport,
    ) -> Result<(), Error> {
        let mut conn = PeerConnection::connect(addr, self.timeouts).await?;
        info!("Connected to peer {}", addr);

        for &index in missing {
            conn.send(Message::RequestPiece(index)).await?;
            match conn.recv().await? {
                Some(Message::PieceData(got)) if got == index => {
                    self.store.mark_owned(index)?;
                    info!("Downloaded piece {} from {}", index, addr);
                    report.obtained.push(index);
                }
                Some(reply) => {
                    debug!("Piece {} not available from {} ({})", index, addr, reply);
                    report.missed.push(index);
                }
                None => {
                    return Err(Error::unreachable(addr, "connection closed mid-scan"));
                }
            }
        }

        conn.close().await;
        Ok(())
    }
}
