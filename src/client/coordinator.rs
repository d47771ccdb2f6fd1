use log::{info, warn};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::{select, time::sleep};

use super::downloader::{DownloadReport, SwarmDownloader};
use super::peer::Timeouts;
use super::piece_store::PieceStore;
use super::server::PieceServer;
use super::tracker::Announce;
use crate::announce::{Event, PeerIdentity};

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub timeouts: Timeouts,
    pub reannounce_interval: Duration,
    /// Download rounds before giving up; each round after the first starts with
    /// a fresh peer list from the tracker.
    pub max_rounds: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Complete,
    Incomplete {
        missing: Vec<u32>,
        unreachable: Vec<String>,
    },
}

/// Drives one download session: serve others, announce, fan out downloaders,
/// wait for the store to fill up, report.
pub struct Coordinator<A> {
    peer_id: String,
    store: PieceStore,
    announcer: A,
    settings: SessionSettings,
    server: Option<JoinHandle<()>>,
}

impl<A: Announce> Coordinator<A> {
    pub fn new(
        peer_id: String,
        store: PieceStore,
        announcer: A,
        settings: SessionSettings,
    ) -> Coordinator<A> {
        Coordinator {
            peer_id,
            store,
            announcer,
            settings,
            server: None,
        }
    }

    /// Starts serving pieces in the background.
    pub fn start(&mut self, server: PieceServer) {
        self.server = Some(tokio::spawn(server.run()));
    }

    pub async fn download(&self) -> SessionOutcome {
        let mut unreachable = BTreeSet::new();
        let mut peers = self.announce_or_empty(Event::Started).await;
        let mut round = 1;

        loop {
            if self.run_round(peers, &mut unreachable).await {
                break;
            }
            if round >= self.settings.max_rounds {
                let missing = self.store.missing();
                warn!(
                    "Giving up after {} rounds, missing pieces {:?}, unreachable peers {:?}",
                    round, missing, unreachable
                );
                return SessionOutcome::Incomplete {
                    missing,
                    unreachable: unreachable.into_iter().collect(),
                };
            }
            round += 1;
            sleep(self.settings.reannounce_interval).await;
            peers = self.announce_or_empty(Event::Empty).await;
        }

        info!("All {} pieces downloaded", self.store.total_pieces());
        if let Err(e) = self.announcer.announce(Event::Completed).await {
            warn!("Could not report completion to tracker: {}", e);
        }
        SessionOutcome::Complete
    }

    /// Runs one downloader per peer and returns once the store is complete or
    /// every downloader has finished. Returns whether the store is complete.
    async fn run_round(
        &self,
        peers: Vec<PeerIdentity>,
        unreachable: &mut BTreeSet<String>,
    ) -> bool {
        let mut tasks = JoinSet::new();
        for peer in peers {
            if peer.peer_id == self.peer_id {
                continue;
            }
            let downloader = SwarmDownloader::new(
                self.peer_id.clone(),
                peer,
                self.store.clone(),
                self.settings.timeouts,
            );
            tasks.spawn(downloader.run());
        }

        loop {
            select! {
                _ = self.store.wait_complete() => return true,
                joined = tasks.join_next() => match joined {
                    Some(Ok(report)) => record(report, unreachable),
                    Some(Err(e)) => warn!("Download task failed: {}", e),
                    None => return self.store.is_complete(),
                },
            }
        }
    }

    async fn announce_or_empty(&self, event: Event) -> Vec<PeerIdentity> {
        match self.announcer.announce(event).await {
            Ok(peers) => peers,
            Err(e) => {
                warn!("Announce {} failed, continuing without new peers: {}", event, e);
                Vec::new()
            }
        }
    }

    /// Leaves the swarm and stops serving.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.announcer.announce(Event::Stopped).await {
            warn!("Could not report departure to tracker: {}", e);
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

fn record(report: DownloadReport, unreachable: &mut BTreeSet<String>) {
    if report.is_unreachable() {
        unreachable.insert(report.peer);
    } else if !report.obtained.is_empty() || !report.missed.is_empty() {
        info!(
            "Finished with {}: got {:?}, unavailable {:?}",
            report.peer, report.obtained, report.missed
        );
    }
}
