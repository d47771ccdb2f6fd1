use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::announce::{Event, PeerIdentity, TrackerResponse};
use crate::error::Error;

/// A validated announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub peer_id: String,
    pub ip: String,
    pub port: u16,
    pub info_hash: String,
    pub event: Event,
}

impl AnnounceRequest {
    /// Builds a request from query parameters. `peer_id`, `port` and
    /// `info_hash` are required and must be non-empty.
    pub fn from_query(
        params: &HashMap<String, String>,
        ip: String,
    ) -> Result<AnnounceRequest, Error> {
        let required = |name: &str| -> Result<String, Error> {
            params
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| Error::BadRequest(format!("missing required parameter {}", name)))
        };
        let peer_id = required("peer_id")?;
        let port = required("port")?;
        let info_hash = required("info_hash")?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::BadRequest(format!("invalid port {:?}", port)))?;

        Ok(AnnounceRequest {
            peer_id,
            ip,
            port,
            info_hash,
            event: Event::parse(params.get("event").map(String::as_str)),
        })
    }
}

/// Tracker-side map from peer_id to how that peer can be reached. One global
/// swarm: entries are not partitioned by info_hash.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<BTreeMap<String, PeerIdentity>>,
}

impl PeerRegistry {
    pub fn new() -> PeerRegistry {
        PeerRegistry::default()
    }

    /// Registers or overwrites `peer_id` and returns every registered peer,
    /// the caller included.
    pub fn announce_started(
        &self,
        peer_id: &str,
        ip: &str,
        port: u16,
        info_hash: &str,
    ) -> Vec<PeerIdentity> {
        let mut peers = self.peers.write();
        let previous = peers.insert(
            peer_id.to_string(),
            PeerIdentity {
                peer_id: peer_id.to_string(),
                ip: ip.to_string(),
                port,
                info_hash: info_hash.to_string(),
            },
        );
        if previous.is_some() {
            debug!("Peer {} re-registered at {}:{}", peer_id, ip, port);
        } else {
            info!("Peer {} joined from {}:{}", peer_id, ip, port);
        }
        peers.values().cloned().collect()
    }

    pub fn announce_stopped(&self, peer_id: &str) {
        if self.peers.write().remove(peer_id).is_some() {
            info!("Peer {} left", peer_id);
        }
    }

    pub fn announce_completed(&self, peer_id: &str) {
        info!("Peer {} completed the download", peer_id);
    }

    pub fn announce_generic(&self, peer_id: &str) -> Vec<PeerIdentity> {
        debug!("Peer {} asked for the peer list", peer_id);
        self.peers.read().values().cloned().collect()
    }

    pub fn handle(&self, request: &AnnounceRequest, tracker_id: &str) -> TrackerResponse {
        match request.event {
            Event::Started => TrackerResponse {
                tracker_id: Some(tracker_id.to_string()),
                peers: Some(self.announce_started(
                    &request.peer_id,
                    &request.ip,
                    request.port,
                    &request.info_hash,
                )),
                ..Default::default()
            },
            Event::Stopped => {
                self.announce_stopped(&request.peer_id);
                TrackerResponse::default()
            }
            Event::Completed => {
                self.announce_completed(&request.peer_id);
                TrackerResponse::default()
            }
            Event::Empty => TrackerResponse {
                peers: Some(self.announce_generic(&request.peer_id)),
                ..Default::default()
            },
        }
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
