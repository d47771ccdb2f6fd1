use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;
use url::Url;

use crate::announce::{Event, PeerIdentity, TrackerResponse};
use crate::error::Error;

/// Who we are, as reported to the tracker.
#[derive(Debug, Clone)]
pub struct LocalPeer {
    pub peer_id: String,
    pub info_hash: String,
    pub port: u16,
}

/// Reports an event to the tracker and returns the peers it knows about.
/// Failures are returned, never retried here.
#[async_trait]
pub trait Announce: Send + Sync {
    async fn announce(&self, event: Event) -> Result<Vec<PeerIdentity>, Error>;
}

pub struct TrackerRequest<'a> {
    pub announce_url: &'a Url,
    pub local: &'a LocalPeer,
    pub event: Event,
}

impl TrackerRequest<'_> {
    pub fn url(&self) -> Url {
        let mut url = self.announce_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("info_hash", &self.local.info_hash)
                .append_pair("peer_id", &self.local.peer_id)
                .append_pair("port", &self.local.port.to_string());
            if let Some(event) = self.event.as_query() {
                query.append_pair("event", event);
            }
        }
        url
    }
}

pub struct HttpAnnouncer {
    client: reqwest::Client,
    announce_url: Url,
    local: LocalPeer,
    timeout: Duration,
}

impl HttpAnnouncer {
    pub fn new(announce_url: Url, local: LocalPeer, timeout: Duration) -> HttpAnnouncer {
        HttpAnnouncer {
            client: reqwest::Client::new(),
            announce_url,
            local,
            timeout,
        }
    }
}

#[async_trait]
impl Announce for HttpAnnouncer {
    async fn announce(&self, event: Event) -> Result<Vec<PeerIdentity>, Error> {
        let url = TrackerRequest {
            announce_url: &self.announce_url,
            local: &self.local,
            event,
        }
        .url();
        debug!("Announcing {} to {}", event, url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(Error::TrackerUnreachable)?;
        let status = response.status();
        let body = response.bytes().await.map_err(Error::TrackerUnreachable)?;
        let decoded = serde_json::from_slice::<TrackerResponse>(&body);

        let tracker_response = match decoded {
            Ok(TrackerResponse {
                failure_reason: Some(reason),
                ..
            }) => return Err(Error::TrackerError(reason)),
            _ if !status.is_success() => {
                return Err(Error::TrackerError(format!("tracker returned {}", status)))
            }
            Ok(tracker_response) => tracker_response,
            Err(e) => return Err(Error::TrackerError(format!("undecodable response: {}", e))),
        };

        let peers = tracker_response.peers.unwrap_or_default();
        info!("Tracker acknowledged {} with {} peers", event, peers.len());
        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{registry::PeerRegistry, server};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn local(peer_id: &str, info_hash: &str) -> LocalPeer {
        LocalPeer {
            peer_id: peer_id.to_string(),
            info_hash: info_hash.to_string(),
            port: 6881,
        }
    }

    async fn spawn_tracker() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = server::router(Arc::new(PeerRegistry::new()), "tracker123".to_string());
        tokio::spawn(server::serve(listener, router));
        Url::parse(&format!("http://{}/announce", addr)).unwrap()
    }

    #[test]
    fn request_url_carries_identity() {
        let announce_url = Url::parse("http://tracker.local:8000/announce").unwrap();
        let me = local("p1", "abc");
        let url = TrackerRequest {
            announce_url: &announce_url,
            local: &me,
            event: Event::Started,
        }
        .url();
        assert_eq!(
            url.as_str(),
            "http://tracker.local:8000/announce?info_hash=abc&peer_id=p1&port=6881&event=started"
        );

        let plain = TrackerRequest {
            announce_url: &announce_url,
            local: &me,
            event: Event::Empty,
        }
        .url();
        assert!(plain.query().is_some_and(|q| !q.contains("event")));
    }

    #[tokio::test]
    async fn started_returns_ourselves() {
        let url = spawn_tracker().await;
        let announcer = HttpAnnouncer::new(url, local("p1", "abc"), Duration::from_secs(5));

        let peers = announcer.announce(Event::Started).await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer_id, "p1");
        assert_eq!(peers[0].ip, "127.0.0.1");
        assert_eq!(peers[0].port, 6881);

        assert!(announcer.announce(Event::Completed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_info_hash_is_tracker_error() {
        let url = spawn_tracker().await;
        let announcer = HttpAnnouncer::new(url, local("p1", ""), Duration::from_secs(5));

        let result = announcer.announce(Event::Started).await;
        assert!(matches!(result, Err(Error::TrackerError(reason)) if reason.contains("info_hash")));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/announce", addr)).unwrap();
        let announcer = HttpAnnouncer::new(url, local("p1", "abc"), Duration::from_secs(5));
        assert!(matches!(
            announcer.announce(Event::Started).await,
            Err(Error::TrackerUnreachable(_))
        ));
    }
}
