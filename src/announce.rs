//! Types crossing the tracker boundary, shared by the tracker service and the
//! peer-side announce client.

use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Event carried by an announce. Anything other than the three named events is
/// a plain announce that only asks for the current peer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started,
    Stopped,
    Completed,
    Empty,
}

impl Event {
    pub fn parse(value: Option<&str>) -> Event {
        match value {
            Some("started") => Event::Started,
            Some("stopped") => Event::Stopped,
            Some("completed") => Event::Completed,
            _ => Event::Empty,
        }
    }

    /// Query value, `None` for a plain announce.
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            Event::Started => Some("started"),
            Event::Stopped => Some("stopped"),
            Event::Completed => Some("completed"),
            Event::Empty => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query().unwrap_or("announce"))
    }
}

/// A swarm participant as the tracker knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub peer_id: String,
    pub ip: String,
    pub port: u16,
    pub info_hash: String,
}

impl PeerIdentity {
    /// `host:port` form usable with `TcpStream::connect`.
    pub fn addr(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerResponse {
    #[serde(rename = "failure reason")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(rename = "tracker id")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<PeerIdentity>>,
}

impl TrackerResponse {
    pub fn failure(reason: impl Into<String>) -> TrackerResponse {
        TrackerResponse {
            failure_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}
