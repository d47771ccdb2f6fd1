use thiserror::Error;

/// Failures shared by the tracker and the peer client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("piece index {index} out of range, swarm has {total} pieces")]
    OutOfRange { index: u32, total: u32 },

    #[error("bad announce request: {0}")]
    BadRequest(String),

    #[error("tracker unreachable: {0}")]
    TrackerUnreachable(#[source] reqwest::Error),

    #[error("tracker error: {0}")]
    TrackerError(String),

    #[error("peer {addr} unreachable: {reason}")]
    PeerUnreachable { addr: String, reason: String },

    #[error("peer protocol error: {0}")]
    PeerProtocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unreachable(addr: &str, reason: impl ToString) -> Error {
        Error::PeerUnreachable {
            addr: addr.to_string(),
            reason: reason.to_string(),
        }
    }
}
