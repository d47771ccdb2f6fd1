pub mod coordinator;
pub mod downloader;
pub mod message;
pub mod peer;
pub mod piece_store;
pub mod server;
pub mod tracker;

use coordinator::{Coordinator, SessionOutcome};
use log::{info, warn};
use piece_store::PieceStore;
use server::PieceServer;
use sha1::{Digest, Sha1};
use tracker::{HttpAnnouncer, LocalPeer};

use rand::Rng;

use crate::config::PeerConfig;
use crate::error::Error;

fn generate_peer_id() -> String {
    let prefix = "-SW0100-";

    let random_part: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Uniform::new(0u8, 10))
        .take(12)
        .map(|n| (n + b'0') as char)
        .collect();

    format!("{}{}", prefix, random_part)
}

/// Hex SHA-1 of the shared file's name, identifying the swarm.
pub fn info_hash_for(file_name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(file_name.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

pub async fn run(config: PeerConfig) -> Result<(), Error> {
    let store = PieceStore::new(config.pieces);
    for index in config.owned_at_start() {
        store.mark_owned(index)?;
    }

    let timeouts = config.timeouts();
    let server = PieceServer::bind(("0.0.0.0", config.port), store.clone(), timeouts.io).await?;
    let local = LocalPeer {
        peer_id: generate_peer_id(),
        info_hash: info_hash_for(&config.file_name),
        port: server.local_addr()?.port(),
    };
    info!(
        "Peer {} sharing {} ({} pieces, {} owned)",
        local.peer_id,
        config.file_name,
        store.total_pieces(),
        store.owned_count()
    );

    let announcer = HttpAnnouncer::new(config.tracker_url.clone(), local.clone(), timeouts.io);
    let mut coordinator = Coordinator::new(local.peer_id, store, announcer, config.session());
    coordinator.start(server);

    match coordinator.download().await {
        SessionOutcome::Complete => info!("All pieces downloaded. File assembled."),
        SessionOutcome::Incomplete {
            missing,
            unreachable,
        } => warn!(
            "Download incomplete: missing pieces {:?}, unreachable peers {:?}",
            missing, unreachable
        ),
    }

    info!("Serving pieces until interrupted");
    tokio::signal::ctrl_c().await?;
    coordinator.shutdown().await;
    Ok(())
}
