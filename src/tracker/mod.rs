pub mod registry;
pub mod server;

use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::TrackerConfig;
use crate::error::Error;
use registry::PeerRegistry;

pub async fn run(config: TrackerConfig) -> Result<(), Error> {
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Tracker server running on {}", listener.local_addr()?);
    let router = server::router(Arc::new(PeerRegistry::new()), config.tracker_id);
    server::serve(listener, router).await?;
    Ok(())
}
