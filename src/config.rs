use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use url::Url;

use crate::client::coordinator::SessionSettings;
use crate::client::peer::Timeouts;

#[derive(Debug, Parser)]
#[command(name = "swarm", version, about = "Tracker and peer for a single-file swarm")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the rendezvous tracker
    Tracker(TrackerConfig),
    /// Join the swarm as a peer
    Peer(PeerConfig),
}

#[derive(Debug, Clone, Args)]
pub struct TrackerConfig {
    #[arg(long, env = "SWARM_TRACKER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Opaque id returned on `started` announces
    #[arg(long, env = "SWARM_TRACKER_ID", default_value = "tracker123")]
    pub tracker_id: String,
}

#[derive(Debug, Clone, Args)]
pub struct PeerConfig {
    #[arg(long = "tracker", env = "SWARM_TRACKER", default_value = "http://127.0.0.1:8000")]
    pub tracker_url: Url,

    /// Port other peers connect to
    #[arg(long, env = "SWARM_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Name of the shared file, hashed into the info_hash
    #[arg(long = "file", env = "SWARM_FILE", default_value = "sample_file.txt")]
    pub file_name: String,

    #[arg(long, env = "SWARM_PIECES", default_value_t = 4)]
    pub pieces: u32,

    /// Pieces already owned at start
    #[arg(long, env = "SWARM_HAVE", value_delimiter = ',')]
    pub have: Vec<u32>,

    /// Start with every piece owned
    #[arg(long, env = "SWARM_SEED")]
    pub seed: bool,

    #[arg(long, env = "SWARM_CONNECT_TIMEOUT", default_value_t = 5)]
    pub connect_timeout: u64,

    #[arg(long, env = "SWARM_IO_TIMEOUT", default_value_t = 10)]
    pub io_timeout: u64,

    /// Seconds to wait before asking the tracker for fresh peers
    #[arg(long, env = "SWARM_REANNOUNCE", default_value_t = 5)]
    pub reannounce: u64,

    #[arg(long, env = "SWARM_MAX_ROUNDS", default_value_t = 3)]
    pub max_rounds: u32,
}

impl PeerConfig {
    pub fn owned_at_start(&self) -> Vec<u32> {
        if self.seed {
            (0..self.pieces).collect()
        } else {
            self.have.clone()
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout),
            io: Duration::from_secs(self.io_timeout),
        }
    }

    pub fn session(&self) -> SessionSettings {
        SessionSettings {
            timeouts: self.timeouts(),
            reannounce_interval: Duration::from_secs(self.reannounce),
            max_rounds: self.max_rounds,
        }
    }
}
