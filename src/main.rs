mod announce;
mod client;
mod config;
mod error;
mod tracker;

use clap::Parser;
use config::{Cli, Command};
use log::error;

#[tokio::main(worker_threads = 4)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Tracker(config) => tracker::run(config).await,
        Command::Peer(config) => client::run(config).await,
    };
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
