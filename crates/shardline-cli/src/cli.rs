use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shardline",
    about = "Shardline: a sharding gateway over S3-compatible storage nodes",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Discover storage nodes and serve the HTTP gateway
    Serve(ServeArgs),
    /// List the storage nodes discovery finds
    Nodes(NodesArgs),
    /// Show which node each object id routes to
    Locate(LocateArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, overriding the configuration
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct NodesArgs {}

#[derive(Args)]
pub struct LocateArgs {
    #[arg(required = true)]
    pub ids: Vec<String>,
}
