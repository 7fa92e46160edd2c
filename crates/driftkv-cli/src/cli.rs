use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use driftkv_types::NodeRole;

const DEFAULT_ADDR: &str = "127.0.0.1:4141";

#[derive(Parser)]
#[command(
    name = "driftkv",
    about = "driftkv — a durable, replicated key-value store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a driftkv node
    Serve(ServeArgs),
    /// Write one key/value pair
    Put(PutArgs),
    /// Read one key
    Get(GetArgs),
    /// Delete one key
    Del(DelArgs),
    /// Read every pair in an inclusive key range
    Range(RangeArgs),
    /// Write several pairs as one atomic batch
    Batchput(BatchputArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file; the flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Node role: master or replica
    #[arg(long)]
    pub role: Option<NodeRole>,
    /// Data directory for the WAL, data file, and index snapshot
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Replica address to forward mutations to (repeatable)
    #[arg(long = "replica")]
    pub replicas: Vec<SocketAddr>,
    /// Wait for replica acknowledgements before answering clients
    #[arg(long)]
    pub sync: bool,
}

#[derive(Args)]
pub struct PutArgs {
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct GetArgs {
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,
    pub key: String,
}

#[derive(Args)]
pub struct DelArgs {
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,
    pub key: String,
}

#[derive(Args)]
pub struct RangeArgs {
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,
    pub start: String,
    pub end: String,
}

#[derive(Args)]
pub struct BatchputArgs {
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,
    /// key=value pairs
    #[arg(required = true)]
    pub pairs: Vec<String>,
}
