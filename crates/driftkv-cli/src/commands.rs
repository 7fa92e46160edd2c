use anyhow::bail;
use colored::Colorize;

use driftkv_protocol::{Request, Response};
use driftkv_replication::ReplicationMode;
use driftkv_server::{KvServer, NodeConfig};

use crate::cli::{BatchputArgs, Cli, Command, DelArgs, GetArgs, PutArgs, RangeArgs, ServeArgs};
use crate::client;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Put(args) => cmd_put(args),
        Command::Get(args) => cmd_get(args),
        Command::Del(args) => cmd_del(args),
        Command::Range(args) => cmd_range(args),
        Command::Batchput(args) => cmd_batchput(args),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(role) = args.role {
        config.role = role;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if !args.replicas.is_empty() {
        config.replication.enabled = true;
        config.replication.replicas = args.replicas;
    }
    if args.sync {
        config.replication.mode = ReplicationMode::Sync;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = KvServer::new(config)?;
        server
            .serve(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok(())
    })
}

fn cmd_put(args: PutArgs) -> anyhow::Result<()> {
    let response = client::request(
        args.addr,
        Request::Put {
            key: args.key.into_bytes(),
            value: args.value.into_bytes(),
        },
    )?;
    print_response(response)
}

fn cmd_get(args: GetArgs) -> anyhow::Result<()> {
    let response = client::request(
        args.addr,
        Request::Read {
            key: args.key.into_bytes(),
        },
    )?;
    print_response(response)
}

fn cmd_del(args: DelArgs) -> anyhow::Result<()> {
    let response = client::request(
        args.addr,
        Request::Delete {
            key: args.key.into_bytes(),
        },
    )?;
    print_response(response)
}

fn cmd_range(args: RangeArgs) -> anyhow::Result<()> {
    let response = client::request(
        args.addr,
        Request::ReadRange {
            start: args.start.into_bytes(),
            end: args.end.into_bytes(),
        },
    )?;
    print_response(response)
}

fn cmd_batchput(args: BatchputArgs) -> anyhow::Result<()> {
    let mut keys = Vec::with_capacity(args.pairs.len());
    let mut values = Vec::with_capacity(args.pairs.len());
    for pair in &args.pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected key=value, got {pair:?}");
        };
        keys.push(key.as_bytes().to_vec());
        values.push(value.as_bytes().to_vec());
    }
    let response = client::request(args.addr, Request::BatchPut { keys, values })?;
    print_response(response)
}

fn print_response(response: Response) -> anyhow::Result<()> {
    match response {
        Response::Ok => println!("{}", "OK".green().bold()),
        Response::NotFound => println!("{}", "NOT_FOUND".yellow()),
        Response::Value(value) => println!("{}", String::from_utf8_lossy(&value)),
        Response::Range(pairs) => {
            for (key, value) in pairs {
                println!(
                    "{}: {}",
                    String::from_utf8_lossy(&key).cyan(),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Response::Error(msg) => bail!("server error: {msg}"),
    }
    Ok(())
}
