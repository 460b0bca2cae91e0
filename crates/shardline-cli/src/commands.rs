use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use shardline_discovery::NodeDiscovery;
use shardline_gateway::{ShardlineConfig, ShardlineServer};
use shardline_ring::HashRing;
use shardline_router::ShardRouter;
use shardline_store::{ObjectStore, S3StoreFactory};
use shardline_types::{Node, ObjectId, RequestContext};
use tracing::info;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ShardlineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Nodes(_) => cmd_nodes(config).await,
        Command::Locate(args) => cmd_locate(config, args).await,
    }
}

fn discovery(config: &ShardlineConfig) -> anyhow::Result<Arc<dyn NodeDiscovery>> {
    shardline_discovery::from_config(&config.discovery).context("connecting to node discovery")
}

async fn discover(config: &ShardlineConfig) -> anyhow::Result<Vec<Node>> {
    discovery(config)?
        .list_nodes(&RequestContext::background())
        .await
        .context("discovering storage nodes")
}

async fn cmd_serve(mut config: ShardlineConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.gateway.bind_addr = bind;
    }
    info!(bucket = %config.bucket_name, "starting shardline");

    let factory = Arc::new(S3StoreFactory::new(config.bucket_name.clone(), config.backend.clone()));
    let router = ShardRouter::new(discovery(&config)?, factory, config.ring.clone());

    let init = RequestContext::background();
    tokio::select! {
        result = router.init(&init) => result.context("initializing storage nodes")?,
        _ = shutdown_signal() => {
            println!("Interrupted before the gateway started.");
            return Ok(());
        }
    }
    for (member, load) in router.loads() {
        info!(member = %member, partitions = load, "ring member");
    }

    println!(
        "{} Shardline gateway on {} ({} nodes, bucket {})",
        "✓".green().bold(),
        config.gateway.bind_addr.to_string().bold(),
        router.members().len(),
        config.bucket_name.yellow(),
    );
    let store: Arc<dyn ObjectStore> = Arc::new(router);
    ShardlineServer::new(config.gateway.clone(), store)
        .serve(shutdown_signal())
        .await
        .context("serving HTTP")?;
    Ok(())
}

async fn cmd_nodes(config: ShardlineConfig) -> anyhow::Result<()> {
    let nodes = discover(&config).await?;
    if nodes.is_empty() {
        println!("No storage nodes found.");
        return Ok(());
    }
    for node in &nodes {
        println!("  {} {}", node.token().to_string().green(), node.diagnostic().dimmed());
    }
    println!("{} nodes", nodes.len().to_string().bold());
    Ok(())
}

async fn cmd_locate(config: ShardlineConfig, args: LocateArgs) -> anyhow::Result<()> {
    let nodes = discover(&config).await?;
    let ring = HashRing::with_members(config.ring.clone(), nodes.iter().map(Node::token))
        .context("building hash ring")?;

    for raw in &args.ids {
        match ObjectId::parse(raw) {
            Ok(id) => {
                let member = ring.locate(id.as_str().as_bytes())?;
                println!("{} → {}", id.as_str().bold(), member.to_string().green());
            }
            Err(err) => println!("{} {} ({})", "✗".red(), raw.bold(), err),
        }
    }
    Ok(())
}

/// Resolves on SIGINT, and on SIGTERM, SIGHUP or SIGQUIT where those exist.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let other = async {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
            signal(SignalKind::quit()),
        ) {
            (Ok(mut term), Ok(mut hup), Ok(mut quit)) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = hup.recv() => {}
                    _ = quit.recv() => {}
                }
            }
            _ => {
                tracing::error!("cannot install signal handlers");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let other = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = other => {}
    }
}
