use axum::Router;
use gossip_membership::config::MembershipConfig;
use gossip_membership::membership::client::HttpMembershipClient;
use gossip_membership::membership::handlers::membership_router;
use gossip_membership::membership::service::MembershipService;
use gossip_membership::membership::types::NodeId;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--seed <addr:port>]... [--node-id <id>]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:7000", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:7001 --seed 127.0.0.1:7000",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut seed_nodes: Vec<String> = vec![];
    let mut node_id: Option<NodeId> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--bind", Some(value)) => {
                bind_addr = Some(value.parse()?);
                i += 2;
            }
            ("--seed", Some(value)) => {
                seed_nodes.push(value.clone());
                i += 2;
            }
            ("--node-id", Some(value)) => {
                node_id = Some(NodeId(value.clone()));
                i += 2;
            }
            (flag, _) => {
                tracing::warn!("Ignoring unknown or incomplete argument {}", flag);
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.ok_or_else(|| anyhow::anyhow!("--bind is required"))?;
    let node_id = node_id.unwrap_or_default();
    let config = MembershipConfig::from_env()?;

    tracing::info!("Starting node {} on {}", node_id, bind_addr);
    tracing::info!("Config: {:?}", config);

    let client = Arc::new(HttpMembershipClient::new(config.rpc_timeout));
    let membership = MembershipService::new(node_id, bind_addr.to_string(), config, client);

    // 1. Serve the membership RPCs before announcing ourselves.
    let app: Router = membership_router(membership.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    // 2. Join through the seeds:
    membership.join_cluster(&seed_nodes).await?;

    // 3. Probe and sync loops:
    membership.clone().start().await;

    // 4. Log membership changes:
    let mut joins = membership.subscribe_join("logger").await;
    let mut updates = membership.subscribe_update("logger").await;
    let mut leaves = membership.subscribe_leave("logger").await;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(member) = joins.recv() => tracing::info!("[event] join {} at {}", member.node_id, member.rpc_addr),
                Some(member) = updates.recv() => tracing::info!("[event] update {} -> {:?}", member.node_id, member.state),
                Some(member) = leaves.recv() => tracing::info!("[event] leave {}", member.node_id),
                else => break,
            }
        }
    });

    // 5. Stats reporter:
    let stats_service = membership.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));

        loop {
            interval.tick().await;
            let members = stats_service.members().await;
            tracing::info!("Cluster stats: {} known members", members.len());
            for member in members {
                tracing::info!("  - {} rpc={} state={:?}", member.node_id, member.rpc_addr, member.state);
            }
        }
    });

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::select! {
        result = server => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down, announcing leave");
            membership.shutdown();
            membership.leave_cluster().await;
        }
    }

    Ok(())
}
