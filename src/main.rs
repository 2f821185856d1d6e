use clap::Parser;
use podloop::controller::config::DEFAULT_WORKERS;
use podloop::controller::{Controller, LogPolicy};
use podloop::error::Result;
use podloop::k8s::pods::PodFilter;
use podloop::k8s::{client, nodes, USER_AGENT};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace to watch; all namespaces when omitted
    #[arg(short, long)]
    namespace: Option<String>,

    /// Value of the `app` label that identifies the pods
    #[arg(short, long, default_value = "zookeeper")]
    labelselector: String,

    /// Lifecycle phase the pods must be in
    #[arg(short, long, default_value = "Pending")]
    phase: String,

    /// Number of concurrent reconcile workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Absolute path to a kubeconfig file; inferred when omitted
    #[arg(short, long)]
    kubeconfig: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::ring::default_provider(),
    );

    let args = Args::parse();

    let client = client::new(Some(USER_AGENT), args.kubeconfig.as_deref()).await?;

    match nodes::list_names(client.clone()).await {
        Ok(names) => info!("🖥️  cluster nodes: {}", names.join(", ")),
        Err(e) => warn!("⚠️  could not list cluster nodes: {e}"),
    }

    let filter = PodFilter {
        app_label: Some(args.labelselector),
        phase: Some(args.phase),
    };
    let controller = Controller::new(Arc::new(LogPolicy), args.workers);
    let (shutdown_tx, handle) = controller.start(client, args.namespace, filter).await;

    tokio::signal::ctrl_c().await?;
    info!("received ctrl-c, shutting down");
    let _ = shutdown_tx.send(()).await;
    handle.drained().await;

    Ok(())
}
