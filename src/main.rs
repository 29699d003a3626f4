use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use suzaku::cache::CacheOrchestrator;
use suzaku::config::Config;
use suzaku::dispatch::Dispatcher;
use suzaku::kv::{InMemoryKv, PersistentKv};
use suzaku::proxy::RequestPipeline;
use suzaku::server::ServerConfig;
use suzaku::source::object_store::ObjectStoreRegistry;
use suzaku::source::SourceFetcher;

/// Suzaku video transformation edge proxy.
#[derive(Parser, Debug)]
#[command(name = "suzaku")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Address to bind the HTTP listener to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    suzaku::logging::init_subscriber().map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let config = Config::from_file(&args.config).map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    tracing::info!(
        config_file = %args.config.display(),
        origin_count = config.origins.len(),
        "configuration loaded successfully"
    );

    let config = Arc::new(config);

    // Object store bindings are a host-integration concern: the edge
    // platform registers its real bindings before traffic is served. An
    // empty registry here means every `ObjectStore`-sourced origin
    // returns a config error until the host wires its bindings in.
    let object_stores = ObjectStoreRegistry::new();
    let source_fetcher = Arc::new(SourceFetcher::new(object_stores)?);
    let kv: Arc<dyn PersistentKv> = Arc::new(InMemoryKv::new());
    let dispatcher = Dispatcher::new(source_fetcher, kv.clone())?;
    let cache = CacheOrchestrator::new(kv, config.cache.ttl.clone());

    let pipeline = RequestPipeline::new(config.clone(), dispatcher, cache)?;
    let _ = pipeline;

    let server_config = ServerConfig::new(args.listen);
    tracing::info!(
        address = %server_config.address,
        threads = server_config.threads,
        "suzaku request pipeline initialized"
    );

    // Wiring `RequestPipeline::handle` into a `pingora_proxy::ProxyHttp`
    // listener is the host integration's job, same as the teacher's own
    // binary stops short of calling `Server::run_forever`.
    tracing::info!("server initialized successfully");

    Ok(())
}
