use std::sync::Arc;

use clap::Args;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use wisp_auth::CapabilityTokenService;
use wisp_quota::HttpQuotaClient;
use wisp_sites::handlers::not_found_fallback;
use wisp_sites::{configure_routes, PathResolver, SiteAppState, SiteService};
use wisp_store::{ContentStore, RedisKv};

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:3000", env = "WISP_ADDRESS")]
    pub address: String,

    /// Redis connection URL for site and file storage
    #[arg(
        long,
        default_value = "redis://127.0.0.1:6379",
        env = "WISP_REDIS_URL"
    )]
    pub redis_url: String,

    /// Root URL of the quota service
    #[arg(long, env = "WISP_QUOTA_URL")]
    pub quota_url: String,

    /// API key for the quota service
    #[arg(long, env = "WISP_QUOTA_API_KEY")]
    pub quota_api_key: String,

    /// Public origin used to build site URLs
    #[arg(long, default_value = "http://127.0.0.1:3000", env = "WISP_ORIGIN")]
    pub origin: String,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.serve())
    }

    async fn serve(self) -> anyhow::Result<()> {
        debug!("Connecting to Redis at {}", self.redis_url);
        let kv = RedisKv::connect(&self.redis_url).await?;
        let store = Arc::new(ContentStore::new(Arc::new(kv)));

        let secret = store.get_or_create_secret_key().await?;
        let tokens = Arc::new(CapabilityTokenService::new(secret));

        let quota = Arc::new(HttpQuotaClient::new(
            self.quota_url.clone(),
            self.quota_api_key.clone(),
        ));

        let state = Arc::new(SiteAppState {
            sites: SiteService::new(store.clone(), tokens, quota, self.origin.clone()),
            resolver: PathResolver::new(store),
        });

        let app = configure_routes()
            .fallback(not_found_fallback)
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&self.address).await?;
        info!("Wisp server listening on {}", self.address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("Wisp server exited");
        Ok(())
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Shutdown signal received");
}
