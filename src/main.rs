//! GIS Gateway - a validating proxy in front of GeoServer.
//!
//! This binary loads configuration, builds the upstream client and serves
//! the HTTP API until interrupted.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gis_gateway::{
    config::Config,
    server::{create_router, serve, RouterConfig, ServeConfig},
    upstream::{Credentials, GeoServerClient},
};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    let config = Config::parse();
    run_serve(config).await
}

async fn run_serve(config: Config) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let gateway = config.gateway_config();

    info!("GIS Gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  GeoServer: {}", gateway.geoserver_url);
    info!("  Workspace: {}", gateway.workspace);
    info!("  Tile gridset: {}", gateway.tile_gridset);
    info!("  Geometry column: {}", gateway.geom_column);
    info!("  Max zoom: {}", gateway.max_z);
    if gateway.attributes.whitelist().is_empty() {
        info!("  Attribute filters: any identifier");
    } else {
        info!(
            "  Attribute filters: {}",
            gateway.attributes.whitelist().join(", ")
        );
    }
    info!(
        "  Upstream: {} connections, {}ms request timeout, {}ms stream idle timeout",
        config.pool_size, config.upstream_timeout_ms, config.stream_timeout_ms
    );
    info!(
        "  Server: {}ms header read timeout, {}ms JSON request timeout",
        config.headers_timeout_ms, config.request_timeout_ms
    );

    let credentials = Credentials::new(&config.geoserver_user, &config.geoserver_password);
    if credentials.is_empty() {
        warn!("  Upstream auth: none (GEOSERVER_USER is not set)");
    } else {
        info!("  Upstream auth: basic as '{}'", credentials.username);
    }

    let client = match GeoServerClient::new(credentials, config.upstream_timeout(), config.pool_size)
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create upstream client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let router_config = build_router_config(&config, gateway);
    let router = create_router(client, router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/health", addr);
    info!("  curl http://{}/layers", addr);

    let serve_config = ServeConfig::default().with_header_read_timeout(config.headers_timeout());
    if let Err(e) = serve(listener, router, serve_config, shutdown_signal()).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Resolve when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "gis_gateway=debug,tower_http=debug"
    } else {
        "gis_gateway=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the parsed CLI configuration.
fn build_router_config(config: &Config, gateway: gis_gateway::GatewayConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new(gateway);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
        .with_request_timeout(config.request_timeout())
        .with_tracing(!config.no_tracing)
}
