use axum::http::HeaderValue;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod chain;
mod config;
mod constants;
mod crypto;
mod error;
mod explorer;
mod game;
mod models;
mod resolver;
mod services;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use chain::{check_network, ChainReader, EthersChain, RpsAbi};
use config::Config;
use constants::API_VERSION;
use explorer::{BlockExplorer, EtherscanClient, SourceVerifier};
use resolver::OutcomeResolver;
use services::{GameService, GameWatcher, VerificationService};
use store::{CommitmentStore, HistoryStore, ResultStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rpsls_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting RPSLS Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Chain: {} (testnet={})", config.chain_id, config.is_testnet());
    tracing::info!("API Version: {}", API_VERSION);

    let store = store::open(config.redis_url.as_deref()).await?;

    let abi = RpsAbi::load()?;
    let chain: Arc<dyn ChainReader> = Arc::new(EthersChain::new(&config, abi.clone())?);
    let etherscan = Arc::new(EtherscanClient::new(&config)?);
    let explorer: Arc<dyn BlockExplorer> = etherscan.clone();
    let verifier: Arc<dyn SourceVerifier> = etherscan;

    // Refuse to serve wallet calls for a different network
    let network = check_network(chain.as_ref(), config.chain_id).await;
    match network.node_chain_id {
        Some(node) if !network.matches => anyhow::bail!(
            "RPC node reports chain {} but CHAIN_ID is {}",
            node,
            config.chain_id
        ),
        Some(_) => tracing::info!("RPC node on expected chain {}", config.chain_id),
        None => tracing::warn!("RPC node unreachable; network check deferred to /health"),
    }

    let contract_source = load_contract_source(config.rps_source_path.as_deref()).await;
    let verification = Arc::new(VerificationService::new(
        verifier,
        chain.clone(),
        contract_source,
    ));

    let commitments = CommitmentStore::new(store.clone());
    let resolver = Arc::new(OutcomeResolver::new(
        chain.clone(),
        explorer.clone(),
        commitments.clone(),
        ResultStore::new(store.clone()),
    ));
    let games = Arc::new(GameService::new(
        chain.clone(),
        explorer,
        abi,
        config.rps_bytecode.clone(),
        commitments,
        HistoryStore::new(store.clone()),
        resolver,
    ));
    let watcher = Arc::new(GameWatcher::new(
        games.clone(),
        Duration::from_secs(config.poll_interval_secs),
    ));

    let app_state = api::AppState {
        config: config.clone(),
        store,
        chain,
        games,
        watcher,
        verification,
    };

    let app = build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Game lifecycle
        .route("/api/v1/games/create", post(api::games::create_game))
        .route("/api/v1/games/join", post(api::games::join_game))
        .route("/api/v1/games/reveal", post(api::games::reveal))
        .route(
            "/api/v1/games/claim-timeout",
            post(api::games::claim_timeout),
        )
        .route(
            "/api/v1/games/{address}/register",
            post(api::games::register_game),
        )
        .route("/api/v1/games/{address}/state", get(api::games::get_state))
        // Outcome
        .route(
            "/api/v1/games/{address}/outcome",
            get(api::games::get_outcome),
        )
        .route(
            "/api/v1/games/{address}/refresh",
            post(api::games::refresh_outcome),
        )
        .route(
            "/api/v1/games/{address}/verify",
            get(api::verify::get_verification).post(api::verify::start_verification),
        )
        // Watcher
        .route(
            "/api/v1/games/{address}/watch",
            post(api::watch::start_watch),
        )
        .route(
            "/api/v1/watch/{viewer}",
            get(api::watch::get_watch).delete(api::watch::stop_watch),
        )
        .route(
            "/api/v1/watch/{viewer}/pause",
            post(api::watch::pause_watch),
        )
        .route(
            "/api/v1/watch/{viewer}/resume",
            post(api::watch::resume_watch),
        )
        // History
        .route(
            "/api/v1/history/{player}",
            get(api::history::get_history).delete(api::history::clear_history),
        )
        .route(
            "/api/v1/history/{player}/{address}/status",
            put(api::history::update_status),
        )
        // Explorer
        .route(
            "/api/v1/explorer/transactions",
            get(api::explorer::get_transactions),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn load_contract_source(path: Option<&str>) -> Option<String> {
    let path = path?;
    match tokio::fs::read_to_string(path).await {
        Ok(source) => Some(source),
        Err(err) => {
            tracing::warn!("Contract source {} unreadable: {}", path, err);
            None
        }
    }
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
