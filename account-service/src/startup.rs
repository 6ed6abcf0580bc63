//! Application startup and lifecycle management.
//!
//! Wires the repository, resolver chain, account context and the optional
//! remote license client, then serves the account HTTP API.

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{make_request_span, metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::{AccountServiceConfig, SessionConfig};
use crate::handlers::{account, health};
use crate::middleware::request_context::gateway_principal_middleware;
use crate::services::remote::{FilePreferenceStore, PreferenceStore, StatsJob};
use crate::services::{
    AccountContext, AccountRepository, AccountServiceApi, AccountStatusCache,
    DomainAccountResolver, HeaderAccountResolver, InMemoryAccountRepository, LocalAccountService,
    PrincipalAccountResolver, RemoteAccountClient, RemoteAccountResolver,
    RequestAttributeResolver, ResolverRegistry,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AccountServiceConfig,
    pub repository: Arc<dyn AccountRepository>,
    pub context: AccountContext,
    /// Local service, or the remote client on licensed installations.
    pub service: Arc<dyn AccountServiceApi>,
    pub remote: Option<Arc<RemoteAccountClient>>,
}

impl AppState {
    pub fn new(
        config: AccountServiceConfig,
        repository: Arc<dyn AccountRepository>,
        remote: Option<Arc<RemoteAccountClient>>,
    ) -> Self {
        let status_cache = Arc::new(AccountStatusCache::new());

        let mut resolvers = ResolverRegistry::new();
        resolvers
            .register(Arc::new(RequestAttributeResolver::new(repository.clone())))
            .register(Arc::new(PrincipalAccountResolver::new(repository.clone())));
        if config.resolver.trusted_gateway {
            resolvers.register(Arc::new(HeaderAccountResolver::with_header(
                repository.clone(),
                config.resolver.account_header.clone(),
            )));
        }
        resolvers.register(Arc::new(DomainAccountResolver::new(repository.clone())));
        if let Some(remote) = &remote {
            resolvers.register(Arc::new(RemoteAccountResolver::new(remote.clone())));
        }

        let context = AccountContext::new(resolvers, repository.clone(), status_cache);

        let service: Arc<dyn AccountServiceApi> = match &remote {
            Some(remote) => remote.clone(),
            None => Arc::new(LocalAccountService::new(context.clone())),
        };

        Self {
            config,
            repository,
            context,
            service,
            remote,
        }
    }
}

fn session_layer(config: &SessionConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookie)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.inactivity_minutes,
        )))
}

pub fn build_router(state: AppState) -> Router {
    let sessions = session_layer(&state.config.session);

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route("/api/saas/account/:uuid", get(account::get_account))
        .route("/api/saas/account/:uuid/stats", post(account::update_stats))
        .route(
            "/api/saas/account/:uuid/parameter/:name",
            get(account::get_parameter),
        )
        .route("/api/saas/current", get(account::current_account))
        .route("/api/saas/current/:account_id", post(account::select_account));
    if state.config.resolver.trusted_gateway {
        router = router.layer(from_fn(gateway_principal_middleware));
    }

    router
        .layer(sessions)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Remote client selected by configuration, if any.
pub fn build_remote_client(
    config: &AccountServiceConfig,
) -> Result<Option<RemoteAccountClient>, AppError> {
    let Some(remote) = &config.remote else {
        return Ok(None);
    };

    let client = if remote.one_time {
        let store: Arc<dyn PreferenceStore> = match &remote.preferences_path {
            Some(path) => Arc::new(FilePreferenceStore::open(path)?),
            None => Arc::new(FilePreferenceStore::user_default()?),
        };
        RemoteAccountClient::one_time(remote.account.clone(), store)?
    } else {
        RemoteAccountClient::new(remote.account.clone())?
    };

    tracing::info!(
        server_url = %remote.account.server_url,
        one_time = remote.one_time,
        "Remote account checks enabled"
    );
    Ok(Some(client))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AccountServiceConfig) -> Result<Self, AppError> {
        let repository: Arc<dyn AccountRepository> = match &config.seed_file {
            Some(path) => Arc::new(InMemoryAccountRepository::from_seed_file(path).map_err(|e| {
                tracing::error!("Failed to load account seed {}: {}", path, e);
                e
            })?),
            None => Arc::new(InMemoryAccountRepository::new()),
        };
        let remote = build_remote_client(&config)?.map(Arc::new);

        Self::build_with(config, repository, remote).await
    }

    /// Build around an existing repository and remote client.
    pub async fn build_with(
        config: AccountServiceConfig,
        repository: Arc<dyn AccountRepository>,
        remote: Option<Arc<RemoteAccountClient>>,
    ) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState::new(config, repository, remote);
        tracing::info!(
            port,
            resolvers = ?state.context.resolvers().names(),
            "Account service listening"
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let stats_shutdown = self.state.remote.clone().map(|client| {
            let job = StatsJob::new(client);
            let token = job.shutdown_token();
            job.spawn();
            token
        });

        let router = build_router(self.state);
        let result = axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        if let Some(token) = stats_shutdown {
            token.cancel();
        }

        result.map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
