use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use perpus::{
    application::{
        books::BookService,
        catalog::CatalogService,
        error::AppError,
        logs::LogService,
        repos::{BooksRepo, BooksWriteRepo, HealthRepo, LogsRepo, VisitorsRepo},
        stats::StatsService,
        visitors::VisitorService,
    },
    cache::{CachePolicy, CachedResponse, QueryCache, spawn_expiry_sweeper},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState},
        telemetry,
        uploads::UploadStorage,
    },
    live::EventBroadcaster,
};
use tokio::{sync::Notify, task::JoinHandle, time::MissedTickBehavior};
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    info!(target: "perpus::migrate", "Migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;

    let app = build_application_context(repositories, &settings)?;

    let sweeper_handle = settings
        .cache
        .sweep_interval
        .filter(|_| settings.cache.enabled)
        .map(|interval| spawn_expiry_sweeper(app.cache.clone(), interval));
    let limiter_handle = spawn_rate_limit_pruner(
        app.state.rate_limiter.clone(),
        app.state.rate_limiter.window(),
    );

    let result = serve_http(&settings, app.state, app.broadcaster).await;

    limiter_handle.abort();
    let _ = limiter_handle.await;
    if let Some(handle) = sweeper_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

struct ApplicationContext {
    state: ApiState,
    cache: Arc<QueryCache<CachedResponse>>,
    broadcaster: EventBroadcaster,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let books_repo: Arc<dyn BooksRepo> = repositories.clone();
    let books_write_repo: Arc<dyn BooksWriteRepo> = repositories.clone();
    let logs_repo: Arc<dyn LogsRepo> = repositories.clone();
    let visitors_repo: Arc<dyn VisitorsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone()).map_err(InfraError::Io)?,
    );
    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| InfraError::configuration("uploads.max_request_bytes exceeds usize"))?;

    let cache = Arc::new(QueryCache::new());
    let broadcaster = EventBroadcaster::new(settings.live.channel_capacity.get() as usize);

    let books = Arc::new(BookService::new(
        books_repo.clone(),
        books_write_repo,
        cache.clone(),
        broadcaster.clone(),
        settings.public.base_url.as_str(),
    ));

    let rate_limiter = Arc::new(ApiRateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    ));

    let state = ApiState {
        books,
        catalog: Arc::new(CatalogService::new(books_repo.clone())),
        logs: Arc::new(LogService::new(logs_repo)),
        visitors: Arc::new(VisitorService::new(visitors_repo.clone())),
        stats: Arc::new(StatsService::new(books_repo, visitors_repo)),
        health: health_repo,
        broadcaster: broadcaster.clone(),
        upload_storage,
        rate_limiter,
        books_cache: CachePolicy::new(
            cache.clone(),
            settings.cache.books_ttl,
            settings.cache.enabled,
        ),
        facets_cache: CachePolicy::new(
            cache.clone(),
            settings.cache.facets_ttl,
            settings.cache.enabled,
        ),
        live_keep_alive: settings.live.keep_alive,
        max_request_bytes,
    };

    Ok(ApplicationContext {
        state,
        cache,
        broadcaster,
    })
}

fn spawn_rate_limit_pruner(limiter: Arc<ApiRateLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip the first immediate tick
        loop {
            ticker.tick().await;
            let pruned = limiter.prune();
            if pruned > 0 {
                debug!(pruned, "pruned idle rate limit windows");
            }
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    state: ApiState,
    broadcaster: EventBroadcaster,
) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::Io)?;
    info!(
        target: "perpus::serve",
        addr = %settings.server.addr,
        base_url = %settings.public.base_url,
        "Backend server is running"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });

    let grace = settings.server.graceful_shutdown;
    let forced_exit = async {
        wait_for_signal().await;
        info!(target: "perpus::serve", "Shutdown signal received");
        // Live streams never end on their own.
        broadcaster.disconnect_all();
        shutdown.notify_one();
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = forced_exit => {
            warn!(
                target: "perpus::serve",
                grace_seconds = grace.as_secs(),
                "Graceful shutdown timed out; exiting"
            );
            Ok(())
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
