use std::{process, sync::Arc, time::Duration};

use axum_extra::extract::cookie::Key;
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        groups::GroupAdminService,
        pagination::Paginator,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, GroupsWriteRepo, HealthRepo, PostsRepo,
            PostsWriteRepo, UsersRepo,
        },
    },
    config,
    infra::{
        cache::PageCache,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};

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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let (http_state, admin_state) = build_application_context(repositories, &settings)?;
    serve_http(&settings, http_state, admin_state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = database_url(&settings)?;
    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await?;
    PostgresRepositories::run_migrations(&pool).await?;
    info!(target = "yatube::migrate", "migrations applied");
    Ok(())
}

fn database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = database_url(settings)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await?;
    PostgresRepositories::run_migrations(&pool).await?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<(HttpState, AdminState), AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let groups_write_repo: Arc<dyn GroupsWriteRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let paginator = Paginator::new(settings.feed.page_size);
    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        follows_repo.clone(),
        comments_repo.clone(),
        paginator,
    ));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo.clone(),
        groups_repo.clone(),
        comments_repo,
    ));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
    let accounts = Arc::new(AccountService::new(users_repo));
    let groups = Arc::new(GroupAdminService::new(groups_repo, groups_write_repo));

    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );
    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::unexpected("upload limit exceeds addressable memory"))?;

    let page_cache = PageCache::new(settings.cache.index_ttl, settings.cache.max_entries);
    let session_key = session_key(&settings.session)?;

    let http_state = HttpState {
        feed,
        posts,
        follows,
        accounts,
        upload_storage,
        upload_limit_bytes,
        page_cache: page_cache.clone(),
        session_key,
    };

    let admin_state = AdminState {
        groups,
        posts: posts_write_repo,
        page_cache,
        health: health_repo,
    };

    Ok((http_state, admin_state))
}

fn session_key(session: &config::SessionSettings) -> Result<Key, AppError> {
    match session.secret.as_deref() {
        Some(secret) => Key::try_from(secret.as_bytes()).map_err(|err| {
            AppError::from(InfraError::configuration(format!(
                "session secret is unusable: {err}"
            )))
        }),
        None => {
            warn!(
                target = "yatube::session",
                "no session secret configured; sessions will not survive a restart"
            );
            Ok(Key::generate())
        }
    }
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "yatube::serve",
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));

    let servers = async { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    let result = tokio::select! {
        result = &mut servers => result,
        _ = shutdown_requested(shutdown_rx) => {
            info!(target = "yatube::serve", "shutdown requested; draining connections");
            drain(&mut servers, settings.server.graceful_shutdown).await
        }
    };

    result
        .map(|_| ())
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn drain<F, T>(servers: &mut std::pin::Pin<&mut F>, grace: Duration) -> std::io::Result<T>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(grace, servers.as_mut()).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                target = "yatube::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out"
            );
            Err(std::io::Error::other("graceful shutdown timed out"))
        }
    }
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|requested| *requested).await;
}
