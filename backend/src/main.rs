use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cdp_missions_backend::{
    config::Config, db::connection::create_pool, routes::build_router,
    services::bootstrap::ensure_bootstrap_admin, state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdp_missions_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        bind_addr = %config.bind_addr,
        session_ttl_hours = config.session_ttl_hours,
        lockout_max_attempts = config.lockout_max_attempts,
        lockout_duration_seconds = config.lockout_duration_seconds,
        verify_timeout_seconds = config.verify_timeout_seconds,
        attempt_store = ?config.attempt_store,
        rate_limit_ip_enabled = config.rate_limit_ip_enabled,
        bootstrap_admin_email = ?config.bootstrap_admin_email,
        bootstrap_admin_password = %mask_secret(config.bootstrap_admin_password.as_deref().unwrap_or_default()),
        "Loaded configuration from environment/.env"
    );

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    ensure_bootstrap_admin(&pool, &config).await?;

    let addr = config.bind_addr;
    let state = AppState::from_config(pool, config);
    let app = build_router(state)?;

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
