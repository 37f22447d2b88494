use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    docs::ApiDoc,
    handlers,
    middleware::{self as auth_middleware, create_login_rate_limiter, log_error_responses},
    state::AppState,
};

/// Assembles the public, authenticated and administrator route groups.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let mut login = Router::new().route("/api/auth/login", post(handlers::auth::login));
    if state.config.rate_limit_ip_enabled {
        login = login.route_layer(create_login_rate_limiter(&state.config)?);
    }

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/roles", get(handlers::auth::roles))
        .merge(login);

    let user_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/auth/change-password",
            put(handlers::auth::change_password),
        )
        .route(
            "/api/missions",
            get(handlers::missions::list_missions).post(handlers::missions::create_mission),
        )
        .route(
            "/api/missions/statistics",
            get(handlers::missions::statistics),
        )
        .route(
            "/api/missions/advance-statuses",
            post(handlers::missions::advance_statuses),
        )
        .route(
            "/api/missions/{id}",
            get(handlers::missions::get_mission)
                .put(handlers::missions::update_mission)
                .delete(handlers::missions::delete_mission),
        )
        .route(
            "/api/missions/{id}/findings",
            get(handlers::missions::list_findings).post(handlers::missions::add_finding),
        )
        .route(
            "/api/missions/{id}/remarks",
            get(handlers::missions::list_remarks).post(handlers::missions::add_remark),
        )
        .route(
            "/api/missions/{id}/sanctions",
            get(handlers::missions::list_sanctions).post(handlers::missions::add_sanction),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/api/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route(
            "/api/users/lockouts/{email}",
            get(handlers::users::get_lockout).delete(handlers::users::clear_lockout),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth_admin,
        ));

    let cors = cors_layer(&state.config);
    let app = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(log_error_responses))
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(24 * 60 * 60));

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
