use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

use crate::identity::{
    reconcile_roles, AuthWorkflow, InMemorySessions, LogEmailSender, PgIdentityStore, TokenCodec,
};

pub mod handlers;
// OpenAPI document assembly lives in openapi.rs.
mod openapi;

pub use handlers::auth::{AuthConfig, AuthState};
pub use openapi::openapi;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Build the application router over shared state.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::health::health))
        .route("/v1/auth/register", post(handlers::auth::register::register))
        .route("/v1/auth/login", post(handlers::auth::login::login))
        .route("/v1/auth/logout", post(handlers::auth::session::logout))
        .route("/v1/auth/session", get(handlers::auth::session::session))
        .route("/v1/auth/confirm", post(handlers::auth::register::confirm))
        .route(
            "/v1/auth/confirm/resend",
            post(handlers::auth::register::resend_confirmation),
        )
        .route(
            "/v1/auth/password",
            post(handlers::auth::password::change_password),
        )
        .route(
            "/v1/auth/reset",
            post(handlers::auth::password::password_reset_request),
        )
        .route(
            "/v1/auth/reset/confirm",
            post(handlers::auth::password::password_reset_apply),
        )
        .route(
            "/v1/auth/email",
            post(handlers::auth::email_change::change_email_request),
        )
        .route(
            "/v1/auth/email/confirm",
            post(handlers::auth::email_change::change_email_apply),
        )
        .route("/v1/users", get(handlers::users::list_users))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, secret_key: SecretString, config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Seed/repair the role catalog; safe to run from several replicas at once.
    let store = PgIdentityStore::new(pool.clone());
    reconcile_roles(&store)
        .await
        .context("Failed to reconcile role catalog")?;

    let tokens = TokenCodec::new(&secret_key, config.token_ttl_seconds());
    let sessions = Arc::new(InMemorySessions::new().with_ttls(
        Duration::from_secs(u64::try_from(config.session_ttl_seconds()).unwrap_or(0)),
        Duration::from_secs(u64::try_from(config.remember_ttl_seconds()).unwrap_or(0)),
    ));
    let workflow = AuthWorkflow::new(
        store,
        tokens,
        sessions,
        Arc::new(LogEmailSender),
        config.bootstrap_admin_email().map(str::to_string),
    );
    let state = Arc::new(AuthState::new(config, workflow));

    let frontend_origin = frontend_origin(state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = router().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(state))
            .layer(Extension(pool)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
