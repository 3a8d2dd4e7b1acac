//! Gatekeeper is an account manager with tiered authorization.
#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
mod router;
pub mod telemetry;
pub mod token;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

pub use error::ServerError;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    token: Option<&str>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State backed by a private in-memory database.
#[cfg(test)]
pub async fn test_state() -> AppState {
    let mut config = config::Configuration::default();
    config.name = "gatekeeper".into();
    config.url = "http://localhost/".into();
    let config = Arc::new(config);

    let db = database::Database::memory().await.unwrap();
    db.migrate().await.unwrap();

    // cheap parameters, tests hash a lot.
    let pwd = crypto::PasswordManager::new(Some(config::Argon2 {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }))
    .unwrap();
    let token = token::TokenManager::new(&config.url, "test-secret").unwrap();

    AppState::new(config, db, Arc::new(pwd), token, None)
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub users: user::UserService,
    pub resolver: auth::Resolver,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the store, resolver and user service together.
    pub fn new(
        config: Arc<config::Configuration>,
        db: database::Database,
        pwd: Arc<crypto::PasswordManager>,
        token: token::TokenManager,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let store: Arc<dyn user::UserStore> =
            Arc::new(user::UserRepository::new(db.pool.clone()));
        let codes = user::VerificationRepository::new(db.pool.clone());

        Self {
            resolver: auth::Resolver::new(Arc::clone(&store), token.clone()),
            users: user::UserService::new(store, codes, pwd, token),
            config,
            db,
            metrics,
        }
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(
                    |chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                        tracing::trace!(
                            size_bytes = chunk.len(),
                            latency = ?latency,
                            "sending body chunk"
                        )
                    },
                )
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(true)
                        .level(tracing::Level::INFO),
                )
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new()
                        .include_headers(true)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        // Turn panics into 500.
        .layer(CatchPanicLayer::custom(error::handle_panic))
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `GET /metrics` goes to `metrics`.
        .route("/metrics", get(router::status::metrics))
        // `POST /register` goes to `create`.
        .route("/register", post(router::create::handler))
        // `POST /login` goes to `login`.
        .route("/login", post(router::login::handler))
        // `POST /refresh` goes to `refresh_token`. Authorization required.
        .route("/refresh", post(router::users::refresh_token::handler))
        // `GET /verify/{code}` goes to `verify`.
        .route("/verify/{code}", get(router::verify::handler))
        .merge(router::users::router())
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let (url, pool_size) = match &config.database {
        Some(db) => (
            db.url.clone(),
            db.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
        ),
        None => {
            tracing::warn!(
                url = database::DEFAULT_URL,
                "missing `database` entry on `config.yaml` file, using default"
            );
            (database::DEFAULT_URL.to_owned(), database::DEFAULT_POOL_SIZE)
        },
    };
    let db = if url.contains(":memory:") {
        database::Database::memory().await?
    } else {
        database::Database::new(&url, pool_size).await?
    };

    // execute migrations scripts on start.
    db.migrate().await?;

    // handle jwt.
    let Some(token_config) = &config.token else {
        return Err("missing `token` entry on `config.yaml` file".into());
    };
    let mut token =
        token::TokenManager::new(&config.url, &token_config.secret)?;
    if let Some(audience) = &token_config.audience {
        token.audience(audience);
    }
    if let Some(expiration) = token_config.expiration {
        token.expiration(expiration);
    }

    let pwd = Arc::new(crypto::PasswordManager::new(config.argon2.clone())?);

    let metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "prometheus recorder not installed");
            None
        },
    };

    Ok(AppState::new(config, db, pwd, token, metrics))
}
