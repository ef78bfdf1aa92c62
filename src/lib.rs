//! Portfolio CMS - content backend for the portfolio site and admin dashboard

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod tracking;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::state::AppState;

/// CORS for the configured frontend origins.
pub fn configure_cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config.allowed_origins);
    let max_body = state.config.max_upload_bytes;
    let public_dir = state.config.storage.public_dir.clone();
    tracing::info!("CORS configured");

    Router::new()
        .route("/api/login", post(routes::auth::login))
        .route("/api/protected", get(routes::auth::protected))
        .route(
            "/api/visits",
            get(routes::visits::get_visits).post(routes::visits::record_visit),
        )
        .route("/api/visits/daily", get(routes::visits::get_daily))
        .route("/api/visits/locations", get(routes::visits::get_locations))
        .route("/api/visits/stats", get(routes::visits::get_stats))
        .route(
            "/api/blogs",
            get(routes::blogs::list_blogs).post(routes::blogs::create_blog),
        )
        .route("/api/blogs/upload", post(routes::upload::upload_blog_image))
        .route(
            "/api/blogs/{id}",
            put(routes::blogs::update_blog).delete(routes::blogs::delete_blog),
        )
        .route(
            "/api/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/api/projects/upload",
            post(routes::upload::upload_project_image),
        )
        .route(
            "/api/projects/{id}",
            put(routes::projects::update_project).delete(routes::projects::delete_project),
        )
        .route(
            "/api/skills",
            get(routes::skills::list_skills).post(routes::skills::create_skill),
        )
        .route("/api/skills/grouped", get(routes::skills::grouped_skills))
        .route(
            "/api/skills/{id}",
            put(routes::skills::update_skill).delete(routes::skills::delete_skill),
        )
        .route(
            "/api/certifications",
            get(routes::certifications::list_certifications)
                .post(routes::certifications::create_certification),
        )
        .route(
            "/api/certifications/upload",
            post(routes::upload::upload_certification_file),
        )
        .route(
            "/api/certifications/{id}",
            delete(routes::certifications::delete_certification),
        )
        .route("/api/media", get(routes::media::count_media))
        .route("/api/media/upload", post(routes::media::upload_media))
        .route("/api/media/list", get(routes::media::list_media))
        .route("/api/media/library", get(routes::media::media_library))
        .route("/api/media/{id}", delete(routes::media::delete_media))
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .nest_service("/public", ServeDir::new(public_dir))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Uploads are capped by the outer limit rather than axum's 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(cors)
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Guards must outlive the server or buffered log lines are lost.
    let _log_guards = logging::init(&config.logging, &config.environment)?;
    config.log_warnings();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(
        backend = config.storage.backend.as_str(),
        environment = %config.environment,
        "Opening content store"
    );
    let state = AppState::from_config(config).await?;
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
