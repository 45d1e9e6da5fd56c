use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderName, HeaderValue, Request},
    routing::{any, MethodRouter},
    Router,
};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod config;
pub mod cookie;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod session;
pub mod state;
pub mod templates;

use pipeline::{Pipeline, Stage};
use state::App;

const REQUEST_ID: &str = "x-request-id";

/// Every route starts with the base headers and the session.
fn pipeline_route(stages: &[Stage]) -> MethodRouter<Arc<App>> {
    let pipeline = Pipeline::new(&[&[Stage::BaseHeaders, Stage::Session], stages].concat());
    any(move |State(app): State<Arc<App>>, request: Request<Body>| {
        let pipeline = pipeline.clone();
        async move { pipeline.serve(app, request).await }
    })
}

/// Build the router with every route bound to its pipeline.
#[must_use]
pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route(
            "/mpinVerify",
            pipeline_route(&[Stage::Allow(&["POST"]), Stage::Verify]),
        )
        .route(
            "/mpinAuthenticate",
            pipeline_route(&[Stage::Allow(&["POST"]), Stage::Authenticate]),
        )
        .route(
            "/mpinActivate",
            pipeline_route(&[Stage::Allow(&["GET", "POST"]), Stage::Activate]),
        )
        .route(
            "/mpinPermitUser",
            pipeline_route(&[Stage::Allow(&["GET"]), Stage::PermitUser]),
        )
        .route(
            "/logout",
            pipeline_route(&[Stage::Allow(&["GET", "POST", "OPTIONS"]), Stage::Logout]),
        )
        .route("/protected", pipeline_route(&[Stage::Protected]))
        .route("/protected/*page", pipeline_route(&[Stage::Protected]))
        .fallback_service(pipeline_route(&[Stage::Index]).with_state(Arc::clone(&app)))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .with_state(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(address: IpAddr, port: u16, app: Arc<App>) -> Result<()> {
    let listener = TcpListener::bind(SocketAddr::new(address, port))
        .await
        .with_context(|| format!("Failed to bind {address}:{port}"))?;

    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        router(app).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
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
