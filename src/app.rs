use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth, comments, error::ApiError, likes, response::ApiResponse, state::AppState, subscriptions,
    tweets, users, videos,
};

/// Body limit for JSON and urlencoded requests.
pub const JSON_BODY_LIMIT: usize = 16 * 1024;

pub fn build_app(state: AppState) -> Router {
    let upload_limit = state.config.upload_limit_mb * 1024 * 1024;
    let cors = cors_layer(state.config.cors_origin.as_deref());

    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router(upload_limit))
                .merge(users::router(upload_limit))
                .merge(videos::router(upload_limit))
                .merge(comments::router())
                .merge(likes::router())
                .merge(subscriptions::router())
                .merge(tweets::router())
                .route("/healthcheck", get(healthcheck)),
        )
        .fallback(route_not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn healthcheck() -> ApiResponse<&'static str> {
    ApiResponse::ok("OK", "Healthy")
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// Credentialed CORS for a configured origin, permissive otherwise.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(value))
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
        Err(_) => {
            tracing::warn!(%origin, "CORS_ORIGIN is not a valid header value; using permissive CORS");
            CorsLayer::permissive()
        }
    }
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
