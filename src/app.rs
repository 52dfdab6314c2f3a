use std::net::SocketAddr;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth, envelope::ApiResponse, error::expose_internal_detail, feedback,
    rate_limit::rate_limit_middleware, state::AppState, users,
};

#[derive(Debug, Serialize)]
struct Health {
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    environment: String,
}

async fn health(State(state): State<AppState>) -> ApiResponse<Health> {
    ApiResponse::ok(Health {
        timestamp: OffsetDateTime::now_utc(),
        environment: state.config.environment.clone(),
    })
    .with_message("Server is running")
}

async fn not_found(uri: Uri) -> (StatusCode, ApiResponse<()>) {
    (
        StatusCode::NOT_FOUND,
        ApiResponse::failure(format!("Route {} not found", uri.path()), None),
    )
}

/// A known path hit with the wrong method is answered like an unknown route.
async fn unmatched_method(request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    let response = next.run(request).await;
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return not_found(uri).await.into_response();
    }
    response
}

fn cors(state: &AppState) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = %state.config.frontend_url, "FRONTEND_URL is not a valid origin; CORS disabled");
            layer
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(feedback::router())
                .merge(users::router())
                .route("/health", get(health)),
        )
        .fallback(not_found)
        .layer(middleware::from_fn(unmatched_method))
        .layer(middleware::from_fn_with_state(state.clone(), expose_internal_detail))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(cors(&state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
        .with_state(state)
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
