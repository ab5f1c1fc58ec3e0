use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::debug;
use weather_relay_core::{CacheStore, OriginGate, ResourceName, ResourceStatus};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const ALLOWED_METHODS: &str = "GET, OPTIONS";

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn CacheStore>,
    gate: Arc<OriginGate>,
}

impl AppState {
    pub fn new(store: Arc<dyn CacheStore>, gate: OriginGate) -> Self {
        Self {
            store,
            gate: Arc::new(gate),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/{resource}", get(resource))
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), origin_gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Attaches CORS grant headers when the request origin is whitelisted.
/// Never blocks: a foreign origin still gets the response, just without the grant.
/// `OPTIONS` on any path is answered here with 204 so browser preflights succeed.
async fn origin_gate(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let grant = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .and_then(|origin| st.gate.evaluate(origin));

    let mut res = if req.method() == Method::OPTIONS {
        let mut res = StatusCode::NO_CONTENT.into_response();
        res.headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        res
    } else {
        next.run(req).await
    };

    // Grant varies by request origin.
    res.headers_mut()
        .append(header::VARY, HeaderValue::from_static("origin"));

    if let Some(grant) = grant {
        if let Ok(origin) = HeaderValue::from_str(&grant.allow_origin) {
            let headers = res.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(grant.allow_headers),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
        }
    }
    res
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(st): State<AppState>) -> Result<Json<Vec<ResourceStatus>>, AppError> {
    let mut out = Vec::with_capacity(ResourceName::ALL.len());
    for name in ResourceName::ALL {
        let last_fetch_ms = match st.store.get(name.as_str()) {
            Ok(entry) => Some(entry.fetched_at_ms),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(AppError::Internal(e.into())),
        };
        out.push(ResourceStatus {
            name,
            ready: last_fetch_ms.is_some(),
            last_fetch_ms,
            interval_minutes: name.interval_minutes(),
        });
    }
    Ok(Json(out))
}

async fn resource(
    State(st): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Response, AppError> {
    let name: ResourceName = segment.parse().map_err(|_| AppError::NotFound)?;
    match st.store.get(name.as_str()) {
        Ok(entry) => {
            debug!(resource = %name, "{name}.json sent");
            let headers = [(header::CONTENT_TYPE, "application/json")];
            Ok((headers, entry.payload.clone()).into_response())
        }
        Err(e) if e.is_not_found() => Err(AppError::NotReady(name)),
        Err(e) => Err(AppError::Internal(e.into())),
    }
}

async fn fallback() -> AppError {
    AppError::NotFound
}

#[derive(Debug)]
pub enum AppError {
    NotFound,
    /// No successful fetch yet for this resource.
    NotReady(ResourceName),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": "not_found" }),
            ),
            AppError::NotReady(name) => (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "error": "not_ready", "resource": name }),
            ),
            AppError::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "internal" }),
                )
            }
        };
        (code, Json(body)).into_response()
    }
}
