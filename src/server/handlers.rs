use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::catalog::{Catalog, TranslatorConfig};
use crate::error::ServiceError;
use crate::providers::Provider;
use crate::queue::QueueStats;
use crate::translator::{TranslationRequest, Translator, join_directions};

use super::models::{BatchBody, BatchResponse, ToolHealth, TranslateBody, TranslatorSummary};
use super::state::ServerState;
use super::translate::{
    ApiError, batch_item, detect_response, request_from_body, translate_response,
};
use super::util::read_upload;

const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;
const MAX_BATCH_TEXTS: usize = 50;

/// Builds the HTTP surface over `catalog`.
pub fn app<P: Provider>(catalog: Catalog, translator: Translator<P>) -> Router {
    let state = Arc::new(ServerState {
        catalog,
        translator,
    });
    Router::new()
        .route("/health", get(health))
        .route("/api/translators", get(list_translators::<P>))
        .route("/api/queue", get(queue_stats::<P>))
        .route("/api/:tool", get(tool_health::<P>).post(translate::<P>))
        .route("/api/:tool/upload", post(upload::<P>))
        .route("/api/:tool/batch", post(batch::<P>))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

pub async fn run_server<P: Provider>(
    addr: &str,
    catalog: Catalog,
    translator: Translator<P>,
) -> Result<()> {
    let tools = catalog.len();
    let app = app(catalog, translator);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", addr))?;
    info!("serving {} translators on http://{}", tools, addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

fn summary(config: &TranslatorConfig) -> TranslatorSummary {
    let multimodal = config.multimodal.as_ref();
    TranslatorSummary {
        id: config.id.clone(),
        name: config.name.clone(),
        kind: config.kind,
        bidirectional: config.bidirectional,
        language_detection: config.supports_detection(),
        directions: config.directions.clone(),
        modes: config.mode_names(),
        supports_image: multimodal.is_some_and(|value| value.supports_image),
        supports_audio: multimodal.is_some_and(|value| value.supports_audio),
        credit_cost: config.credit_cost,
    }
}

async fn list_translators<P: Provider>(
    State(state): State<Arc<ServerState<P>>>,
) -> impl IntoResponse {
    let translators = state.catalog.all().map(summary).collect::<Vec<_>>();
    Json(serde_json::json!({
        "count": translators.len(),
        "translators": translators,
    }))
}

async fn queue_stats<P: Provider>(State(state): State<Arc<ServerState<P>>>) -> Json<QueueStats> {
    Json(state.translator.queue().stats())
}

async fn tool_health<P: Provider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(tool): Path<String>,
) -> Result<Json<ToolHealth>, ApiError> {
    let config = state.tool(&tool)?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| ServiceError::Internal(err.into()))?;
    Ok(Json(ToolHealth {
        status: "healthy",
        message: format!("{} API is running", config.name),
        timestamp,
        methods: vec!["GET", "POST", "OPTIONS"],
        directions: config.directions.clone(),
        default_direction: config.default_direction.clone(),
        modes: config.mode_names(),
        default_mode: config.default_mode.clone(),
    }))
}

async fn translate<P: Provider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(tool): Path<String>,
    body: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<axum::response::Response, ApiError> {
    let config = state.tool(&tool)?;
    let Json(body) = body.map_err(|rejection| ServiceError::invalid(rejection.body_text()))?;
    let request = request_from_body(body)?;
    let detect_only = request.detect_only;

    let result = state.translator.translate(request, config).await?;
    if detect_only {
        Ok(Json(detect_response(&result, config)).into_response())
    } else {
        Ok(Json(translate_response(result, config)).into_response())
    }
}

async fn upload<P: Provider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(tool): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<axum::response::Response, ApiError> {
    let config = state.tool(&tool)?;
    let multipart = multipart.map_err(|rejection| ServiceError::invalid(rejection.body_text()))?;
    let request = read_upload(multipart).await?.into_request()?;
    let result = state.translator.translate(request, config).await?;
    Ok(Json(translate_response(result, config)).into_response())
}

async fn batch<P: Provider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(tool): Path<String>,
    body: Result<Json<BatchBody>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let config = state.tool(&tool)?;
    let Json(BatchBody {
        texts,
        mode,
        direction,
    }) = body.map_err(|rejection| ServiceError::invalid(rejection.body_text()))?;

    if texts.is_empty() {
        return Err(ServiceError::invalid("No texts provided").into());
    }
    if texts.len() > MAX_BATCH_TEXTS {
        return Err(ServiceError::invalid(format!(
            "Too many texts: at most {} per batch",
            MAX_BATCH_TEXTS
        ))
        .into());
    }
    let mode = mode.filter(|mode| !mode.trim().is_empty());
    let direction = direction.filter(|direction| !direction.trim().is_empty());
    if let Some(mode) = mode.as_deref()
        && config.mode(mode.trim()).is_none()
    {
        return Err(ServiceError::invalid(format!(
            "Invalid mode. Available modes: {}",
            config.mode_names().join(", ")
        ))
        .into());
    }
    if let Some(raw) = direction.as_deref()
        && config.resolve_direction(raw).is_none()
    {
        return Err(ServiceError::invalid(format!(
            "Invalid direction: {}. Available directions: {}",
            raw,
            join_directions(&config.directions)
        ))
        .into());
    }

    let concurrency = state.translator.queue().config().concurrency;
    let translator = &state.translator;
    let mut results = stream::iter(texts.into_iter().enumerate())
        .map(|(index, text)| {
            let request = TranslationRequest {
                mode: mode.clone(),
                direction: direction.clone(),
                ..TranslationRequest::text(text.clone())
            };
            async move {
                let outcome = translator.translate(request, config).await;
                (index, batch_item(text, outcome))
            }
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;
    results.sort_by_key(|(index, _)| *index);

    let results = results.into_iter().map(|(_, item)| item).collect::<Vec<_>>();
    let failed = results.iter().filter(|item| item.error.is_some()).count();
    Ok(Json(BatchResponse {
        succeeded: results.len() - failed,
        failed,
        results,
    }))
}
