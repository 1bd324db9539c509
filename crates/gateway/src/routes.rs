use crate::{
    error::ServiceError,
    orchestrator::{RawUpload, ServiceInfo},
    state::AppState,
};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use schema::{BatchReport, SingleReport};
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

const SINGLE_FIELD: &str = "file";
const BATCH_FIELD: &str = "files";

pub async fn run_server(
    address: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("HTTP server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let limits = state.limits;

    let api = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/info", get(info))
        .route(
            "/predict/",
            post(predict).layer(DefaultBodyLimit::max(limits.single)),
        )
        .route(
            "/predict/batch/",
            post(predict_batch).layer(DefaultBodyLimit::max(limits.batch)),
        )
        .with_state(state);

    with_middleware(api)
}

/// Tracing, CORS and panic containment shared by every route.
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

#[derive(Serialize)]
struct Banner {
    message: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service_info: ServiceInfo,
}

async fn root() -> Json<Banner> {
    Json(Banner {
        message: "PCB Defect Detection API is running",
        status: "healthy",
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let service_info = state.orchestrator.service_info();
    let status = if state.orchestrator.is_ready() {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status,
        service_info,
    })
}

async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.orchestrator.service_info())
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SingleReport>, ServiceError> {
    state.orchestrator.check_ready()?;

    let mut multipart = multipart.map_err(|e| ServiceError::BadRequest(e.body_text()))?;
    let upload = next_upload(&mut multipart, SINGLE_FIELD)
        .await?
        .ok_or_else(|| missing_field(SINGLE_FIELD))?;

    let report = state.orchestrator.predict_single(upload).await?;
    Ok(Json(report))
}

async fn predict_batch(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchReport>, ServiceError> {
    state.orchestrator.check_ready()?;

    let mut multipart = multipart.map_err(|e| ServiceError::BadRequest(e.body_text()))?;
    let max = state.orchestrator.max_batch_size();
    let mut uploads = Vec::new();
    let mut skipped = 0;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(BATCH_FIELD) {
            continue;
        }
        // Past the cap parts are only counted; dropping the field skips its body.
        if uploads.len() < max {
            uploads.push(read_upload(field).await?);
        } else {
            skipped += 1;
        }
    }

    if uploads.is_empty() {
        return Err(missing_field(BATCH_FIELD));
    }
    if skipped > 0 {
        let size = uploads.len() + skipped;
        tracing::warn!(size, max, "Rejecting oversized batch");
        return Err(ServiceError::BatchTooLarge { size, max });
    }

    let report = state.orchestrator.predict_batch(uploads).await?;
    Ok(Json(report))
}

/// Reads the next part named `field_name`, skipping any other parts.
async fn next_upload(
    multipart: &mut Multipart,
    field_name: &str,
) -> Result<Option<RawUpload>, ServiceError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(field_name) {
            return read_upload(field).await.map(Some);
        }
    }

    Ok(None)
}

async fn read_upload(field: Field<'_>) -> Result<RawUpload, ServiceError> {
    let filename = field.file_name().unwrap_or("unknown").to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;

    Ok(RawUpload::new(filename, content_type, bytes))
}

fn missing_field(name: &str) -> ServiceError {
    ServiceError::BadRequest(format!("Missing multipart field `{}`", name))
}

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(err.body_text())
    } else {
        ServiceError::BadRequest(format!("Invalid multipart request: {}", err.body_text()))
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ServiceError::Internal(details).into_response()
}
