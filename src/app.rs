use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cache::CachedStore;
use crate::catalog::{STATUS_CATALOG, STATUS_NEMO_CATALOG, StatusOption};
use crate::config::AppConfig;
use crate::downloader;
use crate::error::ProcessError;
use crate::processes::{ALIGNER_TYPES, NewProcess, ProcessService, RESPONSIBLE_OPTIONS, local_now};
use crate::resolver::RowIdentifier;
use crate::store::FileStore;
use crate::update::{FieldUpdate, UpdateOutcome};

type Service = ProcessService<CachedStore<FileStore>>;

pub struct AppState {
    service: Mutex<Service>,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        AppState {
            service: Mutex::new(service),
        }
    }

    fn service(&self) -> Result<MutexGuard<'_, Service>, ApiError> {
        self.service.lock().map_err(|_| ApiError::Poisoned)
    }
}

#[derive(Deserialize)]
struct UpdateRequest {
    #[serde(default)]
    order_number: Option<String>,
    #[serde(default)]
    row_index: Option<usize>,
    fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct OptionsResponse {
    aligner_types: Vec<&'static str>,
    responsibles: Vec<&'static str>,
}

enum ApiError {
    Process(ProcessError),
    Export(String),
    Poisoned,
}

impl From<ProcessError> for ApiError {
    fn from(e: ProcessError) -> Self {
        ApiError::Process(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            ApiError::Process(e) => {
                let code = match &e {
                    ProcessError::NotFound => StatusCode::NOT_FOUND,
                    ProcessError::Validation { .. } => StatusCode::BAD_REQUEST,
                    ProcessError::UnknownFields { .. }
                    | ProcessError::Transform { .. }
                    | ProcessError::DerivedField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    ProcessError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (code, e.to_string())
            }
            ApiError::Export(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "service state is unavailable".to_string(),
            ),
        };
        if code.is_server_error() {
            error!("{}", message);
        }
        let body = StatusResponse {
            status: "error".to_string(),
            message: Some(message),
        };
        (code, Json(body)).into_response()
    }
}

/// Routes of the JSON API.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/processes", get(list_processes).post(register_process))
        .route("/api/processes/table", get(get_table))
        .route("/api/processes/update", post(update_process))
        .route("/api/catalog/status", get(status_catalog))
        .route("/api/catalog/status_nemo", get(status_nemo_catalog))
        .route("/api/options", get(form_options))
        .route("/api/summary", get(get_summary))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(&config.store_path, &config.worksheet)?;
    let mut service = ProcessService::new(CachedStore::new(store, config.cache_ttl));
    service.initialize()?;

    let app_state = Arc::new(AppState::new(service));
    let app = router(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_processes(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let views = state.service()?.views()?;
    Ok(Json(views).into_response())
}

async fn get_table(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let table = state.service()?.list_processes()?;
    Ok(Json(table).into_response())
}

async fn register_process(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewProcess>,
) -> Result<Response, ApiError> {
    state.service()?.register(&payload)?;
    let body = StatusResponse {
        status: "ok".to_string(),
        message: None,
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn update_process(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateRequest>,
) -> Result<Json<UpdateOutcome>, ApiError> {
    let identifier = RowIdentifier {
        order_number: payload.order_number,
        row_index: payload.row_index,
    };
    let update = FieldUpdate::from_json_fields(identifier, &payload.fields);
    let outcome = state.service()?.update_fields(&update)?;
    Ok(Json(outcome))
}

async fn status_catalog() -> Json<Vec<StatusOption>> {
    Json(STATUS_CATALOG.options().to_vec())
}

async fn status_nemo_catalog() -> Json<Vec<StatusOption>> {
    Json(STATUS_NEMO_CATALOG.options().to_vec())
}

async fn form_options() -> Json<OptionsResponse> {
    Json(OptionsResponse {
        aligner_types: ALIGNER_TYPES.to_vec(),
        responsibles: RESPONSIBLE_OPTIONS.to_vec(),
    })
}

async fn get_summary(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let summary = state.service()?.status_summary()?;
    Ok(Json(summary).into_response())
}

fn attachment(content_type: &str, extension: &str, body: Vec<u8>) -> Response {
    let filename = downloader::export_filename(extension, local_now());
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let table = state.service()?.list_processes()?;
    let csv = downloader::to_csv(&table).map_err(|e| ApiError::Export(e.to_string()))?;
    Ok(attachment("text/csv; charset=utf-8", "csv", csv.into_bytes()))
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let table = state.service()?.list_processes()?;
    let xlsx = downloader::to_xlsx(&table).map_err(|e| ApiError::Export(e.to_string()))?;
    Ok(attachment(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
        xlsx,
    ))
}
