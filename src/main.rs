//! Sheets Audit - spreadsheet performance audit connector server.

mod catalog;
mod config;
mod dates;
mod error;
mod extractor;
mod projector;
mod sheets;
mod snapshot;
mod workbook;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use catalog::{build_catalog, FieldDescriptor, FieldGroup};
use config::{connector_config, ConfigParam, Settings};
use error::AuditError;
use projector::{ProjectedTable, Projector, RecordSet, RequestKind};
use sheets::SheetsClient;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    settings: Settings,
    projector: Arc<Projector>,
    sheets: Option<Arc<SheetsClient>>,
    audits: Arc<RwLock<HashMap<String, StoredAudit>>>,
}

/// A completed upload audit, kept in memory for later retrieval.
#[derive(Debug, Clone, serde::Serialize)]
struct StoredAudit {
    id: String,
    source_file: String,
    audited_at: String,
    #[serde(flatten)]
    table: ProjectedTable,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheets_audit=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    info!(
        "capacity ceiling: {} cells, binding {}",
        settings.capacity_ceiling, settings.bind_addr
    );

    let projector = Arc::new(Projector::new(build_catalog(settings.capacity_ceiling)));

    // Hosted-service audits need a token; upload audits do not.
    let sheets = match SheetsClient::from_env() {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("/data disabled, upload audits only: {}", e);
            None
        }
    };

    let bind_addr = settings.bind_addr.clone();
    let state = AppState {
        settings,
        projector,
        sheets,
        audits: Arc::new(RwLock::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route("/fields", get(list_fields))
        .route("/data", post(get_data))
        .route("/audit", post(audit_upload))
        .route("/audits/:id", get(get_audit))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024)) // 100MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Connector configuration parameters (what the reporting tool asks the user).
async fn get_config() -> Json<Vec<ConfigParam>> {
    Json(connector_config())
}

/// The full field catalog.
async fn list_fields(State(state): State<AppState>) -> Json<Vec<FieldDescriptor>> {
    Json(state.projector.catalog().to_vec())
}

#[derive(serde::Deserialize)]
struct DataRequest {
    url: String,
    fields: Vec<String>,
}

/// Audit a hosted spreadsheet and project it onto the requested fields.
///
/// The request kind decides what gets fetched: spreadsheet-metric fields pull
/// grid data and produce one row per tab; revision fields pull the revision
/// listing and produce one row per historical save.
async fn get_data(
    State(state): State<AppState>,
    Json(request): Json<DataRequest>,
) -> Result<Json<ProjectedTable>, (StatusCode, String)> {
    let sheets = state.sheets.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "hosted spreadsheet access is not configured (GOOGLE_API_TOKEN not set)".to_string(),
    ))?;

    let kind = state
        .projector
        .resolve_request_kind(&request.fields)
        .map_err(error_response)?;

    let records = match kind {
        RequestKind::Metrics => {
            let start = Instant::now();
            let (file_name, tabs) = sheets
                .fetch_spreadsheet(&request.url)
                .await
                .map_err(error_response)?;
            let load_time = start.elapsed().as_secs_f64();

            let outcome = extractor::extract(
                &file_name,
                &tabs,
                state.settings.capacity_ceiling,
                load_time,
            )
            .map_err(error_response)?;
            RecordSet::Tabs(outcome.tabs)
        }
        RequestKind::Revisions => {
            let revisions = sheets
                .fetch_revisions(&request.url)
                .await
                .map_err(error_response)?;
            RecordSet::Revisions(revisions)
        }
    };

    let table = state
        .projector
        .project(&request.fields, &records)
        .map_err(error_response)?;

    info!(
        "data request for {} fields returned {} rows",
        request.fields.len(),
        table.rows.len()
    );
    Ok(Json(table))
}

#[derive(serde::Deserialize)]
struct AuditQuery {
    /// Comma-separated field names; defaults to every spreadsheet-metric field.
    fields: Option<String>,
}

/// Upload a workbook file and audit it.
async fn audit_upload(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
    mut multipart: Multipart,
) -> Result<Json<StoredAudit>, (StatusCode, String)> {
    // Read the uploaded file
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("workbook").to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e)))?
                .to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }

    let fields = match &query.fields {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => default_metric_fields(state.projector.catalog()),
    };

    let kind = state
        .projector
        .resolve_request_kind(&fields)
        .map_err(error_response)?;
    if kind == RequestKind::Revisions {
        return Err((
            StatusCode::BAD_REQUEST,
            "revision history fields need a hosted spreadsheet url; uploaded files expose spreadsheet metric fields only".to_string(),
        ));
    }

    info!("Received file: {} ({} bytes)", filename, file_data.len());

    let start = Instant::now();
    let (doc_name, tabs) = workbook::parse_workbook(&filename, &file_data).map_err(error_response)?;
    let load_time = start.elapsed().as_secs_f64();

    let outcome = extractor::extract(
        &doc_name,
        &tabs,
        state.settings.capacity_ceiling,
        load_time,
    )
    .map_err(|e| {
        error!("Extraction failed: {}", e);
        error_response(e)
    })?;

    let table = state
        .projector
        .project(&fields, &RecordSet::Tabs(outcome.tabs))
        .map_err(error_response)?;

    let audit = StoredAudit {
        id: format!("aud_{}", Uuid::new_v4().simple()),
        source_file: filename,
        audited_at: dates::now_iso8601(),
        table,
    };

    {
        let mut audits = state.audits.write().unwrap();
        audits.insert(audit.id.clone(), audit.clone());
    }

    info!("Audit complete: {}", audit.id);
    Ok(Json(audit))
}

/// Get a stored audit by ID.
async fn get_audit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredAudit>, StatusCode> {
    let audits = state.audits.read().unwrap();
    audits.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

// ============================================================================
// Helper functions
// ============================================================================

/// Every non-revision catalog field, in catalog order.
fn default_metric_fields(catalog: &[FieldDescriptor]) -> Vec<String> {
    catalog
        .iter()
        .filter(|f| f.group != FieldGroup::Revision)
        .map(|f| f.name.clone())
        .collect()
}

/// Map the error taxonomy onto HTTP statuses. Messages are already
/// user-facing.
fn error_response(err: AuditError) -> (StatusCode, String) {
    let status = match &err {
        AuditError::BadUrl { .. }
        | AuditError::MixedCategoryRequest { .. }
        | AuditError::UnsupportedFile { .. } => StatusCode::BAD_REQUEST,
        AuditError::InvalidSnapshot { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AuditError::Fetch(_) | AuditError::Decode(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}
