use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use godeye::config::Config;
use godeye::error::OsintError;
use godeye::service::OsintService;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OsintService>,
}

// Per-kind request bodies; field names match what the dashboard sends.
#[derive(Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct DomainRequest {
    pub domain: String,
}

#[derive(Deserialize)]
pub struct IpRequest {
    pub ip: String,
}

#[derive(Deserialize)]
pub struct ReportRequest {
    pub title: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub notes: String,
}

/// Failure body; successes return the result object itself
#[derive(Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "godeye=info,tower_http=debug".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let service = Arc::new(OsintService::from_config(&config)?);
    let app_state = AppState { service };

    let app = create_router(app_state);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/username-lookup", post(username_lookup))
        .route("/api/email-scan", post(email_scan))
        .route("/api/domain-scan", post(domain_scan))
        .route("/api/ip-lookup", post(ip_lookup))
        .route("/api/whois-lookup", post(whois_lookup))
        .route("/api/exif-extract", post(exif_extract))
        .route("/api/generate-report", post(generate_report))
        .route("/api/download-report/:locator", get(download_report))
        .route(
            "/api/search-history",
            get(search_history).delete(clear_history),
        )
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

/// Map orchestrator errors onto HTTP status codes
fn status_for(error: &OsintError) -> StatusCode {
    match error {
        OsintError::Validation(_) => StatusCode::BAD_REQUEST,
        OsintError::Report(godeye::error::ReportError::NotFound(_)) => StatusCode::NOT_FOUND,
        OsintError::Report(godeye::error::ReportError::InvalidLocator(_)) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: OsintError) -> (StatusCode, Json<ErrorBody>) {
    let status = status_for(&error);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(%error, "request failed");
    }
    (
        status,
        Json(ErrorBody {
            detail: error.to_string(),
        }),
    )
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn username_lookup(
    State(state): State<AppState>,
    Json(request): Json<UsernameRequest>,
) -> ApiResult<godeye::service::UsernameResponse> {
    match state.service.lookup_username(&request.username).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(reject(e)),
    }
}

async fn email_scan(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<godeye::service::EmailResponse> {
    match state.service.scan_email(&request.email).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(reject(e)),
    }
}

async fn domain_scan(
    State(state): State<AppState>,
    Json(request): Json<DomainRequest>,
) -> ApiResult<godeye::service::DomainResponse> {
    match state.service.scan_domain(&request.domain).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(reject(e)),
    }
}

async fn ip_lookup(
    State(state): State<AppState>,
    Json(request): Json<IpRequest>,
) -> ApiResult<godeye::service::IpResponse> {
    match state.service.lookup_ip(&request.ip).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(reject(e)),
    }
}

async fn whois_lookup(
    State(state): State<AppState>,
    Json(request): Json<DomainRequest>,
) -> ApiResult<godeye::service::WhoisResponse> {
    match state.service.lookup_whois(&request.domain).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(reject(e)),
    }
}

// Accepts a multipart upload; the first file field is the image
async fn exif_extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<godeye::exif::ExifSummary> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let filename = field
            .file_name()
            .unwrap_or("upload.bin")
            .to_string();
        match field.bytes().await {
            Ok(bytes) => {
                upload = Some((filename, bytes.to_vec()));
                break;
            }
            Err(e) => {
                warn!(%e, "failed to read multipart field");
            }
        }
    }

    let Some((filename, data)) = upload else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                detail: "no image file in upload".to_string(),
            }),
        ));
    };

    match state.service.extract_exif(&filename, &data).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => Err(reject(e)),
    }
}

async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> ApiResult<godeye::service::ReportResponse> {
    match state
        .service
        .generate_report(&request.title, &request.data, &request.notes)
    {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(reject(e)),
    }
}

async fn download_report(
    State(state): State<AppState>,
    Path(locator): Path<String>,
) -> ApiResult<godeye::report::StoredReport> {
    match state.service.fetch_report(&locator) {
        Ok(report) => Ok(Json(report)),
        Err(e) => Err(reject(e)),
    }
}

async fn search_history(
    State(state): State<AppState>,
) -> Json<Vec<godeye::model::HistoryEntry>> {
    Json(state.service.history().await)
}

async fn clear_history(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    match state.service.clear_history().await {
        Ok(()) => Ok(Json(json!({ "message": "history cleared" }))),
        Err(e) => Err(reject(e)),
    }
}
