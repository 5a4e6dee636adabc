// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web UI and JSON API for Dermascan

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::{ClearSummary, Database, FileCleanup};
use crate::inference::Classifier;
use crate::report::{build_export, render_pdf};
use crate::uploads::{discard_upload, store_upload};
use crate::{DermaError, Result};

/// Shared application state, built once at startup
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub classifier: Arc<dyn Classifier>,
    templates: Environment<'static>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        Ok(Self {
            db,
            config,
            classifier,
            templates: load_templates()?,
        })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<Html<String>> {
        let html = self.templates.get_template(name)?.render(ctx)?;
        Ok(Html(html))
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(&state.config.uploads.dir);
    let body_limit = state.config.uploads.max_bytes;

    Router::new()
        // Pages
        .route("/", get(index_page).post(upload_image))
        .route("/history", get(history_page))
        // API endpoints
        .route("/api/history", get(api_get_history))
        .route("/api/history/clear", post(api_clear_history))
        .route("/api/history/:id", delete(api_delete_analysis))
        .route("/api/disease/:name", get(api_get_disease))
        .route("/api/diseases", get(api_get_diseases))
        .route("/api/export/:id", get(api_export))
        .route("/api/export/:id/pdf", get(api_export_pdf))
        .nest_service("/static/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message.to_string() })).into_response()
}

impl IntoResponse for DermaError {
    fn into_response(self) -> Response {
        let status = match &self {
            DermaError::NotFound(_) => return error_response(StatusCode::NOT_FOUND, "Analysis not found"),
            DermaError::InvalidInput(_) | DermaError::Upload(_) | DermaError::Image(_) => StatusCode::BAD_REQUEST,
            DermaError::Inference(_) | DermaError::Api(_) => StatusCode::BAD_GATEWAY,
            DermaError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let message = match self {
            DermaError::InvalidInput(m) | DermaError::Upload(m) => m,
            other => other.to_string(),
        };
        error_response(status, &message)
    }
}

// === Page Handlers ===

async fn index_page(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let history = state.db.list_recent(state.config.history.index_limit)?;
    state.render("index.html", context! { history })
}

async fn history_page(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let history = state.db.list_recent(state.config.history.page_limit)?;
    state.render("history.html", context! { history })
}

async fn upload_image(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Result<Html<String>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DermaError::Upload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(DermaError::Upload("No selected file".to_string()));
        }
        let data = field.bytes().await.map_err(|e| DermaError::Upload(e.to_string()))?;
        upload = Some((file_name, data));
        break;
    }
    let (file_name, data) = upload.ok_or_else(|| DermaError::Upload("No file uploaded".to_string()))?;

    let image_path = store_upload(&state.config.uploads, &file_name, &data).await?;

    let prediction = match state.classifier.classify(&image_path).await {
        Ok(prediction) => prediction,
        Err(e) => {
            discard_upload(&image_path).await;
            return Err(e);
        }
    };

    let stored = state.db.create_analysis(
        &image_path.to_string_lossy(),
        &prediction.disease_class,
        prediction.confidence,
    );
    let id = match stored {
        Ok(id) => id,
        Err(e) => {
            discard_upload(&image_path).await;
            return Err(e);
        }
    };
    info!("Analysis {}: {} ({:.2}%)", id, prediction.disease_class, prediction.confidence);

    let disease_info = state.db.lookup_disease(&prediction.disease_class)?;
    if disease_info.is_none() {
        warn!("Classifier label {:?} has no catalog entry", prediction.disease_class);
    }
    let result = state.db.get_analysis(&id)?;
    let history = state.db.list_recent(state.config.history.index_limit)?;

    state.render("index.html", context! { result, disease_info, history })
}

// === API Handlers ===

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

impl HistoryQuery {
    /// Unparseable values fall back to the default; zero is passed through
    fn limit_or(&self, default: usize) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(default)
    }
}

async fn api_get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<crate::db::AnalysisRecord>>> {
    let limit = query.limit_or(state.config.history.api_limit);
    Ok(Json(state.db.list_recent(limit)?))
}

async fn api_get_disease(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    match state.db.lookup_disease(&name)? {
        Some(info) => Ok(Json(info).into_response()),
        None => Ok(error_response(StatusCode::NOT_FOUND, "Disease not found")),
    }
}

async fn api_get_diseases(State(state): State<Arc<AppState>>) -> Result<Json<Vec<crate::db::DiseaseInfo>>> {
    Ok(Json(state.db.list_diseases()?))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    image: FileCleanup,
}

async fn api_delete_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let image = state.db.delete_analysis(&id)?;
    info!("Deleted analysis {}", id);
    Ok(Json(DeleteResponse { success: true, image }))
}

#[derive(Serialize)]
struct ClearResponse {
    success: bool,
    #[serde(flatten)]
    summary: ClearSummary,
}

async fn api_clear_history(State(state): State<Arc<AppState>>) -> Result<Json<ClearResponse>> {
    let summary = state.db.clear_history()?;
    info!("Cleared history: {} analyses", summary.records_removed);
    Ok(Json(ClearResponse { success: true, summary }))
}

async fn api_export(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response> {
    let export = build_export(&state.db, &id)?;
    Ok(Json(export).into_response())
}

async fn api_export_pdf(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response> {
    let export = build_export(&state.db, &id)?;
    let bytes = render_pdf(&export)?;
    let disposition = format!("attachment; filename=\"{}\"", export.file_name("pdf"));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// === Template Rendering ===

fn load_templates() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template("base.html", include_str!("templates/base.html"))?;
    env.add_template("_history_table.html", include_str!("templates/_history_table.html"))?;
    env.add_template("index.html", include_str!("templates/index.html"))?;
    env.add_template("history.html", include_str!("templates/history.html"))?;
    env.add_filter("image_url", image_url);
    env.add_filter("short_time", short_time);
    Ok(env)
}

/// Public URL of a stored upload
fn image_url(path: String) -> String {
    let name = FsPath::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("/static/uploads/{}", name)
}

fn short_time(raw: String) -> String {
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or(raw)
}

/// Start the web server with the given state
pub async fn start_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.web.host, state.config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Web UI available at http://{}", addr);

    let router = create_router(Arc::new(state));
    axum::serve(listener, router).await
        .map_err(|e| DermaError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Prediction;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "dermascan-test-boundary";

    struct FixedClassifier {
        label: &'static str,
        confidence: f64,
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn classify(&self, _path: &FsPath) -> Result<Prediction> {
            Ok(Prediction {
                disease_class: self.label.to_string(),
                confidence: self.confidence,
            })
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl Classifier for FailingClassifier {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn classify(&self, _path: &FsPath) -> Result<Prediction> {
            Err(DermaError::Inference("model offline".to_string()))
        }
    }

    /// Classifies successfully but leaves the history table unusable
    struct StoreBreakingClassifier {
        db: Database,
    }

    #[async_trait]
    impl Classifier for StoreBreakingClassifier {
        fn name(&self) -> &'static str {
            "store-breaking"
        }

        async fn classify(&self, _path: &FsPath) -> Result<Prediction> {
            self.db.connect()?.execute_batch("DROP TABLE analysis_history")?;
            Ok(Prediction {
                disease_class: "Melanoma".to_string(),
                confidence: 91.2,
            })
        }
    }

    fn test_state(classifier: Arc<dyn Classifier>) -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        let state = state_in(&dir, db, classifier);
        (state, dir)
    }

    fn state_in(dir: &tempfile::TempDir, db: Database, classifier: Arc<dyn Classifier>) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.uploads.dir = dir.path().join("uploads").to_string_lossy().to_string();
        Arc::new(AppState::new(db, config, classifier).unwrap())
    }

    fn melanoma_state() -> (Arc<AppState>, tempfile::TempDir) {
        test_state(Arc::new(FixedClassifier { label: "Melanoma", confidence: 91.2 }))
    }

    fn multipart_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
            BOUNDARY, field, file_name
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = create_router(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(state, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_upload_classifies_and_stores() {
        let (state, _dir) = melanoma_state();

        let (status, body) = send(&state, multipart_request("file", "lesion.PNG", b"fake image")).await;
        let html = String::from_utf8(body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Melanoma"));
        assert!(html.contains("most serious type of skin cancer"));

        let records = state.db.list_recent(5).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].confidence, 91.2);
        assert!(records[0].image_path.ends_with(".png"));
        assert!(FsPath::new(&records[0].image_path).exists());
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (state, _dir) = melanoma_state();
        let (status, json) = send_json(&state, multipart_request("other", "a.png", b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_upload_with_empty_file_name() {
        let (state, _dir) = melanoma_state();
        let (status, json) = send_json(&state, multipart_request("file", "", b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No selected file");
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_format() {
        let (state, _dir) = melanoma_state();
        let (status, _) = send(&state, multipart_request("file", "script.exe", b"MZ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.db.count_analyses().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_inference_discards_upload() {
        let (state, dir) = test_state(Arc::new(FailingClassifier));
        let (status, _) = send(&state, multipart_request("file", "a.png", b"x")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(state.db.count_analyses().unwrap(), 0);

        let leftovers = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_failed_store_discards_upload() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        let classifier = Arc::new(StoreBreakingClassifier { db: db.clone() });
        let state = state_in(&dir, db, classifier);

        let (status, json) = send_json(&state, multipart_request("file", "a.png", b"x")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());

        let leftovers = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_api_history_limits() {
        let (state, _dir) = melanoma_state();
        for i in 0..12 {
            state.db.create_analysis(&format!("{}.png", i), "Melanoma", 1.0).unwrap();
        }

        let (status, json) = send_json(&state, request("GET", "/api/history")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 10);

        let (_, json) = send_json(&state, request("GET", "/api/history?limit=3")).await;
        assert_eq!(json.as_array().unwrap().len(), 3);

        let (status, json) = send_json(&state, request("GET", "/api/history?limit=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, json) = send_json(&state, request("GET", "/api/history?limit=abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_api_disease_lookup() {
        let (state, _dir) = melanoma_state();

        let (status, json) = send_json(&state, request("GET", "/api/disease/Melanoma")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Melanoma");

        let (status, json) = send_json(&state, request("GET", "/api/disease/Benign%20keratosis")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Benign keratosis");

        let (status, json) = send_json(&state, request("GET", "/api/disease/Psoriasis")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Disease not found");

        let (_, json) = send_json(&state, request("GET", "/api/diseases")).await;
        assert_eq!(json.as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_delete_analysis() {
        let (state, dir) = melanoma_state();
        let image = dir.path().join("a.png");
        std::fs::write(&image, b"png").unwrap();
        let id = state.db.create_analysis(&image.to_string_lossy(), "Melanoma", 91.2).unwrap();

        let (status, json) = send_json(&state, request("DELETE", &format!("/api/history/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["image"]["status"], "removed");
        assert!(!image.exists());

        let (status, json) = send_json(&state, request("DELETE", &format!("/api/history/{}", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Analysis not found");
    }

    #[tokio::test]
    async fn test_clear_history() {
        let (state, _dir) = melanoma_state();
        state.db.create_analysis("missing-1.png", "Melanoma", 1.0).unwrap();
        state.db.create_analysis("missing-2.png", "Melanoma", 2.0).unwrap();

        let (status, json) = send_json(&state, request("POST", "/api/history/clear")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["records_removed"], 2);
        assert_eq!(json["files_missing"], 2);

        let (_, json) = send_json(&state, request("GET", "/api/history")).await;
        assert!(json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_json_and_pdf() {
        let (state, _dir) = melanoma_state();
        let id = state.db.create_analysis("uploads/a.png", "Melanoma", 91.2).unwrap();

        let (status, json) = send_json(&state, request("GET", &format!("/api/export/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["analysis"]["id"], id.as_str());
        assert!(json["disease_info"]["description"]
            .as_str()
            .unwrap()
            .contains("most serious type of skin cancer"));

        let response = create_router(state.clone())
            .oneshot(request("GET", &format!("/api/export/{}/pdf", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains(&format!("skin_analysis_{}.pdf", id)));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"%PDF"));

        let (status, _) = send(&state, request("GET", "/api/export/unknown/pdf")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_unknown_class_has_null_info() {
        let (state, _dir) = melanoma_state();
        let id = state.db.create_analysis("uploads/b.png", "Psoriasis", 33.0).unwrap();

        let (status, json) = send_json(&state, request("GET", &format!("/api/export/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["disease_info"].is_null());
    }

    #[tokio::test]
    async fn test_pages_render() {
        let (state, _dir) = melanoma_state();

        let (status, body) = send(&state, request("GET", "/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("No analyses yet"));

        state.db.create_analysis("static/uploads/x.png", "<b>Injected</b>", 5.0).unwrap();
        let (status, body) = send(&state, request("GET", "/history")).await;
        let html = String::from_utf8(body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("x.png"));
        assert!(html.contains("&lt;b&gt;Injected"));
        assert!(!html.contains("<b>Injected</b>"));
    }

    #[test]
    fn test_image_url_uses_file_name() {
        assert_eq!(image_url("static/uploads/abc.png".to_string()), "/static/uploads/abc.png");
        assert_eq!(short_time("2024-03-01T10:15:30.000001Z".to_string()), "2024-03-01 10:15");
        assert_eq!(short_time("garbage".to_string()), "garbage");
    }
}
