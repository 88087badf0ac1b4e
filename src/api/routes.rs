use crate::analyzer::categorizer::CategoryRules;
use crate::analyzer::period::resolve_period;
use crate::brief::{self, Brief, BriefRequest};
use crate::braindump::{self, Analysis};
use crate::collector::export::UploadHint;
use crate::collector::{self, BatchSummary, IngestRequest};
use crate::context::AppContext;
use crate::db::checkin::MetricValue;
use crate::db::notes::{Braindump, JournalEntry, JournalInput, Profile};
use crate::db::newsletter::NewsletterSource;
use crate::db::{HistorySource, ReviewSource};
use crate::error::AppError;
use crate::journal::{self, Reflection};
use crate::metrics::{self, MetricReport, ReportRequest, SubmitRequest, SuggestRequest};
use crate::newsletter::{self, Draft, FetchSummary, PeriodRequest, SourcesRequest};
use crate::{analyzer, profile};
use anyhow::Context;
use axum::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use tracing::error;

pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Clone)]
pub struct ApiState {
    pub context: Arc<AppContext>,
}

pub fn router(state: ApiState) -> Router {
    let body_limit = state.context.config.max_upload_bytes();

    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/history/:source/ingest", post(history_ingest))
        .route("/api/v1/review", get(review_list))
        .route("/api/v1/review/:source/week", post(review_week))
        .route("/api/v1/metrics/submit", post(metrics_submit))
        .route("/api/v1/metrics/report", post(metrics_report))
        .route("/api/v1/metrics/suggest", post(metrics_suggest))
        .route("/api/v1/journal/create", post(journal_create))
        .route("/api/v1/journal/analyze", post(journal_analyze))
        .route("/api/v1/braindump/ingest", post(braindump_ingest))
        .route("/api/v1/braindump/analyze", post(braindump_analyze))
        .route("/api/v1/newsletter/sources", post(newsletter_sources))
        .route("/api/v1/newsletter/fetch", post(newsletter_fetch))
        .route("/api/v1/newsletter/research", post(newsletter_research))
        .route("/api/v1/newsletter/draft", post(newsletter_draft))
        .route("/api/v1/brief/run", post(brief_run))
        .route("/api/v1/profile", get(profile_get).put(profile_put))
        .route(
            "/api/v1/categories",
            get(categories_get).put(categories_put),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Caller identity, set by the identity proxy in front of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Owner(value.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

/// JSON body whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Serialize)]
struct StatusPayload {
    version: &'static str,
    api_port: u16,
    ai_configured: bool,
    search_configured: bool,
    primary_model: String,
    fallback_model: String,
    last_history_at: Option<DateTime<Utc>>,
}

async fn status(
    State(state): State<ApiState>,
    owner: Option<Owner>,
) -> ApiResult<Json<StatusPayload>> {
    let config = &state.context.config;
    let last_history_at = match owner {
        Some(Owner(owner)) => state
            .context
            .open_database()?
            .latest_history_timestamp(&owner)?,
        None => None,
    };

    Ok(Json(StatusPayload {
        version: env!("CARGO_PKG_VERSION"),
        api_port: config.api_port,
        ai_configured: config.resolve_ai_api_key().is_some(),
        search_configured: config.resolve_search_api_key().is_some(),
        primary_model: config.ai_primary_model.clone(),
        fallback_model: config.ai_fallback_model.clone(),
        last_history_at,
    }))
}

#[derive(Debug, Deserialize)]
struct IngestQuery {
    filename: Option<String>,
}

async fn history_ingest(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    Path(source): Path<String>,
    Query(query): Query<IngestQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<BatchSummary>> {
    let source = match ReviewSource::parse(&source) {
        Some(ReviewSource::Browser) => HistorySource::Browser,
        Some(ReviewSource::Video) => HistorySource::Video,
        _ => {
            return Err(ApiError::BadRequest(format!(
                "unknown history source: {source}. Use browser or video"
            )));
        }
    };
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let context = &state.context;
    let rules = context.category_rules()?;
    let mut database = context.open_database()?;
    let summary = collector::ingest_export(
        &mut database,
        &rules,
        context.config.retention_days,
        IngestRequest {
            owner: &owner,
            source,
            hint: UploadHint {
                filename: query.filename.as_deref(),
                content_type,
            },
            body: &body,
        },
        Utc::now(),
    )?;

    Ok(Json(summary))
}

#[derive(Debug, Default, Deserialize)]
struct ReviewRequest {
    #[serde(default)]
    period_week: Option<String>,
}

async fn review_week(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    Path(source): Path<String>,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<Json<analyzer::ReviewOutcome>> {
    let source = ReviewSource::parse(&source).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "unknown review source: {source}. Use browser, video or combined"
        ))
    })?;
    let period = resolve_period("period_week", request.period_week.as_deref())?;

    let outcome = analyzer::review_week(&state.context, &owner, source, period).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct ReviewListQuery {
    week: Option<String>,
}

async fn review_list(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    Query(query): Query<ReviewListQuery>,
) -> ApiResult<Json<Value>> {
    let period = resolve_period("week", query.week.as_deref())?;
    let reviews = analyzer::list_reviews(&state.context, &owner, period)?;

    Ok(Json(json!({
        "period_week": period.key(),
        "reviews": reviews,
    })))
}

async fn metrics_submit(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<SubmitRequest>,
) -> ApiResult<Json<Value>> {
    let saved: Vec<MetricValue> = metrics::submit(&state.context, &owner, request)?;
    Ok(Json(json!({ "ok": true, "values": saved })))
}

async fn metrics_report(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<ReportRequest>,
) -> ApiResult<Json<MetricReport>> {
    Ok(Json(metrics::report(&state.context, &owner, request).await?))
}

async fn metrics_suggest(
    Owner(_owner): Owner,
    ApiJson(request): ApiJson<SuggestRequest>,
) -> ApiResult<Json<Value>> {
    let suggested = metrics::suggest(&request)?;
    Ok(Json(json!({ "suggested": suggested })))
}

async fn journal_create(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(input): ApiJson<JournalInput>,
) -> ApiResult<Json<JournalEntry>> {
    Ok(Json(journal::create_entry(&state.context, &owner, input)?))
}

async fn journal_analyze(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<journal::AnalyzeRequest>,
) -> ApiResult<Json<Reflection>> {
    Ok(Json(
        journal::analyze_entry(&state.context, &owner, request).await?,
    ))
}

async fn braindump_ingest(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<braindump::IngestRequest>,
) -> ApiResult<Json<Braindump>> {
    Ok(Json(braindump::ingest(&state.context, &owner, request)?))
}

async fn braindump_analyze(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<braindump::AnalyzeRequest>,
) -> ApiResult<Json<Analysis>> {
    Ok(Json(
        braindump::analyze(&state.context, &owner, request).await?,
    ))
}

async fn newsletter_sources(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<SourcesRequest>,
) -> ApiResult<Json<Value>> {
    let sources: Vec<NewsletterSource> =
        newsletter::update_sources(&state.context, &owner, request)?;
    Ok(Json(json!({ "sources": sources })))
}

async fn newsletter_fetch(
    State(state): State<ApiState>,
    Owner(owner): Owner,
) -> ApiResult<Json<FetchSummary>> {
    Ok(Json(newsletter::fetch(&state.context, &owner).await?))
}

async fn newsletter_research(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<PeriodRequest>,
) -> ApiResult<Json<Value>> {
    let research = newsletter::research(&state.context, &owner, request).await?;
    Ok(Json(json!({ "research": research })))
}

async fn newsletter_draft(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<PeriodRequest>,
) -> ApiResult<Json<Draft>> {
    Ok(Json(
        newsletter::draft(&state.context, &owner, request).await?,
    ))
}

async fn brief_run(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(request): ApiJson<BriefRequest>,
) -> ApiResult<Json<Brief>> {
    Ok(Json(brief::run(&state.context, &owner, request).await?))
}

async fn profile_get(
    State(state): State<ApiState>,
    Owner(owner): Owner,
) -> ApiResult<Json<Value>> {
    let profile = profile::load(&state.context, &owner)?;
    Ok(Json(json!({ "profile": profile })))
}

async fn profile_put(
    State(state): State<ApiState>,
    Owner(owner): Owner,
    ApiJson(payload): ApiJson<Profile>,
) -> ApiResult<Json<Value>> {
    let profile = profile::save(&state.context, &owner, payload)?;
    Ok(Json(json!({ "ok": true, "profile": profile })))
}

async fn categories_get(State(state): State<ApiState>) -> ApiResult<Json<CategoryRules>> {
    Ok(Json(state.context.category_rules()?))
}

async fn categories_put(
    State(state): State<ApiState>,
    Owner(_owner): Owner,
    ApiJson(payload): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let categories_path = &state.context.config.categories_path;
    serde_json::from_value::<CategoryRules>(payload.clone())
        .map_err(|error| ApiError::BadRequest(format!("Invalid categories schema: {error}")))?;

    let pretty =
        serde_json::to_string_pretty(&payload).context("Failed to serialize categories JSON")?;
    fs::write(categories_path, pretty).with_context(|| {
        format!(
            "Failed to save categories file: {}",
            categories_path.display()
        )
    })?;

    Ok(Json(json!({
        "saved": true,
        "path": categories_path.display().to_string()
    })))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    App(AppError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::App(error) => match error {
                AppError::Validation(_) | AppError::Export(_) => StatusCode::BAD_REQUEST,
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                AppError::Generation(_) | AppError::Parse(_) => StatusCode::BAD_GATEWAY,
                AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation",
            ApiError::Unauthorized => "unauthorized",
            ApiError::App(error) => error.kind(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::App(AppError::Storage(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = match self {
            ApiError::BadRequest(message) => message,
            ApiError::Unauthorized => format!("missing {OWNER_HEADER} header"),
            ApiError::App(error) => error.to_string(),
        };

        if status.is_server_error() {
            error!(status = %status, kind, error = %message, "request failed");
        }

        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, OWNER_HEADER, Owner};
    use crate::error::AppError;
    use axum::extract::FromRequestParts;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn owner_from(header: Option<&str>) -> Result<Owner, ApiError> {
        let mut builder = Request::builder().uri("/api/v1/profile");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).expect("request").into_parts();

        Owner::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn owner_header_is_required() {
        assert_eq!(
            owner_from(Some(" user-1 ")).await.expect("owner"),
            Owner("user-1".to_string())
        );
        assert!(matches!(owner_from(None).await, Err(ApiError::Unauthorized)));
        assert!(matches!(owner_from(Some("  ")).await, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        let cases = [
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ApiError::App(AppError::validation("bad")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::App(AppError::Export("no url column".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::App(AppError::not_found("missing")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::App(AppError::Generation("both failed".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::App(AppError::Parse("not json".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::App(AppError::Storage(anyhow::anyhow!("disk full"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn generation_and_parse_failures_have_distinct_kinds() {
        assert_eq!(
            ApiError::App(AppError::Generation("x".to_string())).kind(),
            "generation_failure"
        );
        assert_eq!(
            ApiError::App(AppError::Parse("x".to_string())).kind(),
            "parse_failure"
        );
    }
}
