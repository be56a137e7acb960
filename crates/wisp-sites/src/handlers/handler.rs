//! HTTP handlers for site creation, upload and serving
//!
//! These are the only places where the error taxonomy turns into HTTP
//! responses and where headers are pulled apart; the services below
//! never see a request object.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use tracing::{debug, warn};
use utoipa::OpenApi;
use wisp_core::constants::{MAX_SITE_SIZE, PUBLIC_KEY_LENGTH, RESPONSE_HEADER_PREFIX};
use wisp_core::problemdetails::Problem;
use wisp_core::{SiteError, SiteResult};
use wisp_store::StoredFile;

use super::types::{CreateSiteResponse, RootSummaryResponse, UploadResponse};
use crate::services::{PathResolver, Resolution, SiteService, SiteSummary};

/// Shared state for the site routes.
pub struct SiteAppState {
    pub sites: SiteService,
    pub resolver: PathResolver,
}

/// OpenAPI documentation for the site endpoints
#[derive(OpenApi)]
#[openapi(
    paths(create_site, get_site_file, post_site_file),
    components(schemas(
        CreateSiteResponse,
        UploadResponse,
        RootSummaryResponse,
        SiteSummary,
    )),
    tags(
        (name = "Sites", description = "Ephemeral site creation, upload and serving")
    )
)]
pub struct SitesApiDoc;

/// Configure the site routes.
pub fn configure_routes() -> Router<Arc<SiteAppState>> {
    Router::new()
        .route("/create/", post(create_site).fallback(create_not_allowed))
        .route(
            "/{public_key}",
            get(get_site_root).fallback(site_read_only_not_allowed),
        )
        .route(
            "/{public_key}/",
            get(get_site_root)
                .post(post_site_root)
                .fallback(site_not_allowed),
        )
        .route(
            "/{public_key}/{*path}",
            get(get_site_file)
                .post(post_site_file)
                .fallback(site_not_allowed),
        )
        // Uploads are bounded by the site size quota, not the framework
        // default; the quota check answers 429 for anything over it.
        .layer(DefaultBodyLimit::max(MAX_SITE_SIZE as usize + 1024))
}

/// Fallback for any route nothing else matched.
pub async fn not_found_fallback() -> Problem {
    SiteError::NotFound("404: page not found".into()).into()
}

async fn create_not_allowed() -> Problem {
    SiteError::MethodNotAllowed {
        allowed: "POST".into(),
    }
    .into()
}

async fn site_not_allowed() -> Problem {
    SiteError::MethodNotAllowed {
        allowed: "GET,POST".into(),
    }
    .into()
}

async fn site_read_only_not_allowed() -> Problem {
    SiteError::MethodNotAllowed {
        allowed: "GET".into(),
    }
    .into()
}

/// Create a new ephemeral site
#[utoipa::path(
    tag = "Sites",
    post,
    path = "/create/",
    responses(
        (status = 200, description = "Site created", body = CreateSiteResponse),
        (status = 401, description = "Authorization header missing"),
        (status = 403, description = "Authorization key over the hash threshold"),
        (status = 409, description = "Public key collision"),
        (status = 429, description = "Site creation quota exceeded"),
        (status = 502, description = "Quota service failure")
    )
)]
async fn create_site(
    State(state): State<Arc<SiteAppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Problem> {
    let auth = header_str(&headers, &header::AUTHORIZATION);
    let user_agent = header_str(&headers, &header::USER_AGENT);
    let ip_address = client_ip(&headers);

    let site = state
        .sites
        .create_site(auth, user_agent, &ip_address)
        .await?;

    Ok(Json(CreateSiteResponse {
        message: "New site created successfully".into(),
        public_key: site.public_key,
        secret_key: site.secret_key,
        url: site.url,
        site_creation: site.site_creation,
        site_expiration: site.site_expiration,
        upload_expiration: site.upload_expiration,
        sites_created_24h: site.sites_created_24h,
    }))
}

/// Fetch a file from a site
#[utoipa::path(
    tag = "Sites",
    get,
    path = "/{public_key}/{path}",
    params(
        ("public_key" = String, Path, description = "Site identifier"),
        ("path" = String, Path, description = "File path within the site")
    ),
    responses(
        (status = 200, description = "File content, or the site summary for the reserved path"),
        (status = 404, description = "File not found (possibly served from the site's own 404 page)")
    )
)]
async fn get_site_file(
    State(state): State<Arc<SiteAppState>>,
    Path((public_key, path)): Path<(String, String)>,
) -> Result<Response, Problem> {
    serve_get(&state, &public_key, &format!("/{path}")).await
}

async fn get_site_root(
    State(state): State<Arc<SiteAppState>>,
    Path(public_key): Path<String>,
) -> Result<Response, Problem> {
    serve_get(&state, &public_key, "/").await
}

async fn serve_get(state: &SiteAppState, public_key: &str, path: &str) -> Result<Response, Problem> {
    validate_public_key(public_key)?;
    debug!("GET /{}{}", public_key, path);

    match state.resolver.resolve(public_key, path).await? {
        Resolution::File { file, status } => Ok(file_response(file, status)),
        Resolution::Summary(summary) => Ok(Json(summary).into_response()),
        Resolution::RootFallback { message, summary } => {
            Ok(Json(RootSummaryResponse { message, summary }).into_response())
        }
    }
}

/// Upload a file to a site
#[utoipa::path(
    tag = "Sites",
    post,
    path = "/{public_key}/{path}",
    params(
        ("public_key" = String, Path, description = "Site identifier"),
        ("path" = String, Path, description = "File path within the site")
    ),
    request_body(content = [u8], content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Capability token bound to a different site"),
        (status = 403, description = "Invalid token, or reserved path"),
        (status = 410, description = "Upload window elapsed"),
        (status = 429, description = "Site size quota exceeded"),
        (status = 502, description = "Quota service failure")
    ),
    security(("bearer_auth" = []))
)]
async fn post_site_file(
    State(state): State<Arc<SiteAppState>>,
    Path((public_key, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, Problem> {
    serve_post(&state, &public_key, &format!("/{path}"), &headers, body).await
}

async fn post_site_root(
    State(state): State<Arc<SiteAppState>>,
    Path(public_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, Problem> {
    serve_post(&state, &public_key, "/", &headers, body).await
}

async fn serve_post(
    state: &SiteAppState,
    public_key: &str,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, Problem> {
    validate_public_key(public_key)?;
    debug!("POST /{}{} ({} bytes)", public_key, path, body.len());

    let token = header_str(headers, &header::AUTHORIZATION);
    let content_type = header_str(headers, &header::CONTENT_TYPE).map(str::to_string);
    let extra_headers = response_header_overrides(headers);

    let outcome = state
        .sites
        .upload_file(public_key, path, token, content_type, extra_headers, body)
        .await?;

    Ok(Json(UploadResponse {
        path: outcome.path,
        content_type: outcome.content_type,
        size: outcome.size,
        total_site_size: outcome.total_site_size,
    }))
}

/// Public keys are fixed-length lowercase alphanumerics; anything else
/// cannot name a site.
fn validate_public_key(public_key: &str) -> SiteResult<()> {
    let valid = public_key.len() == PUBLIC_KEY_LENGTH
        && public_key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(SiteError::NotFound("404: page not found".into()))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Best-effort client address for quota accounting: first hop of
/// `X-Forwarded-For` when present.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Collect `response-header-*` upload headers as response overrides.
fn response_header_overrides(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let suffix = name.as_str().strip_prefix(RESPONSE_HEADER_PREFIX)?;
            let value = value.to_str().ok()?;
            Some((suffix.to_string(), value.to_string()))
        })
        .collect()
}

/// Build a file response: stored content type, any per-file header
/// overrides, and the resolution status (200, or a forced 404 for
/// custom not-found pages).
fn file_response(file: StoredFile, status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    let mut response = (status, file.content).into_response();

    let content_type = file
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);

    for (name, value) in file.extra_headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!("dropping invalid response header override {:?}", name),
        }
    }

    response
}
