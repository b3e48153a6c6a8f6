//! HTTP surface for the resolver.
//!
//! `POST /company-details` takes a company name, optional seed URLs and an
//! optional reference logo URL, runs a full resolution with extraction, and
//! answers with the extracted profile. A logo that cannot be downloaded or
//! decoded is a 400; a run that selects nothing is a 404.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::compare::LogoFingerprint;
use crate::extraction::CompanyProfile;
use crate::fetch::get_with_timeout;
use crate::pipeline::Resolver;
use crate::types::{CompanyQuery, DecisionReason};

pub const NOT_FOUND_DETAIL: &str = "No information found for the company.";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanyDetailsRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub urls: Vec<String>,
    /// Where to download the reference logo from.
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompanyDetailsResponse {
    pub source_url: String,
    pub decision_reason: DecisionReason,
    pub profile: CompanyProfile,
}

#[derive(Clone)]
struct AppState {
    resolver: Arc<Resolver>,
}

pub fn build_router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/company-details", post(company_details))
        .route("/health", get(health))
        .with_state(AppState { resolver })
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

async fn health() -> &'static str {
    "ok"
}

async fn company_details(
    State(state): State<AppState>,
    Json(body): Json<CompanyDetailsRequest>,
) -> Response {
    let mut query = CompanyQuery::new(body.name).with_seed_urls(body.urls);
    if let Err(e) = query.validate() {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }
    if let Some(logo_url) = body.logo_url.as_deref() {
        match download_logo(&state.resolver, logo_url).await {
            Ok(bytes) => query = query.with_logo(bytes),
            Err(message) => {
                warn!(logo_url, %message, "Rejecting request with unusable logo");
                return error_response(StatusCode::BAD_REQUEST, message);
            }
        }
    }

    let resolution = match state.resolver.run(&query).await {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!(error = %e, "Company details extraction failed");
            return error_response(StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let decision_reason = resolution.outcome.decision_reason;
    match (resolution.outcome.selected, resolution.profile) {
        (Some(selected), Some(profile)) => {
            info!(url = %selected.url, reason = %decision_reason, "Company details resolved");
            (
                StatusCode::OK,
                Json(CompanyDetailsResponse {
                    source_url: selected.url,
                    decision_reason,
                    profile,
                }),
            )
                .into_response()
        }
        _ => {
            info!(reason = %decision_reason, "No company details found");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "detail": NOT_FOUND_DETAIL,
                    "reason": decision_reason,
                })),
            )
                .into_response()
        }
    }
}

/// Fetch the reference logo and make sure it decodes, so a bad logo is
/// reported to the caller instead of silently ranking without similarity.
async fn download_logo(resolver: &Resolver, url: &str) -> Result<Vec<u8>, String> {
    let resp = get_with_timeout(resolver.transport(), url, resolver.config().fetch_timeout())
        .await
        .map_err(|e| format!("Logo could not be downloaded from {url}: {e}"))?;
    if !resp.is_success() {
        return Err(format!("Logo not found at {url} (status {})", resp.status));
    }

    let bytes = resp.body;
    let check = bytes.clone();
    match tokio::task::spawn_blocking(move || LogoFingerprint::from_bytes(&check)).await {
        Ok(Ok(_)) => Ok(bytes),
        Ok(Err(e)) => Err(format!("Logo at {url} is not a usable image: {e}")),
        Err(e) => Err(format!("Logo decode task failed: {e}")),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::testing::{circle_png, MockExtractor, MockSearcher, MockTransport};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const LINKEDIN_ACME: &str = "https://www.linkedin.com/company/acme";
    const LOGO: &str = "https://files.example.com/acme.png";

    fn router(transport: MockTransport, extractor: MockExtractor) -> (Router, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let resolver = Resolver::new(
            ResolverConfig::default(),
            Arc::new(MockSearcher::new()),
            transport.clone(),
        )
        .with_extractor(Arc::new(extractor));
        (build_router(Arc::new(resolver)), transport)
    }

    fn acme_profile() -> CompanyProfile {
        CompanyProfile {
            company_name: Some("Acme".into()),
            ..Default::default()
        }
    }

    async fn post_json(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/company-details")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = router(MockTransport::new(), MockExtractor::returning(acme_profile()));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn resolved_company_returns_profile() {
        let (app, _) = router(
            MockTransport::new().on_page(LINKEDIN_ACME, "<html><body>Acme</body></html>"),
            MockExtractor::returning(acme_profile()),
        );

        let (status, body) = post_json(
            app,
            serde_json::json!({"name": "Acme", "urls": [LINKEDIN_ACME]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source_url"], LINKEDIN_ACME);
        assert_eq!(body["decision_reason"], "HighConfidenceMatch");
        let profile: CompanyProfile = serde_json::from_value(body["profile"].clone()).unwrap();
        assert_eq!(profile, acme_profile());
    }

    #[tokio::test]
    async fn logo_is_downloaded_and_used_for_matching() {
        let (app, transport) = router(
            MockTransport::new()
                .on_image(LOGO, circle_png(64, 64))
                .on_page(LINKEDIN_ACME, "<html><body>Acme</body></html>"),
            MockExtractor::returning(acme_profile()),
        );

        let (status, _) = post_json(
            app,
            serde_json::json!({"name": "Acme", "urls": [LINKEDIN_ACME], "logo_url": LOGO}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(transport.calls(LOGO), 1);
    }

    #[tokio::test]
    async fn empty_query_is_bad_request() {
        let (app, transport) = router(MockTransport::new(), MockExtractor::returning(acme_profile()));
        let (status, body) = post_json(app, serde_json::json!({"name": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("no company name"));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn missing_logo_is_bad_request_before_any_page_fetch() {
        let (app, transport) = router(
            MockTransport::new()
                .on_status(LOGO, 404)
                .on_page(LINKEDIN_ACME, "<html></html>"),
            MockExtractor::returning(acme_profile()),
        );

        let (status, body) = post_json(
            app,
            serde_json::json!({"name": "Acme", "urls": [LINKEDIN_ACME], "logo_url": LOGO}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("status 404"));
        assert_eq!(transport.calls(LINKEDIN_ACME), 0);
    }

    #[tokio::test]
    async fn undecodable_logo_is_bad_request() {
        let (app, _) = router(
            MockTransport::new().on_image(LOGO, b"not an image".to_vec()),
            MockExtractor::returning(acme_profile()),
        );
        let (status, body) = post_json(
            app,
            serde_json::json!({"name": "Acme", "logo_url": LOGO}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not a usable image"));
    }

    #[tokio::test]
    async fn nothing_selected_is_not_found() {
        let (app, _) = router(
            MockTransport::new().on_status(LINKEDIN_ACME, 503),
            MockExtractor::returning(acme_profile()),
        );
        let (status, body) = post_json(
            app,
            serde_json::json!({"name": "Acme", "urls": [LINKEDIN_ACME]}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], NOT_FOUND_DETAIL);
        assert_eq!(body["reason"], "AllFetchesFailed");
    }

    #[tokio::test]
    async fn extraction_failure_is_bad_gateway() {
        let (app, _) = router(
            MockTransport::new().on_page(LINKEDIN_ACME, "<html><body>Acme</body></html>"),
            MockExtractor::failing("model overloaded"),
        );
        let (status, body) = post_json(
            app,
            serde_json::json!({"name": "Acme", "urls": [LINKEDIN_ACME]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("model overloaded"));
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let (app, _) = router(MockTransport::new(), MockExtractor::returning(acme_profile()));
        let request = Request::builder()
            .method("POST")
            .uri("/company-details")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "Acme", "logo": "/etc/passwd"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
