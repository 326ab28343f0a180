use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use platform_authz::{
    AccessContext, AccessRule, Actor, AuthzError, Role, StoreError, Tier, TierFeature, TierLimits,
    VendorStore, can_access_tier_field, has_feature_access, has_tier_access, is_admin_or_self,
    field_access, tier_change::TierChangeRequest,
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VendorStore>,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "access server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/tiers", get(tiers_handler))
        .route("/access/tier/{tier}", get(tier_access_handler))
        .route("/access/feature/{feature}", get(feature_access_handler))
        .route("/access/field/{tier}", post(field_access_handler))
        .route("/users/{id}/access", get(self_access_handler))
        .route("/tier-requests/validate", post(validate_tier_request_handler))
        .route("/profiles/validate/{tier}", post(validate_profile_handler))
        .route(
            "/profiles/tier-change/{current}/{target}",
            post(validate_downgrade_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// Actor forwarded by the authentication proxy. No role header means the
/// request is unauthenticated; a role header that is present but blank is
/// rejected with 400.
#[derive(Debug)]
pub struct RequestActor(pub Option<Actor>);

impl FromRequestParts<AppState> for RequestActor {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(raw_role) = parts.headers.get(&state.config.actor_role_header) else {
            return Ok(Self(None));
        };
        let role: Role = String::from_utf8_lossy(raw_role.as_bytes()).parse()?;
        let id = parts
            .headers
            .get(&state.config.actor_id_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self(Some(Actor { id, role })))
    }
}

fn decision(result: Result<bool, StoreError>) -> HttpResult<StatusCode> {
    match result {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Ok(StatusCode::FORBIDDEN),
        Err(err) => Err(AuthzError::from(err).into()),
    }
}

async fn tier_access_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(tier): Path<String>,
) -> HttpResult<StatusCode> {
    let minimum: Tier = tier.parse()?;
    let ctx = AccessContext::new(actor.as_ref()).with_store(state.store.as_ref());
    decision(has_tier_access(minimum).evaluate(&ctx).await)
}

async fn feature_access_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(feature): Path<String>,
) -> HttpResult<StatusCode> {
    let feature: TierFeature = feature.parse()?;
    let ctx = AccessContext::new(actor.as_ref()).with_store(state.store.as_ref());
    decision(has_feature_access(feature).evaluate(&ctx).await)
}

async fn field_access_handler(
    RequestActor(actor): RequestActor,
    Path(tier): Path<String>,
    Json(data): Json<Value>,
) -> HttpResult<StatusCode> {
    let minimum: Tier = tier.parse()?;
    let ctx = AccessContext::new(actor.as_ref()).with_data(&data);
    decision(can_access_tier_field(minimum).evaluate(&ctx).await)
}

async fn self_access_handler(
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> StatusCode {
    let ctx = AccessContext::new(actor.as_ref());
    if is_admin_or_self(&ctx, Some(&id)) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::FORBIDDEN
    }
}

#[derive(Debug, Serialize)]
struct ValidationResponse {
    valid: bool,
    errors: Vec<String>,
}

fn validation_response<E: std::fmt::Display>(
    result: Result<(), Vec<E>>,
) -> (StatusCode, Json<ValidationResponse>) {
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(ValidationResponse {
                valid: true,
                errors: Vec::new(),
            }),
        ),
        Err(violations) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationResponse {
                valid: false,
                errors: violations.iter().map(ToString::to_string).collect(),
            }),
        ),
    }
}

async fn validate_tier_request_handler(
    Json(request): Json<TierChangeRequest>,
) -> (StatusCode, Json<ValidationResponse>) {
    validation_response(request.validate())
}

async fn validate_profile_handler(
    Path(tier): Path<String>,
    Json(update): Json<Value>,
) -> HttpResult<(StatusCode, Json<ValidationResponse>)> {
    let tier: Tier = tier.parse()?;
    Ok(validation_response(field_access::validate_profile_update(
        tier, &update,
    )))
}

async fn validate_downgrade_handler(
    Path((current, target)): Path<(String, String)>,
    Json(profile): Json<Value>,
) -> HttpResult<(StatusCode, Json<ValidationResponse>)> {
    let current: Tier = current.parse()?;
    let target: Tier = target.parse()?;
    Ok(validation_response(field_access::validate_tier_change(
        current, target, &profile,
    )))
}

#[derive(Serialize)]
struct TierSummary {
    tier: Tier,
    name: &'static str,
    rank: u8,
    features: Vec<TierFeature>,
    limits: TierLimits,
}

async fn tiers_handler() -> Json<Vec<TierSummary>> {
    Json(
        Tier::ORDER
            .into_iter()
            .map(|tier| TierSummary {
                tier,
                name: tier.display_name(),
                rank: tier.rank(),
                features: TierFeature::available_for(tier).collect(),
                limits: TierLimits::for_tier(tier),
            })
            .collect(),
    )
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.store.ping().await.is_ok();
    Json(HealthResponse {
        ok: store_ok,
        store_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    store_ok: bool,
    version: &'static str,
}

type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    fn internal(err: &dyn std::error::Error) -> Self {
        error!(error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<AuthzError> for HttpError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::UnknownTier(_)
            | AuthzError::UnknownFeature(_)
            | AuthzError::UnknownRole(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            AuthzError::Store(ref inner) => Self::internal(inner),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install CTRL+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use http_body_util::BodyExt;
    use platform_authz::{InMemoryVendorStore, VendorRecord};
    use serde_json::json;
    use tower::ServiceExt;

    fn state_with(store: Arc<InMemoryVendorStore>) -> AppState {
        AppState {
            store,
            config: Arc::new(AppConfig::default()),
        }
    }

    fn seeded_store() -> Arc<InMemoryVendorStore> {
        Arc::new(InMemoryVendorStore::new([VendorRecord {
            id: "vendor-1".into(),
            user: "v1".into(),
            tier: Tier::Tier1,
        }]))
    }

    fn get_as(uri: &str, actor: Option<(&str, &str)>) -> http::Request<Body> {
        let mut builder = http::Request::builder().uri(uri);
        if let Some((id, role)) = actor {
            builder = builder.header("x-actor-id", id).header("x-actor-role", role);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn status_of(router: Router, request: http::Request<Body>) -> StatusCode {
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn tier_access_reflects_vendor_subscription() {
        let router = build_router(state_with(seeded_store()));
        let vendor = Some(("v1", "vendor"));
        assert_eq!(
            status_of(router.clone(), get_as("/access/tier/free", vendor)).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            status_of(router.clone(), get_as("/access/tier/tier1", vendor)).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            status_of(router, get_as("/access/tier/tier2", vendor)).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn admin_is_allowed_without_lookup() {
        let store = seeded_store();
        let router = build_router(state_with(store.clone()));
        let status = status_of(router, get_as("/access/tier/tier2", Some(("a1", "admin")))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn anonymous_requests_are_forbidden() {
        let router = build_router(state_with(seeded_store()));
        assert_eq!(
            status_of(router, get_as("/access/tier/free", None)).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn unknown_tier_is_bad_request() {
        let router = build_router(state_with(seeded_store()));
        let response = router
            .oneshot(get_as("/access/tier/tier3", Some(("v1", "vendor"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"unknown tier \"tier3\"");
    }

    #[tokio::test]
    async fn blank_role_header_is_bad_request() {
        let router = build_router(state_with(seeded_store()));
        let response = router
            .oneshot(get_as("/access/tier/free", Some(("v1", "  "))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"unknown role \"  \"");
    }

    #[tokio::test]
    async fn store_failure_is_masked_500() {
        let store = seeded_store();
        store.set_failing(true);
        let router = build_router(state_with(store));
        let response = router
            .oneshot(get_as("/access/tier/free", Some(("v1", "vendor"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"internal server error");
    }

    #[tokio::test]
    async fn feature_access_uses_feature_minimum() {
        let router = build_router(state_with(seeded_store()));
        let vendor = Some(("v1", "vendor"));
        assert_eq!(
            status_of(router.clone(), get_as("/access/feature/mediaGallery", vendor)).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            status_of(router.clone(), get_as("/access/feature/apiAccess", vendor)).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(router, get_as("/access/feature/promotionPack", vendor)).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn field_access_reads_payload_tier() {
        let router = build_router(state_with(seeded_store()));
        let post = |uri: &str, body: Value| {
            http::Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("x-actor-id", "v9")
                .header("x-actor-role", "vendor")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };
        assert_eq!(
            status_of(router.clone(), post("/access/field/tier1", json!({ "tier": "tier1" }))).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            status_of(router, post("/access/field/tier1", json!({}))).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn self_access_matches_ids() {
        let router = build_router(state_with(seeded_store()));
        assert_eq!(
            status_of(router.clone(), get_as("/users/v1/access", Some(("v1", "vendor")))).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            status_of(router.clone(), get_as("/users/v2/access", Some(("v1", "vendor")))).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(router, get_as("/users/v2/access", Some(("a1", "admin")))).await,
            StatusCode::NO_CONTENT
        );
    }

    #[tokio::test]
    async fn tier_request_validation_reports_errors() {
        let router = build_router(state_with(seeded_store()));
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/tier-requests/validate")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "vendor": "vendor-1",
                    "user": "v1",
                    "currentTier": "tier1",
                    "requestedTier": "tier1"
                })
                .to_string(),
            ))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            json!({
                "valid": false,
                "errors": ["requested tier must be different from current tier"]
            })
        );
    }

    fn post_json(uri: &str, body: Value) -> http::Request<Body> {
        http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn profile_validation_lists_restricted_fields() {
        let router = build_router(state_with(seeded_store()));
        let update = json!({ "companyName": "Helm", "website": "https://helm.example" });

        let response = router
            .clone()
            .oneshot(post_json("/profiles/validate/free", update.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            json!({
                "valid": false,
                "errors": ["fields website are not accessible for free tier"]
            })
        );

        assert_eq!(
            status_of(router, post_json("/profiles/validate/tier1", update)).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn downgrade_with_extra_locations_is_rejected() {
        let router = build_router(state_with(seeded_store()));
        let profile = json!({
            "companyName": "Helm",
            "locations": [{}, {}, {}, {}],
        });
        assert_eq!(
            status_of(
                router.clone(),
                post_json("/profiles/tier-change/tier2/tier1", profile.clone())
            )
            .await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(
                router.clone(),
                post_json("/profiles/tier-change/tier1/tier2", profile.clone())
            )
            .await,
            StatusCode::OK
        );
        assert_eq!(
            status_of(router, post_json("/profiles/tier-change/tier3/free", profile)).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn tiers_catalog_lists_every_tier() {
        let router = build_router(state_with(seeded_store()));
        let response = router.oneshot(get_as("/tiers", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json[0]["tier"], "free");
        assert_eq!(json[1]["name"], "Professional");
        assert_eq!(json[1]["features"], json!(["multipleLocations", "mediaGallery"]));
        assert_eq!(json[2]["limits"]["maxLocations"], 10);
    }

    #[tokio::test]
    async fn health_reports_store_state() {
        let store = seeded_store();
        let router = build_router(state_with(store.clone()));
        let response = router.clone().oneshot(get_as("/health", None)).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);

        store.set_failing(true);
        let response = router.oneshot(get_as("/health", None)).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["store_ok"], false);
    }
}
