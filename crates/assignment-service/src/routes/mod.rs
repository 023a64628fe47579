//! HTTP routes for the assignment service.
//!
//! Defines the Axum router and application state.

use crate::allocator::build_allocator;
use crate::auth::{CredentialDirectory, JwtKeys};
use crate::config::Config;
use crate::errors::AssignmentError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_admin, require_user};
use crate::repositories::AssignmentRepository;
use crate::store::DocumentStore;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repository: AssignmentRepository,

    /// Store backing the repository, for health checks.
    pub store: Arc<dyn DocumentStore>,

    /// Signing keys for both role groups.
    pub keys: Arc<JwtKeys>,

    /// Hashed logins for both role groups.
    pub credentials: Arc<CredentialDirectory>,

    pub config: Config,
}

impl AppState {
    /// Wire the repository, allocator, keys and credentials for `store`.
    ///
    /// Hashes every configured password, so this is slow at production
    /// bcrypt cost.
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Result<Self, AssignmentError> {
        let allocator = build_allocator(
            config.id_allocator,
            Arc::clone(&store),
            config.assignment_id_start,
        );
        let repository = AssignmentRepository::new(Arc::clone(&store), allocator);
        let keys = Arc::new(JwtKeys::from_config(&config));
        let credentials = Arc::new(CredentialDirectory::from_config(&config)?);

        Ok(Self {
            repository,
            store,
            keys,
            credentials,
            config,
        })
    }
}

/// Build the application routes.
///
/// - `/`, `/health`, `/metrics` - public
/// - `/user/token`, `/admin/token` - public, form login
/// - `/user/...` - user-group Bearer token required
/// - `/admin/...` - admin-group Bearer token required
/// - TraceLayer, 30 second timeout, HTTP metrics (outermost)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/user/token", post(handlers::user_token))
        .route("/admin/token", post(handlers::admin_token))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let user_routes = Router::new()
        .route(
            "/user/assignments",
            post(handlers::create_assignment).get(handlers::list_my_assignments),
        )
        .route("/user/assignments/:id", get(handlers::get_assignment))
        .route(
            "/user/user_assignments/:owner",
            get(handlers::list_assignments_for_owner),
        )
        .route_layer(middleware::from_fn_with_state(
            state.keys.clone(),
            require_user,
        ))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/assignments", get(handlers::list_assignments))
        .route(
            "/admin/assignments/:id",
            get(handlers::get_assignment).delete(handlers::delete_assignment),
        )
        .route_layer(middleware::from_fn_with_state(
            state.keys.clone(),
            require_admin,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// In-memory state with `user1`/`user2` (user) and `admin1` (admin) logins,
/// all with password `password1`.
#[cfg(test)]
pub(crate) fn test_state() -> (Arc<AppState>, Arc<crate::store::MemoryDocumentStore>) {
    use crate::store::MemoryDocumentStore;
    use std::collections::HashMap;

    let vars = HashMap::from([
        ("STORE_BACKEND".to_string(), "memory".to_string()),
        (
            "SECRET_KEY_USER".to_string(),
            "test-user-secret-key-0123456789".to_string(),
        ),
        (
            "SECRET_KEY_ADMIN".to_string(),
            "test-admin-secret-key-0123456789".to_string(),
        ),
        (
            "USER_CREDENTIALS".to_string(),
            "user1:password1,user2:password1".to_string(),
        ),
        ("ADMIN_CREDENTIALS".to_string(), "admin1:password1".to_string()),
        ("BCRYPT_COST".to_string(), "4".to_string()),
    ]);

    #[allow(clippy::expect_used)]
    let config = Config::from_vars(&vars).expect("test config should load");
    let store = Arc::new(MemoryDocumentStore::new(config.assignment_collection.clone()));
    #[allow(clippy::expect_used)]
    let state = AppState::new(config, store.clone()).expect("test state should build");

    (Arc::new(state), store)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }

    fn app() -> (Router, Arc<AppState>) {
        let (state, _store) = test_state();
        let handle = PrometheusBuilder::new().build_recorder().handle();
        (build_routes(state.clone(), handle), state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_route() {
        let (app, _state) = app();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"Hello": "World"}));
    }

    #[tokio::test]
    async fn test_user_routes_require_token() {
        let (app, _state) = app();
        let request = Request::builder()
            .uri("/user/assignments")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_admin_routes_reject_user_token() {
        let (app, state) = app();
        let token = state.keys.issue("user1", Role::User).unwrap();

        let (status, _) = send(app, get_with_token("/admin/assignments", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_integer_id_is_bad_request() {
        let (app, state) = app();
        let token = state.keys.issue("user1", Role::User).unwrap();

        let (status, body) = send(app, get_with_token("/user/assignments/abc", &token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_create_via_router() {
        let (app, state) = app();
        let token = state.keys.issue("user1", Role::User).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/user/assignments")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"name": "Essay", "owner": "user1", "assignment_id": 77}).to_string(),
            ))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["assignment_id"], 1);
    }

    #[tokio::test]
    async fn test_create_missing_owner_is_unprocessable() {
        let (app, state) = app();
        let token = state.keys.issue("user1", Role::User).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/user/assignments")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(json!({"name": "Essay"}).to_string()))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    fn post_json(uri: &str, token: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_keeps_error_envelope() {
        let (app, state) = app();
        let token = state.keys.issue("user1", Role::User).unwrap();

        let (status, body) = send(app, post_json("/user/assignments", &token, "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert!(body["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_wrongly_typed_field_is_validation_error() {
        let (app, state) = app();
        let token = state.keys.issue("user1", Role::User).unwrap();

        let body = json!({"name": "Essay", "owner": "user1", "assignment_id": "seven"});
        let (status, body) = send(
            app,
            post_json("/user/assignments", &token, &body.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_bad_limit_keeps_error_envelope() {
        let (app, state) = app();
        let token = state.keys.issue("admin1", Role::Admin).unwrap();

        let (status, body) = send(app, get_with_token("/admin/assignments?limit=-1", &token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_incomplete_login_form_keeps_error_envelope() {
        let (app, _state) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/user/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("username=user1"))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (app, _state) = app();
        let request = Request::builder()
            .uri("/assignments")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
