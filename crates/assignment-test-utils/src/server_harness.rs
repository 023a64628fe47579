//! Test server harness for E2E testing
//!
//! Provides `TestAssignmentServer` for spawning real assignment server
//! instances on the in-memory store.

use assignment_service::config::Config;
use assignment_service::routes::{self, AppState};
use assignment_service::store::{DocumentStore, MemoryDocumentStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Password shared by every login the harness configures.
pub const TEST_PASSWORD: &str = "password1";

/// User-group logins configured on every test server.
pub const TEST_USERS: [&str; 2] = ["user1", "user2"];

/// Admin-group login configured on every test server.
pub const TEST_ADMIN: &str = "admin1";

/// Test harness for spawning the assignment server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_e2e() -> Result<(), anyhow::Error> {
///     let server = TestAssignmentServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestAssignmentServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    store: Arc<MemoryDocumentStore>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestAssignmentServer {
    /// Spawn a server with the default test configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(HashMap::new()).await
    }

    /// Spawn a server with extra environment overrides, such as
    /// `ID_ALLOCATOR` or `ASSIGNMENT_ID_START`.
    ///
    /// The server will:
    /// - Use the in-memory document store
    /// - Hash passwords at the lowest bcrypt cost
    /// - Bind to a random available port (127.0.0.1:0)
    pub async fn spawn_with(overrides: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("STORE_BACKEND".to_string(), "memory".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "SECRET_KEY_USER".to_string(),
                "harness-user-secret-key-0123456789".to_string(),
            ),
            (
                "SECRET_KEY_ADMIN".to_string(),
                "harness-admin-secret-key-0123456789".to_string(),
            ),
            (
                "USER_CREDENTIALS".to_string(),
                TEST_USERS
                    .iter()
                    .map(|user| format!("{user}:{TEST_PASSWORD}"))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            (
                "ADMIN_CREDENTIALS".to_string(),
                format!("{TEST_ADMIN}:{TEST_PASSWORD}"),
            ),
            ("BCRYPT_COST".to_string(), "4".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let store = Arc::new(MemoryDocumentStore::new(
            config.assignment_collection.clone(),
        ));
        let state = Arc::new(
            AppState::new(config, store.clone() as Arc<dyn DocumentStore>)
                .map_err(|e| anyhow::anyhow!("Failed to build app state: {}", e))?,
        );

        // Local recorder handle; tests must not install a global recorder
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            store,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Shared application state, for minting tokens directly.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The in-memory store behind the server.
    pub fn store(&self) -> &Arc<MemoryDocumentStore> {
        &self.store
    }

    /// Log in through `POST /user/token` and return the access token.
    pub async fn user_token(&self, username: &str) -> Result<String, anyhow::Error> {
        self.login("/user/token", username, TEST_PASSWORD).await
    }

    /// Log in through `POST /admin/token` and return the access token.
    pub async fn admin_token(&self) -> Result<String, anyhow::Error> {
        self.login("/admin/token", TEST_ADMIN, TEST_PASSWORD).await
    }

    async fn login(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<String, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}{}", self.url(), path))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Login for {} failed with {}", username, response.status());
        }

        let body: Value = response.json().await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Token response missing access_token"))
    }
}

impl Drop for TestAssignmentServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
