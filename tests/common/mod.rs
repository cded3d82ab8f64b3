use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};
use stepout_api::{
    config::AppConfig,
    db,
    entities::user,
    events::{self, EventSender},
    handlers::AppServices,
    services::notifications::NoopMailer,
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@stepout.test";
pub const ADMIN_PASSWORD: &str = "admin-password-for-tests";

/// Spins up the full application router backed by a throwaway SQLite file.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        jwt_secret: "integration-test-jwt-secret-integration-test-jwt-secret-0123456789"
            .to_string(),
        jwt_expiration: 3600,
        host: "127.0.0.1".to_string(),
        port: 18_080,
        environment: "development".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
        event_channel_capacity: 256,
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        razorpay_key_id: None,
        razorpay_key_secret: None,
        razorpay_base_url: "https://api.razorpay.com".to_string(),
        default_currency: "INR".to_string(),
        otp_expiry_minutes: 10,
        email_api_key: None,
        email_base_url: "https://api.brevo.com".to_string(),
        email_from: "noreply@stepout.test".to_string(),
        email_from_name: "StepOut".to_string(),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build an app after letting the caller tweak the base configuration.
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = TempDir::new().expect("create temp dir for test database");
        let db_url = format!(
            "sqlite://{}/stepout_test.db?mode=rwc",
            db_dir.path().display()
        );
        let mut cfg = test_config(db_url);
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let cfg = Arc::new(cfg);
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            cfg.clone(),
            Arc::new(NoopMailer),
        );

        services
            .users
            .ensure_admin_account(&cfg)
            .await
            .expect("seed admin account");

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = stepout_api::app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Log in as the seeded back-office account and return its token.
    pub async fn admin_token(&self) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "admin login should succeed");
        let body = response_json(response).await;
        body["data"]["token"]
            .as_str()
            .expect("admin token in login response")
            .to_string()
    }

    /// Register a verified customer account and return its token.
    pub async fn customer_token(&self, email: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "name": "Test Customer",
                    "email": email,
                    "password": "customer-pass",
                    "confirm_password": "customer-pass",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), 201, "registration should succeed");

        let otp = self.stored_otp(email).await;
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/verify-otp",
                Some(json!({ "email": email, "otp": otp })),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "OTP verification should succeed");
        let body = response_json(response).await;
        body["data"]["token"]
            .as_str()
            .expect("token in verify response")
            .to_string()
    }

    /// Read the OTP persisted for an account straight out of the database.
    pub async fn stored_otp(&self, email: &str) -> String {
        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email.to_lowercase()))
            .one(self.state.db.as_ref())
            .await
            .expect("query user")
            .expect("user exists");
        account.otp_code.expect("user has a pending OTP")
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
