#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use declarest::app::{build_router, AppContext};
use declarest::config::AppConfig;
use declarest::email::LogMailer;
use declarest::model::ModelRegistry;
use declarest::store::MemoryStore;

pub const SECRET: &str = "integration-secret";

// Fixture deployment: an owner-scoped model exercising every field type,
// a reference target, and one public model.
const MODELS_YAML: &str = r#"
models:
  - name: todo
    access: USER
    fields:
      name:
        type: string
        opts: { required: true }
      points:
        type: number
      completed:
        type: boolean
      tags:
        type: array
        listType: string
      deadline:
        type: date
      project:
        type: reference
        referenceType: project
      code:
        type: string
        opts: { unique: true }
  - name: project
    access: USER
    fields:
      title:
        type: string
        opts: { required: true }
  - name: announcement
    access: PUBLIC
    fields:
      title:
        type: string
        opts: { required: true }
"#;

/// In-process application under test. The store is exposed so flows that
/// normally go through email (reset and magic-link tokens) can be driven
/// end to end.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn spawn() -> Self {
        let registry =
            ModelRegistry::from_yaml(MODELS_YAML).expect("fixture models must be valid");
        let store = Arc::new(MemoryStore::new());

        let config = AppConfig {
            project_name: "declarest-tests".to_string(),
            project_url: "http://localhost:6000".to_string(),
            project_secret: SECRET.to_string(),
            port: 0,
            models_path: String::new(),
            token_expiry_hours: 24,
            from_email: "no-reply@tests.local".to_string(),
        };

        let ctx = AppContext {
            store: store.clone(),
            mailer: Arc::new(LogMailer::new(config.email())),
            config: Arc::new(config),
        };

        Self {
            router: build_router(ctx, &registry),
            store,
        }
    }

    /// Fire one request at the router. Non-JSON response bodies come back
    /// as a JSON string so plain-text endpoints stay assertable.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, value))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, path, token, Some(body)).await
    }

    /// Register an account and return `(token, user_id)`.
    pub async fn signup(&self, email: &str) -> Result<(String, String)> {
        let (status, body) = self
            .post(
                "/signup",
                None,
                json!({ "email": email, "name": "Tester", "password": "hunter2" }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "signup failed: {} {}", status, body);

        let token = body["token"].as_str().unwrap_or_default().to_string();
        let user_id = body["user"]["id"].as_str().unwrap_or_default().to_string();
        Ok((token, user_id))
    }

    /// Create a record and return its stored form.
    pub async fn create(&self, model: &str, token: &str, body: Value) -> Result<Value> {
        let (status, body) = self.post(&format!("/{}", model), Some(token), body).await?;
        anyhow::ensure!(status == StatusCode::OK, "create failed: {} {}", status, body);
        Ok(body)
    }
}

/// Percent-encode a query-string value (the `where` parameter is JSON).
pub fn urlencode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
