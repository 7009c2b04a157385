//! Deployment configuration, loaded once from the environment at startup
//! and passed into the app state by value. Nothing here is a process-wide
//! singleton; handlers reach configuration through `AppContext` only.

use std::env;

use anyhow::Context;

use crate::email::EmailConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_name: String,
    /// Public base URL embedded in reset and magic-link emails.
    pub project_url: String,
    /// Token signing secret. Required; startup fails without it.
    pub project_secret: String,
    pub port: u16,
    /// Path to the YAML model-definition file.
    pub models_path: String,
    pub token_expiry_hours: u64,
    pub from_email: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let project_secret =
            env::var("PROJECT_SECRET").context("PROJECT_SECRET must be set")?;

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6000);

        let project_url =
            env::var("PROJECT_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));

        Ok(Self {
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "declarest".to_string()),
            project_url,
            project_secret,
            port,
            models_path: env::var("MODELS_PATH").unwrap_or_else(|_| "models.yaml".to_string()),
            // 400 days.
            token_expiry_hours: env::var("TOKEN_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9600),
            from_email: env::var("FROM_EMAIL")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
        })
    }

    pub fn email(&self) -> EmailConfig {
        EmailConfig {
            from_email: self.from_email.clone(),
        }
    }
}
