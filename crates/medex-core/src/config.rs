use serde::{Deserialize, Serialize};

use crate::error::{MedexError, Result};

/// Where the service-account document comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsSource {
    /// Discrete `GCP_*` environment variables.
    Env,
    /// One pre-formed JSON blob in `GCP_CREDENTIALS_JSON`.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub gcp_project_id: String,
    pub gcp_location: String,
    pub gcp_processor_id: String,
    pub gcp_bucket_name: String,
    pub mime_type: String,
    pub field_mask: Option<String>,
    pub job_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub persist_dir: Option<String>,
    pub parallel: bool,
    pub credentials_source: CredentialsSource,
    pub openai_api_key: String,
    pub openai_model: String,
    pub server_host: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            gcp_project_id: std::env::var("GCP_PROJECT_ID").unwrap_or_default(),
            gcp_location: std::env::var("GCP_LOCATION").unwrap_or_else(|_| "us".into()),
            gcp_processor_id: std::env::var("GCP_PROCESSOR_ID").unwrap_or_default(),
            gcp_bucket_name: std::env::var("GCP_BUCKET_NAME").unwrap_or_default(),
            mime_type: std::env::var("MEDEX_MIME_TYPE")
                .unwrap_or_else(|_| "application/pdf".into()),
            field_mask: std::env::var("MEDEX_FIELD_MASK")
                .ok()
                .filter(|m| !m.trim().is_empty()),
            job_timeout_secs: std::env::var("MEDEX_JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(400),
            poll_interval_secs: std::env::var("MEDEX_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            persist_dir: std::env::var("MEDEX_PERSIST_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty()),
            parallel: std::env::var("MEDEX_PARALLEL")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            credentials_source: match std::env::var("MEDEX_CREDENTIALS").as_deref() {
                Ok("json") => CredentialsSource::Json,
                _ => CredentialsSource::Env,
            },
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4-turbo".into()),
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }

    /// Reports every required key that is empty, and a zero poll interval.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("GCP_PROJECT_ID", &self.gcp_project_id),
            ("GCP_PROCESSOR_ID", &self.gcp_processor_id),
            ("GCP_BUCKET_NAME", &self.gcp_bucket_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();

        if !missing.is_empty() {
            return Err(MedexError::Config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(MedexError::Config(
                "MEDEX_POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Full resource name of the configured processor.
    pub fn processor_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.gcp_project_id, self.gcp_location, self.gcp_processor_id
        )
    }
}
