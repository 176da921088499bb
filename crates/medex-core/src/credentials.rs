use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MedexError, Result};

/// Service-account credential document as issued by the cloud provider.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default = "default_key_type")]
    pub key_type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub auth_uri: String,
    #[serde(default)]
    pub token_uri: String,
    #[serde(default)]
    pub auth_provider_x509_cert_url: String,
    #[serde(default)]
    pub client_x509_cert_url: String,
    #[serde(default = "default_universe_domain")]
    pub universe_domain: String,
}

fn default_key_type() -> String {
    "service_account".to_string()
}

fn default_universe_domain() -> String {
    "googleapis.com".to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("type", &self.key_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("project_id", &self.project_id),
            ("private_key_id", &self.private_key_id),
            ("private_key", &self.private_key),
            ("client_email", &self.client_email),
            ("client_id", &self.client_id),
            ("auth_uri", &self.auth_uri),
            ("token_uri", &self.token_uri),
            ("auth_provider_x509_cert_url", &self.auth_provider_x509_cert_url),
            ("client_x509_cert_url", &self.client_x509_cert_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MedexError::CredentialsInvalid(format!(
                "Missing required GCP credentials: {}",
                missing.join(", ")
            )))
        }
    }
}

/// A strategy for assembling the service-account document.
pub trait CredentialsProvider: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self) -> Result<ServiceAccountKey>;
}

/// Reads the document from discrete `GCP_*` environment variables.
pub struct EnvCredentials {
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Uses `lookup` instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> String {
        (self.lookup)(key).unwrap_or_default()
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialsProvider for EnvCredentials {
    fn name(&self) -> &str {
        "env"
    }

    fn load(&self) -> Result<ServiceAccountKey> {
        let key_type = self.var("GCP_SERVICE_TYPE");
        let universe_domain = self.var("GCP_UNIVERSE_DOMAIN");

        Ok(ServiceAccountKey {
            key_type: if key_type.is_empty() {
                default_key_type()
            } else {
                key_type
            },
            project_id: self.var("GCP_SERVICE_PROJECT_ID"),
            private_key_id: self.var("GCP_PRIVATE_KEY_ID"),
            // Keys pasted into .env files carry literal "\n" sequences.
            private_key: self.var("GCP_PRIVATE_KEY").replace("\\n", "\n"),
            client_email: self.var("GCP_CLIENT_EMAIL"),
            client_id: self.var("GCP_CLIENT_ID"),
            auth_uri: self.var("GCP_AUTH_URI"),
            token_uri: self.var("GCP_TOKEN_URI"),
            auth_provider_x509_cert_url: self.var("GCP_AUTH_PROVIDER_X509_CERT_URL"),
            client_x509_cert_url: self.var("GCP_CLIENT_X509_CERT_URL"),
            universe_domain: if universe_domain.is_empty() {
                default_universe_domain()
            } else {
                universe_domain
            },
        })
    }
}

/// Parses one pre-formed JSON document.
pub struct JsonCredentials {
    blob: String,
}

impl JsonCredentials {
    pub fn new(blob: impl Into<String>) -> Self {
        Self { blob: blob.into() }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("GCP_CREDENTIALS_JSON").unwrap_or_default())
    }
}

impl CredentialsProvider for JsonCredentials {
    fn name(&self) -> &str {
        "json"
    }

    fn load(&self) -> Result<ServiceAccountKey> {
        if self.blob.trim().is_empty() {
            return Err(MedexError::CredentialsInvalid(
                "GCP_CREDENTIALS_JSON is empty".to_string(),
            ));
        }
        serde_json::from_str(&self.blob)
            .map_err(|e| MedexError::CredentialsInvalid(format!("Malformed credentials JSON: {e}")))
    }
}

/// Validated credentials, written once to an owner-only temporary file and
/// shared by every collaborator. The file is removed when the last clone drops.
#[derive(Clone, Debug)]
pub struct CredentialsHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    key: ServiceAccountKey,
    file: tempfile::TempPath,
}

impl CredentialsHandle {
    pub fn create(provider: &dyn CredentialsProvider) -> Result<Self> {
        let key = provider.load()?;
        key.validate()?;

        let mut file = tempfile::Builder::new()
            .prefix("medex-credentials-")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer_pretty(&mut file, &key)?;
        file.flush()?;

        let file = file.into_temp_path();
        tracing::info!(
            provider = provider.name(),
            client_email = %key.client_email,
            path = %file.display(),
            "Credentials written"
        );

        Ok(Self {
            inner: Arc::new(HandleInner { key, file }),
        })
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.inner.key
    }

    /// Location of the credential document on disk.
    pub fn path(&self) -> &Path {
        &self.inner.file
    }
}
