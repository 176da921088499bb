//! Google Cloud collaborators: Cloud Storage, Document AI batch processing,
//! and service-account authentication, all over the REST APIs.

use medex_core::error::{MedexError, Result};

mod auth;
mod documentai;
mod storage;

pub use auth::ServiceAccountTokenSource;
pub use documentai::DocumentAiClient;
pub use storage::GcsObjectStore;

/// Turns a non-2xx response into [`MedexError::Api`], keeping the body as
/// the message.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    service: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    Err(MedexError::Api {
        service: service.to_string(),
        status: status.as_u16(),
        message: body,
    })
}
