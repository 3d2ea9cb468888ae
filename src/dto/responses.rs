use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// `{ "data": ... }` success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Where the browser should go next.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RedirectData {
    pub redirect: String,
}

impl RedirectData {
    pub fn share_page(share_id: &uuid::Uuid) -> Self {
        Self {
            redirect: format!("/files/share/{}", share_id),
        }
    }

    pub fn upload_page() -> Self {
        Self {
            redirect: "/files/upload".to_string(),
        }
    }
}

/// Body of the unlock and revoke forms. Accepted as JSON or urlencoded.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PassphraseRequest {
    pub passphrase: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub version: String,
}
