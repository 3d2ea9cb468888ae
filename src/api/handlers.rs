use axum::{
    Json,
    async_trait,
    extract::{Form, FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Redirect},
};
use bytes::Bytes;
use secrecy::SecretString;
use uuid::Uuid;

use crate::blob::BlobUpload;
use crate::dto::*;
use crate::error::{AccessError, AccessResult};
use crate::models::Expiration;
use crate::passphrase::hash_passphrase;
use crate::state::AppState;

pub type ApiResult<T> = Result<T, ApiError>;

/// Path ids that are not UUIDs cannot name a record.
pub fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found("Not found in our records"))
}

/// A passphrase taken from a JSON or urlencoded form body.
pub struct PassphraseInput(pub SecretString);

#[async_trait]
impl<S> FromRequest<S> for PassphraseInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let body = if is_json {
            Json::<PassphraseRequest>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(|e| ApiError::bad_request(e.body_text()))?
        } else {
            Form::<PassphraseRequest>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(|e| ApiError::bad_request(e.body_text()))?
        };

        Ok(PassphraseInput(require_passphrase(body.passphrase)?))
    }
}

fn require_passphrase(raw: Option<String>) -> AccessResult<SecretString> {
    raw.filter(|p| !p.is_empty())
        .map(SecretString::from)
        .ok_or_else(|| AccessError::validation("passphrase", "Required"))
}

fn parse_expiration(raw: Option<&str>) -> AccessResult<Expiration> {
    raw.ok_or_else(|| AccessError::validation("expiration", "Required"))?
        .parse::<Expiration>()
        .map_err(|message| AccessError::validation("expiration", message))
}

#[derive(Default)]
struct UploadForm {
    attachment: Option<BlobUpload>,
    passphrase: Option<String>,
    expiration: Option<String>,
}

async fn read_upload_form(multipart: &mut Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "attachment" => {
                let filename = field.file_name().unwrap_or("attachment").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes: Bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.attachment = Some(BlobUpload {
                        bytes,
                        filename,
                        mime_type,
                    });
                }
            }
            "passphrase" => form.passphrase = Some(field.text().await?),
            "expiration" => form.expiration = Some(field.text().await?),
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_upload_form(&mut multipart).await?;

    let passphrase = require_passphrase(form.passphrase)?;
    let expiration = parse_expiration(form.expiration.as_deref())?;

    let Some(attachment) = form.attachment else {
        return Err(ApiError::bad_request("File is required")
            .with_field("attachment", "Invalid or missing file"));
    };

    tracing::debug!(
        filename = %attachment.filename,
        size = attachment.bytes.len(),
        expiration = %expiration,
        "Uploading file"
    );

    let hashed = hash_passphrase(passphrase)
        .await
        .map_err(AccessError::from)?;
    let receipt = state.access.upload(attachment, hashed, expiration).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataEnvelope::new(RedirectData::share_page(&receipt.share_id))),
    ))
}

/// Deletes a share early. The owner proves ownership with the passphrase.
pub async fn revoke_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
    PassphraseInput(passphrase): PassphraseInput,
) -> ApiResult<impl IntoResponse> {
    let share_id = parse_id(&id)?;

    let report = state.access.revoke(&share_id, passphrase).await?;
    if !report.is_complete() {
        // The record is gone or going; a leftover blob is the sweep's problem.
        tracing::warn!(share_id = %share_id, failures = %report.failure_summary(), "Revocation left artifacts behind");
    }

    Ok(Json(DataEnvelope::new(RedirectData::upload_page())))
}

/// Unlocks a file and sends the browser to its short-lived URL.
pub async fn unlock_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    PassphraseInput(passphrase): PassphraseInput,
) -> ApiResult<Redirect> {
    let view_id = parse_id(&id)?;
    let signed = state.access.view(&view_id, passphrase).await?;
    Ok(Redirect::to(&signed.url))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.metadata.health_check().await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("disconnected: {}", e),
    };

    Json(HealthCheckResponse {
        status: "ok".to_string(),
        database,
        timestamp: time::OffsetDateTime::now_utc(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
