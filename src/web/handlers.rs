use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::AccessError;
use crate::models::Expiration;
use crate::state::AppState;

const INDEX: &str = include_str!("../../templates/index.html");
const UPLOAD: &str = include_str!("../../templates/upload.html");
const SHARE: &str = include_str!("../../templates/share.html");
const VIEW: &str = include_str!("../../templates/view.html");
const NOT_FOUND: &str = include_str!("../../templates/404.html");
const SERVER_ERROR: &str = include_str!("../../templates/error.html");

/// Fills `{{name}}` placeholders. Values are ids, dates and configured
/// origins, so no escaping is done.
fn render(template: &str, values: &[(&str, &str)]) -> Html<String> {
    let mut page = template.to_string();
    for (name, value) in values {
        page = page.replace(&format!("{{{{{}}}}}", name), value);
    }
    Html(page)
}

fn format_expiration(expiration: OffsetDateTime) -> String {
    let format = format_description!(
        "[month repr:short] [day padding:none], [year] [hour repr:12 padding:none]:[minute] [period] UTC"
    );
    expiration
        .format(&format)
        .unwrap_or_else(|_| expiration.to_string())
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX)
}

pub async fn upload_page() -> Html<String> {
    let options: String = Expiration::ALL
        .iter()
        .map(|e| format!("<option value=\"{0}\">{0}</option>", e.as_str()))
        .collect();
    render(UPLOAD, &[("expiration_options", options.as_str())])
}

pub async fn share_page(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(share_id) = uuid::Uuid::parse_str(&id) else {
        return not_found().await.into_response();
    };

    match state.access.share_details(&share_id).await {
        Ok(details) => {
            let share_link = format!(
                "{}/files/view/{}",
                state.config.server.base_url.trim_end_matches('/'),
                details.view_id
            );
            render(
                SHARE,
                &[
                    ("share_id", details.share_id.to_string().as_str()),
                    ("share_link", share_link.as_str()),
                    ("expiration", format_expiration(details.expiration).as_str()),
                ],
            )
            .into_response()
        }
        Err(AccessError::NotFound(_)) => not_found().await.into_response(),
        Err(e) => {
            tracing::error!(share_id = %share_id, error = %e, "Failed to load share page");
            server_error().into_response()
        }
    }
}

pub async fn view_page(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(view_id) = uuid::Uuid::parse_str(&id) else {
        return not_found().await.into_response();
    };

    match state.access.view_details(&view_id).await {
        Ok(details) => render(
            VIEW,
            &[
                ("view_id", details.view_id.to_string().as_str()),
                ("expiration", format_expiration(details.expiration).as_str()),
            ],
        )
        .into_response(),
        Err(AccessError::NotFound(_)) => not_found().await.into_response(),
        Err(e) => {
            tracing::error!(view_id = %view_id, error = %e, "Failed to load view page");
            server_error().into_response()
        }
    }
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND))
}

/// Generic failure page. The cause is only logged.
fn server_error() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR))
}
