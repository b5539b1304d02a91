use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tracing::instrument;

use crate::api::server::{AppState, RouteError};
use crate::compose::{Background, ComposeRequest};

/// `POST /api/compose`: a `request` part holding the JSON [`ComposeRequest`] and an optional
/// `background` image part. Answers with the PNG as an attachment.
#[instrument(skip(state, multipart))]
pub async fn compose(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, RouteError> {
    let mut request: Option<ComposeRequest> = None;
    let mut background: Option<Background> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("request") => {
                let bytes = field.bytes().await?;
                request = Some(serde_json::from_slice(&bytes).map_err(|e| {
                    RouteError::BadRequest(format!("invalid compose request: {e}"))
                })?);
            }
            Some("background") => {
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    background = Some(Background::Image(bytes.to_vec()));
                }
            }
            other => tracing::debug!(field = ?other, "ignoring multipart field"),
        }
    }

    let request = request
        .ok_or_else(|| RouteError::BadRequest(String::from("Missing request part")))?;
    let png = state.compositor.render_png(&request, background).await?;

    Ok((
        [
            (CONTENT_TYPE, String::from("image/png")),
            (CONTENT_DISPOSITION, attachment(&png.filename)),
        ],
        png.bytes,
    )
        .into_response())
}

/// `Content-Disposition` value; characters a quoted header value cannot carry become `_`.
fn attachment(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("attachment; filename=\"{safe}\"")
}
