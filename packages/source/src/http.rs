//! Single-attempt HTTP helper for JSON endpoints.
//!
//! Collection tasks are best-effort: a failed request is counted and the
//! task is picked up again on the next run, so nothing here retries. What
//! this module adds over a bare `send()` is status checking and a useful
//! log line when the body is not JSON.

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends `request` once and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails, the server answers with a
/// non-2xx status, or the body is not valid JSON.
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, SourceError> {
    let response = request.send().await?;

    let status = response.status();
    let mut url = response.url().clone();
    url.set_query(None);
    let url = url.to_string();

    if !status.is_success() {
        log::warn!("HTTP {status} from {url}");
        return Err(SourceError::Status {
            status: status.as_u16(),
            url,
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             content-type: {content_type:?}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        SourceError::Json(e)
    })
}

/// Truncates `text` to [`BODY_PREVIEW_LEN`] bytes on a char boundary.
fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
