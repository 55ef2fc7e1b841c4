use axum::{
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    Form, Json,
};
use tracing::{info, instrument};

use super::types::PostMessageRequest;
use crate::shared::{AppError, AppState};

/// GET /
pub async fn welcome() -> (StatusCode, &'static str) {
    (StatusCode::OK, "Welcome")
}

/// HTTP handler for posting a message into the chat
///
/// POST /post
/// Accepts a JSON or form-encoded body and blocks until the chat platform
/// has answered, because the caller wants to know whether it worked.
#[instrument(name = "post_message", skip(state, request), fields(method = %request.method()))]
pub async fn post_message(
    State(state): State<AppState>,
    request: Request,
) -> Result<&'static str, AppError> {
    info!("Posting new message");

    let body = extract_message(request).await?;

    let mut message = state.bridge.acquire();
    message.channel.push_str(&body.channel);
    message.text.push_str(&body.message);
    if let Some(params) = body.params {
        message.params.merge_from(params);
    }

    let receipt = state
        .bridge
        .submit(message)
        .await
        .map_err(|e| AppError::PostFailed(e.to_string()))?;

    info!(
        channel = %receipt.channel,
        ts = %receipt.ts,
        "Message posted successfully"
    );

    Ok("Sent")
}

/// Decodes the request body according to its content type
async fn extract_message(request: Request) -> Result<PostMessageRequest, AppError> {
    if request.method() != Method::POST {
        return Err(AppError::BadRequest(format!(
            "unsupported method: {}",
            request.method()
        )));
    }

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let body = match mime.as_str() {
        "application/json" => {
            let Json(body) = Json::<PostMessageRequest>::from_request(request, &())
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            body
        }
        "application/x-www-form-urlencoded" => {
            let Form(body) = Form::<PostMessageRequest>::from_request(request, &())
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            body
        }
        _ => {
            return Err(AppError::BadRequest(format!(
                "unknown content type: {}",
                content_type
            )))
        }
    };

    if body.channel.is_empty() {
        return Err(AppError::BadRequest("channel cannot be empty".to_string()));
    }

    Ok(body)
}
