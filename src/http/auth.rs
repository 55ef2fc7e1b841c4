use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::shared::{AppError, AppState};

/// Shared-secret header check
///
/// Does nothing unless a secret is configured. Usage:
/// `.route_layer(middleware::from_fn_with_state(state.clone(), require_shared_secret))`
#[instrument(skip(state, req, next), fields(uri = %req.uri()))]
pub async fn require_shared_secret(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(secret) = &state.shared_secret else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(secret.header.as_str())
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(value) if value == secret.value => {
            debug!(header = %secret.header, "Shared secret accepted");
            Ok(next.run(req).await)
        }
        Some(_) => {
            warn!(header = %secret.header, "Shared secret mismatch");
            Err(AppError::Unauthorized("invalid shared secret".to_string()))
        }
        None => {
            warn!(header = %secret.header, "Missing shared secret header");
            Err(AppError::Unauthorized("missing shared secret".to_string()))
        }
    }
}
