use crate::AppState;
use crate::api::error::AppError;
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

/// Extracts and verifies the bearer token, then injects the verified
/// [`IdentityClaims`](crate::services::identity::IdentityClaims) as a
/// request extension for the handler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Preflight requests never carry credentials.
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .ok_or(AppError::MissingToken)?;

    let claims = state
        .verifier
        .verify(&token)
        .await
        .map_err(|e| AppError::InvalidToken(e.to_string()))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
