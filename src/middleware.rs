use std::sync::Arc;

use axum::{
    extract::State,
    http::{self, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, model::CurrentUser, AppState};

/// Rejects requests without a valid bearer token and exposes the token's
/// user to handlers as a [`CurrentUser`] extension.
pub async fn mw_require_auth<B>(
    State(data): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_owned()))?;

    let token = bearer_token(auth_header)
        .ok_or_else(|| AppError::Unauthorized("Expected a bearer token".to_owned()))?;

    let claims = data.tokens.verify(token).map_err(AppError::from)?;

    tracing::debug!(user_id = claims.user_id, username = %claims.sub, "authenticated request");
    request.extensions_mut().insert(CurrentUser {
        id: claims.user_id,
        username: claims.sub,
    });

    Ok(next.run(request).await)
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
