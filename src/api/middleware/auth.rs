use crate::api::error::AppError;
use crate::models::Principal;
use crate::utils::auth::validate_jwt;
use crate::{AppState, entities::prelude::Users};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Resolves the caller into a [`Principal`] extension. No token means an
/// anonymous caller; a bad token or an unknown user is refused.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = if let Some(t) = auth_header {
        Some(t)
    } else {
        // Try query parameter
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    };

    let principal = match token {
        None => Principal::anonymous(),
        Some(token) => {
            let claims = validate_jwt(&token, &state.config.jwt_secret)
                .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

            // The user may have been removed since the token was issued.
            let user = Users::find_by_id(claims.sub.clone())
                .one(&state.db)
                .await?
                .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;

            Principal {
                user_id: Some(user.id),
                is_admin: user.is_admin,
            }
        }
    };

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
