use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores both the `User` and its `Actor` in
/// the request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    let actor = Actor::try_from(&user).map_err(AppError::Forbidden)?;
    debug!("Authenticated {} with {:?}", actor.id, actor.capabilities);

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}
