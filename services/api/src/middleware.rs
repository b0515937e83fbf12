//! Authentication middleware for JWT bearer tokens

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use domain::models::Actor;
use tracing::warn;

use crate::{error::ApiError, jwt::JwtService, state::AppState};

pub type BearerHeader = TypedHeader<Authorization<Bearer>>;

/// Resolve the acting user from a bearer token, if it is valid
pub fn actor_from_bearer(jwt_service: &JwtService, bearer: Option<&BearerHeader>) -> Option<Actor> {
    let TypedHeader(authorization) = bearer?;
    match jwt_service.validate_token(authorization.token()) {
        Ok(claims) => Some(Actor::new(claims.sub)),
        Err(e) => {
            warn!("Rejected bearer token: {}", e);
            None
        }
    }
}

/// Require a valid bearer token and expose the [`Actor`] to handlers
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let actor =
        actor_from_bearer(&state.jwt_service, bearer.as_ref()).ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
