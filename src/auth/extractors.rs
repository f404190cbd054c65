use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, warn};

use super::repo_types::User;
use crate::{error::AppError, items::repo_types::OwnerId, state::AppState};

/// The caller behind a valid bearer token, resolved to an active user.
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn owner(&self) -> OwnerId {
        OwnerId::authenticated(self.0.id)
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Header and token checks never touch the store.
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                debug!("missing Authorization header");
                AppError::Unauthorized
            })?;

        let token = bearer_token(header).ok_or_else(|| {
            debug!("invalid auth scheme");
            AppError::Unauthorized
        })?;

        let user_id = state.tokens.validate(token)?;

        let user = {
            let mut tx = state.store.begin().await?;
            tx.find_user_by_id(user_id).await?
        };
        match user {
            Some(user) if user.is_active => Ok(AuthUser(user)),
            Some(_) => {
                warn!(%user_id, "token for inactive user");
                Err(AppError::Unauthorized)
            }
            None => {
                warn!(%user_id, "token for unknown user");
                Err(AppError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token(""), None);
    }
}
