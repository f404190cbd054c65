use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::IssuedToken,
        password::{Passwords, MAX_PASSWORD_CHARS},
        repo_types::{NewUser, User},
    },
    error::AppError,
    state::AppState,
};

const MAX_EMAIL_CHARS: usize = 320;
const MAX_DISPLAY_NAME_CHARS: usize = 255;

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.chars().count() <= MAX_EMAIL_CHARS && EMAIL_RE.is_match(email)
}

/// Checks a registration request and returns the normalized fields.
fn validate_registration(
    req: RegisterRequest,
    min_password_chars: usize,
) -> Result<(String, String, Option<String>), AppError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!("invalid email");
        return Err(AppError::invalid("Invalid email"));
    }

    let password_chars = req.password.chars().count();
    if password_chars < min_password_chars {
        return Err(AppError::invalid(format!(
            "Password must be at least {min_password_chars} characters"
        )));
    }
    if password_chars > MAX_PASSWORD_CHARS {
        return Err(AppError::invalid(format!(
            "Password must be at most {MAX_PASSWORD_CHARS} characters"
        )));
    }

    let display_name = req
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if let Some(name) = &display_name {
        if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(AppError::invalid(format!(
                "Display name must be at most {MAX_DISPLAY_NAME_CHARS} characters"
            )));
        }
    }

    Ok((email, req.password, display_name))
}

/// Runs Argon2 off the async workers.
async fn hash_blocking(passwords: Arc<Passwords>, plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || passwords.hash(&plain))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::from)
}

async fn verify_unknown_blocking(
    passwords: Arc<Passwords>,
    plain: String,
) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || passwords.verify_unknown(&plain))
        .await
        .map_err(AppError::internal)
}

async fn verify_blocking(
    passwords: Arc<Passwords>,
    plain: String,
    hash: String,
) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || passwords.verify(&plain, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(|e| {
            error!(error = %e, "stored password hash unusable");
            AppError::from(e)
        })
}

pub async fn register_user(state: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    let (email, password, display_name) =
        validate_registration(req, state.config.password_min_length)?;

    // Hash before opening the transaction so no connection is held while
    // Argon2 runs.
    let password_hash = hash_blocking(state.passwords.clone(), password).await?;

    let mut tx = state.store.begin().await?;
    if tx.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    let user = tx
        .insert_user(&NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
        })
        .await?;
    tx.commit().await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Verifies credentials and issues an access token. Every failure mode
/// (unknown email, wrong password, inactive account) is the same
/// [`AppError::Unauthorized`].
pub async fn login(state: &AppState, req: LoginRequest) -> Result<IssuedToken, AppError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!("login with malformed email");
        return Err(AppError::Unauthorized);
    }

    let user = {
        let mut tx = state.store.begin().await?;
        tx.find_user_by_email(&email).await?
    };
    let Some(user) = user else {
        verify_unknown_blocking(state.passwords.clone(), req.password).await?;
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized);
    };

    let ok = verify_blocking(
        state.passwords.clone(),
        req.password,
        user.password_hash.clone(),
    )
    .await?;
    if !ok {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized);
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login inactive user");
        return Err(AppError::Unauthorized);
    }

    let issued = state.tokens.issue(user.id, state.tokens.ttl())?;
    info!(user_id = %user.id, "user logged in");
    Ok(issued)
}
