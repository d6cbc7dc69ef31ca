//! User account API endpoints.
//!
//! - POST `/` - Create an account
//! - POST `/login` - Exchange username and password for access and refresh tokens
//! - GET `/{username}` - Get own profile
//! - PUT `/{username}/interests` - Replace own interests
//! - DELETE `/{username}` - Delete own account and everything it owns

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, header::USER_AGENT, request::Parts},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::error::{ApiError, ResultExt, validate_username};
use crate::auth::{ApiAuth, AuthenticatedUser, IpExtractor, extract_client_ip, require_auth};
use crate::db::{Database, NewSession, NewUser, User, is_unique_violation};
use crate::impl_has_authenticator;
use crate::password::{MIN_PASSWORD_LENGTH, hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_user_create};
use crate::token::Authenticator;

const MAX_INTERESTS: usize = 32;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub authenticator: Arc<dyn Authenticator>,
    pub access_token_duration: Duration,
    pub refresh_token_duration: Duration,
    pub no_signup: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
    pub ip_extractor: Option<IpExtractor>,
}

impl_has_authenticator!(UsersState);

pub fn router(state: UsersState) -> Router {
    let protected = Router::new()
        .route("/{username}", get(get_user).delete(delete_user))
        .route("/{username}/interests", put(update_interests))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<UsersState>,
        ));

    let login = Router::new()
        .route("/login", post(login_user))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let router = protected.merge(login);

    let router = if state.no_signup {
        router
    } else {
        router.merge(Router::new().route("/", post(create_user)).route_layer(
            middleware::from_fn_with_state(
                state.rate_limit_config.clone(),
                rate_limit_user_create,
            ),
        ))
    };

    router.with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    password: String,
    email: String,
    first_name: String,
    last_name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct UpdateInterestsRequest {
    interests: Vec<String>,
}

#[derive(Serialize)]
struct UserResponse {
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    interests: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            interests: user.interests,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
struct LoginResponse {
    session_id: String,
    access_token: String,
    access_token_expires_at: DateTime<Utc>,
    refresh_token: String,
    refresh_token_expires_at: DateTime<Utc>,
    user: UserResponse,
}

/// Device details recorded on the session at login.
struct ClientInfo {
    user_agent: String,
    client_ip: String,
}

impl FromRequestParts<UsersState> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &UsersState,
    ) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(ClientInfo {
            user_agent,
            client_ip: extract_client_ip(&*parts, state.ip_extractor.as_ref())
                .unwrap_or_default(),
        })
    }
}

// --- Helpers ---

fn require_field(value: &str, name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} cannot be empty", name)));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

/// Run argon2 off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, argon2::password_hash::Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("Password task failed: {}", e);
            ApiError::internal("Failed to process password")
        })?
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::internal("Failed to process password")
        })
}

/// Username-scoped routes: syntax first, then ownership, then the store.
fn authorize_username(auth: &AuthenticatedUser, username: &str) -> Result<(), ApiError> {
    validate_username(username)?;
    if !auth.owns(username) {
        return Err(ApiError::not_owner());
    }
    Ok(())
}

// --- Handlers ---

async fn create_user(
    State(state): State<UsersState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    validate_username(username)?;

    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    let email = payload.email.trim();
    validate_email(email)?;
    require_field(&payload.first_name, "First name")?;
    require_field(&payload.last_name, "Last name")?;

    let password = payload.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let user = match state
        .db
        .users()
        .create(&NewUser {
            username,
            password_hash: &password_hash,
            email,
            first_name: payload.first_name.trim(),
            last_name: payload.last_name.trim(),
        })
        .await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Username or email is already taken"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    info!(username = %user.username, "User created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn login_user(
    State(state): State<UsersState>,
    client: ClientInfo,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&payload.username)?;

    let user = state
        .db
        .users()
        .get_by_username(&payload.username)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let password = payload.password;
    let stored_hash = user.password_hash.clone();
    let matches = blocking(move || verify_password(&password, &stored_hash)).await?;
    if !matches {
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    let (access_token, access_payload) = state
        .authenticator
        .create_token(&user.username, state.access_token_duration)
        .map_err(|e| {
            error!("Failed to create access token: {}", e);
            ApiError::internal("Failed to create token")
        })?;

    let (refresh_token, refresh_payload) = state
        .authenticator
        .create_token(&user.username, state.refresh_token_duration)
        .map_err(|e| {
            error!("Failed to create refresh token: {}", e);
            ApiError::internal("Failed to create token")
        })?;

    let session = state
        .db
        .sessions()
        .create(&NewSession {
            id: refresh_payload.id,
            username: &user.username,
            refresh_token: &refresh_token,
            user_agent: &client.user_agent,
            client_ip: &client.client_ip,
            expires_at: refresh_payload.expired_at,
        })
        .await
        .db_err("Failed to create session")?;

    info!(username = %user.username, session_id = %session.id, "User logged in");

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            session_id: session.id,
            access_token,
            access_token_expires_at: access_payload.expired_at,
            refresh_token,
            refresh_token_expires_at: refresh_payload.expired_at,
            user: UserResponse::from(user),
        }),
    ))
}

async fn get_user(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_username(&auth, &username)?;

    let user = state
        .db
        .users()
        .get_by_username(&username)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}

async fn update_interests(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    Path(username): Path<String>,
    Json(payload): Json<UpdateInterestsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_username(&auth, &username)?;

    if payload.interests.len() > MAX_INTERESTS {
        return Err(ApiError::bad_request(format!(
            "Cannot have more than {} interests",
            MAX_INTERESTS
        )));
    }

    let interests: Vec<String> = payload
        .interests
        .iter()
        .map(|interest| interest.trim().to_string())
        .collect();
    if interests.iter().any(String::is_empty) {
        return Err(ApiError::bad_request("Interests cannot be empty"));
    }

    let user = state
        .db
        .users()
        .update_interests(&username, &interests)
        .await
        .db_err("Failed to update interests")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}

async fn delete_user(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_username(&auth, &username)?;

    let deleted = state
        .db
        .users()
        .delete_account(&username)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(username = %username, "User deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}
