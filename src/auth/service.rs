//! The auth workflow: credential verification and session issuance for
//! Register, Login, and VerifyToken.

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password,
        repo::{is_unique_violation, NewUser, User},
    },
    error::{AppError, AppResult},
    state::AppState,
};

/// Identical message for unknown email and wrong password; anything more
/// specific lets callers enumerate accounts.
const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const EMAIL_TAKEN: &str = "Email already registered";

/// A freshly authenticated user together with their session token.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn require(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub async fn register(state: &AppState, mut input: RegisterRequest) -> AppResult<Session> {
    require(&input.name, "Name")?;
    require(&input.email, "Email")?;
    require(&input.password, "Password")?;

    if let Some(confirm) = &input.confirm_password {
        if confirm != &input.password {
            return Err(AppError::Validation("Passwords do not match".into()));
        }
    }

    input.email = input.email.trim().to_lowercase();
    if !is_valid_email(&input.email) {
        warn!(email = %input.email, "invalid email");
        return Err(AppError::Validation("Invalid email address".into()));
    }

    if User::find_by_email(&state.db, &input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(AppError::Conflict(EMAIL_TAKEN.into()));
    }

    let hash = password::hash(input.password.clone()).await?;

    let new = NewUser {
        email: &input.email,
        name: input.name.trim(),
        age: input.age,
        fitness_goal: input.fitness_goal.as_deref(),
        experience: input.experience.as_deref(),
        workout_time: input.workout_time.as_deref(),
        dietary_preference: input.dietary_preference.as_deref(),
        password_hash: &hash,
    };
    let user = match User::create(&state.db, &new).await {
        Ok(u) => u,
        // Lost the insert race to a concurrent register; same outcome as
        // the pre-insert check.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %input.email, "duplicate email at insert");
            return Err(AppError::Conflict(EMAIL_TAKEN.into()));
        }
        Err(e) => return Err(AppError::Storage(e)),
    };

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Session { user, token })
}

pub async fn login(state: &AppState, mut input: LoginRequest) -> AppResult<Session> {
    require(&input.email, "Email")?;
    require(&input.password, "Password")?;

    input.email = input.email.trim().to_lowercase();

    let Some(user) = User::find_by_email(&state.db, &input.email).await? else {
        warn!(email = %input.email, "login for unknown email");
        return Err(AppError::Auth(INVALID_CREDENTIALS.into()));
    };

    let ok = password::verify(input.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::Auth(INVALID_CREDENTIALS.into()));
    }

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Session { user, token })
}

/// Verify a raw bearer token and load its user. Idempotent, no side
/// effects.
pub async fn verify_token(state: &AppState, token: &str) -> AppResult<User> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify(token)
        .map_err(|_| AppError::Auth("Invalid or expired token".into()))?;

    let Some(user) = User::find_by_id(&state.db, claims.sub).await? else {
        warn!(user_id = %claims.sub, "token for vanished user");
        return Err(AppError::NotFound("User not found".into()));
    };
    Ok(user)
}
