//! Sign-up, sign-in and sign-out.
//!
//! A successful sign-up or sign-in sets the session cookie and redirects to
//! the dashboard; sign-out removes the session and clears the cookie.

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Redirect, Response},
    routing::post,
};
use chrono::Utc;
use uuid::Uuid;

use super::actions::DASHBOARD_PATH;
use super::dto::{SignInForm, SignUpForm};
use super::response::{ActionError, StoreResultExt};
use super::validation::{
    FORM_ERROR, INVALID_CREDENTIALS, ValidationReport, parse_sign_in, parse_sign_up,
};
use crate::auth::{RequireUser, SIGN_IN_PATH, clear_session_cookie, session_cookie, start_session};
use crate::server::AppState;
use crate::store::Store;
use crate::types::User;

pub fn account_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
        .route("/signout", post(sign_out))
}

/// Opens a session for the user and sends them to the dashboard with the
/// session cookie set.
fn enter_dashboard(
    state: &AppState,
    store: &dyn Store,
    user_id: &str,
) -> Result<Response, ActionError> {
    let (session, raw_token) =
        start_session(store, &state.hasher, user_id).api_err("Failed to start session")?;
    tracing::info!(user_id, session_id = %session.id, "Session started");

    let cookie = session_cookie(&raw_token, state.secure_cookies);
    Ok(([(SET_COOKIE, cookie)], Redirect::to(DASHBOARD_PATH)).into_response())
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignUpForm>,
) -> Result<Response, ActionError> {
    let input = parse_sign_up(&form).into_result()?;
    let store = state.store().await?;

    let password_hash = state
        .hasher
        .hash(&input.password)
        .api_err("Failed to hash password")?;
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        password_hash,
        name: input.name,
        profile_image: None,
        customer_id: None,
        customer_pending_key: None,
        created_at: Utc::now(),
    };

    store.create_user(&user).or_conflict("Failed to create account")?;
    tracing::info!(user_id = %user.id, "Account created");

    enter_dashboard(&state, store.as_ref(), &user.id)
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignInForm>,
) -> Result<Response, ActionError> {
    let input = parse_sign_in(&form).into_result()?;
    let store = state.store().await?;

    let user = store
        .get_user_by_email(&input.email)
        .api_err("Failed to load user")?;

    let verified = match &user {
        Some(user) => state
            .hasher
            .verify(&input.password, &user.password_hash)
            .api_err("Failed to verify password")?,
        None => state
            .hasher
            .verify_decoy(&input.password)
            .api_err("Failed to verify password")?,
    };

    match user {
        Some(user) if verified => enter_dashboard(&state, store.as_ref(), &user.id),
        _ => {
            tracing::debug!("Rejected sign-in");
            Err(ValidationReport::single(FORM_ERROR, INVALID_CREDENTIALS).into())
        }
    }
}

pub async fn sign_out(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ActionError> {
    let store = state.store().await?;
    store
        .delete_session(&auth.session_id)
        .api_err("Failed to end session")?;
    tracing::info!(user_id = %auth.user.id, "Session ended");

    let cookie = clear_session_cookie(state.secure_cookies);
    Ok(([(SET_COOKIE, cookie)], Redirect::to(SIGN_IN_PATH)).into_response())
}
