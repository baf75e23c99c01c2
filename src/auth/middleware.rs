use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::COOKIE, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use super::session::{SessionError, extract_session_token, get_session};
use crate::server::AppState;
use crate::types::User;

/// Where unauthenticated callers are sent.
pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Extractor that requires a signed-in user.
///
/// Rejection never reaches the handler: callers without a live session are
/// redirected to the sign-in page before any record is read or written.
pub struct RequireUser {
    pub session_id: String,
    pub user: User,
}

#[derive(Debug)]
pub enum AuthRejection {
    SignIn,
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::SignIn => Redirect::to(SIGN_IN_PATH).into_response(),
            AuthRejection::InternalError => {
                let body = json!({ "data": null, "error": "Internal server error" });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw_token = extract_session_token(
            parts
                .headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|h| h.to_str().ok()),
        )
        .ok_or(AuthRejection::SignIn)?;

        let store = state.database.connect().await.map_err(|e| {
            tracing::error!("Session lookup without store: {e}");
            AuthRejection::InternalError
        })?;

        let validated =
            get_session(store.as_ref(), &state.hasher, &raw_token).map_err(|e| match e {
                SessionError::InvalidToken | SessionError::Expired => {
                    tracing::debug!("Rejected session: {e:?}");
                    AuthRejection::SignIn
                }
                SessionError::InternalError => AuthRejection::InternalError,
            })?;

        Ok(RequireUser {
            session_id: validated.session.id,
            user: validated.user,
        })
    }
}
