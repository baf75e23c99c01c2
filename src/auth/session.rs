use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{SecretHasher, parse_token};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Session, User};

pub const SESSION_COOKIE: &str = "quire_session";
pub const SESSION_TTL_DAYS: i64 = 30;

const MAX_LOOKUP_RETRIES: u32 = 3;

#[derive(Debug)]
pub enum SessionError {
    InvalidToken,
    Expired,
    InternalError,
}

pub struct ValidatedSession {
    pub session: Session,
    pub user: User,
}

/// Pulls the session token out of one or more `Cookie` header values.
pub fn extract_session_token<'a>(
    cookie_headers: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    cookie_headers
        .into_iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Resolves a raw session token to its session and owning user.
pub fn get_session(
    store: &dyn Store,
    hasher: &SecretHasher,
    raw_token: &str,
) -> std::result::Result<ValidatedSession, SessionError> {
    let (lookup, _secret) = parse_token(raw_token).map_err(|_| SessionError::InvalidToken)?;

    let session = store
        .get_session_by_lookup(&lookup)
        .map_err(|_| SessionError::InternalError)?
        .ok_or(SessionError::InvalidToken)?;

    if !hasher
        .verify(raw_token, &session.token_hash)
        .map_err(|_| SessionError::InternalError)?
    {
        return Err(SessionError::InvalidToken);
    }

    if session.is_expired() {
        if let Err(e) = store.delete_session(&session.id) {
            tracing::warn!("Failed to delete expired session: {e}");
        }
        return Err(SessionError::Expired);
    }

    let user = store
        .get_user(&session.user_id)
        .map_err(|_| SessionError::InternalError)?
        .ok_or(SessionError::InvalidToken)?;

    Ok(ValidatedSession { session, user })
}

/// Creates a session for the user and returns it with the raw token, which is
/// only ever available here.
pub fn start_session(
    store: &dyn Store,
    hasher: &SecretHasher,
    user_id: &str,
) -> Result<(Session, String)> {
    for _ in 0..MAX_LOOKUP_RETRIES {
        let (raw_token, lookup, hash) = hasher.generate_token()?;
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
        };

        match store.create_session(&session) {
            Ok(()) => return Ok((session, raw_token)),
            Err(Error::SessionLookupCollision) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(Error::SessionLookupCollision)
}

#[must_use]
pub fn session_cookie(raw_token: &str, secure: bool) -> String {
    let max_age = SESSION_TTL_DAYS * 24 * 60 * 60;
    let mut cookie =
        format!("{SESSION_COOKIE}={raw_token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn store_with_user() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        store
            .create_user(&User {
                id: "u1".to_string(),
                email: "a@example.com".to_string(),
                password_hash: "hash".to_string(),
                name: "A".to_string(),
                profile_image: None,
                customer_id: None,
                customer_pending_key: None,
                created_at: Utc::now(),
            })
            .unwrap();
        store
    }

    #[test]
    fn test_extract_session_token() {
        assert_eq!(
            extract_session_token(["theme=dark; quire_session=abc; other=1"]),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_session_token(["theme=dark", "quire_session=xyz"]),
            Some("xyz".to_string())
        );
        assert_eq!(extract_session_token(["quire_session="]), None);
        assert_eq!(extract_session_token(["theme=dark"]), None);
        assert_eq!(extract_session_token(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_session_lifecycle() {
        let store = store_with_user();
        let hasher = SecretHasher::new();

        let (session, raw) = start_session(&store, &hasher, "u1").unwrap();
        let validated = get_session(&store, &hasher, &raw).unwrap();
        assert_eq!(validated.session.id, session.id);
        assert_eq!(validated.user.email, "a@example.com");

        assert!(store.delete_session(&session.id).unwrap());
        assert!(matches!(
            get_session(&store, &hasher, &raw),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_session_is_rejected_and_removed() {
        let store = store_with_user();
        let hasher = SecretHasher::new();
        let (raw, lookup, hash) = hasher.generate_token().unwrap();
        let now = Utc::now();
        store
            .create_session(&Session {
                id: "s-old".to_string(),
                token_hash: hash,
                token_lookup: lookup.clone(),
                user_id: "u1".to_string(),
                created_at: now - Duration::days(31),
                expires_at: now - Duration::days(1),
            })
            .unwrap();

        assert!(matches!(
            get_session(&store, &hasher, &raw),
            Err(SessionError::Expired)
        ));
        assert!(store.get_session_by_lookup(&lookup).unwrap().is_none());
    }

    #[test]
    fn test_forged_secret_is_rejected() {
        let store = store_with_user();
        let hasher = SecretHasher::new();
        let (_, raw) = start_session(&store, &hasher, "u1").unwrap();

        let replacement = if raw.ends_with('0') { '1' } else { '0' };
        let forged = format!("{}{replacement}", &raw[..raw.len() - 1]);
        assert!(matches!(
            get_session(&store, &hasher, &forged),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("quire_token", true);
        assert!(cookie.starts_with("quire_session=quire_token;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!session_cookie("t", false).contains("Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
