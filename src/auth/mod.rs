mod middleware;
mod session;
mod token;

pub use middleware::{AuthRejection, RequireUser, SIGN_IN_PATH};
pub use session::{
    SESSION_COOKIE, SESSION_TTL_DAYS, SessionError, ValidatedSession, clear_session_cookie,
    extract_session_token, get_session, session_cookie, start_session,
};
pub use token::{SecretHasher, parse_token};
