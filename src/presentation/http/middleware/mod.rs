pub mod rate_limit;
pub mod session;

pub use rate_limit::LoginRateLimiter;
pub use session::{
    cookie_value, expired_session_cookie, require_auth_middleware, session_cookie,
    session_middleware, SessionContext, SessionLayerState, SESSION_COOKIE,
    SESSION_WARNING_HEADER,
};
