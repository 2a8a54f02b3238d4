mod middleware;
mod password;
pub mod resolver;
pub mod session;

pub use middleware::{CurrentUser, RequireRoot, auth_checker, danger_password_checker};
pub use password::{PasswordHasher, check_password_length, generate_password};
pub use resolver::{IdentityStrategy, RequestCredentials, SessionResolver};
pub use session::{SESSION_COOKIE_NAME, SessionPayload, removal_cookie, session_cookie, start_session};
