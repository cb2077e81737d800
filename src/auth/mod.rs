//! Authentication module
//!
//! Session state of the dashboard client:
//!
//! - [`TokenStore`] persists the access/refresh token pair and the CSRF token
//! - [`SessionObserver`] is told when a failed refresh ends the session
//! - [`AuthService`] wraps the login, register, logout and current-user
//!   endpoints

mod service;
mod session;
mod tokens;
mod types;

pub use service::{AuthService, CURRENT_USER_PATH, LOGIN_PATH, LOGOUT_PATH, REGISTER_PATH};
pub use session::{LogSessionObserver, SessionObserver};
pub use tokens::{
    generate_csrf_token, TokenStore, ACCESS_TOKEN_KEY, CSRF_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
pub use types::{AuthResponse, LoginCredentials, RegisterData, User, UserRole};
