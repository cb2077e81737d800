//! Session lifecycle notifications

use tracing::warn;

/// Told when the session can no longer be recovered
///
/// The client calls this after a failed token refresh, once the stored
/// tokens have been cleared. Front ends use it to send the user to the login
/// route.
pub trait SessionObserver: Send + Sync {
    fn session_expired(&self, login_route: &str);
}

/// Observer that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSessionObserver;

impl SessionObserver for LogSessionObserver {
    fn session_expired(&self, login_route: &str) {
        warn!(login_route, "Session expired, sign in again");
    }
}
