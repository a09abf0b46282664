use beef_core::AdminAuth;
use beef_store::MissStore;
use beef_util::{LoginLimits, LoginRateLimiter};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything the handlers share
pub struct AppState {
    pub store: MissStore,
    pub auth: AdminAuth,
    pub limiter: Mutex<LoginRateLimiter>,
    /// Mark session cookies `Secure`
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(
        store: MissStore,
        auth: AdminAuth,
        limits: LoginLimits,
        secure_cookies: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            auth,
            limiter: Mutex::new(LoginRateLimiter::new(limits)),
            secure_cookies,
        })
    }

    /// Drop expired rate limit entries
    pub async fn sweep_rate_limits(&self) -> usize {
        self.limiter.lock().await.sweep()
    }
}
