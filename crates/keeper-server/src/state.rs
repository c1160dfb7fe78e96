use std::sync::Arc;

use keeper_auth::Auth;
use keeper_bus::Bus;
use keeper_store::StorageBackend;

use crate::rate_limit::RateLimiter;

pub struct AppState {
    pub store: Arc<dyn StorageBackend>,
    pub auth: Auth,
    pub bus: Arc<Bus>,
    pub rate_limiter: RateLimiter,
}

pub type Shared = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<dyn StorageBackend>) -> Shared {
        Arc::new(AppState {
            store,
            auth: Auth::new(),
            bus: Arc::new(Bus::new()),
            rate_limiter: RateLimiter::new(20.0, 50),
        })
    }
}
