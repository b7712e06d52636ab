//! Shared, read-only handles every handler needs. Built once in `main` and
//! cloned (cheaply — everything inside is an `Arc`) into the router.

use std::sync::Arc;

use eoss_common::Config;
use eoss_coordinator::ObjectCoordinator;
use eoss_lock::ObjectLockManager;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ObjectCoordinator>,
    pub locks: Arc<ObjectLockManager>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(coordinator: ObjectCoordinator, locks: ObjectLockManager, config: Config) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            locks: Arc::new(locks),
            config: Arc::new(config),
        }
    }
}
