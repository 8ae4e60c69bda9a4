use std::sync::Arc;

use tokio::sync::watch;

use faretrack_core::audit::{AuditHandle, AuditStore};
use faretrack_core::config::Config;
use faretrack_core::notify::NotificationGate;
use faretrack_core::refresh::PriceRefresher;
use faretrack_core::requote::RequoteSupervisor;
use faretrack_core::store::{PackageStore, RunLockStore};
use faretrack_core::SanitizedConfig;

/// Shared application state
pub struct AppState {
    config: Config,
    packages: Arc<dyn PackageStore>,
    locks: Arc<dyn RunLockStore>,
    audit_store: Arc<dyn AuditStore>,
    audit: AuditHandle,
    refresher: Arc<PriceRefresher>,
    supervisor: Arc<RequoteSupervisor>,
    gate: Option<Arc<NotificationGate>>,
    shutdown: watch::Receiver<bool>,
}

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        config: Config,
        packages: Arc<dyn PackageStore>,
        locks: Arc<dyn RunLockStore>,
        audit_store: Arc<dyn AuditStore>,
        audit: AuditHandle,
        refresher: Arc<PriceRefresher>,
        supervisor: Arc<RequoteSupervisor>,
        gate: Option<Arc<NotificationGate>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            packages,
            locks,
            audit_store,
            audit,
            refresher,
            supervisor,
            gate,
            shutdown,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn packages(&self) -> &dyn PackageStore {
        self.packages.as_ref()
    }

    pub fn locks(&self) -> Arc<dyn RunLockStore> {
        Arc::clone(&self.locks)
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    #[allow(dead_code)]
    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn refresher(&self) -> Arc<PriceRefresher> {
        Arc::clone(&self.refresher)
    }

    pub fn supervisor(&self) -> Arc<RequoteSupervisor> {
        Arc::clone(&self.supervisor)
    }

    pub fn gate(&self) -> Option<Arc<NotificationGate>> {
        self.gate.clone()
    }

    pub fn shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }
}
