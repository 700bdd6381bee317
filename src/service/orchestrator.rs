//! Fleet-wide lifecycle driver.
//!
//! Starting is all-or-nothing: the first failing service aborts `start_all`
//! and every service already up is rolled back in reverse order. Stopping is
//! best-effort: a failing `stop()` is recorded on that service and the next
//! service is stopped regardless.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    DependencyRegistry, Service, ServiceEntry, ServiceError, ServiceState, ServiceStatus,
};

pub struct Orchestrator {
    registry: RwLock<DependencyRegistry>,
    /// Serializes register/unregister/start_all/stop_all/restart_service.
    lifecycle: Mutex<()>,
    shutdown: CancellationToken,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(DependencyRegistry::new()),
            lifecycle: Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn register<I, S>(
        &self,
        service: Arc<dyn Service>,
        dependencies: I,
    ) -> Result<(), ServiceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _guard = self.lifecycle.lock().await;
        let name = service.name().to_string();
        self.registry.write().await.register(service, dependencies)?;
        info!("Registered service '{}'", name);
        Ok(())
    }

    pub async fn unregister(&self, name: &str) -> Result<Option<Arc<dyn Service>>, ServiceError> {
        let _guard = self.lifecycle.lock().await;
        let removed = self.registry.write().await.unregister(name)?;
        if removed.is_some() {
            info!("Unregistered service '{}'", name);
        }
        Ok(removed)
    }

    /// Start every service in dependency order.
    ///
    /// On the first failure the failing service is marked `Error`, the whole
    /// fleet is stopped (which also raises the shutdown signal) and the start
    /// error is returned.
    pub async fn start_all(&self) -> Result<(), ServiceError> {
        let _guard = self.lifecycle.lock().await;

        let plan = {
            let registry = self.registry.read().await;
            for (service, dependency) in registry.ordering_violations() {
                warn!(
                    "Service '{}' will start before its dependency '{}'; \
                     register dependencies first",
                    service, dependency
                );
            }
            registry.ordered_services()
        };

        info!("Starting {} services", plan.len());

        for service in plan {
            let name = service.name().to_string();
            self.update(&name, |entry| entry.set_state(ServiceState::Starting))
                .await;
            info!("Starting service '{}'", name);

            match service.start().await {
                Ok(()) => {
                    self.update(&name, |entry| entry.mark_running()).await;
                    info!("Service '{}' is running", name);
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    error!("Service '{}' failed to start: {}", name, reason);
                    self.update(&name, |entry| entry.mark_error(reason.clone()))
                        .await;

                    warn!("Rolling back started services");
                    self.stop_fleet().await;
                    return Err(ServiceError::Start { name, reason });
                }
            }
        }

        info!("All services started");
        Ok(())
    }

    /// Stop every service that is not already stopped, in reverse order, and
    /// raise the shutdown signal. Individual failures are logged and recorded
    /// on the failing service; they never interrupt the rest of the fleet.
    pub async fn stop_all(&self) {
        let _guard = self.lifecycle.lock().await;
        self.stop_fleet().await;
    }

    /// Restart a single service without touching the rest of the fleet.
    ///
    /// Runs the same steps as [`Service::restart`], one at a time, so the
    /// recorded state reads `Stopping` and then `Starting`. A failed stop is
    /// logged and the start is attempted anyway.
    pub async fn restart_service(&self, name: &str) -> Result<(), ServiceError> {
        let _guard = self.lifecycle.lock().await;

        let service = {
            let registry = self.registry.read().await;
            registry
                .get(name)
                .map(|entry| entry.service())
                .ok_or_else(|| ServiceError::NotFound(name.to_string()))?
        };

        info!("Restarting service '{}'", name);
        self.update(name, |entry| entry.set_state(ServiceState::Stopping))
            .await;
        if let Err(e) = service.stop().await {
            warn!("Service '{}' failed to stop during restart: {:#}", name, e);
        }

        self.update(name, |entry| entry.set_state(ServiceState::Starting))
            .await;
        match service.start().await {
            Ok(()) => {
                self.update(name, |entry| entry.mark_running()).await;
                info!("Service '{}' restarted", name);
                Ok(())
            }
            Err(e) => {
                let reason = format!("{e:#}");
                error!("Service '{}' failed to restart: {}", name, reason);
                self.update(name, |entry| entry.mark_error(reason.clone()))
                    .await;
                Err(ServiceError::Start {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    /// Suspend until the shutdown signal is raised by `stop_all` or
    /// `request_shutdown`.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.cancelled().await;
    }

    pub fn request_shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn status(&self, name: &str) -> Option<ServiceStatus> {
        self.registry.read().await.get(name).map(|entry| entry.status())
    }

    /// Statuses in start order.
    pub async fn services(&self) -> Vec<ServiceStatus> {
        self.registry.read().await.all()
    }

    pub async fn get_status(&self) -> BTreeMap<String, ServiceStatus> {
        self.services()
            .await
            .into_iter()
            .map(|status| (status.name.clone(), status))
            .collect()
    }

    pub async fn order(&self) -> Vec<String> {
        self.registry.read().await.order()
    }

    async fn stop_fleet(&self) {
        let plan: Vec<(Arc<dyn Service>, ServiceState)> = {
            let registry = self.registry.read().await;
            registry
                .order()
                .iter()
                .rev()
                .filter_map(|name| registry.get(name))
                .map(|entry| (entry.service(), entry.state()))
                .collect()
        };

        for (service, state) in plan {
            if state == ServiceState::Stopped {
                continue;
            }

            let name = service.name().to_string();
            self.update(&name, |entry| entry.set_state(ServiceState::Stopping))
                .await;
            info!("Stopping service '{}'", name);

            match service.stop().await {
                Ok(()) => {
                    self.update(&name, |entry| entry.set_state(ServiceState::Stopped))
                        .await;
                    info!("Service '{}' stopped", name);
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(
                        "{}",
                        ServiceError::Stop {
                            name: name.clone(),
                            reason: reason.clone(),
                        }
                    );
                    self.update(&name, |entry| entry.mark_error(reason)).await;
                }
            }
        }

        self.shutdown.cancel();
    }

    async fn update<F>(&self, name: &str, apply: F)
    where
        F: FnOnce(&mut ServiceEntry),
    {
        let mut registry = self.registry.write().await;
        if let Some(entry) = registry.get_mut(name) {
            apply(entry);
        }
    }
}
