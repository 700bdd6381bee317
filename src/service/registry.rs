//! Service registry and start-order computation.
//!
//! Ordering is insertion based: a service is placed directly after the
//! latest-positioned dependency that is already registered, or at the end of
//! the order when none is. Dependencies registered *after* their dependent
//! are not retroactively enforced; [`DependencyRegistry::ordering_violations`]
//! reports every declared edge the order does not honour.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Service, ServiceError, ServiceState, ServiceStatus};

/// A registered service plus the lifecycle bookkeeping the orchestrator keeps for it.
pub struct ServiceEntry {
    service: Arc<dyn Service>,
    dependencies: Vec<String>,
    state: ServiceState,
    last_error: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl ServiceEntry {
    fn new(service: Arc<dyn Service>, dependencies: Vec<String>) -> Self {
        Self {
            service,
            dependencies,
            state: ServiceState::Stopped,
            last_error: None,
            started_at: None,
        }
    }

    pub fn service(&self) -> Arc<dyn Service> {
        Arc::clone(&self.service)
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Seconds since the last successful start, zero unless running.
    pub fn uptime_seconds(&self) -> u64 {
        match (self.state, self.started_at) {
            (ServiceState::Running, Some(started)) => {
                (Utc::now() - started).num_seconds().max(0) as u64
            }
            _ => 0,
        }
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            name: self.service.name().to_string(),
            state: self.state,
            error: self.last_error.clone(),
            uptime_seconds: self.uptime_seconds(),
            depends_on: self.dependencies.clone(),
        }
    }

    pub(crate) fn set_state(&mut self, state: ServiceState) {
        self.state = state;
    }

    pub(crate) fn mark_running(&mut self) {
        self.state = ServiceState::Running;
        self.last_error = None;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_error(&mut self, error: String) {
        self.state = ServiceState::Error;
        self.last_error = Some(error);
    }
}

#[derive(Default)]
pub struct DependencyRegistry {
    services: HashMap<String, ServiceEntry>,
    order: Vec<String>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, placing it after its already-registered dependencies.
    pub fn register<I, S>(
        &mut self,
        service: Arc<dyn Service>,
        dependencies: I,
    ) -> Result<(), ServiceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = service.name().to_string();
        if self.services.contains_key(&name) {
            return Err(ServiceError::Registration(name));
        }

        let dependencies: Vec<String> = dependencies.into_iter().map(Into::into).collect();

        let mut latest: Option<usize> = None;
        for dependency in &dependencies {
            match self.position(dependency) {
                Some(index) => latest = Some(latest.map_or(index, |l| l.max(index))),
                None => warn!(
                    "Service '{}' depends on '{}', which is not registered yet; \
                     the dependency will not be enforced",
                    name, dependency
                ),
            }
        }

        let index = latest.map_or(self.order.len(), |l| l + 1);
        debug!("Registering service '{}' at position {}", name, index);

        self.order.insert(index, name.clone());
        self.services
            .insert(name, ServiceEntry::new(service, dependencies));
        Ok(())
    }

    /// Remove a stopped service. Unknown names are ignored.
    pub fn unregister(&mut self, name: &str) -> Result<Option<Arc<dyn Service>>, ServiceError> {
        let Some(entry) = self.services.get(name) else {
            return Ok(None);
        };
        if !entry.state.is_resting() {
            return Err(ServiceError::Busy {
                name: name.to_string(),
                state: entry.state,
            });
        }

        self.order.retain(|n| n != name);
        Ok(self.services.remove(name).map(|entry| entry.service))
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEntry> {
        self.services.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut ServiceEntry> {
        self.services.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Statuses of every service, in start order.
    pub fn all(&self) -> Vec<ServiceStatus> {
        self.order
            .iter()
            .filter_map(|name| self.services.get(name))
            .map(ServiceEntry::status)
            .collect()
    }

    /// Service names in start order.
    pub fn order(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Services in start order, detached from the registry.
    pub fn ordered_services(&self) -> Vec<Arc<dyn Service>> {
        self.order
            .iter()
            .filter_map(|name| self.services.get(name))
            .map(ServiceEntry::service)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Declared `(service, dependency)` edges the start order does not honour:
    /// the dependency is missing or positioned after its dependent.
    pub fn ordering_violations(&self) -> Vec<(String, String)> {
        let mut violations = Vec::new();
        for (index, name) in self.order.iter().enumerate() {
            let Some(entry) = self.services.get(name) else {
                continue;
            };
            for dependency in &entry.dependencies {
                match self.position(dependency) {
                    Some(dep_index) if dep_index < index => {}
                    _ => violations.push((name.clone(), dependency.clone())),
                }
            }
        }
        violations
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}
