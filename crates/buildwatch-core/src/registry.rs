// ── Service type registry ──
//
// Maps a service-type identifier (`baseUrl`) to the descriptor and the
// factory that builds adapters of that type. Reads are lock-free snapshots
// via `ArcSwap`; writes clone-and-swap.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{ServiceSettings, ServiceTypeSettings};
use crate::service::BuildService;

/// Builds one adapter instance from its settings.
pub type ServiceFactory = Arc<dyn Fn(ServiceSettings) -> Arc<dyn BuildService> + Send + Sync>;

/// A registered service type: UI metadata plus adapter factory.
#[derive(Clone)]
pub struct ServiceType {
    settings: ServiceTypeSettings,
    factory: ServiceFactory,
}

impl ServiceType {
    pub fn new<F>(settings: ServiceTypeSettings, factory: F) -> Self
    where
        F: Fn(ServiceSettings) -> Arc<dyn BuildService> + Send + Sync + 'static,
    {
        Self {
            settings,
            factory: Arc::new(factory),
        }
    }

    /// The identifier configurations refer to this type by.
    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    pub fn settings(&self) -> &ServiceTypeSettings {
        &self.settings
    }

    pub fn create(&self, settings: ServiceSettings) -> Arc<dyn BuildService> {
        (self.factory)(settings)
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceType")
            .field("base_url", &self.settings.base_url)
            .field("type_name", &self.settings.type_name)
            .finish_non_exhaustive()
    }
}

/// Registry of available service types, keyed by `baseUrl`.
///
/// An explicit instance, handed to the controller at construction.
/// Iteration order is registration order; re-registering a key keeps
/// its position and replaces the entry.
#[derive(Default)]
pub struct ServiceRegistry {
    types: ArcSwap<IndexMap<String, ServiceType>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every adapter shipped in this crate.
    pub fn with_builtin_types() -> Self {
        let registry = Self::new();
        registry.register_type(crate::service::jenkins::service_type());
        registry
    }

    /// Add or overwrite the mapping for the type's `baseUrl`. Last wins.
    pub fn register_type(&self, service_type: ServiceType) {
        debug!(base_url = service_type.base_url(), "registering service type");
        self.types.rcu(|current| {
            let mut next = IndexMap::clone(current);
            next.insert(service_type.base_url().to_owned(), service_type.clone());
            next
        });
    }

    /// Snapshot of the current registrations (empty if none).
    pub fn all_types(&self) -> Arc<IndexMap<String, ServiceType>> {
        self.types.load_full()
    }

    /// Remove every registration.
    pub fn clear(&self) {
        self.types.store(Arc::new(IndexMap::new()));
    }

    pub fn get(&self, base_url: &str) -> Option<ServiceType> {
        self.types.load().get(base_url).cloned()
    }

    /// Descriptor metadata of every registered type, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceTypeSettings> {
        self.types
            .load()
            .values()
            .map(|t| t.settings().clone())
            .collect()
    }

    /// Build an adapter for `settings` using its registered type.
    pub fn create(&self, settings: ServiceSettings) -> Result<Arc<dyn BuildService>, CoreError> {
        let service_type = self
            .get(&settings.base_url)
            .ok_or_else(|| CoreError::UnknownServiceType {
                base_url: settings.base_url.clone(),
            })?;
        Ok(service_type.create(settings))
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.load().keys()).finish()
    }
}
