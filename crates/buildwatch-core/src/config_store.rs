// ── Configuration stores ──
//
// The services configuration and the view configuration as live values.
// Mutators are fire-and-forget; observers only ever learn about changes
// through `changes()`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::controller::ServicesSnapshot;
use crate::model::{ServiceSettings, ViewSettings};

/// Ordered list of configured services.
pub trait ServiceConfigStore: Send + Sync {
    /// Replay-latest stream of the whole configuration.
    fn changes(&self) -> watch::Receiver<ServicesSnapshot>;

    /// Move the named services to the front, in the given order.
    fn set_order(&self, names: &[String]);

    /// Reorder the selected projects of one service.
    fn set_build_order(&self, service: &str, builds: &[String]);

    fn enable_service(&self, name: &str);

    fn disable_service(&self, name: &str);

    fn remove_service(&self, name: &str);

    fn rename_service(&self, old_name: &str, new_name: &str);

    /// Replace the service with the same name, or append it.
    fn save_service(&self, settings: ServiceSettings);

    /// Replace the whole configuration.
    fn save(&self, services: Vec<ServiceSettings>);
}

/// Dashboard layout settings.
pub trait ViewConfigStore: Send + Sync {
    fn changes(&self) -> watch::Receiver<ViewSettings>;

    fn save(&self, views: ViewSettings);
}

// ── In-memory services store ─────────────────────────────────────

/// `watch`-backed [`ServiceConfigStore`].
pub struct ServiceConfiguration {
    tx: watch::Sender<ServicesSnapshot>,
}

impl ServiceConfiguration {
    pub fn new(services: Vec<ServiceSettings>) -> Self {
        let (tx, _) = watch::channel(Arc::new(services));
        Self { tx }
    }

    pub fn current(&self) -> ServicesSnapshot {
        self.tx.borrow().clone()
    }

    /// Apply `edit` to a copy of the configuration; publish only when it
    /// reports a change.
    fn update(&self, edit: impl FnOnce(&mut Vec<ServiceSettings>) -> bool) {
        self.tx.send_if_modified(|current| {
            let mut next = Vec::clone(current);
            if !edit(&mut next) {
                return false;
            }
            *current = Arc::new(next);
            true
        });
    }

    fn update_service(&self, name: &str, edit: impl FnOnce(&mut ServiceSettings) -> bool) {
        self.update(|services| match services.iter_mut().find(|s| s.name == name) {
            Some(settings) => edit(settings),
            None => {
                debug!(service = name, "no such service; ignoring");
                false
            }
        });
    }
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ServiceConfigStore for ServiceConfiguration {
    fn changes(&self) -> watch::Receiver<ServicesSnapshot> {
        self.tx.subscribe()
    }

    fn set_order(&self, names: &[String]) {
        self.update(|services| {
            let reordered = order_by(services, names, |s| s.name.as_str());
            let changed = reordered != *services;
            *services = reordered;
            changed
        });
    }

    fn set_build_order(&self, service: &str, builds: &[String]) {
        self.update_service(service, |settings| {
            let reordered = order_by(&settings.projects, builds, String::as_str);
            let changed = reordered != settings.projects;
            settings.projects = reordered;
            changed
        });
    }

    fn enable_service(&self, name: &str) {
        self.update_service(name, |settings| {
            std::mem::replace(&mut settings.disabled, false)
        });
    }

    fn disable_service(&self, name: &str) {
        self.update_service(name, |settings| {
            !std::mem::replace(&mut settings.disabled, true)
        });
    }

    fn remove_service(&self, name: &str) {
        self.update(|services| {
            let before = services.len();
            services.retain(|s| s.name != name);
            services.len() != before
        });
    }

    fn rename_service(&self, old_name: &str, new_name: &str) {
        self.update(|services| {
            if old_name == new_name || services.iter().any(|s| s.name == new_name) {
                debug!(old_name, new_name, "rename target is taken; ignoring");
                return false;
            }
            match services.iter_mut().find(|s| s.name == old_name) {
                Some(settings) => {
                    settings.name = new_name.to_owned();
                    true
                }
                None => false,
            }
        });
    }

    fn save_service(&self, settings: ServiceSettings) {
        self.update(|services| {
            match services.iter_mut().find(|s| s.name == settings.name) {
                Some(existing) if *existing == settings => return false,
                Some(existing) => *existing = settings,
                None => services.push(settings),
            }
            true
        });
    }

    fn save(&self, services: Vec<ServiceSettings>) {
        self.tx.send_replace(Arc::new(services));
    }
}

/// `items` with the ones named in `order` first (in that order), then
/// the rest in their original relative order. Unknown names are ignored.
fn order_by<T, F>(items: &[T], order: &[String], key: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    let mut taken = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    for name in order {
        if let Some(index) = items
            .iter()
            .enumerate()
            .position(|(i, item)| !taken[i] && key(item) == name)
        {
            taken[index] = true;
            out.push(items[index].clone());
        }
    }
    out.extend(
        items
            .iter()
            .zip(&taken)
            .filter(|(_, taken)| !**taken)
            .map(|(item, _)| item.clone()),
    );
    out
}

// ── In-memory view store ─────────────────────────────────────────

/// `watch`-backed [`ViewConfigStore`].
pub struct ViewConfiguration {
    tx: watch::Sender<ViewSettings>,
}

impl ViewConfiguration {
    pub fn new(views: ViewSettings) -> Self {
        let (tx, _) = watch::channel(views);
        Self { tx }
    }

    pub fn current(&self) -> ViewSettings {
        self.tx.borrow().clone()
    }
}

impl Default for ViewConfiguration {
    fn default() -> Self {
        Self::new(ViewSettings::default())
    }
}

impl ViewConfigStore for ViewConfiguration {
    fn changes(&self) -> watch::Receiver<ViewSettings> {
        self.tx.subscribe()
    }

    fn save(&self, views: ViewSettings) {
        self.tx.send_replace(views);
    }
}
