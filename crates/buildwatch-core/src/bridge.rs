// ── Message bridge ──
//
// Adapts UI surfaces to the core. One-shot requests are JSON objects
// discriminated by `name`; persistent connections are named channels that
// receive the latest value of a live stream on connect and every change
// after that.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString, IntoStaticStr};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::config_store::{ServiceConfigStore, ViewConfigStore};
use crate::controller::Controller;
use crate::error::{CoreError, ServiceError};
use crate::model::{ServiceSettings, ViewSettings};

// ── Requests ─────────────────────────────────────────────────────

/// A one-shot request, as sent by the settings and dashboard surfaces.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    AvailableServices,
    SetOrder { order: Vec<String> },
    SetBuildOrder { service_name: String, order: Vec<String> },
    EnableService { service_name: String },
    DisableService { service_name: String },
    RemoveService { service_name: String },
    RenameService { old_name: String, new_name: String },
    SaveService { settings: ServiceSettings },
    SaveConfig { config: Vec<ServiceSettings> },
    SetViews { views: ViewSettings },
    AvailableProjects { service_settings: ServiceSettings },
}

impl Request {
    pub fn parse(message: Value) -> Result<Self, CoreError> {
        serde_json::from_value(message).map_err(|e| CoreError::InvalidMessage {
            reason: e.to_string(),
        })
    }
}

/// Answer to a request that has one.
pub enum Reply {
    /// Available immediately.
    Ready(Value),
    /// Delivered later; the caller must keep its response channel open
    /// until the future resolves.
    Pending(BoxFuture<'static, Value>),
}

impl Reply {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The wire value, waiting for it if necessary.
    pub async fn resolve(self) -> Value {
        match self {
            Self::Ready(value) => value,
            Self::Pending(future) => future.await,
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

// ── Channels ─────────────────────────────────────────────────────

/// Persistent push channels, one per UI surface kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum Channel {
    /// The active projects view.
    State,
    /// The services configuration.
    Configuration,
    /// The view configuration.
    Views,
}

/// A live subscription of one port to one channel.
///
/// Forwarding stops as soon as the connection is disconnected or dropped.
pub struct Connection {
    channel: Channel,
    _guard: DropGuard,
}

impl Connection {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn disconnect(self) {
        debug!(channel = %self.channel, "port disconnected");
    }
}

// ── Bridge ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Bridge {
    controller: Controller,
    services: Arc<dyn ServiceConfigStore>,
    views: Arc<dyn ViewConfigStore>,
}

impl Bridge {
    pub fn new(
        controller: Controller,
        services: Arc<dyn ServiceConfigStore>,
        views: Arc<dyn ViewConfigStore>,
    ) -> Self {
        Self {
            controller,
            services,
            views,
        }
    }

    /// Dispatch one raw message. Unknown or malformed messages are ignored.
    pub fn handle_message(&self, message: Value) -> Option<Reply> {
        match Request::parse(message) {
            Ok(request) => self.handle(request),
            Err(e) => {
                debug!(error = %e, "ignoring message");
                None
            }
        }
    }

    /// Dispatch one parsed request. Mutations return `None`.
    pub fn handle(&self, request: Request) -> Option<Reply> {
        match request {
            Request::AvailableServices => {
                let descriptors = self.controller.registry().descriptors();
                Some(Reply::Ready(to_wire(&descriptors)))
            }
            Request::SetOrder { order } => {
                self.services.set_order(&order);
                None
            }
            Request::SetBuildOrder {
                service_name,
                order,
            } => {
                self.services.set_build_order(&service_name, &order);
                None
            }
            Request::EnableService { service_name } => {
                self.services.enable_service(&service_name);
                None
            }
            Request::DisableService { service_name } => {
                self.services.disable_service(&service_name);
                None
            }
            Request::RemoveService { service_name } => {
                self.services.remove_service(&service_name);
                None
            }
            Request::RenameService { old_name, new_name } => {
                self.services.rename_service(&old_name, &new_name);
                None
            }
            Request::SaveService { settings } => {
                self.services.save_service(settings);
                None
            }
            Request::SaveConfig { config } => {
                self.services.save(config);
                None
            }
            Request::SetViews { views } => {
                self.views.save(views);
                None
            }
            Request::AvailableProjects { service_settings } => {
                Some(self.available_projects(service_settings))
            }
        }
    }

    /// Ask a transient adapter built from `settings` for its projects.
    fn available_projects(&self, settings: ServiceSettings) -> Reply {
        let discovery = match self.controller.registry().create(settings) {
            Ok(service) => service.available_builds(),
            Err(CoreError::UnknownServiceType { base_url }) => {
                futures_util::future::ready(Err(ServiceError::UnknownServiceType { base_url }))
                    .boxed()
            }
            Err(e) => futures_util::future::ready(Err(ServiceError::Failed {
                message: e.to_string(),
            }))
            .boxed(),
        };

        Reply::Pending(
            async move {
                match discovery.await {
                    Ok(projects) => json!({ "projects": to_wire(&projects) }),
                    Err(e) => {
                        debug!(error = %e, "project discovery failed");
                        json!({ "error": e.payload() })
                    }
                }
            }
            .boxed(),
        )
    }

    /// Subscribe `port` to a named channel. The latest value is posted
    /// before this returns.
    pub fn connect(
        &self,
        channel: &str,
        port: mpsc::UnboundedSender<Value>,
    ) -> Result<Connection, CoreError> {
        let channel: Channel = channel.parse().map_err(|_| CoreError::UnknownChannel {
            name: channel.to_owned(),
        })?;

        let cancel = CancellationToken::new();
        match channel {
            Channel::State => forward(self.controller.projects_receiver(), port, cancel.clone()),
            Channel::Configuration => forward(self.services.changes(), port, cancel.clone()),
            Channel::Views => forward(self.views.changes(), port, cancel.clone()),
        }
        debug!(%channel, "port connected");

        Ok(Connection {
            channel,
            _guard: cancel.drop_guard(),
        })
    }
}

/// Post the current value now, then every change until cancelled.
fn forward<T>(
    mut rx: watch::Receiver<T>,
    port: mpsc::UnboundedSender<Value>,
    cancel: CancellationToken,
) where
    T: Serialize + Send + Sync + 'static,
{
    let first = to_wire(&*rx.borrow_and_update());
    if port.send(first).is_err() {
        return;
    }

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() || cancel.is_cancelled() {
                        break;
                    }
                    let value = to_wire(&*rx.borrow_and_update());
                    if port.send(value).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn to_wire<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        debug!(error = %e, "value is not representable as JSON");
        Value::Null
    })
}
