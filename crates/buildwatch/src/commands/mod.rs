//! Command handlers and the session they share.

pub mod config_cmd;
pub mod projects;
pub mod services;
pub mod util;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use buildwatch_config::Config;
use buildwatch_core::service::jenkins;
use buildwatch_core::{
    Bridge, Controller, ServiceConfiguration, ServiceRegistry, TlsMode, TransportConfig,
    ViewConfiguration,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Everything a command needs: the loaded config file, live stores seeded
/// from it, and a controller plus bridge over those stores.
pub struct Session {
    pub path: PathBuf,
    pub config: Config,
    pub controller: Controller,
    pub services: Arc<ServiceConfiguration>,
    pub views: Arc<ViewConfiguration>,
    pub bridge: Bridge,
}

impl Session {
    /// Load the config file (or `--config`) and wire the core around it.
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = global
            .config
            .clone()
            .unwrap_or_else(buildwatch_config::config_path);
        let config = buildwatch_config::load_config_from(&path)?;
        tracing::debug!(path = %path.display(), services = config.services.len(), "config loaded");

        let registry = ServiceRegistry::new();
        registry.register_type(jenkins::service_type_with(transport(global, &config)));
        let controller = Controller::new(registry);

        let services = Arc::new(ServiceConfiguration::new(config.services.clone()));
        let views = Arc::new(ViewConfiguration::new(config.views.clone()));
        let bridge = Bridge::new(controller.clone(), services.clone(), views.clone());

        Ok(Self {
            path,
            config,
            controller,
            services,
            views,
            bridge,
        })
    }

    /// Effective request timeout, seconds.
    pub fn timeout_secs(&self, global: &GlobalOpts) -> u64 {
        global.timeout.unwrap_or(self.config.defaults.timeout)
    }

    /// The config as the stores currently hold it.
    pub fn snapshot(&self) -> Config {
        Config {
            defaults: self.config.defaults.clone(),
            services: self.services.current().to_vec(),
            views: self.views.current(),
        }
    }

    /// Write the stores back to the config file.
    pub fn save(&self) -> Result<(), CliError> {
        buildwatch_config::save_config_to(&self.path, &self.snapshot())?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

/// HTTP settings from CLI flags, falling back to the config defaults.
fn transport(global: &GlobalOpts, config: &Config) -> TransportConfig {
    let tls = if global.insecure || config.defaults.insecure {
        TlsMode::DangerAcceptInvalid
    } else {
        TlsMode::System
    };
    TransportConfig {
        tls,
        timeout: Duration::from_secs(global.timeout.unwrap_or(config.defaults.timeout)),
    }
}

/// Route a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::open(global)?;
    tracing::debug!(command = ?cmd, "dispatching command");
    match cmd {
        Command::Watch(args) => watch::handle(&session, &args, global).await,
        Command::Services => services::handle(&session, global),
        Command::Projects(args) => projects::handle(&session, args, global).await,
        Command::Config(args) => config_cmd::handle(&session, args, global),
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
