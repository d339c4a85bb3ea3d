//! Config subcommand handlers.
//!
//! Edits go through the bridge's mutation messages, so the stored file
//! changes exactly the way a settings UI would change it.

use std::fmt::Write as _;

use serde_json::Value;
use tabled::Tabled;

use buildwatch_config::Config;
use buildwatch_core::{Request, ServiceSettings};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{Session, util};

const REDACTED: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    base_url: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Projects")]
    projects: String,
    #[tabled(rename = "Interval")]
    interval: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl From<&ServiceSettings> for ServiceRow {
    fn from(s: &ServiceSettings) -> Self {
        Self {
            name: s.name.clone(),
            base_url: s.base_url.clone(),
            url: s.url.clone(),
            projects: s.projects.join(", "),
            interval: format!("{}s", s.update_interval),
            enabled: if s.is_enabled() { "yes" } else { "no" }.into(),
        }
    }
}

/// Mask credentials before printing.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for service in &mut cfg.services {
        if service.extra_str("password").is_some() {
            service
                .extra
                .insert("password".into(), Value::String(REDACTED.into()));
        }
    }
    cfg
}

fn format_config(cfg: &Config) -> String {
    let mut out = String::new();
    if cfg.services.is_empty() {
        out.push_str("No services configured.\n");
    } else {
        let rows: Vec<ServiceRow> = cfg.services.iter().map(ServiceRow::from).collect();
        let _ = writeln!(out, "{}", output::render_table(&rows));
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "views: {} column(s), {} theme",
        cfg.views.columns, cfg.views.theme
    );
    let _ = write!(
        out,
        "defaults: output={} color={} insecure={} timeout={}s",
        cfg.defaults.output, cfg.defaults.color, cfg.defaults.insecure, cfg.defaults.timeout
    );
    out
}

/// Send a mutation through the bridge, then persist the result.
fn apply(session: &Session, request: Request, global: &GlobalOpts) -> Result<(), CliError> {
    let before = session.services.current();
    session.bridge.handle(request);
    if session.services.current() == before {
        tracing::debug!("configuration unchanged");
        return Ok(());
    }
    session.save()?;
    if !global.quiet {
        eprintln!("Configuration saved to {}", session.path.display());
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(session: &Session, args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let current = session.services.current();

    match args.command {
        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&session.snapshot());
            let out = output::render_single(global.output, &cfg, format_config)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&session.path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── Add <name> ──────────────────────────────────────────────
        ConfigCommand::Add {
            name,
            service_type,
            url,
            projects,
            username,
            password,
            interval,
        } => {
            if session.controller.registry().get(&service_type).is_none() {
                return Err(CliError::NotFound {
                    resource_type: "service type".into(),
                    identifier: service_type,
                    list_command: "services".into(),
                });
            }
            url::Url::parse(&url).map_err(|e| CliError::Validation {
                field: "url".into(),
                reason: format!("{e}: {url}"),
            })?;

            // Start from the type's defaults, keeping fields of a service
            // that is being replaced.
            let mut settings = current
                .iter()
                .find(|s| s.name == name)
                .cloned()
                .or_else(|| {
                    session
                        .controller
                        .registry()
                        .get(&service_type)
                        .map(|t| t.settings().default_config.clone())
                })
                .unwrap_or_else(|| ServiceSettings::new(&service_type, &name));
            settings.name = name;
            settings.base_url = service_type;
            settings.url = url;
            settings.projects = projects;
            if let Some(interval) = interval {
                settings.update_interval = interval.max(1);
            }
            if let Some(username) = username {
                settings = settings.with_extra("username", username);
            }
            if let Some(password) = password {
                settings = settings.with_extra("password", password);
            }

            apply(session, Request::SaveService { settings }, global)
        }

        // ── Enable / Disable ────────────────────────────────────────
        ConfigCommand::Enable { name } => {
            util::require_service(&current, &name)?;
            apply(session, Request::EnableService { service_name: name }, global)
        }

        ConfigCommand::Disable { name } => {
            util::require_service(&current, &name)?;
            apply(session, Request::DisableService { service_name: name }, global)
        }

        // ── Remove ──────────────────────────────────────────────────
        ConfigCommand::Remove { name } => {
            util::require_service(&current, &name)?;
            if !util::confirm(&format!("Remove service '{name}'?"), "remove", global.yes)? {
                return Ok(());
            }
            apply(session, Request::RemoveService { service_name: name }, global)
        }

        // ── Rename ──────────────────────────────────────────────────
        ConfigCommand::Rename { old_name, new_name } => {
            util::require_service(&current, &old_name)?;
            if old_name != new_name && current.iter().any(|s| s.name == new_name) {
                return Err(CliError::Conflict { name: new_name });
            }
            apply(session, Request::RenameService { old_name, new_name }, global)
        }

        // ── Order ───────────────────────────────────────────────────
        ConfigCommand::Order {
            names,
            service: Some(service),
        } => {
            util::require_service(&current, &service)?;
            apply(
                session,
                Request::SetBuildOrder {
                    service_name: service,
                    order: names,
                },
                global,
            )
        }

        ConfigCommand::Order {
            names,
            service: None,
        } => {
            for name in &names {
                util::require_service(&current, name)?;
            }
            apply(session, Request::SetOrder { order: names }, global)
        }
    }
}
