//! Project discovery against a CI server that is not configured yet.

use serde_json::Value;
use tabled::Tabled;
use url::Url;

use buildwatch_core::{BuildInfo, ErrorPayload, Request, ServiceSettings};

use crate::cli::{GlobalOpts, ProjectsArgs};
use crate::error::CliError;
use crate::output;

use super::{Session, util};

/// Name given to the transient settings used for discovery.
const DISCOVERY_NAME: &str = "discovery";

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Disabled")]
    disabled: String,
}

impl From<&BuildInfo> for ProjectRow {
    fn from(b: &BuildInfo) -> Self {
        Self {
            id: b.id.clone(),
            name: b.name.clone(),
            group: b.group.clone().unwrap_or_default(),
            disabled: if b.is_disabled { "yes".into() } else { String::new() },
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: ProjectsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    Url::parse(&args.url).map_err(|e| CliError::Validation {
        field: "url".into(),
        reason: format!("{e}: {}", args.url),
    })?;

    let password = util::resolve_password(args.username.as_deref(), args.password)?;
    let mut settings =
        ServiceSettings::new(&args.service_type, DISCOVERY_NAME).with_url(&args.url);
    if let Some(username) = args.username {
        settings = settings.with_extra("username", username);
    }
    if let Some(password) = password {
        settings = settings.with_extra("password", password);
    }

    let request = Request::AvailableProjects {
        service_settings: settings,
    };
    let Some(reply) = session.bridge.handle(request) else {
        return Ok(());
    };
    tracing::debug!(url = %args.url, "waiting for project discovery");
    let response = reply.resolve().await;

    let projects = parse_response(response, &args.url, session.timeout_secs(global))?;
    let out = output::render_list(global.output, &projects, |p| ProjectRow::from(p))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// `{projects: [...]}` or `{error: {name, message}}`.
fn parse_response(
    mut response: Value,
    url: &str,
    timeout_secs: u64,
) -> Result<Vec<BuildInfo>, CliError> {
    if let Some(error) = response.get_mut("error").map(Value::take) {
        let payload: ErrorPayload = serde_json::from_value(error)?;
        return Err(CliError::from_payload(payload, url, timeout_secs));
    }
    let projects = response
        .get_mut("projects")
        .map_or_else(|| Value::Array(Vec::new()), Value::take);
    Ok(serde_json::from_value(projects)?)
}
