//! CLI error types with miette diagnostics.
//!
//! Maps core, config, and discovery failures into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use buildwatch_config::ConfigError;
use buildwatch_core::{CoreError, ErrorPayload};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(buildwatch::connection_failed),
        help(
            "Check that the build server is running and reachable.\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(buildwatch::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(buildwatch::auth_failed),
        help("Verify the username and password (or API token) for this server.")
    )]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(buildwatch::not_found),
        help("Run: buildwatch {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Service '{name}' already exists")]
    #[diagnostic(
        code(buildwatch::conflict),
        help("Pick another name or remove the existing service first.")
    )]
    Conflict { name: String },

    #[error("{name}: {message}")]
    #[diagnostic(code(buildwatch::service_error))]
    Service { name: String, message: String },

    // ── Build status ─────────────────────────────────────────────────

    #[error("{broken} broken build(s), {errors} failing to update")]
    #[diagnostic(code(buildwatch::builds_failing))]
    BuildsFailing { broken: usize, errors: usize },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(buildwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(buildwatch::config),
        help("Check the file printed by: buildwatch config path")
    )]
    Config(#[from] ConfigError),

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(buildwatch::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(buildwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(buildwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownServiceType { base_url } => CliError::NotFound {
                resource_type: "service type".into(),
                identifier: base_url,
                list_command: "services".into(),
            },
            CoreError::InvalidMessage { reason } => CliError::Validation {
                field: "message".into(),
                reason,
            },
            CoreError::UnknownChannel { name } => CliError::NotFound {
                resource_type: "channel".into(),
                identifier: name,
                list_command: "--help".into(),
            },
        }
    }
}

// ── Discovery error payload → CliError ───────────────────────────────

impl CliError {
    /// Rebuild an error from the `{name, message}` payload a discovery
    /// reply carries.
    pub fn from_payload(payload: ErrorPayload, url: &str, timeout_secs: u64) -> Self {
        match payload.name.as_str() {
            "ConnectionFailed" if payload.message.contains("timed out") => CliError::Timeout {
                seconds: timeout_secs,
            },
            "ConnectionFailed" => CliError::ConnectionFailed {
                url: url.to_owned(),
                reason: payload.message,
            },
            "AuthenticationFailed" => CliError::AuthFailed {
                message: payload.message,
            },
            "UnknownServiceType" => CliError::NotFound {
                resource_type: "service type".into(),
                identifier: payload
                    .message
                    .rsplit(": ")
                    .next()
                    .unwrap_or_default()
                    .to_owned(),
                list_command: "services".into(),
            },
            "NotFound" => CliError::NotFound {
                resource_type: "resource".into(),
                identifier: url.to_owned(),
                list_command: "projects".into(),
            },
            "InvalidSettings" => CliError::Validation {
                field: "settings".into(),
                reason: payload.message,
            },
            _ => CliError::Service {
                name: payload.name,
                message: payload.message,
            },
        }
    }
}
