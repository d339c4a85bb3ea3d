//! Shared helpers for command handlers.

use std::io::IsTerminal;

use buildwatch_core::ServiceSettings;

use crate::error::CliError;

/// Look up a configured service by name.
pub fn require_service<'a>(
    services: &'a [ServiceSettings],
    name: &str,
) -> Result<&'a ServiceSettings, CliError> {
    services
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "service".into(),
            identifier: name.into(),
            list_command: "config show".into(),
        })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Password from the flag, or prompted for when a username is set.
pub fn resolve_password(
    username: Option<&str>,
    password: Option<String>,
) -> Result<Option<String>, CliError> {
    match (username, password) {
        (_, Some(password)) => Ok(Some(password)),
        (Some(user), None) if std::io::stdin().is_terminal() => {
            let password = rpassword::prompt_password(format!("Password for {user}: "))?;
            Ok(Some(password))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn require_service_reports_missing_name() {
        let services = [ServiceSettings::new("jenkins", "ci")];
        assert_eq!(require_service(&services, "ci").unwrap().name, "ci");

        let err = require_service(&services, "nightly").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::NOT_FOUND);
    }

    #[test]
    fn confirm_skips_prompt_with_yes() {
        assert!(confirm("Remove?", "remove", true).unwrap());
    }
}
