//! Service type listing.

use serde_json::json;
use tabled::Tabled;

use buildwatch_core::{Reply, ServiceTypeSettings};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Session;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ServiceTypeRow {
    #[tabled(rename = "Type")]
    base_url: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Fields")]
    fields: String,
    #[tabled(rename = "URL Hint")]
    url_hint: String,
}

impl From<&ServiceTypeSettings> for ServiceTypeRow {
    fn from(t: &ServiceTypeSettings) -> Self {
        Self {
            base_url: t.base_url.clone(),
            name: t.type_name.clone(),
            fields: t
                .fields
                .iter()
                .map(|f| {
                    serde_json::to_value(f.kind)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_owned))
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>()
                .join(", "),
            url_hint: t.url_hint.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let types: Vec<ServiceTypeSettings> =
        match session.bridge.handle_message(json!({ "name": "availableServices" })) {
            Some(Reply::Ready(value)) => serde_json::from_value(value)?,
            _ => Vec::new(),
        };

    let out = output::render_list(global.output, &types, |t| ServiceTypeRow::from(t))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
