//! Live dashboard: run the controller over the configured services and
//! print the view and event log.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Local;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use buildwatch_core::{
    ActiveProjects, ControllerEvent, ProjectsStream, ProjectsSummary, ServiceConfigStore,
    ServiceEvent, ServiceProjects,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::Session;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct BuildRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn rows(view: &[ServiceProjects], color: bool) -> Vec<BuildRow> {
    view.iter()
        .flat_map(|service| {
            service.items.iter().map(move |build| BuildRow {
                service: service.name.clone(),
                project: build.group.as_ref().map_or_else(
                    || build.name.clone(),
                    |group| format!("{group}/{}", build.name),
                ),
                status: output::build_status(build, color),
                tags: build
                    .tags
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                error: build
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn render_view(
    view: &ActiveProjects,
    format: OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let summary = ProjectsSummary::of(view);
            let mut out = output::render_table(&rows(view, color));
            out.push_str(&format!(
                "\n{} builds, {} broken, {} running, {} failing to update",
                summary.total, summary.broken, summary.running, summary.errors
            ));
            Ok(out)
        }
        // One document per view so the output can be consumed as a stream.
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_json_compact(view.as_slice())
        }
        OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(view.as_slice())?)),
    }
}

/// One line of the event log.
fn event_line(event: &ControllerEvent) -> String {
    let time = Local::now().format("%H:%M:%S");
    match event {
        ControllerEvent::Service { source, event } => {
            let detail = match event {
                ServiceEvent::BuildBroken { build }
                | ServiceEvent::BuildFixed { build }
                | ServiceEvent::BuildStarted { build }
                | ServiceEvent::BuildFinished { build } => build.name.clone(),
                ServiceEvent::UpdateFailed { error } | ServiceEvent::StartFailed { error } => {
                    format!("{}: {}", error.name, error.message)
                }
                ServiceEvent::ServiceStarted | ServiceEvent::ServiceStopped => String::new(),
            };
            format!("{time} [{source}] {} {detail}", event.name())
                .trim_end()
                .to_owned()
        }
        other => format!("{time} {}", other.name()),
    }
}

// ── --once completion tracking ──────────────────────────────────────

/// Tracks which services have started, to tell when the first view is
/// complete.
struct Readiness {
    /// Selected project count per enabled service.
    expected: HashMap<String, usize>,
    started: HashSet<String>,
    initialized: bool,
}

impl Readiness {
    fn new(session: &Session) -> Self {
        let expected = session
            .services
            .current()
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| (s.name.clone(), s.projects.len()))
            .collect();
        Self {
            expected,
            started: HashSet::new(),
            initialized: false,
        }
    }

    fn observe(&mut self, event: &ControllerEvent) {
        match event {
            ControllerEvent::ServicesInitialized => self.initialized = true,
            ControllerEvent::Service {
                source,
                event: ServiceEvent::ServiceStarted,
            } => {
                self.started.insert(source.clone());
            }
            _ => {}
        }
    }

    /// Every started service shows all of its projects.
    fn is_complete(&self, view: &[ServiceProjects]) -> bool {
        self.initialized
            && self.started.iter().all(|name| {
                let expected = self.expected.get(name).copied().unwrap_or_default();
                view.iter()
                    .find(|s| &s.name == name)
                    .is_some_and(|s| s.items.len() >= expected)
            })
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut view = session.controller.active_projects();
    let mut events = session.controller.events();
    let mut readiness = Readiness::new(session);

    session
        .controller
        .start(WatchStream::new(session.services.changes()));
    info!(services = readiness.expected.len(), "watching");

    let result = if args.once {
        // Bounded by the HTTP timeout of the first poll, plus slack.
        let limit = Duration::from_secs(session.timeout_secs(global).saturating_add(5));
        let waited = tokio::time::timeout(
            limit,
            wait_until_complete(&mut view, &mut events, &mut readiness, args, global),
        )
        .await;
        if waited.is_err() {
            warn!("services did not settle in time; showing the partial view");
        }

        let latest = view.latest();
        let out = render_view(&latest, global.output, color)?;
        output::print_output(&out, global.quiet);

        let summary = ProjectsSummary::of(&latest);
        if summary.is_green() {
            Ok(())
        } else {
            Err(CliError::BuildsFailing {
                broken: summary.broken,
                errors: summary.errors,
            })
        }
    } else {
        follow(&mut view, &mut events, args, global, color).await
    };

    session.controller.shutdown().await;
    result
}

async fn wait_until_complete(
    view: &mut ProjectsStream,
    events: &mut tokio::sync::broadcast::Receiver<ControllerEvent>,
    readiness: &mut Readiness,
    args: &WatchArgs,
    global: &GlobalOpts,
) {
    while !readiness.initialized {
        match events.recv().await {
            Ok(event) => {
                log_event(&event, args, global);
                readiness.observe(&event);
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagged"),
            Err(RecvError::Closed) => return,
        }
    }
    while !readiness.is_complete(&view.latest()) {
        if view.changed().await.is_none() {
            return;
        }
    }
}

async fn follow(
    view: &mut ProjectsStream,
    events: &mut tokio::sync::broadcast::Receiver<ControllerEvent>,
    args: &WatchArgs,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                return Ok(());
            }
            changed = view.changed() => {
                let Some(latest) = changed else { return Ok(()) };
                let out = render_view(&latest, global.output, color)?;
                output::print_output(&out, global.quiet);
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event, args, global),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagged"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn log_event(event: &ControllerEvent, args: &WatchArgs, global: &GlobalOpts) {
    if !args.no_events && !global.quiet {
        eprintln!("{}", event_line(event));
    }
}
