//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use console::{Style, Term};
use kiln_events::{AppEvent, BuildEvent, InstallEvent, ManifestEvent, ResolverEvent};

/// Event handler for progress display and user feedback
///
/// Every event is forwarded to `tracing`. Outside JSON mode the user-facing
/// subset is also printed to stderr as one status line per event.
pub struct EventHandler {
    term: Term,
    show_progress: bool,
    colors_enabled: bool,
    debug_enabled: bool,
}

impl EventHandler {
    pub fn new(show_progress: bool, colors_enabled: bool, debug_enabled: bool) -> Self {
        Self {
            term: Term::stderr(),
            show_progress,
            colors_enabled,
            debug_enabled,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, event: AppEvent) {
        log_event_with_tracing(&event);

        if !self.show_progress {
            return;
        }
        if let Some((status, message)) = self.describe(&event) {
            self.show(status, &message);
        }
    }

    /// Status line for an event, or `None` when the event stays in the logs
    fn describe(&self, event: &AppEvent) -> Option<(Status, String)> {
        match event {
            AppEvent::Manifest(ManifestEvent::Loaded {
                name, dependencies, ..
            }) => Some((
                Status::Info,
                format!("Loaded manifest for {name} ({dependencies} dependencies)"),
            )),
            AppEvent::Manifest(ManifestEvent::DependencyAdded { spec, .. }) => {
                Some((Status::Success, format!("Added {spec}")))
            }
            AppEvent::Resolver(ResolverEvent::Completed { packages, .. }) => Some((
                Status::Info,
                format!("Resolved {} packages", packages.len()),
            )),
            AppEvent::Build(build) => self.describe_build(build),
            AppEvent::Install(install) => describe_install(install),
            _ => None,
        }
    }

    fn describe_build(&self, event: &BuildEvent) -> Option<(Status, String)> {
        match event {
            BuildEvent::BackendSelected {
                package, backend, ..
            } => Some((Status::Info, format!("Building {package} with {backend}"))),
            BuildEvent::StepStarted {
                index,
                total,
                command,
                ..
            } => Some((
                Status::Progress,
                format!("[{index}/{total}] {command}"),
            )),
            BuildEvent::StepOutput { line, .. } if self.debug_enabled => {
                Some((Status::Detail, line.clone()))
            }
            BuildEvent::PackagingStarted { package, files, .. } => Some((
                Status::Progress,
                format!("Packaging {package} ({files} files)"),
            )),
            BuildEvent::Completed {
                artifact, duration, ..
            } => Some((
                Status::Success,
                format!("Built {} in {:.1}s", artifact.display(), duration.as_secs_f64()),
            )),
            BuildEvent::Cancelled { stage, .. } => {
                Some((Status::Warning, format!("Build cancelled while {stage}")))
            }
            _ => None,
        }
    }

    fn show(&self, status: Status, message: &str) {
        let line = if self.colors_enabled {
            format!("{} {message}", status.style().apply_to(status.marker()))
        } else {
            format!("{} {message}", status.marker())
        };
        // A closed stderr is not worth failing the command over
        let _ = self.term.write_line(&line);
    }
}

fn describe_install(event: &InstallEvent) -> Option<(Status, String)> {
    match event {
        InstallEvent::Started { env_root, packages } => Some((
            Status::Info,
            format!("Installing {packages} packages into {}", env_root.display()),
        )),
        InstallEvent::FetchCompleted {
            package,
            cached: false,
            ..
        } => Some((Status::Progress, format!("Fetched {package}"))),
        InstallEvent::FetchRetrying {
            package, attempt, ..
        } => Some((
            Status::Warning,
            format!("Retrying fetch of {package} (attempt {attempt})"),
        )),
        InstallEvent::ConflictDetected {
            path,
            first,
            second,
        } => Some((
            Status::Error,
            format!("{path} is provided by both {first} and {second}"),
        )),
        InstallEvent::PackageInstalled { package, .. } => {
            Some((Status::Success, format!("Installed {package}")))
        }
        InstallEvent::RolledBack { packages } => Some((
            Status::Warning,
            format!("Rolled back {} packages", packages.len()),
        )),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Info,
    Progress,
    Detail,
    Success,
    Warning,
    Error,
}

impl Status {
    fn marker(self) -> &'static str {
        match self {
            Self::Info => "::",
            Self::Progress => "->",
            Self::Detail => "  |",
            Self::Success => "ok",
            Self::Warning => "!!",
            Self::Error => "xx",
        }
    }

    fn style(self) -> Style {
        match self {
            Self::Info => Style::new().cyan().bold(),
            Self::Progress => Style::new().blue(),
            Self::Detail => Style::new().dim(),
            Self::Success => Style::new().green().bold(),
            Self::Warning => Style::new().yellow().bold(),
            Self::Error => Style::new().red().bold(),
        }
    }
}
