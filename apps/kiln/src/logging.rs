//! Structured logging integration for events
//!
//! Events emitted by the library crates become `tracing` records with
//! structured fields, under per-domain targets (`kiln::events::build`, ...).

use kiln_events::{
    AppEvent, BuildEvent, EventLevel, GeneralEvent, InstallEvent, ManifestEvent, ResolverEvent,
};
use tracing::{debug, error, info, trace, warn};

/// Initialize tracing/logging
///
/// Logs go to stderr so stdout stays reserved for command output. `--json`
/// switches the formatter to JSON lines; `--debug` or `RUST_LOG` raise the
/// default filter.
pub fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let default_filter = if debug_enabled {
        "info,kiln=debug,kiln_ops=debug"
    } else {
        "warn,kiln=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);
    if json_mode {
        builder.json().init();
    } else {
        builder.with_target(debug_enabled).init();
    }
}

/// Log an event with structured fields at its own level
#[allow(clippy::too_many_lines)]
pub fn log_event_with_tracing(event: &AppEvent) {
    let source = event.event_source();
    let source = source.as_str();

    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(source, context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(source, details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(source, context = ?context, "{message}");
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(source, operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(source, operation = %operation, success, "Operation completed");
            }
            GeneralEvent::OperationFailed { operation, error } => {
                error!(source, operation = %operation, error = %error, "Operation failed");
            }
        },

        AppEvent::Manifest(manifest) => match manifest {
            ManifestEvent::Loaded {
                path,
                name,
                dependencies,
            } => {
                info!(source, path = %path.display(), name = %name, dependencies, "Manifest loaded");
            }
            ManifestEvent::DependencyAdded { path, spec } => {
                info!(source, path = %path.display(), spec = %spec, "Dependency added");
            }
            ManifestEvent::Saved { path } => {
                debug!(source, path = %path.display(), "Manifest saved");
            }
        },

        AppEvent::Build(build) => log_build_event(source, build),

        AppEvent::Resolver(resolver) => match resolver {
            ResolverEvent::Started {
                requested,
                channels,
            } => {
                debug!(source, requested, channels, "Resolution started");
            }
            ResolverEvent::Completed {
                packages,
                duration_ms,
            } => {
                info!(source, packages = ?packages, duration_ms, "Resolution completed");
            }
            ResolverEvent::Failed {
                failure,
                conflicting_packages,
            } => {
                error!(
                    source,
                    code = ?failure.code,
                    conflicting = ?conflicting_packages,
                    hint = ?failure.hint,
                    "Resolution failed: {}",
                    failure.message
                );
            }
        },

        AppEvent::Install(install) => log_install_event(source, install),
    }

    if event.level() == EventLevel::Trace {
        trace!(source, event = ?event, "raw event");
    }
}

fn log_build_event(source: &str, event: &BuildEvent) {
    match event {
        BuildEvent::StateChanged {
            session_id,
            from,
            to,
        } => {
            debug!(source, session = %session_id, from = %from, to = %to, "Build state changed");
        }
        BuildEvent::BackendSelected {
            session_id,
            package,
            backend,
        } => {
            info!(source, session = %session_id, package = %package, backend = %backend, "Backend selected");
        }
        BuildEvent::StepStarted {
            session_id,
            package,
            index,
            total,
            command,
        } => {
            info!(
                source,
                session = %session_id,
                package = %package,
                step = index,
                total,
                "Running {command}"
            );
        }
        BuildEvent::StepOutput {
            package,
            line,
            is_stderr,
            ..
        } => {
            trace!(source, package = %package, stderr = is_stderr, "{line}");
        }
        BuildEvent::StepCompleted {
            package,
            index,
            duration,
            ..
        } => {
            debug!(
                source,
                package = %package,
                step = index,
                duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                "Step completed"
            );
        }
        BuildEvent::PackagingStarted { package, files, .. } => {
            info!(source, package = %package, files, "Packaging");
        }
        BuildEvent::Completed {
            session_id,
            package,
            artifact,
            duration,
        } => {
            info!(
                source,
                session = %session_id,
                package = %package,
                artifact = %artifact.display(),
                duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                "Build completed"
            );
        }
        BuildEvent::Failed {
            session_id,
            package,
            stage,
            failure,
        } => {
            error!(
                source,
                session = %session_id,
                package = ?package,
                stage = %stage,
                code = ?failure.code,
                retryable = failure.retryable,
                "Build failed: {}",
                failure.message
            );
        }
        BuildEvent::Cancelled { session_id, stage } => {
            warn!(source, session = %session_id, stage = %stage, "Build cancelled");
        }
    }
}

fn log_install_event(source: &str, event: &InstallEvent) {
    match event {
        InstallEvent::Started { env_root, packages } => {
            info!(source, env = %env_root.display(), packages, "Install started");
        }
        InstallEvent::UpToDate { env_root, packages } => {
            info!(source, env = %env_root.display(), packages, "Environment up to date");
        }
        InstallEvent::FetchStarted { package } => {
            debug!(source, package = %package, "Fetching");
        }
        InstallEvent::FetchRetrying {
            package,
            attempt,
            delay_ms,
        } => {
            warn!(source, package = %package, attempt, delay_ms, "Retrying fetch");
        }
        InstallEvent::FetchCompleted {
            package,
            cached,
            bytes,
        } => {
            info!(source, package = %package, cached, bytes, "Fetched");
        }
        InstallEvent::ConflictDetected {
            path,
            first,
            second,
        } => {
            error!(source, path = %path, first = %first, second = %second, "File conflict");
        }
        InstallEvent::PackageInstalled { package, files } => {
            info!(source, package = %package, files, "Installed");
        }
        InstallEvent::RolledBack { packages } => {
            warn!(source, packages = ?packages, "Install rolled back");
        }
        InstallEvent::Completed {
            env_root,
            installed,
            duration_ms,
        } => {
            info!(source, env = %env_root.display(), installed, duration_ms, "Install completed");
        }
        InstallEvent::Failed { failure } => {
            error!(
                source,
                code = ?failure.code,
                retryable = failure.retryable,
                "Install failed: {}",
                failure.message
            );
        }
    }
}
