//! kiln - manifest-driven package build orchestrator
//!
//! This is the CLI front end. All work happens in the ops crate; this binary
//! parses arguments, loads configuration, drains events into the terminal and
//! tracing, and renders the final result.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use crate::logging::init_tracing;
use clap::Parser;
use kiln_config::Config;
use kiln_events::EventReceiver;
use kiln_ops::{OperationResult, OpsContextBuilder, OpsCtx};
use kiln_types::{ColorChoice, DepKind, OutputFormat};
use std::process;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;
    let debug = cli.global.debug;

    init_tracing(json_mode, debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {e}");
        let message = e.to_string();
        let mut lines = message.lines();
        eprintln!("Error: {}", lines.next().unwrap_or_default());
        if debug {
            for line in lines {
                eprintln!("  {line}");
            }
            for detail in e.details() {
                eprintln!("  {detail}");
            }
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting kiln v{}", env!("CARGO_PKG_VERSION"));

    // File config (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command);
    config.validate()?;

    let output = config.general.default_output;
    let color = cli.global.color.unwrap_or(config.general.color);
    let colors_enabled = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };

    let (event_sender, event_receiver) = kiln_events::channel();
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let ctx = OpsContextBuilder::new()
        .with_config(config)
        .with_event_sender(event_sender)
        .with_cancellation(cancel)
        .build()?;

    let renderer = OutputRenderer::new(output == OutputFormat::Json, color);
    let mut event_handler =
        EventHandler::new(output == OutputFormat::Tty, colors_enabled, cli.global.debug);

    let result =
        execute_command_with_events(cli.command, ctx, event_receiver, &mut event_handler).await?;

    renderer.render_result(&result)?;

    info!("Command completed successfully");
    Ok(())
}

/// Cancel the running operation on Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    ctx: OpsCtx,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<OperationResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, ctx));

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(command: Commands, ctx: OpsCtx) -> Result<OperationResult, CliError> {
    match command {
        Commands::Build {
            manifest_path,
            output_dir,
            jobs: _,
        } => {
            let report = kiln_ops::build(&ctx, &manifest_path, &output_dir).await?;
            Ok(OperationResult::BuildReport(report))
        }

        Commands::Install {
            manifest_path,
            env,
            artifacts,
        } => {
            let report = if artifacts.is_empty() {
                kiln_ops::install(&ctx, &manifest_path, env.as_deref()).await?
            } else {
                let env_root = env.unwrap_or_else(|| {
                    let path = kiln_manifest::resolve_manifest_path(&manifest_path);
                    kiln_ops::default_env_root(&kiln_manifest::manifest_dir(&path))
                });
                kiln_ops::install_artifacts(&ctx, &artifacts, &env_root).await?
            };
            Ok(OperationResult::InstallReport(report))
        }

        Commands::Add {
            packages,
            manifest_path,
            build,
        } => {
            if packages.iter().any(|p| p.trim().is_empty()) {
                return Err(CliError::InvalidArguments(
                    "package specification cannot be empty".to_string(),
                ));
            }
            let kind = if build { DepKind::Build } else { DepKind::Runtime };
            let manifest = kiln_ops::add(&ctx, &manifest_path, &packages, kind).await?;
            Ok(OperationResult::ManifestUpdated {
                path: kiln_manifest::resolve_manifest_path(&manifest_path),
                runtime: manifest.dependencies.runtime,
                build: manifest.dependencies.build,
            })
        }
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs, command: &Commands) {
    if let Some(color) = global.color {
        config.general.color = color;
    }

    if global.json {
        config.general.default_output = OutputFormat::Json;
    }

    if let Commands::Build {
        jobs: Some(job_count),
        ..
    } = command
    {
        config.build.jobs = *job_count;
    }
}
