//! CLI entry point for the fr-converge file convergence engine.
//!
//! Loads a JSON resource definition, orders the resources so parent
//! directories come before their contents, and checks, applies, or keeps
//! them converged.
//!
//! # Usage
//!
//! ```bash
//! fr-converge [OPTIONS] <COMMAND>
//!
//! # Report drift without touching anything (exit 1 on drift)
//! fr-converge --config /etc/fr-converge.json check
//!
//! # Converge once
//! fr-converge --config /etc/fr-converge.json apply
//!
//! # Converge, then watch and repair drift until Ctrl-C
//! fr-converge --config /etc/fr-converge.json watch
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::WrapErr;
use fr_core::{Config, DirCheckMode, ExhaustionPolicy};
use fr_resource::{AnyResource, Resource, apply_order, resolve_auto_edges};
use fr_watcher::{ControlEvent, Converger, RecheckRequest, WatchContext, WatchError};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Keeps files and directories in their declared state.
#[derive(Parser)]
#[command(name = "fr-converge", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON resource definition.
    #[arg(
        short,
        long,
        global = true,
        env = "FR_CONVERGE_CONFIG",
        default_value = "fr-converge.json"
    )]
    config: Utf8PathBuf,

    /// Also treat unexpected entries in synchronized directories as drift.
    #[arg(long, global = true)]
    strict: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Report which resources have drifted. Changes nothing.
    Check {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Converge every resource once, parents first.
    Apply {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Converge, then watch every resource and repair drift as it happens.
    Watch {
        /// Seconds without activity before a resource counts as converged.
        #[arg(long, value_name = "SECS")]
        converged_timeout: Option<u64>,

        /// Exit once every resource has been idle for the converged timeout.
        #[arg(long)]
        exit_on_converged: bool,
    },
}

/// Result output format.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable table.
    Text,
    /// JSON array.
    Json,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// `notify` is filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Loads the configuration file and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = Config::from_file(&cli.config)
        .wrap_err_with(|| format!("failed to load configuration from {}", cli.config))?;

    if cli.strict {
        config.sync.dir_check = DirCheckMode::Strict;
    }
    if let Commands::Watch {
        converged_timeout: Some(secs),
        ..
    } = cli.command
    {
        config.converger.timeout_secs = Some(secs);
    }

    Ok(config)
}

// =============================================================================
// PLAN
// =============================================================================

/// What happened to one resource during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Converged,
    Drifted,
    Applied,
    Failed,
    Skipped,
}

impl Status {
    const fn label(self) -> &'static str {
        match self {
            Self::Converged => "ok",
            Self::Drifted => "drifted",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Serialize)]
struct Outcome {
    name: String,
    path: String,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Validated resources with their apply order.
struct Plan {
    resources: Vec<Arc<AnyResource>>,
    order: Vec<usize>,
    /// `deps[i]` lists the resources `i` must wait for.
    deps: Vec<Vec<usize>>,
}

impl Plan {
    /// Builds resources from `config` and orders them.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid resource or a dependency cycle.
    fn build(config: &Config) -> color_eyre::Result<Self> {
        let resources = AnyResource::from_config(config)?;
        let edges = resolve_auto_edges(&resources);
        let order = apply_order(&resources, &edges)?;

        let mut deps = vec![Vec::new(); resources.len()];
        for edge in &edges {
            deps[edge.after].push(edge.before);
        }
        debug!(resources = resources.len(), edges = edges.len(), "Plan built");

        Ok(Self {
            resources: resources.into_iter().map(Arc::new).collect(),
            order,
            deps,
        })
    }

    fn find(&self, name: &str) -> Option<&Arc<AnyResource>> {
        self.resources.iter().find(|r| r.name() == name)
    }

    /// Runs `check_apply` over every resource in order.
    ///
    /// When applying, a resource whose dependency failed is skipped.
    fn run(&self, apply: bool) -> Vec<Outcome> {
        let mut blocked = vec![false; self.resources.len()];
        let mut outcomes = Vec::with_capacity(self.resources.len());

        for &index in &self.order {
            let resource = &self.resources[index];
            let mut outcome = Outcome {
                name: resource.name().to_owned(),
                path: resource.path(),
                status: Status::Skipped,
                error: None,
            };

            if apply && self.deps[index].iter().any(|&dep| blocked[dep]) {
                warn!(resource = %outcome.name, "Skipping, a dependency failed");
                blocked[index] = true;
                outcomes.push(outcome);
                continue;
            }

            outcome.status = match resource.check_apply(apply) {
                Ok(true) => Status::Converged,
                Ok(false) if apply => Status::Applied,
                Ok(false) => Status::Drifted,
                Err(err) => {
                    warn!(resource = %outcome.name, error = %err, "CheckApply failed");
                    blocked[index] = true;
                    outcome.error = Some(err.to_string());
                    Status::Failed
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Reports drift without changing anything.
///
/// # Errors
///
/// Returns an error if the plan cannot be built or output fails.
fn run_check(config: &Config, format: OutputFormat) -> color_eyre::Result<ExitCode> {
    info!(resources = config.resources.len(), "Checking");
    let outcomes = Plan::build(config)?.run(false);
    print_outcomes(&outcomes, format)?;

    let clean = outcomes.iter().all(|o| o.status == Status::Converged);
    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Converges every resource once.
///
/// # Errors
///
/// Returns an error if the plan cannot be built or output fails.
fn run_apply(config: &Config, format: OutputFormat) -> color_eyre::Result<ExitCode> {
    info!(resources = config.resources.len(), "Applying");
    let outcomes = Plan::build(config)?.run(true);
    print_outcomes(&outcomes, format)?;
    Ok(exit_code(&outcomes))
}

/// Converges once, then runs one watch loop per resource until interrupted.
///
/// Each recheck request is answered with `check_apply(true)` on a blocking
/// thread and then acknowledged, which releases the requesting loop.
///
/// # Errors
///
/// Returns an error if the plan cannot be built or the initial pass panics.
async fn run_watch(config: &Config, exit_on_converged: bool) -> color_eyre::Result<ExitCode> {
    let plan = Arc::new(Plan::build(config)?);

    let initial = {
        let plan = Arc::clone(&plan);
        tokio::task::spawn_blocking(move || plan.run(true)).await?
    };
    print_outcomes(&initial, OutputFormat::Text)?;

    if plan.resources.is_empty() {
        info!("Nothing to watch");
        return Ok(exit_code(&initial));
    }

    let timeout = config.converger.timeout();
    if exit_on_converged && timeout.is_none() {
        warn!("--exit-on-converged has no effect without a converged timeout");
    }

    let converger = Converger::new(timeout);
    let (recheck_tx, mut rechecks) = mpsc::channel::<RecheckRequest>(plan.resources.len());
    let mut controls = Vec::with_capacity(plan.resources.len());
    let mut loops = JoinSet::new();

    for resource in &plan.resources {
        let (control_tx, control) = mpsc::channel(1);
        controls.push(control_tx);
        let ctx = WatchContext {
            control,
            recheck: recheck_tx.clone(),
            converger: converger.register(),
        };
        let resource = Arc::clone(resource);
        loops.spawn(async move {
            let result = resource.watch(ctx).await;
            (resource.name().to_owned(), result)
        });
    }
    drop(recheck_tx);

    info!(resources = plan.resources.len(), "Watching");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let policy = config.watch.on_exhausted;
    let mut failed = false;

    loop {
        tokio::select! {
            Some(request) = rechecks.recv() => {
                recheck(&plan, request).await;
            }
            Some(joined) = loops.join_next() => {
                if !on_loop_exit(joined, policy, &mut failed) || loops.is_empty() {
                    break;
                }
            }
            result = &mut shutdown => {
                if let Err(err) = result {
                    warn!(error = %err, "Signal handler failed");
                }
                info!("Shutting down");
                break;
            }
            () = converger.wait_converged(), if exit_on_converged => {
                info!("All resources converged");
                break;
            }
        }
    }

    for control in &controls {
        // a loop that already stopped has dropped its receiver
        let _ = control.try_send(ControlEvent::exit());
    }

    // keep releasing loops blocked on an acknowledgement until all are gone
    loop {
        tokio::select! {
            Some(request) = rechecks.recv() => request.acknowledge(),
            joined = loops.join_next() => match joined {
                Some(joined) => {
                    on_loop_exit(joined, policy, &mut failed);
                }
                None => break,
            },
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Answers one recheck request.
async fn recheck(plan: &Plan, request: RecheckRequest) {
    let Some(resource) = plan.find(&request.resource) else {
        warn!(resource = %request.resource, "Recheck for unknown resource");
        request.acknowledge();
        return;
    };

    let resource = Arc::clone(resource);
    match tokio::task::spawn_blocking(move || resource.check_apply(true)).await {
        Ok(Ok(true)) => debug!(resource = %request.resource, "Still converged"),
        Ok(Ok(false)) => info!(resource = %request.resource, "Repaired drift"),
        Ok(Err(err)) => warn!(resource = %request.resource, error = %err, "CheckApply failed"),
        Err(err) => error!(resource = %request.resource, error = %err, "CheckApply task panicked"),
    }
    request.acknowledge();
}

/// Handles a finished watch loop. Returns `false` if the supervisor should
/// shut everything down.
fn on_loop_exit(
    joined: Result<(String, Result<(), WatchError>), JoinError>,
    policy: ExhaustionPolicy,
    failed: &mut bool,
) -> bool {
    match joined {
        Ok((name, Ok(()))) => {
            info!(resource = %name, "Watch loop stopped");
            true
        }
        Ok((name, Err(err))) if err.is_exhausted() => {
            if policy == ExhaustionPolicy::Unwatch {
                warn!(resource = %name, error = %err, "Out of watches, resource left unwatched");
                return true;
            }
            error!(resource = %name, error = %err, "Out of watches, terminating");
            *failed = true;
            false
        }
        Ok((name, Err(err))) => {
            error!(resource = %name, error = %err, "Watch loop failed");
            *failed = true;
            false
        }
        Err(err) => {
            error!(error = %err, "Watch task panicked");
            *failed = true;
            false
        }
    }
}

/// Completes on Ctrl-C or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn exit_code(outcomes: &[Outcome]) -> ExitCode {
    let ok = outcomes
        .iter()
        .all(|o| matches!(o.status, Status::Converged | Status::Applied));
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Prints one line per resource and a summary, or a JSON array.
fn print_outcomes(outcomes: &[Outcome], format: OutputFormat) -> color_eyre::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut handle, outcomes)?;
            writeln!(handle)?;
        }
        OutputFormat::Text => {
            for outcome in outcomes {
                writeln!(
                    handle,
                    "{:<8} {:<24} {}",
                    outcome.status.label(),
                    outcome.name,
                    outcome.path
                )?;
                if let Some(error) = &outcome.error {
                    writeln!(handle, "         {error}")?;
                }
            }

            let count = |status| outcomes.iter().filter(|o| o.status == status).count();
            writeln!(handle)?;
            writeln!(
                handle,
                "{} resources: {} ok, {} applied, {} drifted, {} failed, {} skipped",
                outcomes.len(),
                count(Status::Converged),
                count(Status::Applied),
                count(Status::Drifted),
                count(Status::Failed),
                count(Status::Skipped),
            )?;
        }
    }

    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Load configuration
    let config = build_config(&cli)?;

    // 5. Route to appropriate command
    match &cli.command {
        Commands::Check { format } => run_check(&config, *format),
        Commands::Apply { format } => run_apply(&config, *format),
        Commands::Watch {
            exit_on_converged, ..
        } => run_watch(&config, *exit_on_converged).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fr_core::{FileSpec, ResourceState};
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path")
    }

    fn config_with(resources: Vec<FileSpec>) -> Config {
        Config {
            resources,
            ..Config::default()
        }
    }

    #[test]
    fn test_cli_parses_watch() {
        let cli = Cli::try_parse_from([
            "fr-converge",
            "--config",
            "/etc/fr.json",
            "watch",
            "--converged-timeout",
            "5",
            "--exit-on-converged",
        ])
        .expect("arguments should parse");
        assert_eq!(cli.config.as_str(), "/etc/fr.json");
        assert!(matches!(
            cli.command,
            Commands::Watch {
                converged_timeout: Some(5),
                exit_on_converged: true
            }
        ));
    }

    #[test]
    fn test_apply_orders_parents_first() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        let config = config_with(vec![
            FileSpec::new("index", format!("{root}/www/index.html")).with_content("hi"),
            FileSpec::new("www", format!("{root}/www/")),
        ]);

        let plan = Plan::build(&config).expect("plan should build");
        let outcomes = plan.run(true);
        let names: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["www", "index"]);
        assert!(outcomes.iter().all(|o| o.status == Status::Applied));
        assert_eq!(
            std::fs::read_to_string(root.join("www/index.html")).expect("read"),
            "hi"
        );

        let again = Plan::build(&config).expect("plan should build").run(false);
        assert!(again.iter().all(|o| o.status == Status::Converged));
    }

    #[test]
    fn test_failed_parent_skips_children() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        std::fs::write(root.join("www"), "not a directory").expect("Failed to write file");
        let config = config_with(vec![
            FileSpec::new("www", format!("{root}/www/")),
            FileSpec::new("index", format!("{root}/www/index.html")),
        ]);

        let outcomes = Plan::build(&config).expect("plan should build").run(true);
        assert_eq!(outcomes[0].status, Status::Failed);
        assert!(outcomes[0].error.is_some());
        assert_eq!(outcomes[1].status, Status::Skipped);
    }

    #[test]
    fn test_check_reports_drift() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        std::fs::write(root.join("stale"), "x").expect("Failed to write file");
        let config = config_with(vec![
            FileSpec::new("stale", format!("{root}/stale")).with_state(ResourceState::Absent),
            FileSpec::new("gone", format!("{root}/gone")).with_state(ResourceState::Absent),
        ]);

        let outcomes = Plan::build(&config).expect("plan should build").run(false);
        assert_eq!(outcomes[0].status, Status::Drifted);
        assert_eq!(outcomes[1].status, Status::Converged);
        assert!(root.join("stale").exists());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = Outcome {
            name: "motd".to_owned(),
            path: "/etc/motd".to_owned(),
            status: Status::Applied,
            error: None,
        };
        assert_eq!(
            serde_json::to_string(&outcome).expect("serialize"),
            r#"{"name":"motd","path":"/etc/motd","status":"applied"}"#
        );
    }

    #[test]
    fn test_exhaustion_policy() {
        let exhausted = || {
            Ok((
                "motd".to_owned(),
                Err(WatchError::Exhausted {
                    path: Utf8PathBuf::from("/etc"),
                }),
            ))
        };

        let mut failed = false;
        assert!(on_loop_exit(exhausted(), ExhaustionPolicy::Unwatch, &mut failed));
        assert!(!failed);

        assert!(!on_loop_exit(exhausted(), ExhaustionPolicy::Terminate, &mut failed));
        assert!(failed);
    }
}
